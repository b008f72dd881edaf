//! Gemini `generateContent` backend with optional Google Search grounding.

use super::{Generation, GenerationRequest, GroundingSource, ProviderError, TextGenerator};
use crate::config::LanguageModelConfig;
use crate::env_manager;
use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const API_KEY_VAR: &str = "GEMINI_API_KEY";

pub struct GeminiClient {
    client: Client,
    api_base: String,
    model: String,
    api_key: Option<SecretString>,
}

impl GeminiClient {
    pub fn new(model: impl Into<String>, api_key: Option<SecretString>) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(120)).build()?,
            api_base: DEFAULT_API_BASE.to_string(),
            model: model.into(),
            api_key,
        })
    }

    pub fn from_config(config: &LanguageModelConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_base: config
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            model: config.model.clone(),
            api_key: env_manager::api_key(API_KEY_VAR),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self
    }

    fn request_body(&self, request: &GenerationRequest) -> Value {
        let mut body = json!({
            "contents": [{"role": "user", "parts": [{"text": request.user}]}],
        });
        if let Some(system) = &request.system {
            body["systemInstruction"] = json!({"parts": [{"text": system}]});
        }
        if let Some(temperature) = request.temperature {
            body["generationConfig"] = json!({"temperature": temperature});
        }
        if request.grounded {
            body["tools"] = json!([{"google_search": {}}]);
        }
        body
    }
}

/// Concatenate the text parts of the first candidate.
fn candidate_text(response: &Value) -> Option<String> {
    let parts = response["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    if text.is_empty() { None } else { Some(text) }
}

fn grounding_sources(response: &Value) -> Vec<GroundingSource> {
    let Some(chunks) = response["candidates"][0]["groundingMetadata"]["groundingChunks"].as_array()
    else {
        return Vec::new();
    };

    chunks
        .iter()
        .filter_map(|chunk| {
            let web = &chunk["web"];
            let uri = web["uri"].as_str()?;
            Some(GroundingSource {
                uri: uri.to_string(),
                title: web["title"].as_str().map(str::to_string),
            })
        })
        .collect()
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, ProviderError> {
        let api_key = self.api_key.as_ref().ok_or(ProviderError::MissingApiKey(API_KEY_VAR))?;
        let url = format!(
            "{}/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        );
        debug!("Making API call to {} (grounded: {})", url, request.grounded);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key.expose_secret())
            .json(&self.request_body(request))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Status { status: status.as_u16(), body });
        }

        let response_json: Value = serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        let text = candidate_text(&response_json).ok_or_else(|| {
            ProviderError::InvalidResponse("no text parts in first candidate".to_string())
        })?;
        let sources = grounding_sources(&response_json);
        debug!("Gemini returned {} chars with {} grounding sources", text.len(), sources.len());

        Ok(Generation { text, sources })
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
