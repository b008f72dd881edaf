//! OpenAI-compatible chat-completion backend.

use super::{Generation, GenerationRequest, ProviderError, TextGenerator};
use crate::config::LanguageModelConfig;
use crate::env_manager;
use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

pub struct OpenAIClient {
    client: Client,
    api_base: String,
    model: String,
    api_key: Option<SecretString>,
}

impl OpenAIClient {
    pub fn new(model: impl Into<String>, api_key: Option<SecretString>) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(60)).build()?,
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

    /// Point the client at another server (proxies, tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, request: &GenerationRequest) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": request.user}));

        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }
}

#[async_trait]
impl TextGenerator for OpenAIClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, ProviderError> {
        let api_key = self.api_key.as_ref().ok_or(ProviderError::MissingApiKey(API_KEY_VAR))?;
        if request.grounded {
            debug!("Chat-completion backend has no search tool, sending ungrounded request");
        }

        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));
        debug!("Making API call to {} with model {}", url, self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key.expose_secret())
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
        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                ProviderError::InvalidResponse("content field not found in response".to_string())
            })?;

        debug!("Raw completion: {}", content);
        Ok(Generation::text(content))
    }

    fn name(&self) -> &str {
        "openai"
    }
}
