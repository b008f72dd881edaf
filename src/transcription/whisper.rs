//! Whisper backend: multipart POST to `/audio/transcriptions`.

use super::{AudioInput, Transcriber, TranscriptionError};
use crate::config::TranscriptionConfig;
use crate::env_manager;
use crate::llm::openai::{API_KEY_VAR, DEFAULT_API_BASE};
use crate::llm::ProviderError;
use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::Duration;

pub struct WhisperTranscriber {
    client: Client,
    api_base: String,
    model: String,
    api_key: Option<SecretString>,
}

impl WhisperTranscriber {
    pub fn new(model: impl Into<String>, api_key: Option<SecretString>) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(120)).build()?,
            api_base: DEFAULT_API_BASE.to_string(),
            model: model.into(),
            api_key,
        })
    }

    pub fn from_config(config: &TranscriptionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        log::info!("WhisperTranscriber: model {}", config.model);
        Ok(Self {
            client,
            api_base: config.api_base.clone().unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            model: config.model.clone(),
            api_key: env_manager::api_key(API_KEY_VAR),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &AudioInput) -> Result<String, TranscriptionError> {
        audio.validate()?;
        let api_key = self.api_key.as_ref().ok_or(ProviderError::MissingApiKey(API_KEY_VAR))?;

        let form = Form::new()
            .text("model", self.model.clone())
            .part("file", Part::bytes(audio.bytes.clone()).file_name(audio.file_name.clone()));

        let url = format!("{}/audio/transcriptions", self.api_base.trim_end_matches('/'));
        debug!("Uploading {} to {}", audio.file_name, url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(ProviderError::from)?;

        let status = response.status();
        let body = response.text().await.map_err(ProviderError::from)?;
        if !status.is_success() {
            return Err(ProviderError::Status { status: status.as_u16(), body }.into());
        }

        let json: Value = serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        let text = json["text"]
            .as_str()
            .ok_or_else(|| ProviderError::InvalidResponse("missing 'text' in transcription response".to_string()))?
            .trim()
            .to_string();
        if text.is_empty() {
            return Err(TranscriptionError::EmptyTranscript);
        }
        debug!("Whisper transcription: {text:?}");
        Ok(text)
    }

    fn name(&self) -> &str {
        "whisper"
    }
}
