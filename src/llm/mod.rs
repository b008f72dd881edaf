//! Text-generation backends.
//!
//! Every backend returns the model text verbatim. Failures are reported as a
//! single [`ProviderError`] so callers decide between fallback and retry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod gemini;
pub mod openai;

pub use gemini::GeminiClient;
pub use openai::OpenAIClient;

use crate::config::{Config, LLMProvider, LanguageModelConfig};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{0} environment variable not set")]
    MissingApiKey(&'static str),
    #[error("request to language model failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("language model returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response from language model: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Transport(_) => true,
            ProviderError::Status { status, .. } => {
                *status == 408 || *status == 429 || (500..600).contains(status)
            }
            ProviderError::MissingApiKey(_) | ProviderError::InvalidResponse(_) => false,
        }
    }
}

/// One request to a text-generation backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationRequest {
    pub system: Option<String>,
    pub user: String,
    /// `None` leaves the provider default in place.
    pub temperature: Option<f32>,
    /// Ask for web-search grounding. Backends without search ignore it.
    pub grounded: bool,
}

impl GenerationRequest {
    /// Deterministic single exchange at temperature 0.0.
    pub fn deterministic(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            user: user.into(),
            temperature: Some(0.0),
            grounded: false,
        }
    }

    /// Search-grounded request with the provider's default temperature.
    pub fn grounded(user: impl Into<String>) -> Self {
        Self { system: None, user: user.into(), temperature: None, grounded: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generation {
    pub text: String,
    pub sources: Vec<GroundingSource>,
}

impl Generation {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), sources: Vec::new() }
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, ProviderError>;

    /// Human-readable backend name for logs.
    fn name(&self) -> &str;
}

/// Build the backend selected by `language_model.provider`.
pub fn create_generator(config: &LanguageModelConfig) -> anyhow::Result<Arc<dyn TextGenerator>> {
    match config.provider {
        LLMProvider::OpenAI => {
            log::info!("Creating OpenAI chat-completion backend ({})", config.model);
            Ok(Arc::new(OpenAIClient::from_config(config)?))
        }
        LLMProvider::Gemini => {
            log::info!("Creating Gemini backend ({})", config.model);
            Ok(Arc::new(GeminiClient::from_config(config)?))
        }
    }
}

/// Backend for the search-grounded discovery flow, chosen by `assistant.provider`.
pub fn create_grounded_generator(config: &Config) -> anyhow::Result<Arc<dyn TextGenerator>> {
    if config.assistant.provider != LLMProvider::Gemini {
        log::warn!("Discovery backend {:?} has no web search; answers will not be grounded", config.assistant.provider);
    }
    create_generator(&config.assistant.backend())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(408, true ; "request timeout")]
    #[test_case(429, true ; "rate limited")]
    #[test_case(500, true ; "server error")]
    #[test_case(503, true ; "unavailable")]
    #[test_case(400, false ; "bad request")]
    #[test_case(401, false ; "unauthorized")]
    fn test_status_transience(status: u16, expected: bool) {
        let err = ProviderError::Status { status, body: String::new() };
        assert_eq!(err.is_transient(), expected);
    }

    #[test]
    fn test_missing_key_is_not_transient() {
        assert!(!ProviderError::MissingApiKey("OPENAI_API_KEY").is_transient());
    }

    #[test]
    fn test_grounded_generator_follows_assistant_provider() {
        let mut config = Config::default();
        assert_eq!(create_grounded_generator(&config).unwrap().name(), "gemini");

        config.assistant.provider = LLMProvider::OpenAI;
        assert_eq!(create_grounded_generator(&config).unwrap().name(), "openai");
    }

    #[test]
    fn test_deterministic_request() {
        let request = GenerationRequest::deterministic("sys", "user");
        assert_eq!(request.temperature, Some(0.0));
        assert!(!request.grounded);
        assert_eq!(request.system.as_deref(), Some("sys"));
    }
}
