//! Hearth parser module
//!
//! The multi-intent pipeline: prompt builder → text generator → response
//! extractor → normalizer. Any failure along the way degrades to the
//! single-event fallback bundle.
pub mod extractor;
pub mod normalizer;
pub mod prompt;
pub mod traits;
pub mod utils;

use crate::llm::{GenerationRequest, TextGenerator};
use crate::models::{ParseRequest, ParsedIntentBundle};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;

pub use extractor::{extract_json, ExtractError};
pub use normalizer::{fallback_bundle, normalize};
pub use prompt::{build_prompt, Prompt};
pub use traits::IntentParser;

/// Why a parse degraded to the fallback bundle.
#[derive(Debug, thiserror::Error)]
pub enum ParseFailure {
    #[error(transparent)]
    Provider(#[from] crate::llm::ProviderError),
    #[error(transparent)]
    Extraction(#[from] ExtractError),
}

/// LLM-backed parser for events, chores and shopping items.
pub struct MultiIntentParser {
    generator: Arc<dyn TextGenerator>,
}

impl MultiIntentParser {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Run the pipeline, surfacing the failure instead of falling back.
    pub async fn try_parse(&self, request: &ParseRequest) -> Result<ParsedIntentBundle, ParseFailure> {
        let sanitized = utils::sanitize_user_input(&request.query_text);
        let prompt = build_prompt(&ParseRequest { query_text: sanitized, ..request.clone() });

        debug!("Sending multi-intent prompt to {}", self.generator.name());
        let generation = self
            .generator
            .generate(&GenerationRequest::deterministic(prompt.system, prompt.user))
            .await?;

        let value = extract_json(&generation.text)?;
        Ok(normalize(value)?)
    }
}

#[async_trait]
impl IntentParser for MultiIntentParser {
    async fn parse(&self, request: &ParseRequest) -> ParsedIntentBundle {
        match self.try_parse(request).await {
            Ok(bundle) => {
                info!(
                    "Parsed {} events, {} chores, {} shopping items",
                    bundle.events.len(),
                    bundle.chores.len(),
                    bundle.shopping_items.len()
                );
                bundle
            }
            Err(e) => {
                warn!("Multi-intent parse failed ({}), using single-event fallback", e);
                fallback_bundle(&request.query_text, request.as_of_date)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Generation, ProviderError};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;

    /// Replays a fixed reply and records the prompts it saw.
    struct ScriptedGenerator {
        reply: Result<String, u16>,
        seen: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedGenerator {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self { reply: Ok(text.to_string()), seen: Mutex::new(Vec::new()) })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self { reply: Err(status), seen: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<Generation, ProviderError> {
            self.seen.lock().unwrap().push(request.clone());
            match &self.reply {
                Ok(text) => Ok(Generation::text(text.clone())),
                Err(status) => Err(ProviderError::Status { status: *status, body: String::new() }),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn request(query: &str) -> ParseRequest {
        ParseRequest::new(query, NaiveDate::from_ymd_opt(2026, 10, 16).unwrap())
    }

    fn fallback_json(query: &str) -> serde_json::Value {
        json!({
            "events": [{
                "title": query,
                "start_time": "09:00",
                "end_time": "10:00",
                "date": "2026-10-16",
                "category": "General"
            }],
            "chores": [],
            "shopping_items": []
        })
    }

    #[tokio::test]
    async fn test_fenced_multi_intent_response() {
        let generator = ScriptedGenerator::replying(
            "```json\n{\"events\": [{\"title\": \"Soccer Practice\", \"date\": \"2026-10-20\"}], \"chores\": [{\"title\": \"Fix sink\", \"assigned_to\": \"Dad\"}], \"shopping_items\": [{\"name\": \"Milk\"}]}\n```",
        );
        let parser = MultiIntentParser::new(generator.clone());

        let bundle = parser.parse(&request("Soccer Tuesday, tell Dad to fix the sink, buy milk")).await;
        assert_eq!(bundle.events[0].title(), Some("Soccer Practice"));
        assert_eq!(bundle.chores[0].assigned_to(), Some("Dad"));
        assert_eq!(bundle.shopping_items[0].name(), Some("Milk"));

        let seen = generator.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].temperature, Some(0.0));
        assert!(seen[0].user.ends_with("buy milk"));
    }

    #[tokio::test]
    async fn test_prose_without_json_falls_back() {
        let parser = MultiIntentParser::new(ScriptedGenerator::replying(
            "I'm sorry, I couldn't understand that request.",
        ));
        let bundle = parser.parse(&request("dentist thing maybe")).await;
        assert_eq!(serde_json::to_value(&bundle).unwrap(), fallback_json("dentist thing maybe"));
    }

    #[tokio::test]
    async fn test_provider_failure_falls_back() {
        let parser = MultiIntentParser::new(ScriptedGenerator::failing(503));
        let bundle = parser.parse(&request("Piano lesson Thursday")).await;
        assert_eq!(serde_json::to_value(&bundle).unwrap(), fallback_json("Piano lesson Thursday"));
    }

    #[tokio::test]
    async fn test_try_parse_surfaces_failure_kind() {
        let parser = MultiIntentParser::new(ScriptedGenerator::failing(429));
        let err = parser.try_parse(&request("x")).await.unwrap_err();
        assert!(matches!(err, ParseFailure::Provider(_)));

        let parser = MultiIntentParser::new(ScriptedGenerator::replying("[1, 2]"));
        let err = parser.try_parse(&request("x")).await.unwrap_err();
        assert!(matches!(err, ParseFailure::Extraction(ExtractError::NotAnObject)));
    }

    #[tokio::test]
    async fn test_missing_key_is_defaulted() {
        let parser = MultiIntentParser::new(ScriptedGenerator::replying(
            r#"{"events": [{"title": "Swim"}], "shopping_items": []}"#,
        ));
        let bundle = parser.parse(&request("Swim Saturday")).await;
        assert_eq!(
            serde_json::to_value(&bundle).unwrap(),
            json!({"events": [{"title": "Swim"}], "chores": [], "shopping_items": []})
        );
    }

    #[tokio::test]
    async fn test_non_array_shape_falls_back() {
        let parser = MultiIntentParser::new(ScriptedGenerator::replying(
            r#"{"events": [], "chores": "none", "shopping_items": []}"#,
        ));
        let bundle = parser.parse(&request("nothing much")).await;
        assert_eq!(serde_json::to_value(&bundle).unwrap(), fallback_json("nothing much"));
    }
}
