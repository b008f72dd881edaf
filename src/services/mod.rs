//! Wiring of the assistant components from configuration.
//!
//! Every entry point (terminal, CLI subcommands, HTTP server) goes through
//! [`Services`] so they all share one parser, learner and classifier.

use crate::classifier::{EventClassifier, JsonLabelCache};
use crate::config::Config;
use crate::discovery::EventAssistant;
use crate::llm::{create_generator, create_grounded_generator};
use crate::models::{ActionObservation, ParseContext, ParsedIntentBundle, PreferenceLine};
use crate::parser::{IntentParser, MultiIntentParser};
use crate::profile::{JsonProfileStore, LearnOutcome, PreferenceLearner};
use crate::state::StoreError;
use crate::transcription::{VoiceIntake, WhisperTranscriber};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::{info, warn};
use std::sync::Arc;

pub struct Services {
    pub parser: Arc<dyn IntentParser>,
    pub learner: Arc<PreferenceLearner>,
    pub classifier: Arc<EventClassifier>,
    pub voice: Arc<VoiceIntake>,
    pub assistant: Arc<EventAssistant>,
}

impl Services {
    pub fn from_config(config: &Config) -> Result<Self> {
        let generator = create_generator(&config.language_model)
            .context("Failed to create language model backend")?;
        let parser: Arc<dyn IntentParser> = Arc::new(MultiIntentParser::new(generator));

        let profile_path = config.profile_path()?;
        info!("Using profile store at {:?}", profile_path);
        let learner = Arc::new(PreferenceLearner::new(Arc::new(JsonProfileStore::new(profile_path))));

        let classifier_backend = create_generator(&config.classifier.backend())
            .context("Failed to create classifier backend")?;
        let classifier = EventClassifier::from_config(&config.classifier, classifier_backend)
            .with_cache(Arc::new(JsonLabelCache::open(config.classifier_cache_path()?)));

        let transcriber = WhisperTranscriber::from_config(&config.transcription)
            .context("Failed to create transcription backend")?;
        let voice = Arc::new(VoiceIntake::new(Arc::new(transcriber), parser.clone()));

        let assistant = Arc::new(EventAssistant::new(create_grounded_generator(config)?));

        Ok(Self { parser, learner, classifier: Arc::new(classifier), voice, assistant })
    }

    /// Learn from a saved action. The profile store does file I/O, so this
    /// runs on the blocking pool.
    pub async fn learn(&self, observation: ActionObservation) -> Result<LearnOutcome, StoreError> {
        let learner = self.learner.clone();
        blocking(move || learner.learn(&observation)).await
    }

    pub async fn active_preferences(&self, user_id: i64) -> Result<Vec<PreferenceLine>, StoreError> {
        let learner = self.learner.clone();
        blocking(move || learner.active_preferences(user_id)).await
    }

    /// Parse context for a user, with their trusted preferences attached.
    ///
    /// A broken profile store degrades to an empty preference list.
    pub async fn parse_context(
        &self,
        user_id: Option<i64>,
        home_address: Option<String>,
        as_of: NaiveDate,
    ) -> ParseContext {
        let preferences = match user_id {
            Some(id) => match self.active_preferences(id).await {
                Ok(preferences) => preferences,
                Err(e) => {
                    warn!("Could not load preferences, parsing without them: {}", e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        ParseContext::new(as_of).with_home_address(home_address).with_preferences(preferences)
    }

    /// Parse typed text for a user.
    pub async fn interact(
        &self,
        query: &str,
        user_id: Option<i64>,
        home_address: Option<String>,
        as_of: NaiveDate,
    ) -> ParsedIntentBundle {
        let request = self.parse_context(user_id, home_address, as_of).await.into_request(query);
        self.parser.parse(&request).await
    }

    pub async fn profile_lines(&self, user_id: i64) -> Result<Vec<String>, StoreError> {
        Ok(self
            .active_preferences(user_id)
            .await?
            .iter()
            .map(|line| line.to_prompt_line())
            .collect())
    }
}

async fn blocking<T, F>(task: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Generation, GenerationRequest, ProviderError, TextGenerator};
    use crate::models::ParseRequest;
    use crate::profile::MemoryProfileStore;
    use crate::transcription::{AudioInput, Transcriber, TranscriptionError};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    struct Recorder {
        prompts: Mutex<Vec<GenerationRequest>>,
    }

    #[async_trait]
    impl TextGenerator for Recorder {
        async fn generate(&self, request: &GenerationRequest) -> Result<Generation, ProviderError> {
            self.prompts.lock().unwrap().push(request.clone());
            Ok(Generation::text(r#"{"events": [], "chores": [], "shopping_items": []}"#))
        }

        fn name(&self) -> &str {
            "recorder"
        }
    }

    struct NoTranscriber;

    #[async_trait]
    impl Transcriber for NoTranscriber {
        async fn transcribe(&self, _audio: &AudioInput) -> Result<String, TranscriptionError> {
            Err(TranscriptionError::EmptyTranscript)
        }

        fn name(&self) -> &str {
            "none"
        }
    }

    fn services(generator: Arc<Recorder>) -> Services {
        let parser: Arc<dyn IntentParser> = Arc::new(MultiIntentParser::new(generator.clone()));
        Services {
            parser: parser.clone(),
            learner: Arc::new(PreferenceLearner::new(Arc::new(MemoryProfileStore::new()))),
            classifier: Arc::new(EventClassifier::new(generator.clone())),
            voice: Arc::new(VoiceIntake::new(Arc::new(NoTranscriber), parser)),
            assistant: Arc::new(EventAssistant::new(generator)),
        }
    }

    #[tokio::test]
    async fn test_learned_preferences_reach_the_prompt() {
        let generator = Arc::new(Recorder { prompts: Mutex::new(Vec::new()) });
        let services = services(generator.clone());
        for _ in 0..2 {
            services.learn(ActionObservation::event(3, "Lincoln Fields", "Soccer")).await.unwrap();
        }

        let as_of = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        services.interact("Soccer Tuesday", Some(3), None, as_of).await;
        services.interact("Soccer Tuesday", Some(4), None, as_of).await;

        let prompts = generator.prompts.lock().unwrap();
        let first = prompts[0].system.as_deref().unwrap_or_default();
        let second = prompts[1].system.as_deref().unwrap_or_default();
        assert!(first.contains("- location_Soccer: Lincoln Fields (Confidence: 0.6)"));
        assert!(!second.contains("location_Soccer"));
    }

    #[tokio::test]
    async fn test_parse_context_without_user() {
        let services = services(Arc::new(Recorder { prompts: Mutex::new(Vec::new()) }));
        let as_of = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let context = services.parse_context(None, Some("  ".to_string()), as_of).await;
        assert_eq!(context.into_request("x"), ParseRequest::new("x", as_of));
    }

    #[test]
    fn test_gemini_parser_keeps_openai_classifier() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.language_model.provider = crate::config::LLMProvider::Gemini;
        config.language_model.model = "gemini-2.0-flash".to_string();
        config.storage.profile_path = Some(dir.path().join("profile.json"));
        config.classifier.cache_path = Some(dir.path().join("cache.json"));

        let services = Services::from_config(&config).unwrap();
        assert_eq!(services.classifier.backend_name(), "openai");
    }
}
