//! Single-label event categorisation.
//!
//! One deterministic completion per event, mapped onto a fixed taxonomy.
//! Transient provider failures are retried with exponential backoff; anything
//! unrecoverable becomes "Other" rather than an error.

pub mod cache;

pub use cache::{cache_key, JsonLabelCache, LabelCache, MemoryLabelCache};

use crate::config::ClassifierConfig;
use crate::llm::{GenerationRequest, TextGenerator};
use crate::parser::utils::truncate_chars;
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_LABELS: &[&str] = &[
    "Music",
    "Sports & Recreation",
    "Food & Drink",
    "Arts & Theatre",
    "Tech & Innovation",
    "Business & Networking",
    "Family & Education",
    "Community & Culture",
    "Health & Wellness",
    "Film & Entertainment",
];

pub const OTHER_LABEL: &str = "Other";
pub const MAX_DESCRIPTION_CHARS: usize = 8000;

const SYSTEM_PROMPT: &str = "You are a short, highly accurate event categorisation engine. \
Always respond with exactly one category name.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl EventRecord {
    pub fn new(title: impl Into<String>, description: Option<String>) -> Self {
        Self { title: title.into(), description }
    }
}

/// Delay source for retries, injected so tests never wait.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Progress callback for batches: `(done, total)`.
pub type Progress<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

pub struct EventClassifier {
    generator: Arc<dyn TextGenerator>,
    labels: Vec<String>,
    max_retries: u32,
    base_delay: Duration,
    sleeper: Arc<dyn Sleeper>,
    cache: Arc<dyn LabelCache>,
}

impl EventClassifier {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            labels: DEFAULT_LABELS.iter().map(|l| l.to_string()).collect(),
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            sleeper: Arc::new(TokioSleeper),
            cache: Arc::new(MemoryLabelCache::new()),
        }
    }

    pub fn from_config(config: &ClassifierConfig, generator: Arc<dyn TextGenerator>) -> Self {
        let classifier = Self::new(generator)
            .with_max_retries(config.max_retries)
            .with_base_delay(Duration::from_millis(config.base_delay_ms));
        match &config.labels {
            Some(labels) if !labels.is_empty() => classifier.with_labels(labels.clone()),
            _ => classifier,
        }
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    /// Total attempts per event. Zero is treated as one.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn LabelCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    fn user_prompt(&self, event: &EventRecord) -> String {
        let description = match event.description.as_deref() {
            Some(d) if !d.trim().is_empty() => truncate_chars(d, MAX_DESCRIPTION_CHARS),
            _ => "(none)",
        };
        let title = if event.title.trim().is_empty() { "(none)" } else { event.title.as_str() };

        format!(
            "Event title: {}\n\nEvent description: {}\n\nChoose a single category from this list: \n- {}\nIf no suitable category exists, respond with 'Other'.\nRespond with JUST the category name.",
            title,
            description,
            self.labels.join("\n- ")
        )
    }

    /// The configured taxonomy plus the "Other" sentinel.
    fn is_known_label(&self, label: &str) -> bool {
        label == OTHER_LABEL || self.labels.iter().any(|l| l == label)
    }

    /// Name of the backend answering classification requests.
    pub fn backend_name(&self) -> &str {
        self.generator.name()
    }

    /// Map a free-form answer onto the taxonomy.
    fn match_label(&self, answer: &str) -> String {
        let is_quote = |c: char| matches!(c, '"' | '\'' | '`' | '*');
        let cleaned = answer
            .trim_end_matches(|c: char| {
                is_quote(c) || c.is_whitespace() || matches!(c, '.' | '!' | ',' | ';' | ':')
            })
            .trim_start_matches(|c: char| is_quote(c) || c.is_whitespace());

        self.labels
            .iter()
            .find(|label| label.eq_ignore_ascii_case(cleaned))
            .cloned()
            .unwrap_or_else(|| OTHER_LABEL.to_string())
    }

    /// Classify one event. Never fails: exhaustion yields "Other".
    pub async fn classify(&self, event: &EventRecord) -> String {
        let key = cache_key(&event.title, event.description.as_deref());
        match self.cache.get(&key) {
            Some(label) if self.is_known_label(&label) => {
                debug!("Label cache hit for {:?}", event.title);
                return label;
            }
            Some(stale) => debug!("Cached label {:?} is not in the taxonomy, reclassifying", stale),
            None => {}
        }

        let request = GenerationRequest::deterministic(SYSTEM_PROMPT, self.user_prompt(event));

        for attempt in 0..self.max_retries {
            match self.generator.generate(&request).await {
                Ok(generation) => {
                    let label = self.match_label(&generation.text);
                    debug!("Classified {:?} as {}", event.title, label);
                    self.cache.put(&key, &label);
                    return label;
                }
                Err(e) if e.is_transient() => {
                    if attempt + 1 >= self.max_retries {
                        warn!(
                            "Classify attempt {}/{} failed ({}), giving up",
                            attempt + 1,
                            self.max_retries,
                            e
                        );
                        break;
                    }
                    let delay = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
                    warn!(
                        "Classify attempt {}/{} failed ({}). Retrying in {:?}...",
                        attempt + 1,
                        self.max_retries,
                        e,
                        delay
                    );
                    self.sleeper.sleep(delay).await;
                }
                Err(e) => {
                    warn!("Classification failed permanently: {}", e);
                    break;
                }
            }
        }

        OTHER_LABEL.to_string()
    }

    /// Classify a batch in input order.
    pub async fn classify_all(&self, events: &[EventRecord], progress: Option<Progress<'_>>) -> Vec<String> {
        let total = events.len();
        let mut labels = Vec::with_capacity(total);
        for (idx, event) in events.iter().enumerate() {
            labels.push(self.classify(event).await);
            if let Some(report) = progress {
                report(idx + 1, total);
            }
        }
        info!("Classified {} events", total);
        labels
    }
}
