//! Preference learning.
//!
//! After the user saves something, the learner adjusts a confidence-weighted
//! attribute such as `location_Soccer -> Lincoln Fields`. Attributes above
//! the inclusion gate are fed back into later prompts.

pub mod store;

pub use store::{JsonProfileStore, MemoryProfileStore, ProfileStore};

use crate::models::{ActionObservation, ObservationKind, PreferenceLine, UserProfileAttribute};
use crate::state::StoreError;
use chrono::Utc;
use log::{debug, info};
use serde::Serialize;
use std::sync::Arc;

pub const INITIAL_CONFIDENCE: f64 = 0.5;
pub const REINFORCE_STEP: f64 = 0.1;
pub const CONFLICT_PENALTY: f64 = 0.2;
pub const OVERWRITE_THRESHOLD: f64 = 0.3;
/// Attributes must be strictly above this to reach the prompt.
pub const CONTEXT_GATE: f64 = 0.5;
pub const DEFAULT_CATEGORY: &str = "General";

// Tolerance for comparing rounded confidences against thresholds
const EPSILON: f64 = 1e-9;

/// What a learn step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LearnOutcome {
    /// Not an event, or nothing to learn from.
    Ignored,
    Created,
    Reinforced,
    Weakened,
    /// Confidence ran out and the new value took over.
    Replaced,
}

fn round_confidence(value: f64) -> f64 {
    ((value * 100.0).round() / 100.0).clamp(0.0, 1.0)
}

pub fn location_key(category: &str) -> String {
    format!("location_{}", category)
}

/// Next state of an attribute after observing `observed`.
fn next_attribute(
    current: Option<&UserProfileAttribute>,
    user_id: i64,
    key: &str,
    observed: &str,
) -> (UserProfileAttribute, LearnOutcome) {
    let Some(current) = current else {
        return (
            UserProfileAttribute::new(user_id, key, observed, INITIAL_CONFIDENCE),
            LearnOutcome::Created,
        );
    };

    let mut next = current.clone();
    next.last_updated = Utc::now();

    if current.value == observed {
        next.confidence = round_confidence((current.confidence + REINFORCE_STEP).min(1.0));
        return (next, LearnOutcome::Reinforced);
    }

    next.confidence = round_confidence((current.confidence - CONFLICT_PENALTY).max(0.0));
    if next.confidence <= OVERWRITE_THRESHOLD + EPSILON {
        next.value = observed.to_string();
        next.confidence = INITIAL_CONFIDENCE;
        (next, LearnOutcome::Replaced)
    } else {
        (next, LearnOutcome::Weakened)
    }
}

pub struct PreferenceLearner {
    store: Arc<dyn ProfileStore>,
}

impl PreferenceLearner {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ProfileStore> {
        &self.store
    }

    /// Fold one confirmed action into the user's profile.
    pub fn learn(&self, observation: &ActionObservation) -> Result<LearnOutcome, StoreError> {
        if observation.kind != ObservationKind::Event {
            debug!("Ignoring {:?} observation for user {}", observation.kind, observation.user_id);
            return Ok(LearnOutcome::Ignored);
        }

        let Some(location) =
            observation.location.as_deref().map(str::trim).filter(|l| !l.is_empty())
        else {
            debug!("Event observation without location, nothing to learn");
            return Ok(LearnOutcome::Ignored);
        };
        let category = observation
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CATEGORY);

        let key = location_key(category);
        let user_id = observation.user_id;
        let mut outcome = LearnOutcome::Ignored;

        let updated = self.store.modify(user_id, &key, &mut |current| {
            let (next, result) = next_attribute(current, user_id, &key, location);
            outcome = result;
            Some(next)
        })?;

        if let Some(attr) = updated {
            info!(
                "Learned {:?} for user {}: {} = {} (confidence {})",
                outcome, user_id, attr.key, attr.value, attr.confidence
            );
        }
        Ok(outcome)
    }

    /// Attributes trusted enough for the prompt, ordered by key.
    pub fn active_preferences(&self, user_id: i64) -> Result<Vec<PreferenceLine>, StoreError> {
        Ok(self
            .store
            .list(user_id)?
            .into_iter()
            .filter(|attr| attr.confidence > CONTEXT_GATE + EPSILON)
            .map(|attr| attr.to_preference_line())
            .collect())
    }

    /// The active preferences rendered as prompt lines.
    pub fn profile_context(&self, user_id: i64) -> Result<String, StoreError> {
        let lines: Vec<String> =
            self.active_preferences(user_id)?.iter().map(PreferenceLine::to_prompt_line).collect();
        Ok(lines.join("\n"))
    }
}
