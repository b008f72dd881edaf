//! Core data types shared by the parsing pipeline and the preference learner.
//!
//! Drafts are loose: each wraps whatever JSON item the model produced, object
//! or not, and downstream persistence applies its own validation rules.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A learned preference handed to the prompt builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceLine {
    pub key: String,
    pub value: String,
    pub confidence: f64,
}

impl PreferenceLine {
    /// Render as `- key: value (Confidence: c)`
    pub fn to_prompt_line(&self) -> String {
        format!("- {}: {} (Confidence: {})", self.key, self.value, self.confidence)
    }
}

/// Everything about a parse except the text itself.
///
/// The voice path builds this before any transcript exists.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseContext {
    pub as_of_date: NaiveDate,
    pub home_address_hint: Option<String>,
    pub preference_context: Vec<PreferenceLine>,
}

impl ParseContext {
    pub fn new(as_of_date: NaiveDate) -> Self {
        Self { as_of_date, home_address_hint: None, preference_context: Vec::new() }
    }

    pub fn with_home_address(mut self, address: Option<String>) -> Self {
        self.home_address_hint = address.filter(|a| !a.trim().is_empty());
        self
    }

    pub fn with_preferences(mut self, preferences: Vec<PreferenceLine>) -> Self {
        self.preference_context = preferences;
        self
    }

    pub fn into_request(self, query_text: impl Into<String>) -> ParseRequest {
        ParseRequest {
            query_text: query_text.into(),
            as_of_date: self.as_of_date,
            home_address_hint: self.home_address_hint,
            preference_context: self.preference_context,
        }
    }
}

/// Immutable input to one multi-intent parse.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseRequest {
    pub query_text: String,
    pub as_of_date: NaiveDate,
    pub home_address_hint: Option<String>,
    pub preference_context: Vec<PreferenceLine>,
}

impl ParseRequest {
    pub fn new(query_text: impl Into<String>, as_of_date: NaiveDate) -> Self {
        ParseContext::new(as_of_date).into_request(query_text)
    }
}

fn str_field<'a>(fields: &'a Value, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
}

/// A calendar event the model extracted but nobody has saved yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventDraft(pub Value);

impl EventDraft {
    pub fn title(&self) -> Option<&str> {
        str_field(&self.0, "title")
    }

    pub fn location(&self) -> Option<&str> {
        str_field(&self.0, "location")
    }

    pub fn category(&self) -> Option<&str> {
        str_field(&self.0, "category")
    }

    pub fn date(&self) -> Option<&str> {
        str_field(&self.0, "date")
    }

    pub fn start_time(&self) -> Option<&str> {
        str_field(&self.0, "start_time")
    }

    pub fn end_time(&self) -> Option<&str> {
        str_field(&self.0, "end_time")
    }

    pub fn attendees(&self) -> Vec<&str> {
        match self.0.get("attendees") {
            Some(Value::Array(names)) => names.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

/// A chore or to-do.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChoreDraft(pub Value);

impl ChoreDraft {
    pub fn title(&self) -> Option<&str> {
        str_field(&self.0, "title")
    }

    pub fn assigned_to(&self) -> Option<&str> {
        str_field(&self.0, "assigned_to")
    }

    pub fn due_date(&self) -> Option<&str> {
        str_field(&self.0, "due_date")
    }

    pub fn reward_amount(&self) -> Option<i64> {
        self.0.get("reward_amount").and_then(Value::as_i64)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShoppingDraft(pub Value);

impl ShoppingDraft {
    pub fn name(&self) -> Option<&str> {
        str_field(&self.0, "name")
    }

    pub fn category(&self) -> Option<&str> {
        str_field(&self.0, "category")
    }
}

/// Output of the multi-intent parser. All three arrays are always present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedIntentBundle {
    #[serde(default)]
    pub events: Vec<EventDraft>,
    #[serde(default)]
    pub chores: Vec<ChoreDraft>,
    #[serde(default)]
    pub shopping_items: Vec<ShoppingDraft>,
    /// Top-level keys the model returned beyond the three arrays.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ParsedIntentBundle {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.chores.is_empty() && self.shopping_items.is_empty()
    }

    pub fn total_items(&self) -> usize {
        self.events.len() + self.chores.len() + self.shopping_items.len()
    }
}

/// A learned per-user attribute such as `location_Soccer -> Lincoln Fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfileAttribute {
    pub user_id: i64,
    pub key: String,
    pub value: String,
    pub confidence: f64,
    pub last_updated: DateTime<Utc>,
}

impl UserProfileAttribute {
    pub fn new(user_id: i64, key: impl Into<String>, value: impl Into<String>, confidence: f64) -> Self {
        Self {
            user_id,
            key: key.into(),
            value: value.into(),
            confidence: confidence.clamp(0.0, 1.0),
            last_updated: Utc::now(),
        }
    }

    pub fn to_preference_line(&self) -> PreferenceLine {
        PreferenceLine {
            key: self.key.clone(),
            value: self.value.clone(),
            confidence: self.confidence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationKind {
    Event,
    #[serde(alias = "todo")]
    Chore,
    Shopping,
    #[serde(other)]
    Other,
}

/// Something the user actually saved, fed back into the preference learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionObservation {
    #[serde(default)]
    pub user_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_text: Option<String>,
    #[serde(rename = "type")]
    pub kind: ObservationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ActionObservation {
    pub fn event(user_id: i64, location: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            user_id,
            input_text: None,
            kind: ObservationKind::Event,
            location: Some(location.into()),
            category: Some(category.into()),
        }
    }

    pub fn other(user_id: i64, kind: ObservationKind) -> Self {
        Self { user_id, input_text: None, kind, location: None, category: None }
    }

    /// Observation for an event draft the user has just saved.
    pub fn from_saved_event(user_id: i64, draft: &EventDraft, input_text: Option<String>) -> Self {
        Self {
            user_id,
            input_text,
            kind: ObservationKind::Event,
            location: draft.location().map(str::to_string),
            category: draft.category().map(str::to_string),
        }
    }
}
