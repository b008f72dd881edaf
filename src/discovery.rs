//! Search-grounded event discovery.
//!
//! Asks the grounded backend for real upcoming events that match a query and
//! shapes the answer into suggestions the family can add to the calendar.

use crate::llm::{GenerationRequest, GroundingSource, ProviderError, TextGenerator};
use crate::parser::{extract_json, ExtractError};
use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("could not read suggestions: {0}")]
    Extraction(#[from] ExtractError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyMember {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryRequest {
    pub query: String,
    pub family: Vec<FamilyMember>,
    pub as_of: NaiveDate,
}

fn default_travel_minutes() -> u32 {
    30
}

/// One suggested outing. `title` and `start_time` are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSuggestion {
    pub title: String,
    pub start_time: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub budget_estimate: String,
    #[serde(default = "default_travel_minutes")]
    pub travel_time_minutes: u32,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub suggested_attendees: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_url: Option<String>,
}

impl EventSuggestion {
    pub fn display(&self) -> String {
        let mut output = format!("{} - {}", self.title, self.start_time);
        if !self.location.is_empty() {
            output.push_str(&format!("\n   Location: {}", self.location));
        }
        if !self.budget_estimate.is_empty() {
            output.push_str(&format!("\n   Budget: {}", self.budget_estimate));
        }
        if !self.description.is_empty() {
            output.push_str(&format!("\n   {}", self.description));
        }
        output
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiscoveryResult {
    pub suggestions: Vec<EventSuggestion>,
    pub sources: Vec<GroundingSource>,
}

pub fn build_discovery_prompt(request: &DiscoveryRequest) -> String {
    let today = request.as_of.format("%Y-%m-%d");
    let family = request
        .family
        .iter()
        .map(|member| match member.address.as_deref().map(str::trim) {
            Some(address) if !address.is_empty() => format!("{} (Lives at: {})", member.name, address),
            _ => member.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You are an intelligent family calendar assistant.
Current Date: {today}
Available Family Members: {family}

User Query: "{query}"

Task:
1. SEARCH for real-world events matching the query (concerts, movies, shows, local activities) using Google Search.
2. STRICTLY FILTER for events occurring AFTER {today}. Do NOT return past events.
3. VALIDATE existence: Use Google Search to confirm the event is confirmed and tickets/details are available.
4. If the query is generic (e.g. "dinner ideas"), generate creative suggestions (ensure they are open/available).
5. Return a list of 8-10 distinct event suggestions in JSON format. Including multiple times for the same event is allowed.

For each event, provide:
- title: Specific name of event/activity
- description: Brief description (include venue/context). Mention if it involves travel.
- start_time: ISO8601 string (MUST be in the future relative to {today})
- end_time: ISO8601 string
- location: Specific address or venue name
- budget_estimate: e.g. "$50-100", "Free"
- travel_time_minutes: Estimate derived from location (default 30)
- category: One of [Music, Sports, Food, Arts, Family, General]
- suggested_attendees: List of family members likely interested
- reasoning: Why this match?
- ticket_url: URL to buy tickets or official event page (extracted from search results)

Return pure JSON:
{{
    "suggestions": [
        {{ ... }}
    ]
}}"#,
        today = today,
        family = family,
        query = request.query.trim(),
    )
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Parse suggestions out of the model's JSON, skipping malformed entries.
pub fn collect_suggestions(value: &Value) -> Vec<EventSuggestion> {
    let Some(items) = value.get("suggestions").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<EventSuggestion>(item.clone()) {
            Ok(suggestion) if !suggestion.title.trim().is_empty() => Some(suggestion),
            Ok(_) => None,
            Err(e) => {
                warn!("Skipping malformed suggestion: {}", e);
                None
            }
        })
        .map(|mut suggestion| {
            if let Some(url) = suggestion.ticket_url.as_deref().map(str::trim) {
                if is_http_url(url) {
                    suggestion.description = format!("{}\n\n[Buy Tickets]({})", suggestion.description, url);
                }
            }
            suggestion
        })
        .collect()
}

pub struct EventAssistant {
    generator: Arc<dyn TextGenerator>,
}

impl EventAssistant {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub async fn search(&self, request: &DiscoveryRequest) -> Result<DiscoveryResult, DiscoveryError> {
        info!("Searching for events with query: {}", request.query);
        let prompt = build_discovery_prompt(request);

        let generation = self.generator.generate(&GenerationRequest::grounded(prompt)).await?;
        debug!("Grounded search returned {} sources", generation.sources.len());

        let value = extract_json(&generation.text)?;
        let suggestions = collect_suggestions(&value);
        info!("Found {} event suggestions", suggestions.len());

        Ok(DiscoveryResult { suggestions, sources: generation.sources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Generation;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;

    struct CannedSearch {
        reply: Result<Generation, u16>,
        seen: Mutex<Vec<GenerationRequest>>,
    }

    #[async_trait]
    impl TextGenerator for CannedSearch {
        async fn generate(&self, request: &GenerationRequest) -> Result<Generation, ProviderError> {
            self.seen.lock().unwrap().push(request.clone());
            self.reply
                .clone()
                .map_err(|status| ProviderError::Status { status, body: String::new() })
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn request() -> DiscoveryRequest {
        DiscoveryRequest {
            query: "jazz this weekend".to_string(),
            family: vec![
                FamilyMember { name: "Ana".to_string(), address: Some("12 Elm St".to_string()) },
                FamilyMember { name: "Leo".to_string(), address: None },
            ],
            as_of: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
        }
    }

    #[test]
    fn test_prompt_mentions_family_and_date() {
        let prompt = build_discovery_prompt(&request());
        assert!(prompt.contains("Current Date: 2026-10-16"));
        assert!(prompt.contains("Available Family Members: Ana (Lives at: 12 Elm St), Leo"));
        assert!(prompt.contains("User Query: \"jazz this weekend\""));
        assert!(prompt.contains("\"suggestions\": ["));
    }

    #[test]
    fn test_collect_suggestions_appends_ticket_link() {
        let value = json!({"suggestions": [
            {"title": "Jazz at the Pier", "start_time": "2026-10-17T19:00:00", "description": "Outdoor set",
             "ticket_url": "https://tickets.example/jazz"},
            {"title": "Picnic", "start_time": "2026-10-18T12:00:00", "ticket_url": "n/a"},
            {"description": "no title or time"},
            {"title": "  ", "start_time": "2026-10-18T12:00:00"}
        ]});

        let suggestions = collect_suggestions(&value);
        assert_eq!(suggestions.len(), 2);
        assert_eq!(
            suggestions[0].description,
            "Outdoor set\n\n[Buy Tickets](https://tickets.example/jazz)"
        );
        assert_eq!(suggestions[1].description, "");
        assert_eq!(suggestions[1].travel_time_minutes, 30);
    }

    #[tokio::test]
    async fn test_search_returns_suggestions_and_sources() {
        let text = "```json\n{\"suggestions\": [{\"title\": \"Jazz\", \"start_time\": \"2026-10-17T19:00:00\"}]}\n```";
        let generator = Arc::new(CannedSearch {
            reply: Ok(Generation {
                text: text.to_string(),
                sources: vec![GroundingSource { uri: "https://a.example".to_string(), title: None }],
            }),
            seen: Mutex::new(Vec::new()),
        });
        let assistant = EventAssistant::new(generator.clone());

        let result = assistant.search(&request()).await.unwrap();
        assert_eq!(result.suggestions[0].title, "Jazz");
        assert_eq!(result.sources.len(), 1);
        assert!(generator.seen.lock().unwrap()[0].grounded);
    }

    #[tokio::test]
    async fn test_search_errors_propagate() {
        let assistant = EventAssistant::new(Arc::new(CannedSearch {
            reply: Err(503),
            seen: Mutex::new(Vec::new()),
        }));
        assert!(matches!(assistant.search(&request()).await, Err(DiscoveryError::Provider(_))));

        let assistant = EventAssistant::new(Arc::new(CannedSearch {
            reply: Ok(Generation::text("No events found, sorry.")),
            seen: Mutex::new(Vec::new()),
        }));
        assert!(matches!(
            assistant.search(&request()).await,
            Err(DiscoveryError::Extraction(ExtractError::NoJson))
        ));
    }
}
