//! Prompt construction for multi-intent parsing.
//!
//! The prompt is a pure function of the [`ParseRequest`]: same request, same
//! text. The model gets a weekday table so it never does calendar arithmetic.

use crate::models::ParseRequest;
use chrono::{Duration, NaiveDate};

/// A chat prompt split into its system and user parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Weekday names and dates for `as_of + 1 ..= as_of + 7`.
pub fn upcoming_days(as_of: NaiveDate) -> Vec<(String, NaiveDate)> {
    (1..=7)
        .map(|offset| {
            let day = as_of + Duration::days(offset);
            (day.format("%A").to_string(), day)
        })
        .collect()
}

fn address_section(hint: Option<&str>) -> String {
    match hint {
        Some(address) => format!(
            "- User's Home Address: {}\n  (If a generic location name like 'Chase Bank' or 'Grocery Store' is given, assume it is the one closest to this address)\n",
            address
        ),
        None => String::new(),
    }
}

fn preference_section(request: &ParseRequest) -> String {
    if request.preference_context.is_empty() {
        return String::new();
    }

    let lines: Vec<String> =
        request.preference_context.iter().map(|p| p.to_prompt_line()).collect();
    format!(
        "\nLearned Preferences (use these when the text leaves a detail out):\n{}\n",
        lines.join("\n")
    )
}

const OUTPUT_SCHEMA: &str = r#"Output JSON structure:
{
  "events": [
    {
      "title": "Concise Title",
      "description": "Details",
      "location": "Location Name (Specific address if inferred from home + generic name)",
      "date": "YYYY-MM-DD",
      "start_time": "HH:MM (24h)",
      "end_time": "HH:MM (24h, infer duration if missing, default 1h)",
      "attendees": ["Name1"],
      "category": "Category"
    }
  ],
  "chores": [
    {
      "title": "Chore Title",
      "assigned_to": "Name",
      "due_date": "YYYY-MM-DD",
      "reward_amount": 0
    }
  ],
  "shopping_items": [
    {
      "name": "Item Name",
      "category": "Food/General"
    }
  ]
}"#;

const RULES: &str = r#"Rules:
- Resolve relative dates ("next Tuesday", "tomorrow") against Today and the Upcoming Days Reference above.
- If "tonight", assume 19:00 today.
- Infer attendees and assignees from names mentioned in the text (e.g. "Tell Dad to fix the sink" -> chore assigned to Dad).
- Return empty arrays if no items of that type are found. Never omit a key.
- Return ONLY valid JSON. No explanations, no markdown."#;

/// Build the full prompt for one parse.
pub fn build_prompt(request: &ParseRequest) -> Prompt {
    let as_of = request.as_of_date;
    let upcoming: Vec<String> = upcoming_days(as_of)
        .into_iter()
        .map(|(name, day)| format!("- {}: {}", name, day.format("%Y-%m-%d")))
        .collect();

    let system = format!(
        r#"You are an intelligent Family Operating System assistant. Your job is to parse unstructured "stream of consciousness" text from a parent into structured JSON.

Current Context:
- Today: {} ({})
- Upcoming Days Reference:
{}
{}{}
The user may describe mixed intent types in a single message:
1. Calendar Events (appointments, sports, meetings)
2. Chores (tasks assigned to people)
3. Shopping Items (groceries, supplies)

{}

{}"#,
        as_of.format("%Y-%m-%d"),
        as_of.format("%A"),
        upcoming.join("\n"),
        address_section(request.home_address_hint.as_deref()),
        preference_section(request),
        OUTPUT_SCHEMA,
        RULES,
    );

    let user = format!("Parse this family intent: {}", request.query_text);

    Prompt { system, user }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ParseContext, PreferenceLine};
    use pretty_assertions::assert_eq;

    fn friday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[test]
    fn test_upcoming_days_table() {
        let days = upcoming_days(friday());
        assert_eq!(days.len(), 7);
        assert_eq!(days[0], ("Saturday".to_string(), NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()));
        assert_eq!(days[3].0, "Tuesday");
        assert_eq!(days[6], ("Friday".to_string(), NaiveDate::from_ymd_opt(2026, 10, 23).unwrap()));
    }

    #[test]
    fn test_prompt_contains_date_context() {
        let prompt = build_prompt(&ParseRequest::new("Soccer next Tuesday at 5pm", friday()));
        assert!(prompt.system.contains("- Today: 2026-10-16 (Friday)"));
        assert!(prompt.system.contains("- Tuesday: 2026-10-20"));
        assert!(prompt.system.contains("Return ONLY valid JSON"));
        assert!(prompt.system.contains("\"shopping_items\""));
        assert!(!prompt.system.contains("Home Address"));
        assert!(!prompt.system.contains("Learned Preferences"));
        assert_eq!(prompt.user, "Parse this family intent: Soccer next Tuesday at 5pm");
    }

    #[test]
    fn test_prompt_includes_address_and_preferences() {
        let request = ParseContext::new(friday())
            .with_home_address(Some("12 Elm St, Springfield".to_string()))
            .with_preferences(vec![PreferenceLine {
                key: "location_Soccer".to_string(),
                value: "Lincoln Fields".to_string(),
                confidence: 0.8,
            }])
            .into_request("Soccer Saturday");
        let prompt = build_prompt(&request);

        assert!(prompt.system.contains("- User's Home Address: 12 Elm St, Springfield"));
        assert!(prompt.system.contains("'Chase Bank'"));
        assert!(prompt.system.contains("- location_Soccer: Lincoln Fields (Confidence: 0.8)"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let request = ParseRequest::new("buy milk", friday());
        assert_eq!(build_prompt(&request), build_prompt(&request));
    }
}
