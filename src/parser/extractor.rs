//! Recover a JSON value from raw model output.
//!
//! Models wrap JSON in markdown fences or chat around it. We try, in order:
//! the whole text, a ```` ```json ```` fence, any fence, and finally the span
//! from the first `{` to the last `}`. Malformed JSON is not repaired.

use log::debug;
use serde_json::Value;

const FENCE: &str = "```";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("model response was empty")]
    Empty,
    #[error("no parseable JSON found in model response")]
    NoJson,
    #[error("model response JSON is not an object")]
    NotAnObject,
    #[error("'{0}' in model response is not an array")]
    NotAnArray(String),
}

fn parse_candidate(candidate: &str) -> Option<Value> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }
    serde_json::from_str(candidate).ok()
}

/// Content between the fence opened at `open_end` and the next closing fence.
fn fenced_content(text: &str, open_end: usize) -> Option<&str> {
    let rest = &text[open_end..];
    let close = rest.find(FENCE)?;
    Some(&rest[..close])
}

fn json_fence(text: &str) -> Option<&str> {
    let lower = text.to_ascii_lowercase();
    let start = lower.find("```json")?;
    fenced_content(text, start + "```json".len())
}

fn any_fence(text: &str) -> Option<&str> {
    let start = text.find(FENCE)?;
    let content = fenced_content(text, start + FENCE.len())?;

    // Skip an info string such as `javascript` on the opening line
    let info_len = content
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(content.len());
    Some(&content[info_len..])
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

/// Extract the first JSON value the heuristics can find.
pub fn extract_json(text: &str) -> Result<Value, ExtractError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ExtractError::Empty);
    }

    if let Some(value) = parse_candidate(text) {
        return Ok(value);
    }

    let fenced = if text.to_ascii_lowercase().contains("```json") {
        json_fence(text)
    } else {
        any_fence(text)
    };
    if let Some(value) = fenced.and_then(parse_candidate) {
        debug!("Extracted JSON from fenced block");
        return Ok(value);
    }

    if let Some(value) = brace_span(text).and_then(parse_candidate) {
        debug!("Extracted JSON from brace span");
        return Ok(value);
    }

    Err(ExtractError::NoJson)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_case::test_case;

    #[test]
    fn test_plain_json() {
        let value = extract_json(r#"{"events": [], "chores": []}"#).unwrap();
        assert_eq!(value, json!({"events": [], "chores": []}));
    }

    #[test]
    fn test_json_fence_equals_inner_object() {
        let inner = r#"{"events": [{"title": "Dentist"}], "chores": [], "shopping_items": []}"#;
        let wrapped = format!("```json\n{}\n```", inner);
        assert_eq!(extract_json(&wrapped).unwrap(), serde_json::from_str::<Value>(inner).unwrap());
    }

    #[test]
    fn test_json_fence_with_prose() {
        let text = "Here you go:\n```JSON\n{\"a\": 1}\n```\nLet me know if you need more.";
        assert_eq!(extract_json(text).unwrap(), json!({"a": 1}));
    }

    #[test_case("```\n{\"a\": 1}\n```" ; "bare fence")]
    #[test_case("```javascript\n{\"a\": 1}\n```" ; "other info string")]
    #[test_case("Result:\n```{\"a\": 1}```" ; "inline fence")]
    fn test_generic_fence(text: &str) {
        assert_eq!(extract_json(text).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_brace_span_across_newlines() {
        let text = "Sure! Here is the parsed data:\n{\n  \"events\": [\n    {\"title\": \"Swim\"}\n  ]\n}\nHope that helps.";
        assert_eq!(extract_json(text).unwrap(), json!({"events": [{"title": "Swim"}]}));
    }

    #[test]
    fn test_broken_fence_falls_back_to_brace_span() {
        let text = "```json\nnot json\n``` but later {\"a\": 2}";
        assert_eq!(extract_json(text).unwrap(), json!({"a": 2}));
    }

    #[test_case("" ; "empty")]
    #[test_case("   \n\t " ; "whitespace")]
    fn test_empty_is_failure(text: &str) {
        assert_eq!(extract_json(text), Err(ExtractError::Empty));
    }

    #[test_case("I could not find anything to schedule." ; "prose only")]
    #[test_case("```json\n\n```" ; "empty fence")]
    #[test_case("{\"events\": [" ; "truncated")]
    #[test_case("} backwards {" ; "reversed braces")]
    fn test_no_json(text: &str) {
        assert_eq!(extract_json(text), Err(ExtractError::NoJson));
    }
}
