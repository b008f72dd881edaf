//! Coerce extracted JSON into a [`ParsedIntentBundle`].

use super::extractor::ExtractError;
use crate::models::{ChoreDraft, EventDraft, ParsedIntentBundle, ShoppingDraft};
use chrono::NaiveDate;
use log::debug;
use serde_json::{json, Map, Value};

pub const EVENTS_KEY: &str = "events";
pub const CHORES_KEY: &str = "chores";
pub const SHOPPING_KEY: &str = "shopping_items";

pub const FALLBACK_START: &str = "09:00";
pub const FALLBACK_END: &str = "10:00";
pub const FALLBACK_CATEGORY: &str = "General";

/// Take one of the three arrays out of the model object.
///
/// Missing and `null` become empty. A present array is kept item for item;
/// anything else is a shape we cannot pass through.
fn take_items(object: &mut Map<String, Value>, key: &str) -> Result<Vec<Value>, ExtractError> {
    match object.remove(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => {
            debug!("Value for '{}' is not an array: {}", key, other);
            Err(ExtractError::NotAnArray(key.to_string()))
        }
    }
}

/// Normalize the extractor's output.
pub fn normalize(value: Value) -> Result<ParsedIntentBundle, ExtractError> {
    let Value::Object(mut object) = value else {
        return Err(ExtractError::NotAnObject);
    };

    let events = take_items(&mut object, EVENTS_KEY)?.into_iter().map(EventDraft).collect();
    let chores = take_items(&mut object, CHORES_KEY)?.into_iter().map(ChoreDraft).collect();
    let shopping_items =
        take_items(&mut object, SHOPPING_KEY)?.into_iter().map(ShoppingDraft).collect();

    Ok(ParsedIntentBundle { events, chores, shopping_items, extra: object })
}

/// The degraded result: the whole utterance becomes one generic event.
pub fn fallback_bundle(query: &str, as_of: NaiveDate) -> ParsedIntentBundle {
    let event = json!({
        "title": query,
        "start_time": FALLBACK_START,
        "end_time": FALLBACK_END,
        "date": as_of.format("%Y-%m-%d").to_string(),
        "category": FALLBACK_CATEGORY,
    });

    ParsedIntentBundle {
        events: vec![EventDraft(event)],
        chores: Vec::new(),
        shopping_items: Vec::new(),
        extra: Map::new(),
    }
}
