//! Parser traits module for Hearth
//!
//! Callers (the HTTP layer, the terminal, the voice intake) depend on this
//! trait rather than on a concrete pipeline.

use crate::models::{ParseRequest, ParsedIntentBundle};
use async_trait::async_trait;

/// Turns one utterance into structured drafts.
///
/// Implementations must not fail: when the model cannot be reached or its
/// output cannot be understood they return a degraded bundle instead.
#[async_trait]
pub trait IntentParser: Send + Sync {
    async fn parse(&self, request: &ParseRequest) -> ParsedIntentBundle;
}
