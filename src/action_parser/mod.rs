pub mod text;
pub mod types;

use async_trait::async_trait;

use crate::errors::PilotResult;

pub use text::TextActionParser;
pub use types::{ActionInputs, ActionKind, ParseRequest, ParsedAction, ParsedPrediction};

/// Turns raw prediction text into typed actions.
///
/// The invocation engine treats any error as "no actions" and still returns
/// the raw prediction to its caller.
#[async_trait]
pub trait ActionParser: Send + Sync {
    async fn parse(&self, request: &ParseRequest<'_>) -> PilotResult<ParsedPrediction>;
}
