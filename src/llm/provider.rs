use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::PilotResult;

/// Extra request headers supplied by the caller, e.g. tracing or tenant ids.
pub type ExtraHeaders = [(String, String)];

/// Transport seam to an OpenAI-compatible model endpoint.
///
/// Implementations send exactly the body they are given; request shaping
/// happens before this point.
#[async_trait]
pub trait VlmEndpoint: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// `POST chat/completions`, returning the decoded JSON body.
    async fn chat_completion(&self, body: Value, headers: &ExtraHeaders, timeout: Duration) -> PilotResult<Value>;

    /// `POST responses`, returning the decoded JSON body.
    async fn create_response(&self, body: Value, headers: &ExtraHeaders, timeout: Duration) -> PilotResult<Value>;

    /// `DELETE responses/{id}`.
    async fn delete_response(&self, response_id: &str, headers: &ExtraHeaders, timeout: Duration) -> PilotResult<()>;
}
