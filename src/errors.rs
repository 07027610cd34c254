use thiserror::Error;

/// Upstream error bodies are cut to this many characters before they are
/// stored in an error or logged.
pub const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Error)]
pub enum PilotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upstream error {status}: {message}")]
    Upstream {
        status: u16,
        message: String,
        body: String,
    },

    /// The endpoint answered successfully but produced no usable text.
    #[error("VLM returned an empty prediction (response id: {response_id:?})")]
    EmptyPrediction { response_id: Option<String> },

    #[error("Action parse error: {0}")]
    ActionParse(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Invocation cancelled")]
    Cancelled,
}

impl PilotError {
    /// Build an upstream error from a non-2xx status and the raw response body.
    ///
    /// The message is taken from the OpenAI-style `{"error": {"message": ..}}`
    /// envelope when present, otherwise from the status reason.
    pub fn upstream(status: reqwest::StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                let err = &v["error"];
                err["message"]
                    .as_str()
                    .or_else(|| err.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown status")
                    .to_string()
            });
        Self::Upstream {
            status: status.as_u16(),
            message,
            body: truncate_chars(body, MAX_ERROR_BODY_CHARS),
        }
    }

    pub fn is_empty_prediction(&self) -> bool {
        matches!(self, Self::EmptyPrediction { .. })
    }
}

impl serde::Serialize for PilotError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type PilotResult<T> = Result<T, PilotError>;

pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
