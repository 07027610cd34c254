use serde::{Deserialize, Serialize};

use crate::perception::types::{MAX_PIXELS_DOUBAO, MAX_PIXELS_V1_0, MAX_PIXELS_V1_5};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

impl ChatMessage {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn parts(role: Role, parts: Vec<ContentPart>) -> Self {
        Self {
            role,
            content: MessageContent::Parts(parts),
        }
    }

    pub fn has_image(&self) -> bool {
        self.content.image_count() > 0
    }
}

impl MessageContent {
    /// View the content as a parts list regardless of representation.
    pub fn to_parts(&self) -> Vec<ContentPart> {
        match self {
            Self::Text(text) if text.is_empty() => Vec::new(),
            Self::Text(text) => vec![ContentPart::text(text.clone())],
            Self::Parts(parts) => parts.clone(),
        }
    }

    pub fn image_count(&self) -> usize {
        match self {
            Self::Text(_) => 0,
            Self::Parts(parts) => parts
                .iter()
                .filter(|p| matches!(p, ContentPart::ImageUrl { .. }))
                .count(),
        }
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Image part from base64 PNG data; an existing data URI is kept as is.
    pub fn image_base64(data: &str) -> Self {
        let url = if data.starts_with("data:") {
            data.to_string()
        } else {
            format!("data:image/png;base64,{data}")
        };
        Self::ImageUrl {
            image_url: ImageUrl { url },
        }
    }
}

/// Model family; drives token, pixel and coordinate defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelVersion {
    #[serde(rename = "1.0")]
    V1_0,
    #[serde(rename = "1.5")]
    V1_5,
    #[serde(rename = "doubao-1.5-15B")]
    Doubao15_15B,
    #[serde(rename = "doubao-1.5-20B")]
    Doubao15_20B,
}

impl ModelVersion {
    /// Output token ceiling used when the configuration does not set one.
    pub fn default_max_tokens(self) -> u32 {
        match self {
            Self::V1_5 => 65535,
            Self::V1_0 | Self::Doubao15_15B | Self::Doubao15_20B => 1000,
        }
    }

    pub fn max_pixels(self) -> u32 {
        match self {
            Self::V1_0 => MAX_PIXELS_V1_0,
            Self::V1_5 => MAX_PIXELS_V1_5,
            Self::Doubao15_15B | Self::Doubao15_20B => MAX_PIXELS_DOUBAO,
        }
    }

    /// Whether the model emits absolute coordinates in resized-image space
    /// rather than on a 0..1000 grid.
    pub fn uses_absolute_coordinates(self) -> bool {
        !matches!(self, Self::V1_0)
    }
}

/// Result of one model call, before action parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub prediction: String,
    pub cost_time_ms: u64,
    pub cost_tokens: u64,
    /// Only set on the stateful protocol.
    pub response_id: Option<String>,
}
