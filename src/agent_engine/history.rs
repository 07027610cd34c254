use serde::{Deserialize, Serialize};

/// Sentinel marking where a screenshot belongs inside conversation text.
pub const IMAGE_PLACEHOLDER: &str = "<image>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Human,
    #[serde(alias = "gpt")]
    Assistant,
}

/// One entry of the agent's conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub from: Speaker,
    pub value: String,
}

impl Turn {
    pub fn human(value: impl Into<String>) -> Self {
        Self {
            from: Speaker::Human,
            value: value.into(),
        }
    }

    pub fn assistant(value: impl Into<String>) -> Self {
        Self {
            from: Speaker::Assistant,
            value: value.into(),
        }
    }

    /// A human turn that consists of nothing but a screenshot.
    pub fn screenshot() -> Self {
        Self::human(IMAGE_PLACEHOLDER)
    }

    pub fn placeholder_count(&self) -> usize {
        match self.from {
            Speaker::Human => self.value.matches(IMAGE_PLACEHOLDER).count(),
            // Assistant output never carries screenshots.
            Speaker::Assistant => 0,
        }
    }

    /// True when removing every placeholder leaves no text behind.
    pub fn is_image_only(&self) -> bool {
        self.placeholder_count() > 0 && self.value.replace(IMAGE_PLACEHOLDER, "").trim().is_empty()
    }
}

pub fn count_placeholders(turns: &[Turn]) -> usize {
    turns.iter().map(Turn::placeholder_count).sum()
}
