//! Provider compatibility layer.
//!
//! Every OpenAI-compatible endpoint family is described by a [`CompatProfile`].
//! Configuration is resolved against that profile once, and message shaping
//! reads only its flags.

pub mod alternation;
pub mod normalize;
pub mod probe;
pub mod profile;
pub mod request;

use crate::config::ModelConfig;
use crate::llm::types::ChatMessage;

pub use profile::{CompatProfile, HeaderStyle, NamePrefix};

/// Endpoint, credential style and model name after normalisation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTarget {
    pub profile: &'static CompatProfile,
    pub base_url: String,
    pub model: String,
    pub header_style: HeaderStyle,
}

impl ResolvedTarget {
    pub fn resolve(config: &ModelConfig) -> Self {
        let profile = CompatProfile::detect(config);
        let base_url = normalize::normalize_base_url(&config.base_url, profile);
        let model = normalize::normalize_model_name(&config.model, profile.name_prefix);
        tracing::info!(
            provider = ?profile.kind,
            base_url = %base_url,
            model = %model,
            "model endpoint resolved"
        );
        Self {
            profile,
            base_url,
            model,
            header_style: profile.header_style,
        }
    }
}

/// Reshape formatted messages into what the profile accepts.
pub fn shape_messages(profile: &CompatProfile, messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let mut messages = messages;
    if !profile.supports_system_role {
        messages = alternation::fold_system_messages(&messages);
    }
    if !profile.allows_image_only_messages {
        messages = alternation::caption_image_only(&messages);
    }
    if profile.requires_alternation {
        messages = alternation::repair_alternation(&messages);
    }
    messages
}
