use crate::config::{ModelConfig, ProviderKind};

/// How the credential is attached to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderStyle {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// Provider-specific key header, e.g. `x-goog-api-key: <key>`.
    ApiKey(&'static str),
    /// Both of the above. Only used while probing for compatibility.
    Both(&'static str),
}

/// Convention for the `models/` prefix on model identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamePrefix {
    Plain,
    Models,
}

/// Capability flags of one family of OpenAI-compatible endpoints.
///
/// A profile is selected once per configuration and every request-shaping
/// step reads its flags instead of re-checking provider identity.
#[derive(Debug, Clone, PartialEq)]
pub struct CompatProfile {
    pub kind: ProviderKind,
    pub supports_system_role: bool,
    pub requires_alternation: bool,
    /// Images sent with one request; earlier screenshots become text stand-ins.
    pub max_images_per_request: Option<usize>,
    pub allows_image_only_messages: bool,
    pub header_style: HeaderStyle,
    /// Custom key header tried while probing.
    pub api_key_header: &'static str,
    pub name_prefix: NamePrefix,
    /// Whether `temperature` / `top_p` may be sent at all.
    pub sends_sampling_params: bool,
    pub max_output_tokens: Option<u32>,
    pub supports_responses_api: bool,
    pub disable_thinking: bool,
    pub default_base_url: &'static str,
    /// Versioned API path appended to a bare host.
    pub version_path: &'static str,
    /// Host serving documentation pages that users paste instead of the API root.
    pub docs_host: Option<&'static str>,
}

pub const OPENAI: CompatProfile = CompatProfile {
    kind: ProviderKind::OpenAi,
    supports_system_role: true,
    requires_alternation: false,
    max_images_per_request: None,
    allows_image_only_messages: true,
    header_style: HeaderStyle::Bearer,
    api_key_header: "api-key",
    name_prefix: NamePrefix::Plain,
    sends_sampling_params: true,
    max_output_tokens: None,
    supports_responses_api: true,
    disable_thinking: false,
    default_base_url: "https://api.openai.com/v1/",
    version_path: "v1/",
    docs_host: Some("platform.openai.com"),
};

pub const GEMINI: CompatProfile = CompatProfile {
    kind: ProviderKind::Gemini,
    supports_system_role: false,
    requires_alternation: true,
    max_images_per_request: Some(1),
    allows_image_only_messages: false,
    header_style: HeaderStyle::ApiKey("x-goog-api-key"),
    api_key_header: "x-goog-api-key",
    name_prefix: NamePrefix::Plain,
    sends_sampling_params: false,
    max_output_tokens: Some(8192),
    supports_responses_api: false,
    disable_thinking: false,
    default_base_url: "https://generativelanguage.googleapis.com/v1beta/openai/",
    version_path: "v1beta/openai/",
    docs_host: Some("ai.google.dev"),
};

pub const VOLCENGINE: CompatProfile = CompatProfile {
    kind: ProviderKind::Volcengine,
    supports_system_role: true,
    requires_alternation: false,
    max_images_per_request: None,
    allows_image_only_messages: true,
    header_style: HeaderStyle::Bearer,
    api_key_header: "api-key",
    name_prefix: NamePrefix::Plain,
    sends_sampling_params: true,
    max_output_tokens: None,
    supports_responses_api: true,
    disable_thinking: true,
    default_base_url: "https://ark.cn-beijing.volces.com/api/v3/",
    version_path: "api/v3/",
    docs_host: Some("www.volcengine.com"),
};

pub const GEMINI_HOST: &str = "generativelanguage.googleapis.com";

impl CompatProfile {
    pub fn for_kind(kind: ProviderKind) -> &'static CompatProfile {
        match kind {
            ProviderKind::OpenAi => &OPENAI,
            ProviderKind::Gemini => &GEMINI,
            ProviderKind::Volcengine => &VOLCENGINE,
        }
    }

    /// Pick the profile for a configuration: explicit override first, then
    /// the endpoint host, then the model name.
    pub fn detect(config: &ModelConfig) -> &'static CompatProfile {
        if let Some(kind) = config.provider {
            return Self::for_kind(kind);
        }
        let base = config.base_url.to_ascii_lowercase();
        let model = config.model.trim().trim_matches('`').trim().to_ascii_lowercase();

        let kind = if base.contains(GEMINI_HOST) || base.contains("ai.google.dev") {
            ProviderKind::Gemini
        } else if base.contains("volces.com") {
            ProviderKind::Volcengine
        } else if model.starts_with("gemini") || model.starts_with("models/gemini") {
            ProviderKind::Gemini
        } else {
            ProviderKind::OpenAi
        };
        tracing::debug!(?kind, base_url = %config.base_url, "compatibility profile selected");
        Self::for_kind(kind)
    }
}
