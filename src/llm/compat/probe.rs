//! Connectivity checks for a model configuration.
//!
//! Probing walks a fixed list of endpoint variants and stops at the first
//! one that answers with 2xx. The order is stable: the user's own settings
//! first, then documented variants (API version, then credential header,
//! then model-name prefix).

use std::time::Duration;

use serde_json::json;
use url::Url;

use crate::config::{ModelConfig, ProviderKind};
use crate::llm::compat::normalize::{
    gemini_base_url_for_version, gemini_version, normalize_base_url, normalize_model_name, GEMINI_API_VERSIONS,
};
use crate::llm::compat::profile::{CompatProfile, HeaderStyle, NamePrefix, GEMINI_HOST};
use crate::llm::provider::VlmEndpoint;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;

const PROBE_TIMEOUT: Duration = Duration::from_secs(15);
const PROBE_PROMPT: &str = "hello";

/// One combination of endpoint settings to try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeVariant {
    pub base_url: String,
    pub header_style: HeaderStyle,
    pub model: String,
}

fn header_styles(profile: &CompatProfile) -> Vec<HeaderStyle> {
    vec![
        profile.header_style,
        HeaderStyle::Bearer,
        HeaderStyle::ApiKey(profile.api_key_header),
        HeaderStyle::Both(profile.api_key_header),
    ]
}

fn push_unique(variants: &mut Vec<ProbeVariant>, variant: ProbeVariant) {
    if !variants.contains(&variant) {
        variants.push(variant);
    }
}

/// All variants for `config`, in the order they are tried.
pub fn probe_variants(config: &ModelConfig) -> Vec<ProbeVariant> {
    let profile = CompatProfile::detect(config);
    let base_url = normalize_base_url(&config.base_url, profile);
    let model = normalize_model_name(&config.model, profile.name_prefix);

    let mut variants = vec![ProbeVariant {
        base_url: base_url.clone(),
        header_style: profile.header_style,
        model: model.clone(),
    }];

    let parsed = Url::parse(&base_url).ok();
    let is_gemini_host = parsed.as_ref().is_some_and(|url| url.host_str() == Some(GEMINI_HOST));

    if profile.kind == ProviderKind::Gemini && is_gemini_host {
        let user_version = parsed.as_ref().and_then(gemini_version);
        let versions = user_version.into_iter().chain(GEMINI_API_VERSIONS);
        for version in versions {
            let versioned = gemini_base_url_for_version(&config.base_url, version);
            for header_style in header_styles(profile) {
                for prefix in [NamePrefix::Plain, NamePrefix::Models] {
                    push_unique(
                        &mut variants,
                        ProbeVariant {
                            base_url: versioned.clone(),
                            header_style,
                            model: normalize_model_name(&config.model, prefix),
                        },
                    );
                }
            }
        }
    } else {
        for header_style in header_styles(profile) {
            push_unique(
                &mut variants,
                ProbeVariant {
                    base_url: base_url.clone(),
                    header_style,
                    model: model.clone(),
                },
            );
        }
    }
    variants
}

async fn try_variant(config: &ModelConfig, variant: &ProbeVariant) -> bool {
    let provider = match OpenAiCompatibleProvider::new("probe", &variant.base_url, &config.api_key, variant.header_style)
    {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!(base_url = %variant.base_url, "probe variant skipped: {e}");
            return false;
        }
    };
    let body = json!({
        "model": variant.model,
        "messages": [{ "role": "user", "content": PROBE_PROMPT }],
        "stream": false,
    });
    match provider.chat_completion(body, &[], PROBE_TIMEOUT).await {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!(?variant, "probe variant failed: {e}");
            false
        }
    }
}

/// First variant that answers a minimal completion, if any.
pub async fn probe_model(config: &ModelConfig) -> Option<ProbeVariant> {
    let variants = probe_variants(config);
    let total = variants.len();
    for (i, variant) in variants.into_iter().enumerate() {
        if try_variant(config, &variant).await {
            tracing::info!(attempt = i + 1, total, ?variant, "model reachable");
            return Some(variant);
        }
    }
    tracing::warn!(total, model = %config.model, "model unreachable with every probed variant");
    None
}

pub async fn check_model_availability(config: &ModelConfig) -> bool {
    probe_model(config).await.is_some()
}

/// Create a throwaway response and delete it again.
pub async fn check_responses_api_support(config: &ModelConfig) -> bool {
    let profile = CompatProfile::detect(config);
    let base_url = normalize_base_url(&config.base_url, profile);
    let model = normalize_model_name(&config.model, profile.name_prefix);

    let provider = match OpenAiCompatibleProvider::new("probe", &base_url, &config.api_key, profile.header_style) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("responses check skipped: {e}");
            return false;
        }
    };
    let body = json!({ "model": model, "input": PROBE_PROMPT, "stream": false });

    let created = match provider.create_response(body, &[], PROBE_TIMEOUT).await {
        Ok(json) => json,
        Err(e) => {
            tracing::info!(base_url = %base_url, "responses API not supported: {e}");
            return false;
        }
    };
    if let Some(id) = created["id"].as_str() {
        if let Err(e) = provider.delete_response(id, &[], PROBE_TIMEOUT).await {
            tracing::warn!(response_id = id, "failed to delete probe response: {e}");
        }
    }
    true
}
