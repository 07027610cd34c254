use url::Url;

use crate::config::ProviderKind;
use crate::llm::compat::profile::{CompatProfile, NamePrefix, GEMINI_HOST};

const MODELS_PREFIX: &str = "models/";
/// Gemini API versions in preference order; the first is the documented default.
pub const GEMINI_API_VERSIONS: [&str; 2] = ["v1beta", "v1"];
/// Endpoint suffixes users commonly paste along with the base URL.
const ENDPOINT_SUFFIXES: [&str; 3] = ["chat/completions", "responses", "completions"];

/// Strip whitespace and backtick/quote wrapping from a pasted identifier.
fn clean_identifier(raw: &str) -> &str {
    let mut s = raw.trim();
    loop {
        let next = s.trim_matches(['`', '"', '\'']).trim();
        if next == s {
            return s;
        }
        s = next;
    }
}

/// Normalise a model identifier and apply the target's prefix convention.
pub fn normalize_model_name(raw: &str, prefix: NamePrefix) -> String {
    let cleaned = clean_identifier(raw);
    let bare = cleaned.strip_prefix(MODELS_PREFIX).unwrap_or(cleaned);
    match prefix {
        NamePrefix::Plain => bare.to_string(),
        NamePrefix::Models => format!("{MODELS_PREFIX}{bare}"),
    }
}

fn parse_lenient(raw: &str) -> Option<Url> {
    let cleaned = clean_identifier(raw);
    if cleaned.is_empty() {
        return None;
    }
    let with_scheme = if cleaned.contains("://") {
        cleaned.to_string()
    } else {
        format!("https://{cleaned}")
    };
    let url = Url::parse(&with_scheme).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }
    Some(url)
}

/// Path with exactly one trailing slash and no pasted endpoint suffix.
fn canonical_path(path: &str) -> String {
    let mut trimmed = path.trim_end_matches('/');
    for suffix in ENDPOINT_SUFFIXES {
        if let Some(stripped) = trimmed.strip_suffix(suffix) {
            trimmed = stripped.trim_end_matches('/');
            break;
        }
    }
    format!("{trimmed}/")
}

/// Canonicalise a base URL into a versioned API root ending with `/`.
///
/// Unparseable input and documentation links fall back to the profile's
/// documented endpoint; a bare host gets the profile's version path.
pub fn normalize_base_url(raw: &str, profile: &CompatProfile) -> String {
    let Some(mut url) = parse_lenient(raw) else {
        tracing::warn!(base_url = raw, fallback = profile.default_base_url, "unparseable base URL, using default");
        return profile.default_base_url.to_string();
    };
    url.set_query(None);
    url.set_fragment(None);

    if profile.docs_host.is_some_and(|docs| url.host_str() == Some(docs)) {
        tracing::debug!(base_url = raw, "documentation URL mapped to API root");
        return profile.default_base_url.to_string();
    }
    if profile.kind == ProviderKind::Gemini {
        if let Some(base) = gemini_base_url(&url, None) {
            return base;
        }
        // Any other host is a proxy in front of Gemini; keep its path.
    }

    let mut path = canonical_path(url.path());
    if path == "/" {
        path.push_str(profile.version_path);
    }
    url.set_path(&path);
    url.to_string()
}

/// API version segment found in a Gemini URL path, if any.
pub fn gemini_version(url: &Url) -> Option<&'static str> {
    let segments: Vec<&str> = url.path_segments().map(|s| s.collect()).unwrap_or_default();
    ["v1beta", "v1alpha", "v1"]
        .into_iter()
        .find(|v| segments.contains(v))
}

/// Build the OpenAI-compatibility root for a Gemini URL.
///
/// Documentation links and other hosts map to the default endpoint; a bare
/// host gets the recommended version. `version` forces a specific version.
pub fn gemini_base_url(url: &Url, version: Option<&str>) -> Option<String> {
    if url.host_str() != Some(GEMINI_HOST) {
        return None;
    }
    let version = version
        .or_else(|| gemini_version(url))
        .unwrap_or(GEMINI_API_VERSIONS[0]);
    Some(format!("https://{GEMINI_HOST}/{version}/openai/"))
}

/// Gemini base URL for an explicit API version, derived from the user's value.
pub fn gemini_base_url_for_version(raw: &str, version: &str) -> String {
    let fallback = || format!("https://{GEMINI_HOST}/{version}/openai/");
    parse_lenient(raw)
        .and_then(|url| gemini_base_url(&url, Some(version)))
        .unwrap_or_else(fallback)
}
