use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{PilotError, PilotResult};

/// Environment variable that overrides `model.api_key`.
pub const API_KEY_ENV: &str = "VLMPILOT_API_KEY";
/// Environment variable pointing at an explicit config file.
pub const CONFIG_PATH_ENV: &str = "VLMPILOT_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub context: ContextConfig,
}

/// Endpoint, credential and decoding parameters for one invocation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    /// Forces a compatibility profile instead of detecting it from the URL/model.
    #[serde(default)]
    pub provider: Option<ProviderKind>,
    /// Output token ceiling. Defaults per model version when absent.
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    /// Use the stateful Responses protocol instead of Chat Completions.
    #[serde(default)]
    pub use_responses_api: bool,
    #[serde(default = "default_chat_timeout")]
    pub chat_timeout_secs: u64,
    #[serde(default = "default_responses_timeout")]
    pub responses_timeout_secs: u64,
    /// Overrides the per-version screenshot pixel ceiling.
    #[serde(default)]
    pub max_pixels: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenAi,
    Gemini,
    Volcengine,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Maximum screenshots kept in the rolling window sent to the model.
    #[serde(default = "default_max_images")]
    pub max_images: usize,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_images: default_max_images(),
            system_prompt: None,
        }
    }
}

fn default_temperature() -> f64 {
    0.0
}

fn default_top_p() -> f64 {
    0.7
}

fn default_chat_timeout() -> u64 {
    60
}

fn default_responses_timeout() -> u64 {
    30
}

fn default_max_images() -> usize {
    5
}

impl ModelConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            provider: None,
            max_tokens: None,
            temperature: default_temperature(),
            top_p: default_top_p(),
            use_responses_api: false,
            chat_timeout_secs: default_chat_timeout(),
            responses_timeout_secs: default_responses_timeout(),
            max_pixels: None,
        }
    }
}

fn resolve_config_path() -> PilotResult<PathBuf> {
    if let Ok(explicit) = std::env::var(CONFIG_PATH_ENV) {
        let candidate = PathBuf::from(explicit);
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found via {CONFIG_PATH_ENV}");
            return Ok(candidate);
        }
        tracing::warn!(path = %candidate.display(), "{CONFIG_PATH_ENV} points to a missing file");
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    if let Some(dir) = dirs::config_dir() {
        let candidate = dir.join("vlmpilot").join("config.toml");
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found in user config dir");
            return Ok(candidate);
        }
    }

    Err(PilotError::Config(
        "config.toml not found (checked $VLMPILOT_CONFIG, executable dir, working directory, user config dir)".into(),
    ))
}

/// Parse a config document and apply environment overrides.
pub fn parse_config(content: &str) -> PilotResult<AppConfig> {
    let mut config: AppConfig = toml::from_str(content)?;
    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if !key.trim().is_empty() {
            config.model.api_key = key;
        }
    }
    Ok(config)
}

pub fn load_config() -> PilotResult<AppConfig> {
    let path = resolve_config_path()?;
    let content = std::fs::read_to_string(&path)?;
    let config = parse_config(&content)?;
    tracing::info!(
        path = %path.display(),
        model = %config.model.model,
        responses_api = config.model.use_responses_api,
        "config loaded"
    );
    Ok(config)
}

/// Write `config` back to the file `load_config` would read.
pub fn save_config(config: &AppConfig) -> PilotResult<()> {
    let path = resolve_config_path()?;
    save_config_to(&path, config)
}

pub fn save_config_to(path: &Path, config: &AppConfig) -> PilotResult<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_minimal_config_applies_defaults() {
        let fixture = r#"
            [model]
            base_url = "https://api.openai.com/v1"
            api_key = "sk-test"
            model = "ui-tars-1.5"
        "#;

        let actual: AppConfig = toml::from_str(fixture).unwrap();

        assert_eq!(actual.model.temperature, 0.0);
        assert_eq!(actual.model.top_p, 0.7);
        assert_eq!(actual.model.max_tokens, None);
        assert_eq!(actual.model.provider, None);
        assert!(!actual.model.use_responses_api);
        assert_eq!(actual.model.chat_timeout_secs, 60);
        assert_eq!(actual.model.responses_timeout_secs, 30);
        assert_eq!(actual.context.max_images, 5);
    }

    #[test]
    fn test_parse_provider_override() {
        let fixture = r#"
            [model]
            base_url = "generativelanguage.googleapis.com"
            model = "gemini-2.0-flash"
            provider = "gemini"
            use_responses_api = true

            [context]
            max_images = 1
            system_prompt = "You are a GUI agent."
        "#;

        let actual: AppConfig = toml::from_str(fixture).unwrap();

        assert_eq!(actual.model.provider, Some(ProviderKind::Gemini));
        assert!(actual.model.use_responses_api);
        assert_eq!(actual.context.max_images, 1);
        assert_eq!(actual.context.system_prompt.as_deref(), Some("You are a GUI agent."));
    }

    #[test]
    fn test_saved_config_can_be_read_back() {
        let path = std::env::temp_dir().join(format!("vlmpilot-{}.toml", uuid::Uuid::new_v4()));
        let mut fixture = AppConfig {
            model: ModelConfig::new("http://localhost:8000/v1", "", "ui-tars"),
            context: ContextConfig::default(),
        };
        fixture.model.max_tokens = Some(2048);

        save_config_to(&path, &fixture).unwrap();
        let actual: AppConfig = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(actual.model.max_tokens, Some(2048));
        assert_eq!(actual.model.api_key, "");
    }
}
