pub mod action_parser;
pub mod agent_engine;
pub mod config;
pub mod errors;
pub mod llm;
pub mod perception;

pub use errors::{PilotError, PilotResult};
pub use llm::engine::{InvokeOutput, InvokeParams, ModelEngine};

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

/// Load the configuration and check that the configured model answers.
///
/// Returns whether the model is reachable with the configured credentials.
pub async fn run() -> PilotResult<bool> {
    init_tracing();

    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let cfg = config::load_config()?;
    let engine = ModelEngine::new(cfg.model.clone(), cfg.context.clone())?;
    let target = engine.target();
    tracing::info!(
        provider = ?target.profile.kind,
        base_url = %target.base_url,
        model = %target.model,
        "checking model endpoint"
    );

    let available = engine.is_model_available().await;
    tracing::info!(available, "model availability check finished");

    let responses_supported = engine.supports_responses_api().await;
    if cfg.model.use_responses_api && !responses_supported {
        tracing::warn!("responses API is enabled in the config but the endpoint does not support it");
    }
    tracing::info!(responses_supported, "responses API check finished");
    Ok(available)
}
