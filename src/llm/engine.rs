use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::action_parser::{ActionParser, ParseRequest, ParsedAction, TextActionParser};
use crate::agent_engine::history::Turn;
use crate::agent_engine::state::ModelSession;
use crate::config::{ContextConfig, ModelConfig};
use crate::errors::{PilotError, PilotResult};
use crate::llm::compat::request::{
    chat_completions_body, parse_chat_completion, parse_responses_output, resolve_params, responses_body,
    to_responses_input, ParsedOutput, RequestParams,
};
use crate::llm::compat::{probe, shape_messages, ResolvedTarget};
use crate::llm::formatter::{format_messages, FormatRequest};
use crate::llm::provider::VlmEndpoint;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;
use crate::llm::redact::redacted_json;
use crate::llm::types::{ChatMessage, LlmResponse, ModelVersion, Role};
use crate::perception::box_parser::DEFAULT_FACTORS;
use crate::perception::screenshot::prepare_screenshots;
use crate::perception::types::ScreenContext;

/// One agent step as seen by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeParams {
    /// Full conversation so far, oldest first.
    pub conversations: Vec<Turn>,
    /// Base64 screenshots, one per `<image>` placeholder, oldest first.
    pub images: Vec<String>,
    pub screen_context: ScreenContext,
    pub scale_factor: f64,
    pub model_version: ModelVersion,
    /// Response to chain from on the stateful protocol.
    #[serde(default)]
    pub previous_response_id: Option<String>,
    #[serde(default)]
    pub extra_headers: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeOutput {
    pub prediction: String,
    pub parsed_actions: Vec<ParsedAction>,
    /// Prediction text the action parser could not turn into an action.
    pub unparsed: Option<String>,
    pub cost_time_ms: u64,
    pub cost_tokens: u64,
    pub response_id: Option<String>,
}

/// Runs a single model call per agent step.
///
/// The configuration is fixed for the lifetime of the engine. Per-session
/// mutable state lives in [`ModelSession`], which the caller passes in.
pub struct ModelEngine {
    config: ModelConfig,
    context: ContextConfig,
    target: ResolvedTarget,
    endpoint: Arc<dyn VlmEndpoint>,
    parser: Arc<dyn ActionParser>,
}

/// Run `call` until it finishes, `cancel` fires or `timeout` elapses.
async fn guarded<T, F>(cancel: &CancellationToken, timeout: Duration, call: F) -> PilotResult<T>
where
    F: Future<Output = PilotResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PilotError::Cancelled),
        outcome = tokio::time::timeout(timeout, call) => match outcome {
            Ok(result) => result,
            Err(_) => Err(PilotError::Timeout(timeout.as_secs())),
        },
    }
}

impl ModelEngine {
    pub fn new(config: ModelConfig, context: ContextConfig) -> PilotResult<Self> {
        let target = ResolvedTarget::resolve(&config);
        let endpoint = OpenAiCompatibleProvider::new(
            format!("{:?}", target.profile.kind).to_lowercase(),
            &target.base_url,
            config.api_key.clone(),
            target.header_style,
        )?;
        let parser = TextActionParser::new()?;
        Ok(Self::assemble(config, context, target, Arc::new(endpoint), Arc::new(parser)))
    }

    /// Build an engine around a custom transport and action parser.
    pub fn with_parts(
        config: ModelConfig,
        context: ContextConfig,
        endpoint: Arc<dyn VlmEndpoint>,
        parser: Arc<dyn ActionParser>,
    ) -> Self {
        let target = ResolvedTarget::resolve(&config);
        Self::assemble(config, context, target, endpoint, parser)
    }

    fn assemble(
        config: ModelConfig,
        context: ContextConfig,
        target: ResolvedTarget,
        endpoint: Arc<dyn VlmEndpoint>,
        parser: Arc<dyn ActionParser>,
    ) -> Self {
        if config.use_responses_api && !target.profile.supports_responses_api {
            tracing::warn!(
                provider = ?target.profile.kind,
                "responses API requested but not supported, using chat completions"
            );
        }
        Self {
            config,
            context,
            target,
            endpoint,
            parser,
        }
    }

    pub fn target(&self) -> &ResolvedTarget {
        &self.target
    }

    pub fn uses_responses_api(&self) -> bool {
        self.config.use_responses_api && self.target.profile.supports_responses_api
    }

    /// Format, send and parse one agent step.
    ///
    /// Transport and upstream errors abort the call. A prediction the action
    /// parser cannot handle is still returned, with no actions.
    pub async fn invoke(
        &self,
        session: &mut ModelSession,
        params: InvokeParams,
        cancel: &CancellationToken,
    ) -> PilotResult<InvokeOutput> {
        let response = self.predict(session, &params, cancel).await?;

        let request = ParseRequest {
            prediction: &response.prediction,
            factors: DEFAULT_FACTORS,
            screen_context: params.screen_context,
            scale_factor: params.scale_factor,
            model_version: params.model_version,
        };
        let (parsed_actions, unparsed) = match self.parser.parse(&request).await {
            Ok(parsed) => (parsed.actions, parsed.remainder),
            Err(e) => {
                tracing::warn!(session = %session.session_id, "action parse failed, returning raw prediction: {e}");
                (Vec::new(), Some(response.prediction.clone()))
            }
        };

        Ok(InvokeOutput {
            prediction: response.prediction,
            parsed_actions,
            unparsed,
            cost_time_ms: response.cost_time_ms,
            cost_tokens: response.cost_tokens,
            response_id: response.response_id,
        })
    }

    /// Send one agent step and return the raw prediction.
    pub async fn predict(
        &self,
        session: &mut ModelSession,
        params: &InvokeParams,
        cancel: &CancellationToken,
    ) -> PilotResult<LlmResponse> {
        let profile = self.target.profile;
        let max_pixels = self.config.max_pixels.unwrap_or_else(|| params.model_version.max_pixels());

        let images = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PilotError::Cancelled),
            prepared = prepare_screenshots(&params.images, max_pixels) => prepared?,
        };

        let prompt = format_messages(&FormatRequest {
            history: &params.conversations,
            new_turns: &[],
            system_prompt: self.context.system_prompt.as_deref(),
            images: &images,
            max_images: self.context.max_images,
            images_per_request: profile.max_images_per_request,
        });
        let messages = shape_messages(profile, prompt.messages);
        let request = resolve_params(&self.config, &self.target.model, profile, params.model_version);

        tracing::info!(
            session = %session.session_id,
            messages = messages.len(),
            images = prompt.image_count,
            head_image_turn = ?prompt.head_image_turn,
            responses_api = self.uses_responses_api(),
            "[ModelEngine] invoking model"
        );

        let started = Instant::now();
        let outcome = if self.uses_responses_api() {
            self.send_stateful(session, &messages, prompt.head_image_turn, &request, params, cancel)
                .await
        } else {
            self.send_stateless(&messages, &request, params, cancel).await
        };
        let output = match outcome {
            Ok(output) => output,
            Err(e) => {
                let sent = serde_json::to_value(&messages).unwrap_or_default();
                tracing::error!(
                    session = %session.session_id,
                    messages = %redacted_json(&sent),
                    "[ModelEngine] model call failed: {e}"
                );
                return Err(e);
            }
        };
        let cost_time_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            cost_time_ms,
            cost_tokens = output.total_tokens,
            response_id = ?output.response_id,
            "[ModelEngine] model call finished"
        );

        if output.text.trim().is_empty() {
            return Err(PilotError::EmptyPrediction {
                response_id: output.response_id,
            });
        }
        Ok(LlmResponse {
            prediction: output.text,
            cost_time_ms,
            cost_tokens: output.total_tokens,
            response_id: output.response_id,
        })
    }

    async fn send_stateless(
        &self,
        messages: &[ChatMessage],
        request: &RequestParams,
        params: &InvokeParams,
        cancel: &CancellationToken,
    ) -> PilotResult<ParsedOutput> {
        let timeout = Duration::from_secs(self.config.chat_timeout_secs);
        let body = chat_completions_body(request, messages);
        let json = guarded(
            cancel,
            timeout,
            self.endpoint.chat_completion(body, &params.extra_headers, timeout),
        )
        .await?;
        Ok(parse_chat_completion(&json))
    }

    /// Send only what follows the last assistant turn, one message per
    /// request, chaining response ids.
    ///
    /// Without a previous response id there is nothing to chain to, so the
    /// whole conversation is sent.
    async fn send_stateful(
        &self,
        session: &mut ModelSession,
        messages: &[ChatMessage],
        head_image_turn: Option<usize>,
        request: &RequestParams,
        params: &InvokeParams,
        cancel: &CancellationToken,
    ) -> PilotResult<ParsedOutput> {
        let timeout = Duration::from_secs(self.config.responses_timeout_secs);
        let headers = params.extra_headers.as_slice();

        let pending = match (&params.previous_response_id, messages.iter().rposition(|m| m.role == Role::Assistant)) {
            (Some(_), Some(last_assistant)) => &messages[last_assistant + 1..],
            _ => messages,
        };

        if let Some(stale) = session.head_image.take_superseded(head_image_turn) {
            guarded(cancel, timeout, self.endpoint.delete_response(&stale, headers, timeout)).await?;
            tracing::info!(
                session = %session.session_id,
                response_id = %stale,
                "superseded image context deleted upstream"
            );
        }

        let mut previous = params.previous_response_id.clone();
        let mut total_tokens = 0;
        let mut text = String::new();
        for message in pending {
            let body = responses_body(request, vec![to_responses_input(message)], previous.as_deref());
            let json = guarded(cancel, timeout, self.endpoint.create_response(body, headers, timeout)).await?;
            let output = parse_responses_output(&json);

            total_tokens += output.total_tokens;
            if let Some(id) = output.response_id {
                if message.has_image() {
                    session.head_image.record(head_image_turn, id.clone());
                }
                previous = Some(id);
            }
            text = output.text;
        }

        Ok(ParsedOutput {
            text,
            total_tokens,
            response_id: previous,
        })
    }

    pub async fn is_model_available(&self) -> bool {
        probe::check_model_availability(&self.config).await
    }

    pub async fn supports_responses_api(&self) -> bool {
        probe::check_responses_api_support(&self.config).await
    }
}
