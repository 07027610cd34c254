use serde_json::{json, Value};

use crate::config::ModelConfig;
use crate::llm::compat::profile::CompatProfile;
use crate::llm::types::{ChatMessage, ContentPart, MessageContent, ModelVersion, Role};

/// Decoding parameters after profile rules have been applied. `None` fields
/// are omitted from the request body entirely.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestParams {
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub disable_thinking: bool,
}

/// Output token ceiling: explicit value or the version default, lowered to
/// the profile cap. Zero is never sent.
pub fn resolve_max_tokens(explicit: Option<u32>, version: ModelVersion, profile: &CompatProfile) -> Option<u32> {
    let requested = explicit.unwrap_or_else(|| version.default_max_tokens());
    let capped = match profile.max_output_tokens {
        Some(cap) => requested.min(cap),
        None => requested,
    };
    (capped > 0).then_some(capped)
}

pub fn resolve_params(
    config: &ModelConfig,
    model: &str,
    profile: &CompatProfile,
    version: ModelVersion,
) -> RequestParams {
    let (temperature, top_p) = if profile.sends_sampling_params {
        (Some(config.temperature), Some(config.top_p))
    } else {
        (None, None)
    };
    RequestParams {
        model: model.to_string(),
        max_tokens: resolve_max_tokens(config.max_tokens, version, profile),
        temperature,
        top_p,
        disable_thinking: profile.disable_thinking,
    }
}

fn apply_common(body: &mut Value, params: &RequestParams) {
    if let Some(temperature) = params.temperature {
        body["temperature"] = json!(temperature);
    }
    if let Some(top_p) = params.top_p {
        body["top_p"] = json!(top_p);
    }
    if params.disable_thinking {
        body["thinking"] = json!({ "type": "disabled" });
    }
}

/// Chat Completions request body.
pub fn chat_completions_body(params: &RequestParams, messages: &[ChatMessage]) -> Value {
    let mut body = json!({
        "model": params.model,
        "messages": messages,
        "stream": false,
    });
    if let Some(max_tokens) = params.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    apply_common(&mut body, params);
    body
}

/// Responses API request body for one chained input chunk.
pub fn responses_body(params: &RequestParams, input: Vec<Value>, previous_response_id: Option<&str>) -> Value {
    let mut body = json!({
        "model": params.model,
        "input": input,
        "stream": false,
    });
    if let Some(max_tokens) = params.max_tokens {
        body["max_output_tokens"] = json!(max_tokens);
    }
    if let Some(id) = previous_response_id {
        body["previous_response_id"] = json!(id);
    }
    apply_common(&mut body, params);
    body
}

/// Convert a chat message into a Responses API input item.
pub fn to_responses_input(message: &ChatMessage) -> Value {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    match &message.content {
        MessageContent::Text(text) => json!({ "role": role, "content": text }),
        MessageContent::Parts(parts) => {
            let content: Vec<Value> = parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } if message.role == Role::Assistant => {
                        json!({ "type": "output_text", "text": text })
                    }
                    ContentPart::Text { text } => json!({ "type": "input_text", "text": text }),
                    ContentPart::ImageUrl { image_url } => {
                        json!({ "type": "input_image", "image_url": image_url.url })
                    }
                })
                .collect();
            json!({ "role": role, "content": content })
        }
    }
}

/// Text and usage pulled out of an upstream response body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedOutput {
    pub text: String,
    pub total_tokens: u64,
    pub response_id: Option<String>,
}

fn total_tokens(json: &Value) -> u64 {
    json["usage"]["total_tokens"].as_u64().unwrap_or(0)
}

pub fn parse_chat_completion(json: &Value) -> ParsedOutput {
    let content = &json["choices"][0]["message"]["content"];
    // Some compatible servers return content as a parts array.
    let text = match content {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|p| p["text"].as_str())
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    };
    ParsedOutput {
        text,
        total_tokens: total_tokens(json),
        response_id: None,
    }
}

pub fn parse_responses_output(json: &Value) -> ParsedOutput {
    let text = match json["output_text"].as_str() {
        Some(text) => text.to_string(),
        None => json["output"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter(|item| item["type"].as_str().map_or(true, |t| t == "message"))
                    .filter_map(|item| item["content"].as_array())
                    .flatten()
                    .filter(|c| c["type"].as_str() == Some("output_text"))
                    .filter_map(|c| c["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default(),
    };
    ParsedOutput {
        text,
        total_tokens: total_tokens(json),
        response_id: json["id"].as_str().map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::llm::compat::profile::{GEMINI, OPENAI, VOLCENGINE};

    #[test]
    fn test_max_tokens_defaults_per_version() {
        assert_eq!(resolve_max_tokens(None, ModelVersion::V1_5, &OPENAI), Some(65535));
        assert_eq!(resolve_max_tokens(None, ModelVersion::V1_0, &OPENAI), Some(1000));
    }

    #[test]
    fn test_max_tokens_clamped_down_never_up() {
        assert_eq!(resolve_max_tokens(None, ModelVersion::V1_5, &GEMINI), Some(8192));
        assert_eq!(resolve_max_tokens(Some(500), ModelVersion::V1_5, &GEMINI), Some(500));
    }

    #[test]
    fn test_zero_max_tokens_is_omitted() {
        assert_eq!(resolve_max_tokens(Some(0), ModelVersion::V1_0, &OPENAI), None);
    }

    #[test]
    fn test_gemini_body_omits_sampling_params() {
        let config = ModelConfig::new("https://generativelanguage.googleapis.com", "k", "gemini-2.0-flash");
        let params = resolve_params(&config, "gemini-2.0-flash", &GEMINI, ModelVersion::V1_0);

        let actual = chat_completions_body(&params, &[ChatMessage::text(Role::User, "hi")]);

        let expected = json!({
            "model": "gemini-2.0-flash",
            "messages": [{"role": "user", "content": "hi"}],
            "stream": false,
            "max_tokens": 1000,
        });
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_volcengine_body_disables_thinking() {
        let config = ModelConfig::new("https://ark.cn-beijing.volces.com/api/v3", "k", "doubao");
        let params = resolve_params(&config, "doubao", &VOLCENGINE, ModelVersion::Doubao15_20B);

        let actual = chat_completions_body(&params, &[]);

        assert_eq!(actual["thinking"], json!({"type": "disabled"}));
        assert_eq!(actual["temperature"], json!(0.0));
        assert_eq!(actual["top_p"], json!(0.7));
    }

    #[test]
    fn test_responses_body_chains_previous_id() {
        let params = RequestParams {
            model: "m".into(),
            max_tokens: Some(100),
            temperature: None,
            top_p: None,
            disable_thinking: false,
        };

        let actual = responses_body(&params, vec![json!({"role": "user", "content": "x"})], Some("resp_1"));

        let expected = json!({
            "model": "m",
            "input": [{"role": "user", "content": "x"}],
            "stream": false,
            "max_output_tokens": 100,
            "previous_response_id": "resp_1",
        });
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_responses_input_uses_typed_parts() {
        let fixture = ChatMessage::parts(
            Role::User,
            vec![ContentPart::text("look"), ContentPart::image_base64("AAAA")],
        );

        let actual = to_responses_input(&fixture);

        let expected = json!({
            "role": "user",
            "content": [
                {"type": "input_text", "text": "look"},
                {"type": "input_image", "image_url": "data:image/png;base64,AAAA"}
            ]
        });
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_parse_chat_completion() {
        let fixture = json!({
            "choices": [{"message": {"role": "assistant", "content": "Action: wait()"}}],
            "usage": {"total_tokens": 42}
        });

        let actual = parse_chat_completion(&fixture);

        let expected = ParsedOutput {
            text: "Action: wait()".into(),
            total_tokens: 42,
            response_id: None,
        };
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_parse_responses_output_from_items() {
        let fixture = json!({
            "id": "resp_9",
            "output": [
                {"type": "reasoning", "summary": []},
                {"type": "message", "content": [{"type": "output_text", "text": "Action: finished()"}]}
            ],
            "usage": {"total_tokens": 7}
        });

        let actual = parse_responses_output(&fixture);

        let expected = ParsedOutput {
            text: "Action: finished()".into(),
            total_tokens: 7,
            response_id: Some("resp_9".into()),
        };
        assert_eq!(actual, expected);
    }
}
