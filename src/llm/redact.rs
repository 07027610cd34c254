use serde_json::Value;

/// Characters of an image payload kept in logs.
const IMAGE_PREFIX_CHARS: usize = 50;
const TRUNCATED_MARKER: &str = "...[truncated]";

fn is_image_field(key: &str) -> bool {
    matches!(key, "url" | "image_url")
}

fn truncate_image(s: &str) -> String {
    let prefix: String = s.chars().take(IMAGE_PREFIX_CHARS).collect();
    format!("{prefix}{TRUNCATED_MARKER}")
}

fn redact_in_place(value: &mut Value, key: Option<&str>) {
    match value {
        Value::String(s) => {
            let is_data_uri = s.starts_with("data:image/");
            let is_raw_payload = key.is_some_and(is_image_field) && s.len() > IMAGE_PREFIX_CHARS * 2;
            if is_data_uri || is_raw_payload {
                *s = truncate_image(s);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|v| redact_in_place(v, key)),
        Value::Object(map) => map
            .iter_mut()
            .for_each(|(k, v)| redact_in_place(v, Some(k.as_str()))),
        _ => {}
    }
}

/// Copy of `value` with every embedded image payload cut to a short prefix.
/// Only the copy is redacted; the outgoing request keeps the real images.
pub fn redact_images(value: &Value) -> Value {
    let mut copy = value.clone();
    redact_in_place(&mut copy, None);
    copy
}

/// Redacted JSON text, ready for a `tracing` field.
pub fn redacted_json(value: &Value) -> String {
    serde_json::to_string(&redact_images(value)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_data_uri_is_truncated() {
        let payload = format!("data:image/png;base64,{}", "A".repeat(500));
        let fixture = json!({"messages": [{"content": [{"type": "image_url", "image_url": {"url": payload}}]}]});

        let actual = redact_images(&fixture);

        let url = actual["messages"][0]["content"][0]["image_url"]["url"].as_str().unwrap();
        assert_eq!(url.len(), IMAGE_PREFIX_CHARS + TRUNCATED_MARKER.len());
        assert!(url.starts_with("data:image/png;base64,"));
        assert!(url.ends_with(TRUNCATED_MARKER));
    }

    #[test]
    fn test_responses_input_image_is_truncated() {
        let fixture = json!({"input": [{"content": [{"type": "input_image", "image_url": "B".repeat(300)}]}]});

        let actual = redact_images(&fixture);

        let url = actual["input"][0]["content"][0]["image_url"].as_str().unwrap();
        assert!(url.ends_with(TRUNCATED_MARKER));
    }

    #[test]
    fn test_plain_text_is_untouched() {
        let fixture = json!({"messages": [{"role": "user", "content": "click the button"}], "model": "m"});

        let actual = redact_images(&fixture);

        assert_eq!(actual, fixture);
    }
}
