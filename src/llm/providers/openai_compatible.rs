use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use url::Url;

use crate::errors::{PilotError, PilotResult};
use crate::llm::compat::profile::HeaderStyle;
use crate::llm::provider::{ExtraHeaders, VlmEndpoint};
use crate::llm::redact::redacted_json;

pub struct OpenAiCompatibleProvider {
    id: String,
    base_url: Url,
    api_key: String,
    header_style: HeaderStyle,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    /// `base_url` must already be normalised (versioned, trailing slash).
    pub fn new(
        id: impl Into<String>,
        base_url: &str,
        api_key: impl Into<String>,
        header_style: HeaderStyle,
    ) -> PilotResult<Self> {
        Ok(Self {
            id: id.into(),
            base_url: Url::parse(base_url)?,
            api_key: api_key.into(),
            header_style,
            client: reqwest::Client::new(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        headers: &ExtraHeaders,
        timeout: Duration,
    ) -> PilotResult<reqwest::RequestBuilder> {
        let url = self.base_url.join(path)?;
        let mut builder = self.client.request(method, url).timeout(timeout);

        if !self.api_key.is_empty() {
            builder = match self.header_style {
                HeaderStyle::Bearer => builder.bearer_auth(&self.api_key),
                HeaderStyle::ApiKey(name) => builder.header(name, self.api_key.as_str()),
                HeaderStyle::Both(name) => builder
                    .bearer_auth(&self.api_key)
                    .header(name, self.api_key.as_str()),
            };
        }
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        Ok(builder)
    }

    async fn send(&self, builder: reqwest::RequestBuilder, timeout: Duration) -> PilotResult<serde_json::Value> {
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                PilotError::Timeout(timeout.as_secs())
            } else {
                PilotError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let err_body = response.text().await.unwrap_or_default();
            tracing::warn!(provider = %self.id, status = %status, "upstream returned an error");
            return Err(PilotError::upstream(status, &err_body));
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn post_json(
        &self,
        path: &str,
        body: serde_json::Value,
        headers: &ExtraHeaders,
        timeout: Duration,
    ) -> PilotResult<serde_json::Value> {
        tracing::debug!(
            provider = %self.id,
            path,
            body = %redacted_json(&body),
            "request body (redacted)"
        );
        let builder = self.request(Method::POST, path, headers, timeout)?.json(&body);
        self.send(builder, timeout).await
    }
}

#[async_trait]
impl VlmEndpoint for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn chat_completion(
        &self,
        body: serde_json::Value,
        headers: &ExtraHeaders,
        timeout: Duration,
    ) -> PilotResult<serde_json::Value> {
        self.post_json("chat/completions", body, headers, timeout).await
    }

    async fn create_response(
        &self,
        body: serde_json::Value,
        headers: &ExtraHeaders,
        timeout: Duration,
    ) -> PilotResult<serde_json::Value> {
        self.post_json("responses", body, headers, timeout).await
    }

    async fn delete_response(&self, response_id: &str, headers: &ExtraHeaders, timeout: Duration) -> PilotResult<()> {
        let path = format!("responses/{response_id}");
        let builder = self.request(Method::DELETE, &path, headers, timeout)?;
        let deleted = self.send(builder, timeout).await?;
        tracing::info!(provider = %self.id, response_id, deleted = %deleted, "[DELETE] response removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    async fn setup(header_style: HeaderStyle) -> (mockito::ServerGuard, OpenAiCompatibleProvider) {
        let server = mockito::Server::new_async().await;
        let base = format!("{}/v1/", server.url());
        let provider = OpenAiCompatibleProvider::new("test", &base, "sk-test", header_style).unwrap();
        (server, provider)
    }

    #[tokio::test]
    async fn test_chat_completion_uses_bearer_auth() {
        let (mut server, provider) = setup(HeaderStyle::Bearer).await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_header("x-goog-api-key", Matcher::Missing)
            .match_header("x-trace", "abc")
            .match_body(Matcher::PartialJson(json!({"model": "m"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"content":"ok"}}]}"#)
            .create_async()
            .await;

        let actual = provider
            .chat_completion(json!({"model": "m"}), &[("x-trace".to_string(), "abc".to_string())], TIMEOUT)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(actual["choices"][0]["message"]["content"], "ok");
    }

    #[tokio::test]
    async fn test_api_key_header_style() {
        let (mut server, provider) = setup(HeaderStyle::ApiKey("x-goog-api-key")).await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("x-goog-api-key", "sk-test")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        provider.chat_completion(json!({}), &[], TIMEOUT).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_upstream_error() {
        let (mut server, provider) = setup(HeaderStyle::Bearer).await;
        server
            .mock("POST", "/v1/responses")
            .with_status(400)
            .with_body(r#"{"error":{"message":"bad input"}}"#)
            .create_async()
            .await;

        let actual = provider.create_response(json!({}), &[], TIMEOUT).await;

        match actual {
            Err(PilotError::Upstream { status, message, .. }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "bad input");
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_response() {
        let (mut server, provider) = setup(HeaderStyle::Bearer).await;
        let mock = server
            .mock("DELETE", "/v1/responses/resp_1")
            .with_status(200)
            .with_body(r#"{"id":"resp_1","deleted":true}"#)
            .expect(1)
            .create_async()
            .await;

        provider.delete_response("resp_1", &[], TIMEOUT).await.unwrap();

        mock.assert_async().await;
    }
}
