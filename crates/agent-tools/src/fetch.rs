//! HTTP Fetch Tool

use std::time::Duration;

use agent_core::tool::ParameterSchema;
use agent_core::{AgentError, Result, Tool, ToolCall, ToolContext, ToolSchema};
use async_trait::async_trait;
use reqwest::Url;
use serde_json::json;

use crate::error::ToolError;

/// Characters of body returned when no limit is given
pub const DEFAULT_MAX_CHARS: u64 = 50_000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("rust-agent/", env!("CARGO_PKG_VERSION"));

/// `fetch` - HTTP GET a URL and return the body text
pub struct FetchTool {
    client: reqwest::Client,
}

impl FetchTool {
    /// Build the HTTP client; fails if the TLS backend cannot be initialized
    pub fn new() -> std::result::Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

fn parse_url(raw: &str) -> std::result::Result<Url, ToolError> {
    let url = Url::parse(raw).map_err(|e| ToolError::InvalidUrl(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ToolError::InvalidUrl(format!("{raw}: unsupported scheme {other}"))),
    }
}

/// Cut `body` to at most `max_chars` characters, noting the original size
fn truncate(body: String, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((cut, _)) => format!(
            "{}\n\n... truncated ({} characters total)",
            &body[..cut],
            body.chars().count()
        ),
        None => body,
    }
}

#[async_trait]
impl Tool for FetchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "fetch".into(),
            description: "Fetch a URL with HTTP GET and return the response body as text.".into(),
            parameters: vec![
                ParameterSchema::required("url", "string", "http or https URL to fetch"),
                ParameterSchema::optional("max_chars", "integer", "Maximum characters of body to return")
                    .with_default(json!(DEFAULT_MAX_CHARS)),
            ],
        }
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String> {
        let url = parse_url(call.required_str("url")?)?;
        let max_chars =
            usize::try_from(call.u64_arg("max_chars").unwrap_or(DEFAULT_MAX_CHARS)).unwrap_or(usize::MAX);

        let response = self.client.get(url.clone()).send().await.map_err(ToolError::from)?;
        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::ToolExecution(format!("HTTP {status} fetching {url}")));
        }

        let body = response.text().await.map_err(ToolError::from)?;
        ctx.info(&format!("fetched {} bytes from {url}", body.len()));
        Ok(truncate(body, max_chars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn fetch(args: serde_json::Value) -> Result<String> {
        let call = ToolCall::new("1", "fetch", args);
        let ctx = ToolContext::new(&call);
        FetchTool::new().unwrap().execute(&call, &ctx).await
    }

    #[tokio::test]
    async fn test_configured_client_sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("user-agent", USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(fetch(json!({"url": server.uri()})).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_fetch_body_and_truncation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("abcdefghij"))
            .mount(&server)
            .await;

        let url = format!("{}/page", server.uri());
        assert_eq!(fetch(json!({"url": &url})).await.unwrap(), "abcdefghij");

        let cut = fetch(json!({"url": &url, "max_chars": 4})).await.unwrap();
        assert!(cut.starts_with("abcd\n"));
        assert!(cut.contains("10 characters total"));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = fetch(json!({"url": server.uri()})).await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_rejects_non_http_urls() {
        let err = fetch(json!({"url": "file:///etc/passwd"})).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolValidation(_)));
        assert!(fetch(json!({"url": "not a url"})).await.is_err());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo".into(), 10), "héllo");
        assert!(truncate("héllo".into(), 2).starts_with("hé\n"));
    }
}
