//! Anthropic LLM Provider
//!
//! Implementation of `LlmProvider` over the Anthropic Messages API.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{ContentBlock, Message, Role},
    provider::{Completion, CompletionRequest, FinishReason, LlmProvider, TokenUsage, ToolChoice},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Anthropic provider configuration
#[derive(Clone, Debug)]
pub struct AnthropicConfig {
    /// API key sent as `x-api-key`
    pub api_key: String,

    /// API base URL
    pub base_url: String,

    /// Value of the `anthropic-version` header
    pub api_version: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.anthropic.com".into(),
            api_version: "2023-06-01".into(),
            timeout_secs: 300,
        }
    }
}

impl AnthropicConfig {
    /// Read configuration from the environment.
    ///
    /// `ANTHROPIC_API_KEY` is required; everything else has a default.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AgentError::Config("ANTHROPIC_API_KEY is not set".into()))?;

        let defaults = Self::default();
        let base_url = std::env::var("ANTHROPIC_BASE_URL").unwrap_or(defaults.base_url);
        let api_version = std::env::var("ANTHROPIC_VERSION").unwrap_or(defaults.api_version);
        let timeout_secs = std::env::var("ANTHROPIC_TIMEOUT_SECS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(defaults.timeout_secs);

        Ok(Self {
            api_key,
            base_url,
            api_version,
            timeout_secs,
        })
    }
}

/// Anthropic Messages API provider
pub struct AnthropicProvider {
    client: reqwest::Client,
    config: AnthropicConfig,
}

impl AnthropicProvider {
    /// Create from configuration
    pub fn from_config(config: AnthropicConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(AnthropicConfig::from_env()?)
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    /// Convert agent messages to API format, merging consecutive turns of one role
    fn convert_messages(messages: &[Message]) -> Vec<ApiMessage<'_>> {
        let mut converted: Vec<ApiMessage<'_>> = Vec::with_capacity(messages.len());
        for message in messages {
            match converted.last_mut() {
                Some(last) if last.role == message.role => {
                    last.content.extend(message.content.iter());
                }
                _ => converted.push(ApiMessage {
                    role: message.role,
                    content: message.content.iter().collect(),
                }),
            }
        }
        converted
    }

    fn build_request<'a>(request: &'a CompletionRequest<'a>) -> ApiRequest<'a> {
        let tools: Vec<ApiTool<'a>> = request
            .tools
            .iter()
            .map(|schema| ApiTool {
                name: &schema.name,
                description: &schema.description,
                input_schema: schema.input_schema(),
            })
            .collect();

        let tool_choice = (!tools.is_empty()).then_some(ApiToolChoice {
            kind: request.tool_choice,
        });

        ApiRequest {
            model: &request.options.model,
            max_tokens: request.options.max_tokens,
            system: request.system,
            messages: Self::convert_messages(request.messages),
            tools,
            tool_choice,
            temperature: request.options.temperature,
        }
    }

    /// Convert an API response to an agent completion
    fn convert_completion(response: ApiResponse) -> Completion {
        let content = response
            .content
            .into_iter()
            .filter_map(|block| match block {
                ApiContent::Text { text } => Some(ContentBlock::Text { text }),
                ApiContent::ToolUse { id, name, input } => {
                    Some(ContentBlock::ToolUse { id, name, input })
                }
                ApiContent::Other => None,
            })
            .collect();

        Completion {
            content,
            model: response.model,
            usage: TokenUsage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            },
            stop_reason: response.stop_reason.as_deref().map(FinishReason::parse),
        }
    }

    fn map_status(status: reqwest::StatusCode, body: &str) -> AgentError {
        let message = serde_json::from_str::<ApiErrorBody>(body)
            .map(|b| b.error.message)
            .unwrap_or_else(|_| body.to_string());

        match status.as_u16() {
            401 | 403 => AgentError::Auth(message),
            429 => AgentError::RateLimited(message),
            code => AgentError::Provider(format!("HTTP {code}: {message}")),
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn check_credentials(&self) -> Result<()> {
        if self.config.api_key.trim().is_empty() {
            return Err(AgentError::Config("Anthropic API key is empty".into()));
        }
        Ok(())
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<Completion> {
        let body = Self::build_request(request);
        tracing::debug!(
            model = %request.options.model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            "sending messages request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::Provider(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AgentError::Provider(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "messages request failed");
            return Err(Self::map_status(status, &text));
        }

        let parsed: ApiResponse = serde_json::from_str(&text)
            .map_err(|e| AgentError::Provider(format!("malformed response: {e}")))?;

        Ok(Self::convert_completion(parsed))
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ApiToolChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: Role,
    content: Vec<&'a ContentBlock>,
}

#[derive(Serialize)]
struct ApiTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: serde_json::Value,
}

#[derive(Serialize)]
struct ApiToolChoice {
    #[serde(rename = "type")]
    kind: ToolChoice,
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    content: Vec<ApiContent>,
    #[serde(default)]
    model: String,
    #[serde(default)]
    usage: ApiUsage,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContent {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Default, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::provider::GenerationOptions;
    use agent_core::tool::{ParameterSchema, ToolSchema};
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: &str, api_key: &str) -> AnthropicProvider {
        AnthropicProvider::from_config(AnthropicConfig {
            api_key: api_key.into(),
            base_url: base_url.into(),
            ..AnthropicConfig::default()
        })
        .unwrap()
    }

    fn complete_schema() -> Vec<ToolSchema> {
        vec![ToolSchema {
            name: "complete".into(),
            description: "finish".into(),
            parameters: vec![ParameterSchema::required("result", "string", "answer")],
        }]
    }

    #[test]
    fn test_config_defaults() {
        let config = AnthropicConfig::default();
        assert_eq!(config.base_url, "https://api.anthropic.com");
        assert_eq!(config.api_version, "2023-06-01");
    }

    #[test]
    fn test_consecutive_roles_are_merged() {
        let messages = vec![
            Message::user("first"),
            Message::tool_results(vec![ContentBlock::ToolResult {
                tool_use_id: "t1".into(),
                content: "ok".into(),
                is_error: false,
            }]),
            Message::user("follow-up"),
            Message::assistant("reply"),
        ];

        let converted = AnthropicProvider::convert_messages(&messages);
        assert_eq!(converted.len(), 2);
        assert_eq!(converted[0].content.len(), 3);
        assert_eq!(converted[1].role, Role::Assistant);
    }

    #[test]
    fn test_blank_key_fails_credential_check() {
        let provider = provider("http://localhost", "  ");
        assert!(matches!(provider.check_credentials(), Err(AgentError::Config(_))));
    }

    #[tokio::test]
    async fn test_complete_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", "2023-06-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_1",
                "type": "message",
                "role": "assistant",
                "model": "claude-test",
                "content": [
                    {"type": "text", "text": "Finishing up."},
                    {"type": "tool_use", "id": "toolu_1", "name": "complete", "input": {"result": "42"}}
                ],
                "stop_reason": "tool_use",
                "usage": {"input_tokens": 120, "output_tokens": 30}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(&server.uri(), "test-key");
        let messages = vec![Message::user("answer?")];
        let tools = complete_schema();
        let options = GenerationOptions::default();

        let completion = provider
            .complete(&CompletionRequest {
                messages: &messages,
                system: "be brief",
                tools: &tools,
                tool_choice: ToolChoice::Auto,
                options: &options,
            })
            .await
            .unwrap();

        assert_eq!(completion.content.len(), 2);
        assert_eq!(completion.content[0].as_text(), Some("Finishing up."));
        assert!(matches!(&completion.content[1], ContentBlock::ToolUse { name, .. } if name == "complete"));
        assert_eq!(completion.usage, TokenUsage { input_tokens: 120, output_tokens: 30 });
        assert_eq!(completion.stop_reason, Some(FinishReason::ToolUse));

        let received = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(body["system"], "be brief");
        assert_eq!(body["tool_choice"], json!({"type": "auto"}));
        assert_eq!(body["tools"][0]["input_schema"]["required"], json!(["result"]));
        assert_eq!(body["messages"][0]["content"][0], json!({"type": "text", "text": "answer?"}));
    }

    #[tokio::test]
    async fn test_error_statuses_are_mapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "type": "error",
                "error": {"type": "authentication_error", "message": "invalid x-api-key"}
            })))
            .mount(&server)
            .await;

        let provider = provider(&server.uri(), "bad-key");
        let messages = vec![Message::user("hi")];
        let options = GenerationOptions::default();
        let err = provider
            .complete(&CompletionRequest {
                messages: &messages,
                system: "",
                tools: &[],
                tool_choice: ToolChoice::Auto,
                options: &options,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Auth(ref m) if m == "invalid x-api-key"));
    }

    #[test]
    fn test_server_error_is_provider_error() {
        let err = AnthropicProvider::map_status(reqwest::StatusCode::BAD_GATEWAY, "upstream down");
        assert!(matches!(err, AgentError::Provider(ref m) if m == "HTTP 502: upstream down"));
    }
}
