//! LLM Provider Interface
//!
//! Defines the request/response capability the orchestrator consumes: one
//! call carries the full history, the system prompt and the declared tool
//! schemas, and returns content blocks plus token accounting.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::{CompletionRequest, LlmProvider, ToolChoice};
//!
//! let provider = AnthropicProvider::from_env()?;
//! let completion = provider.complete(&CompletionRequest {
//!     messages: conversation.messages(),
//!     system: "You are helpful.",
//!     tools: &schemas,
//!     tool_choice: ToolChoice::Auto,
//!     options: &options,
//! }).await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::{ContentBlock, Message};
use crate::tool::ToolSchema;

/// Configuration for LLM generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "claude-sonnet-4-5")
    pub model: String,

    /// Maximum tokens to generate per request
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature for sampling (provider default when unset)
    #[serde(default)]
    pub temperature: Option<f32>,
}

const fn default_max_tokens() -> u32 {
    4096
}

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            max_tokens: default_max_tokens(),
            temperature: None,
        }
    }
}

/// How the model may pick tools
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    #[default]
    Auto,
    Any,
    None,
}

/// One model request
#[derive(Clone, Copy, Debug)]
pub struct CompletionRequest<'a> {
    pub messages: &'a [Message],
    pub system: &'a str,
    pub tools: &'a [ToolSchema],
    pub tool_choice: ToolChoice,
    pub options: &'a GenerationOptions,
}

/// Response from an LLM completion
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Completion {
    /// Text and tool-call blocks, in model order
    pub content: Vec<ContentBlock>,

    /// Model that generated this response
    pub model: String,

    /// Token usage reported for this request
    pub usage: TokenUsage,

    /// Finish reason
    pub stop_reason: Option<FinishReason>,
}

/// Token usage statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub const fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
    }
}

/// Reason for completion finishing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
    Other(String),
}

impl FinishReason {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "end_turn" => Self::EndTurn,
            "max_tokens" => Self::MaxTokens,
            "stop_sequence" => Self::StopSequence,
            "tool_use" => Self::ToolUse,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Model provider capability
///
/// Implement this trait to plug a model backend into the orchestrator.
/// Failures returned from `complete` are fatal to the calling run and are
/// never retried by the orchestrator.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &str;

    /// Verify that a usable credential is configured.
    ///
    /// Called once before the first request of every run.
    fn check_credentials(&self) -> Result<()> {
        Ok(())
    }

    /// Issue one model request
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<Completion>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_options_defaults() {
        let opts = GenerationOptions::default();
        assert_eq!(opts.max_tokens, 4096);
        assert_eq!(opts.model, DEFAULT_MODEL);
        assert!(opts.temperature.is_none());
    }

    #[test]
    fn test_usage_accumulates() {
        let mut total = TokenUsage::default();
        total += TokenUsage { input_tokens: 10, output_tokens: 3 };
        total += TokenUsage { input_tokens: 5, output_tokens: 2 };
        assert_eq!(total, TokenUsage { input_tokens: 15, output_tokens: 5 });
        assert_eq!(total.total(), 20);
    }

    #[test]
    fn test_finish_reason_parse() {
        assert_eq!(FinishReason::parse("tool_use"), FinishReason::ToolUse);
        assert_eq!(FinishReason::parse("refusal"), FinishReason::Other("refusal".into()));
    }
}
