//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM provider error (transport or protocol)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Rate limited
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Configuration error (missing credential, bad setting)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Tool not found in registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool validation failed
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Unknown shell or sub-agent instance
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    /// Sub-agent instance was aborted
    #[error("Instance {0} has been aborted")]
    Aborted(String),

    /// Instance has already finished its run
    #[error("Instance {0} has already finished")]
    Finished(String),

    /// Nested run ended before producing what the caller waited for
    #[error("Stream ended without an assistant message ({0})")]
    StreamEnded(String),

    /// Nested run ended with an error
    #[error("Nested run failed: {0}")]
    RunFailed(String),

    /// Run task was cancelled before producing an outcome
    #[error("Run cancelled")]
    Cancelled,

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Stable name of the failure kind, used in tool diagnostics
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Provider(_) => "provider",
            Self::Auth(_) => "auth",
            Self::RateLimited(_) => "rate_limited",
            Self::Config(_) => "config",
            Self::ToolNotFound(_) => "tool_not_found",
            Self::ToolValidation(_) => "tool_validation",
            Self::ToolExecution(_) => "tool_execution",
            Self::InstanceNotFound(_) => "not_found",
            Self::Aborted(_) => "aborted",
            Self::Finished(_) => "finished",
            Self::StreamEnded(_) => "stream_ended",
            Self::RunFailed(_) => "run_failed",
            Self::Cancelled => "cancelled",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Other(_) => "other",
        }
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider(msg) => format!("The model provider returned an error: {msg}"),
            Self::Auth(_) => "Authentication failed. Please check your API key.".into(),
            Self::RateLimited(_) => "The provider is rate limiting requests. Please wait a moment.".into(),
            Self::Config(msg) => format!("Configuration problem: {msg}"),
            Self::ToolNotFound(name) => format!("The tool '{name}' is not available."),
            Self::ToolValidation(msg) => format!("Invalid tool input: {msg}"),
            Self::ToolExecution(msg) => format!("Tool error: {msg}"),
            Self::Cancelled => "The run was cancelled.".into(),
            _ => self.to_string(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(AgentError::ToolNotFound("x".into()).kind(), "tool_not_found");
        assert_eq!(AgentError::Aborted("x".into()).to_string(), "Instance x has been aborted");
        assert_eq!(AgentError::RunFailed("x".into()).kind(), "run_failed");
    }
}
