//! Error Types for Tool Adapters

use agent_core::AgentError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ToolError>;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Shell instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown signal: {0}")]
    InvalidSignal(String),

    #[error("Failed to deliver {signal} to shell {id}: {reason}")]
    Signal {
        id: String,
        signal: String,
        reason: String,
    },

    #[error("Input stream of shell {0} is closed")]
    InputClosed(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ToolError> for AgentError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::InstanceNotFound(id) => Self::InstanceNotFound(id),
            ToolError::InvalidSignal(_) | ToolError::InvalidUrl(_) => {
                Self::ToolValidation(err.to_string())
            }
            other => Self::ToolExecution(other.to_string()),
        }
    }
}
