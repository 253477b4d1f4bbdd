//! # agent-runtime
//!
//! Model providers for the rust-agent system.
//!
//! ## Providers
//!
//! - **Anthropic** (default): Messages API with native tool calling
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::AnthropicProvider;
//!
//! let provider = AnthropicProvider::from_env()?;
//! let agent = AgentBuilder::new()
//!     .provider(Arc::new(provider))
//!     .build()?;
//! ```

#[cfg(feature = "anthropic")]
pub mod anthropic;

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicConfig, AnthropicProvider};

// Re-export core types for convenience
pub use agent_core::{
    Agent, AgentBuilder, AgentError, AgentEvent, LlmProvider, Message, Result, Role, Tool,
    ToolRegistry,
};
