//! # agent-core
//!
//! Core agent runtime: the conversation orchestration loop, the concurrent
//! tool dispatcher and the sub-agent supervisor, over a provider-agnostic
//! model interface.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    SubAgentSupervisor                        │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │                 Agent (orchestrator)                   │  │
//! │  │  ┌───────────┐  ┌──────────────┐  ┌────────────────┐  │  │
//! │  │  │ Run loop  │──│  Dispatcher  │──│  ToolRegistry  │  │  │
//! │  │  └───────────┘  └──────────────┘  └────────────────┘  │  │
//! │  │        │                                               │  │
//! │  │  ┌───────────┐   events ──▶ EventStream                │  │
//! │  │  │LlmProvider│   control ◀── ControlHandle             │  │
//! │  │  └───────────┘                                         │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod dispatch;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod state;
pub mod supervisor;
pub mod tool;

#[cfg(test)]
mod testing;

pub use error::{AgentError, Result};
pub use event::{AgentEvent, ControlHandle, ControlMessage, EventStream};
pub use message::{ContentBlock, Message, Role};
pub use provider::{LlmProvider, TokenUsage};
pub use reasoning::{Agent, AgentBuilder, AgentConfig, RunHandle};
pub use state::{RunOutcome, RunStatus};
pub use supervisor::SubAgentSupervisor;
pub use tool::{CompleteTool, Tool, ToolCall, ToolContext, ToolRegistry, ToolResult, ToolSchema};
