//! Tool adapters over the shell manager

use std::sync::Arc;
use std::time::Duration;

use agent_core::tool::ParameterSchema;
use agent_core::{AgentError, Result, Tool, ToolCall, ToolContext, ToolSchema};
use async_trait::async_trait;
use serde_json::json;

use super::manager::{ShellManager, ShellStart};

/// Default wait before a started command is detached
pub const DEFAULT_START_TIMEOUT_MS: u64 = 5_000;

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// `shell_start` - run a command, synchronously if it is quick
pub struct ShellStartTool {
    manager: Arc<ShellManager>,
}

impl ShellStartTool {
    pub const fn new(manager: Arc<ShellManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Tool for ShellStartTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "shell_start".into(),
            description: "Run a shell command line. If it exits within timeout_ms the output and exit \
                          status are returned; otherwise it keeps running and an id is returned for \
                          use with shell_interact. A timeout of 0 always detaches."
                .into(),
            parameters: vec![
                ParameterSchema::required("command", "string", "Command line passed to sh -c"),
                ParameterSchema::optional(
                    "timeout_ms",
                    "integer",
                    "Milliseconds to wait for the command to exit before detaching",
                )
                .with_default(json!(DEFAULT_START_TIMEOUT_MS)),
            ],
        }
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String> {
        let command = call.required_str("command")?;
        let timeout = Duration::from_millis(call.u64_arg("timeout_ms").unwrap_or(DEFAULT_START_TIMEOUT_MS));

        let started = self.manager.start(command, timeout).await?;
        if let ShellStart::Async { id } = &started {
            ctx.info(&format!("command detached as shell {id}"));
        }
        to_json(&started)
    }
}

/// `shell_interact` - write input, signal and read a running session
pub struct ShellInteractTool {
    manager: Arc<ShellManager>,
}

impl ShellInteractTool {
    pub const fn new(manager: Arc<ShellManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Tool for ShellInteractTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "shell_interact".into(),
            description: "Interact with a detached shell session: optionally write input to its stdin \
                          and/or send a signal (e.g. SIGINT, SIGTERM), then return the output produced \
                          since the last read and whether the process has completed."
                .into(),
            parameters: vec![
                ParameterSchema::required("id", "string", "Session id returned by shell_start"),
                ParameterSchema::optional("input", "string", "Text written verbatim to stdin (include \\n for Enter)"),
                ParameterSchema::optional("signal", "string", "Signal name to deliver, with or without the SIG prefix"),
            ],
        }
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> Result<String> {
        let id = call.required_str("id")?;
        let snapshot = self
            .manager
            .interact(id, call.str_arg("input"), call.str_arg("signal"))
            .await
            .map_err(AgentError::from)?;
        to_json(&snapshot)
    }
}
