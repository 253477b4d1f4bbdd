//! Tool Dispatcher
//!
//! Resolves a batch of tool calls against the registry and runs them
//! concurrently. Every call yields exactly one [`ToolResult`], in request
//! order; failures are folded into the result text instead of failing the
//! batch.

use futures::future::join_all;
use tracing::Instrument;

use crate::error::AgentError;
use crate::tool::{ToolCall, ToolContext, ToolRegistry, ToolResult};

/// Execute every call concurrently and wait for all of them to settle
pub async fn execute_all(calls: &[ToolCall], registry: &ToolRegistry) -> Vec<ToolResult> {
    join_all(calls.iter().map(|call| execute_one(call, registry))).await
}

/// Execute a single call, converting any failure into a diagnostic result
pub async fn execute_one(call: &ToolCall, registry: &ToolRegistry) -> ToolResult {
    let Some(tool) = registry.get(&call.name) else {
        let err = AgentError::ToolNotFound(call.name.clone());
        tracing::warn!(tool = %call.name, call_id = %call.id, "unknown tool requested");
        return ToolResult::failure(call, &err);
    };

    if let Err(err) = tool.validate(call) {
        tracing::warn!(tool = %call.name, call_id = %call.id, error = %err, "tool input rejected");
        return ToolResult::failure(call, &err);
    }

    let ctx = ToolContext::new(call);
    let span = ctx.span().clone();

    async {
        tracing::debug!(arguments = ?call.arguments, "executing tool");
        match tool.execute(call, &ctx).await {
            Ok(output) => {
                let result = ToolResult::success(call, output);
                if tool.is_completion() {
                    result.completing()
                } else {
                    result
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "tool execution failed");
                ToolResult::failure(call, &err)
            }
        }
    }
    .instrument(span)
    .await
}
