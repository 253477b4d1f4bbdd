//! Sub-Agent Tools
//!
//! Let the model delegate work to nested agents through the supervisor.

use std::sync::Arc;

use agent_core::tool::ParameterSchema;
use agent_core::{Result, SubAgentSupervisor, Tool, ToolCall, ToolContext, ToolSchema};
use async_trait::async_trait;
use serde_json::json;

/// `subagent_spawn` - start a nested agent on a sub-task
pub struct SubAgentSpawnTool {
    supervisor: Arc<SubAgentSupervisor>,
}

impl SubAgentSpawnTool {
    pub const fn new(supervisor: Arc<SubAgentSupervisor>) -> Self {
        Self { supervisor }
    }
}

#[async_trait]
impl Tool for SubAgentSpawnTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "subagent_spawn".into(),
            description: "Start a sub-agent with its own conversation to work on a self-contained sub-task. Returns its id and first response.".into(),
            parameters: vec![ParameterSchema::required(
                "prompt",
                "string",
                "Complete instructions for the sub-agent",
            )],
        }
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String> {
        let prompt = call.required_str("prompt")?;
        let (id, response) = self.supervisor.spawn(prompt).await?;
        ctx.info(&format!("spawned sub-agent {id}"));
        Ok(serde_json::to_string_pretty(&json!({ "id": id, "response": response }))?)
    }
}

/// `subagent_message` - send a follow-up and wait for the reply
pub struct SubAgentMessageTool {
    supervisor: Arc<SubAgentSupervisor>,
}

impl SubAgentMessageTool {
    pub const fn new(supervisor: Arc<SubAgentSupervisor>) -> Self {
        Self { supervisor }
    }
}

#[async_trait]
impl Tool for SubAgentMessageTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "subagent_message".into(),
            description: "Send a follow-up message to a running sub-agent and return its next response.".into(),
            parameters: vec![
                ParameterSchema::required("id", "string", "Sub-agent id returned by subagent_spawn"),
                ParameterSchema::required("message", "string", "Message to send"),
            ],
        }
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> Result<String> {
        let id = call.required_str("id")?;
        let message = call.required_str("message")?;

        self.supervisor.send_message(id, message)?;
        let response = self.supervisor.next_response(id).await?;

        Ok(serde_json::to_string_pretty(&json!({
            "id": id,
            "response": response,
            "finished": response.is_none(),
        }))?)
    }
}

/// `subagent_abort` - stop a sub-agent for good
pub struct SubAgentAbortTool {
    supervisor: Arc<SubAgentSupervisor>,
}

impl SubAgentAbortTool {
    pub const fn new(supervisor: Arc<SubAgentSupervisor>) -> Self {
        Self { supervisor }
    }
}

#[async_trait]
impl Tool for SubAgentAbortTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "subagent_abort".into(),
            description: "Abort a sub-agent. It accepts no further messages.".into(),
            parameters: vec![ParameterSchema::required("id", "string", "Sub-agent id")],
        }
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> Result<String> {
        let id = call.required_str("id")?;
        self.supervisor.abort(id)?;
        Ok(format!("Sub-agent {id} aborted"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::dispatch::execute_all;
    use agent_core::provider::{Completion, LlmProvider};
    use agent_core::{AgentBuilder, ContentBlock, ToolRegistry};
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::collections::VecDeque;

    /// Replays canned text replies, then keeps repeating the last one
    struct CannedProvider {
        replies: Mutex<VecDeque<&'static str>>,
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, _request: &agent_core::provider::CompletionRequest<'_>) -> Result<Completion> {
            let text = {
                let mut replies = self.replies.lock();
                if replies.len() > 1 {
                    replies.pop_front().unwrap_or_default()
                } else {
                    replies.front().copied().unwrap_or_default()
                }
            };
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            Ok(Completion {
                content: vec![ContentBlock::Text { text: text.into() }],
                ..Completion::default()
            })
        }
    }

    fn registry(replies: &[&'static str]) -> ToolRegistry {
        let agent = AgentBuilder::new()
            .provider(Arc::new(CannedProvider {
                replies: Mutex::new(replies.iter().copied().collect()),
            }))
            .max_iterations(10)
            .build()
            .unwrap();
        let supervisor = Arc::new(SubAgentSupervisor::new(&agent));

        let mut registry = ToolRegistry::new();
        registry.register(SubAgentSpawnTool::new(Arc::clone(&supervisor)));
        registry.register(SubAgentMessageTool::new(Arc::clone(&supervisor)));
        registry.register(SubAgentAbortTool::new(supervisor));
        registry
    }

    async fn call(registry: &ToolRegistry, name: &str, args: Value) -> agent_core::ToolResult {
        execute_all(&[ToolCall::new("1", name, args)], registry).await.remove(0)
    }

    #[tokio::test]
    async fn test_spawn_then_abort_blocks_messages() {
        let registry = registry(&["hello from child"]);

        let spawned = call(&registry, "subagent_spawn", json!({"prompt": "count files"})).await;
        assert!(!spawned.is_error, "{}", spawned.content);
        let body: Value = serde_json::from_str(&spawned.content).unwrap();
        assert_eq!(body["response"], "hello from child");
        let id = body["id"].as_str().unwrap().to_string();

        let aborted = call(&registry, "subagent_abort", json!({"id": id})).await;
        assert!(!aborted.is_error);

        let rejected = call(&registry, "subagent_message", json!({"id": id, "message": "more"})).await;
        assert!(rejected.is_error);
        assert!(rejected.content.contains("has been aborted"));
    }

    #[tokio::test]
    async fn test_unknown_sub_agent() {
        let registry = registry(&["hi"]);
        let result = call(&registry, "subagent_abort", json!({"id": "ghost"})).await;
        assert!(result.is_error);
        assert!(result.content.contains("Instance not found"));
    }
}
