//! # agent-tools
//!
//! Host-facing tools for the agent runtime: shell sessions, file access,
//! HTTP fetch, the interactive prompt and sub-agent delegation.

pub mod ask_user;
pub mod error;
pub mod fetch;
pub mod fs;
pub mod shell;
pub mod subagent;

use std::sync::Arc;

use agent_core::{CompleteTool, SubAgentSupervisor, ToolRegistry};

pub use ask_user::AskUserTool;
pub use error::{Result, ToolError};
pub use fetch::FetchTool;
pub use fs::{ReadFileTool, WriteFileTool};
pub use shell::{ShellInteractTool, ShellManager, ShellStartTool};
pub use subagent::{SubAgentAbortTool, SubAgentMessageTool, SubAgentSpawnTool};

/// Register the completion tool and every host tool except sub-agent delegation
pub fn register_defaults(registry: &mut ToolRegistry, shells: &Arc<ShellManager>) -> Result<()> {
    registry.register(CompleteTool);
    registry.register(ReadFileTool);
    registry.register(WriteFileTool);
    registry.register(FetchTool::new()?);
    registry.register(AskUserTool::new());
    registry.register(ShellStartTool::new(Arc::clone(shells)));
    registry.register(ShellInteractTool::new(Arc::clone(shells)));
    Ok(())
}

/// Register the sub-agent spawn, message and abort tools
pub fn register_subagent_tools(registry: &mut ToolRegistry, supervisor: &Arc<SubAgentSupervisor>) {
    registry.register(SubAgentSpawnTool::new(Arc::clone(supervisor)));
    registry.register(SubAgentMessageTool::new(Arc::clone(supervisor)));
    registry.register(SubAgentAbortTool::new(Arc::clone(supervisor)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::AgentBuilder;

    #[test]
    fn test_default_registry() {
        let mut registry = ToolRegistry::new();
        register_defaults(&mut registry, &Arc::new(ShellManager::new())).unwrap();
        assert_eq!(
            registry.names(),
            vec![
                "ask_user",
                "complete",
                "fetch",
                "read_file",
                "shell_interact",
                "shell_start",
                "write_file"
            ]
        );
        assert_eq!(registry.without_interactive().len(), 6);
    }

    #[derive(Default)]
    struct NoProvider;

    #[async_trait::async_trait]
    impl agent_core::LlmProvider for NoProvider {
        fn name(&self) -> &str {
            "none"
        }

        async fn complete(
            &self,
            _request: &agent_core::provider::CompletionRequest<'_>,
        ) -> agent_core::Result<agent_core::provider::Completion> {
            Ok(agent_core::provider::Completion::default())
        }
    }

    #[test]
    fn test_subagent_tools_registration() {
        let mut base = ToolRegistry::new();
        register_defaults(&mut base, &Arc::new(ShellManager::new())).unwrap();
        let agent = AgentBuilder::new()
            .provider(Arc::new(NoProvider))
            .tools(base.clone())
            .build()
            .unwrap();
        let supervisor = Arc::new(SubAgentSupervisor::new(&agent));

        let mut full = base;
        register_subagent_tools(&mut full, &supervisor);
        assert_eq!(full.len(), 10);
        assert!(full.get("subagent_spawn").is_some());
    }
}
