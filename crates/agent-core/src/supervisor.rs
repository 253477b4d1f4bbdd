//! Sub-Agent Supervisor
//!
//! Spawns nested orchestrator runs so a parent conversation can delegate
//! sub-tasks, relays follow-up messages into them and aborts them. Nested
//! runs get the supervisor's tool set minus interactive tools.
//!
//! Instances are never evicted; an aborted instance rejects every further
//! message.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::event::{AgentEvent, ControlHandle, EventStream};
use crate::message::Message;
use crate::reasoning::{Agent, RunHandle, RunTask};
use crate::state::RunId;

/// One spawned nested agent
pub struct SubAgentInstance {
    pub id: String,
    pub prompt: String,
    pub run_id: RunId,
    aborted: AtomicBool,
    mirror: Mutex<Vec<Message>>,
    control: ControlHandle,
    events: tokio::sync::Mutex<EventStream>,
    task: RunTask,
}

impl SubAgentInstance {
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Copy of the relayed message history
    pub fn messages(&self) -> Vec<Message> {
        self.mirror.lock().clone()
    }

    fn summary(&self) -> SubAgentSummary {
        SubAgentSummary {
            id: self.id.clone(),
            prompt: self.prompt.clone(),
            aborted: self.is_aborted(),
            finished: self.is_finished(),
            messages: self.mirror.lock().len(),
        }
    }

    /// Wait for the next assistant content of the nested run.
    ///
    /// With `accept_completion`, a completion result also counts. Returns
    /// `Ok(None)` if the stream ends first.
    async fn next_content(&self, accept_completion: bool) -> Result<Option<String>> {
        let mut events = self.events.lock().await;
        while let Some(event) = events.next().await {
            match event {
                AgentEvent::Assistant { content } => {
                    self.mirror.lock().push(Message::assistant(content.clone()));
                    return Ok(Some(content));
                }
                AgentEvent::Complete { result, .. } if accept_completion => {
                    self.mirror.lock().push(Message::assistant(result.clone()));
                    return Ok(Some(result));
                }
                AgentEvent::Error { cause } => {
                    return Err(AgentError::RunFailed(format!("{}: {cause}", self.id)));
                }
                _ => {}
            }
        }
        Ok(None)
    }
}

/// Listing entry for a sub-agent
#[derive(Clone, Debug, Serialize)]
pub struct SubAgentSummary {
    pub id: String,
    pub prompt: String,
    pub aborted: bool,
    pub finished: bool,
    pub messages: usize,
}

/// Registry and lifecycle manager of nested agents
pub struct SubAgentSupervisor {
    agent: Agent,
    instances: RwLock<HashMap<String, Arc<SubAgentInstance>>>,
}

impl SubAgentSupervisor {
    /// Nested runs use `agent`'s provider and configuration, with its
    /// interactive tools removed
    pub fn new(agent: &Agent) -> Self {
        let tools = Arc::new(agent.tools().without_interactive());
        Self {
            agent: agent.with_tools(tools),
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// Start a nested run and wait for its first assistant message.
    ///
    /// Returns the new instance id and the initial response.
    pub async fn spawn(&self, prompt: impl Into<String>) -> Result<(String, String)> {
        let prompt = prompt.into();
        let handle = self.agent.start(prompt.clone());
        let instance = self.register(prompt, handle);

        match instance.next_content(false).await? {
            Some(response) => Ok((instance.id.clone(), response)),
            None => Err(AgentError::StreamEnded(instance.id.clone())),
        }
    }

    /// Track a started run under a fresh instance id
    fn register(&self, prompt: String, handle: RunHandle) -> Arc<SubAgentInstance> {
        let RunHandle {
            id: run_id,
            events,
            control,
            task,
            ..
        } = handle;

        let id = Uuid::new_v4().to_string();
        let instance = Arc::new(SubAgentInstance {
            id: id.clone(),
            prompt: prompt.clone(),
            run_id,
            aborted: AtomicBool::new(false),
            mirror: Mutex::new(vec![Message::user(prompt)]),
            control,
            events: tokio::sync::Mutex::new(events),
            task,
        });
        self.instances.write().insert(id.clone(), Arc::clone(&instance));
        tracing::info!(subagent = %id, run_id = %instance.run_id, "sub-agent spawned");
        instance
    }

    /// Forward a follow-up message into a nested run
    pub fn send_message(&self, id: &str, message: impl Into<String>) -> Result<()> {
        let instance = self.instance(id)?;
        if instance.is_aborted() {
            return Err(AgentError::Aborted(id.to_string()));
        }

        let message = message.into();
        if !instance.control.send_message(message.clone()) {
            return Err(AgentError::Finished(id.to_string()));
        }
        instance.mirror.lock().push(Message::user(message));
        tracing::debug!(subagent = %id, "message relayed to sub-agent");
        Ok(())
    }

    /// Wait for the next assistant or completion content of a nested run.
    ///
    /// `Ok(None)` means the nested run has ended and produced nothing more.
    pub async fn next_response(&self, id: &str) -> Result<Option<String>> {
        let instance = self.instance(id)?;
        if instance.is_aborted() {
            return Err(AgentError::Aborted(id.to_string()));
        }
        instance.next_content(true).await
    }

    /// Abort a nested run. Aborting twice signals only once.
    pub fn abort(&self, id: &str) -> Result<()> {
        let instance = self.instance(id)?;
        if !instance.aborted.swap(true, Ordering::SeqCst) {
            let delivered = instance.control.abort();
            tracing::info!(subagent = %id, delivered, "sub-agent aborted");
        }
        Ok(())
    }

    /// Relayed message history of an instance
    pub fn messages(&self, id: &str) -> Result<Vec<Message>> {
        Ok(self.instance(id)?.messages())
    }

    pub fn get(&self, id: &str) -> Option<SubAgentSummary> {
        self.instances.read().get(id).map(|i| i.summary())
    }

    pub fn list(&self) -> Vec<SubAgentSummary> {
        let mut all: Vec<_> = self.instances.read().values().map(|i| i.summary()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    fn instance(&self, id: &str) -> Result<Arc<SubAgentInstance>> {
        self.instances
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| AgentError::InstanceNotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ControlMessage, control_channel, event_channel};
    use crate::reasoning::AgentBuilder;
    use crate::state::UsageCounters;
    use crate::testing::{ScriptedProvider, text_reply, tool_reply};
    use crate::tool::{COMPLETE_TOOL_NAME, CompleteTool, Tool, ToolCall, ToolContext, ToolSchema};
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    struct AskTool;

    #[async_trait]
    impl Tool for AskTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "ask_user".into(),
                description: "asks the human".into(),
                parameters: vec![],
            }
        }

        async fn execute(&self, _call: &ToolCall, _ctx: &ToolContext) -> Result<String> {
            Ok("yes".into())
        }

        fn is_interactive(&self) -> bool {
            true
        }
    }

    fn supervisor(provider: Arc<ScriptedProvider>) -> SubAgentSupervisor {
        let agent = AgentBuilder::new()
            .provider(provider)
            .tool(CompleteTool)
            .tool(AskTool)
            .build()
            .unwrap();
        SubAgentSupervisor::new(&agent)
    }

    fn complete(result: &str) -> crate::provider::Completion {
        tool_reply(None, &[("c", COMPLETE_TOOL_NAME, json!({"result": result}))])
    }

    #[tokio::test]
    async fn test_spawn_returns_first_assistant_message() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(text_reply("On it.")),
            Ok(complete("done")),
        ]));
        let supervisor = supervisor(Arc::clone(&provider));

        let (id, response) = supervisor.spawn("summarize the repo").await.unwrap();
        assert_eq!(response, "On it.");

        let summary = supervisor.get(&id).unwrap();
        assert_eq!(summary.prompt, "summarize the repo");
        assert!(!summary.aborted);
        assert_eq!(supervisor.list().len(), 1);

        assert_eq!(provider.requests()[0].tool_names, vec!["complete"]);
    }

    #[tokio::test]
    async fn test_spawn_fails_when_stream_ends_without_assistant() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(complete("silent"))]));
        let supervisor = supervisor(provider);

        let err = supervisor.spawn("quiet task").await.unwrap_err();
        assert!(matches!(err, AgentError::StreamEnded(_)));
        assert!(err.to_string().contains("without an assistant message"));
        assert_eq!(supervisor.list().len(), 1);
    }

    #[tokio::test]
    async fn test_messages_relay_into_nested_run() {
        let provider = Arc::new(
            ScriptedProvider::new(vec![
                Ok(text_reply("ready")),
                Ok(text_reply("noted")),
                Ok(complete("all done")),
            ])
            .with_latency(Duration::from_millis(30)),
        );
        let supervisor = supervisor(Arc::clone(&provider));

        let (id, _) = supervisor.spawn("task").await.unwrap();
        supervisor.send_message(&id, "also check the tests").unwrap();

        assert_eq!(supervisor.next_response(&id).await.unwrap().as_deref(), Some("noted"));
        assert_eq!(supervisor.next_response(&id).await.unwrap().as_deref(), Some("all done"));
        assert_eq!(supervisor.next_response(&id).await.unwrap(), None);

        let relayed = provider
            .requests()
            .iter()
            .any(|r| r.messages.iter().any(|m| m.text() == "also check the tests"));
        assert!(relayed);

        let mirror = supervisor.messages(&id).unwrap();
        assert_eq!(mirror[0].text(), "task");
        assert!(mirror.iter().any(|m| m.text() == "also check the tests"));
    }

    #[tokio::test]
    async fn test_abort_is_a_permanent_latch() {
        let provider = Arc::new(ScriptedProvider::repeating(text_reply("working")));
        let supervisor = supervisor(provider);

        let (id, _) = supervisor.spawn("long task").await.unwrap();
        supervisor.abort(&id).unwrap();
        supervisor.abort(&id).unwrap();

        for _ in 0..3 {
            let err = supervisor.send_message(&id, "continue").unwrap_err();
            assert!(matches!(err, AgentError::Aborted(_)));
            assert!(err.to_string().contains("has been aborted"));
        }
        assert!(supervisor.get(&id).unwrap().aborted);
    }

    #[tokio::test]
    async fn test_repeated_abort_signals_once() {
        let supervisor = supervisor(Arc::new(ScriptedProvider::new(vec![])));
        let (control, mut control_rx) = control_channel();
        let (_event_tx, events) = event_channel();
        let handle = RunHandle {
            id: RunId::new(),
            events,
            control,
            counters: Arc::new(UsageCounters::default()),
            task: RunTask(tokio::spawn(std::future::pending())),
        };
        let id = supervisor.register("idle".into(), handle).id.clone();

        for _ in 0..3 {
            supervisor.abort(&id).unwrap();
        }

        let mut aborts = 0;
        while let Ok(message) = control_rx.try_recv() {
            assert_eq!(message, ControlMessage::Abort);
            aborts += 1;
        }
        assert_eq!(aborts, 1);
    }

    #[tokio::test]
    async fn test_child_failure_carries_its_cause() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(AgentError::Provider(
            "upstream 503".into(),
        ))]));
        let supervisor = supervisor(provider);

        let err = supervisor.spawn("task").await.unwrap_err();
        assert!(matches!(err, AgentError::RunFailed(_)));
        assert!(err.to_string().contains("upstream 503"));
        assert!(!err.to_string().contains("without an assistant message"));
    }

    #[tokio::test]
    async fn test_unknown_instance_is_not_found() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let supervisor = supervisor(provider);

        assert!(matches!(supervisor.send_message("nope", "hi"), Err(AgentError::InstanceNotFound(_))));
        assert!(matches!(supervisor.abort("nope"), Err(AgentError::InstanceNotFound(_))));
        assert!(matches!(supervisor.next_response("nope").await, Err(AgentError::InstanceNotFound(_))));
    }
}
