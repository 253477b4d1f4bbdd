//! Conversation Orchestrator
//!
//! Drives the call-model → dispatch-tools → feed-results loop. Each run
//! executes on its own task; the caller gets a [`RunHandle`] with the live
//! event stream, the control channel and the final outcome.
//!
//! A run ends when the completion tool is called, when the model returns an
//! empty response, when the iteration cap is hit (reported as a result), or
//! when it is aborted. Provider and configuration failures end it with an
//! error; tool failures never do.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::dispatch;
use crate::error::{AgentError, Result};
use crate::event::{
    AgentEvent, ControlHandle, ControlMessage, EventStream, control_channel, event_channel,
};
use crate::message::{ContentBlock, Message, Role};
use crate::provider::{CompletionRequest, GenerationOptions, LlmProvider, ToolChoice};
use crate::state::{
    CANCELLED_RESULT, ConversationState, IMPLICIT_COMPLETION_RESULT, MAX_ITERATIONS_RESULT,
    RunId, RunOutcome, RunStatus, UsageCounters,
};
use crate::tool::{Tool, ToolCall, ToolRegistry, ToolResult};

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// System prompt sent with every request
    pub system_prompt: String,

    /// Maximum model requests per run
    pub max_iterations: usize,

    /// Generation options
    pub generation: GenerationOptions,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_iterations: 25,
            generation: GenerationOptions::default(),
        }
    }
}

pub const DEFAULT_SYSTEM_PROMPT: &str = r"You are a capable autonomous assistant working on the user's machine.

Use the available tools to gather information and act. Several tool calls in one
response run concurrently, so batch independent calls together.

When the task is finished, call the `complete` tool with the final answer.
Its `result` is shown to the user exactly as written.";

/// The conversation orchestrator
#[derive(Clone)]
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

/// Caller side of a running conversation
pub struct RunHandle {
    pub id: RunId,

    /// Live outbound events; closes after the terminal event
    pub events: EventStream,

    /// Inbound control channel
    pub control: ControlHandle,

    /// Live token and interaction counters
    pub counters: Arc<UsageCounters>,

    pub task: RunTask,
}

impl RunHandle {
    /// Wait for the final outcome, ignoring the event stream
    pub async fn wait(self) -> Result<RunOutcome> {
        self.task.wait().await
    }
}

/// Future side of a run
pub struct RunTask(pub(crate) JoinHandle<Result<RunOutcome>>);

impl RunTask {
    pub async fn wait(self) -> Result<RunOutcome> {
        match self.0.await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Err(AgentError::Cancelled),
            Err(err) => Err(AgentError::Other(format!("run task failed: {err}"))),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

impl Agent {
    /// Create a new agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    /// Create with default configuration
    pub fn with_defaults(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self::new(provider, tools, AgentConfig::default())
    }

    /// Same provider and configuration, different tool set
    #[must_use]
    pub fn with_tools(&self, tools: Arc<ToolRegistry>) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            tools,
            config: self.config.clone(),
        }
    }

    /// Start a run on a new task. Must be called inside a tokio runtime.
    pub fn start(&self, prompt: impl Into<String>) -> RunHandle {
        let (event_tx, events) = event_channel();
        let (control, control_rx) = control_channel();
        let counters = Arc::new(UsageCounters::default());
        let state = ConversationState::new(event_tx, Arc::clone(&counters));
        let id = state.id.clone();

        let span = tracing::info_span!("run", run_id = %id);
        let agent = self.clone();
        let prompt = prompt.into();
        let handle = tokio::spawn(agent.drive(state, prompt, control_rx).instrument(span));

        RunHandle {
            id,
            events,
            control,
            counters,
            task: RunTask(handle),
        }
    }

    /// Run to completion, discarding events
    pub async fn run(&self, prompt: impl Into<String>) -> Result<RunOutcome> {
        self.start(prompt).wait().await
    }

    async fn drive(
        self,
        mut state: ConversationState,
        prompt: String,
        mut control: mpsc::UnboundedReceiver<ControlMessage>,
    ) -> Result<RunOutcome> {
        tracing::info!(provider = self.provider.name(), tools = self.tools.len(), "run started");

        match self.run_loop(&mut state, prompt, &mut control).await {
            Ok(outcome) => {
                let event = match outcome.status {
                    RunStatus::Cancelled => AgentEvent::Cancelled {
                        interactions: outcome.interactions,
                    },
                    RunStatus::Completed | RunStatus::MaxIterations => AgentEvent::Complete {
                        result: outcome.result.clone(),
                        tokens: outcome.usage,
                        interactions: outcome.interactions,
                    },
                };
                state.finish(event);
                tracing::info!(
                    status = ?outcome.status,
                    interactions = outcome.interactions,
                    input_tokens = outcome.usage.input_tokens,
                    output_tokens = outcome.usage.output_tokens,
                    "run finished"
                );
                Ok(outcome)
            }
            Err(err) => {
                tracing::error!(error = %err, "run failed");
                state.finish(AgentEvent::Error {
                    cause: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn run_loop(
        &self,
        state: &mut ConversationState,
        prompt: String,
        control: &mut mpsc::UnboundedReceiver<ControlMessage>,
    ) -> Result<RunOutcome> {
        self.provider.check_credentials()?;

        state.push(Message::user(prompt.clone()));
        state.emit(AgentEvent::User { content: prompt });

        let schemas = self.tools.schemas();
        let mut pending = Vec::new();

        for iteration in 1..=self.config.max_iterations {
            if drain_control(control, &mut pending) {
                return Ok(state.outcome(CANCELLED_RESULT, RunStatus::Cancelled));
            }
            for content in pending.drain(..) {
                state.push(Message::user(content.clone()));
                state.emit(AgentEvent::User { content });
            }

            tracing::debug!(iteration, messages = state.conversation().len(), "requesting completion");
            let completion = self
                .provider
                .complete(&CompletionRequest {
                    messages: state.conversation().messages(),
                    system: &self.config.system_prompt,
                    tools: &schemas,
                    tool_choice: ToolChoice::Auto,
                    options: &self.config.generation,
                })
                .await?;

            state.counters().record_interaction();
            state.counters().add(completion.usage);

            if drain_control(control, &mut pending) {
                tracing::warn!(iteration, "run aborted during model request, discarding response");
                return Ok(state.outcome(CANCELLED_RESULT, RunStatus::Cancelled));
            }

            if completion.content.is_empty() {
                tracing::debug!(iteration, "empty response, treating task as done");
                return Ok(state.outcome(IMPLICIT_COMPLETION_RESULT, RunStatus::Completed));
            }

            let (text, calls) = split_content(&completion.content);
            state.push(Message::new(Role::Assistant, completion.content));
            if !text.is_empty() {
                state.emit(AgentEvent::Assistant { content: text });
            }

            if calls.is_empty() {
                continue;
            }

            tracing::debug!(iteration, calls = calls.len(), "dispatching tool calls");
            let results = dispatch::execute_all(&calls, &self.tools).await;
            let answer = results
                .iter()
                .find(|r| r.completes)
                .map(|r| r.content.clone());
            state.push(Message::tool_results(
                results.into_iter().map(into_result_block).collect(),
            ));

            if let Some(answer) = answer {
                return Ok(state.outcome(answer, RunStatus::Completed));
            }
        }

        tracing::warn!(max_iterations = self.config.max_iterations, "iteration cap reached");
        Ok(state.outcome(MAX_ITERATIONS_RESULT, RunStatus::MaxIterations))
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get configuration
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Drain queued control messages. Returns `true` on abort.
fn drain_control(
    control: &mut mpsc::UnboundedReceiver<ControlMessage>,
    pending: &mut Vec<String>,
) -> bool {
    while let Ok(message) = control.try_recv() {
        match message {
            ControlMessage::Abort => return true,
            ControlMessage::UserMessage(content) => pending.push(content),
        }
    }
    false
}

/// Split a response into its concatenated text and its tool calls
fn split_content(content: &[ContentBlock]) -> (String, Vec<ToolCall>) {
    let mut texts = Vec::new();
    let mut calls = Vec::new();
    for block in content {
        match block {
            ContentBlock::Text { text } if !text.is_empty() => texts.push(text.as_str()),
            ContentBlock::ToolUse { id, name, input } => {
                calls.push(ToolCall::new(id.clone(), name.clone(), input.clone()));
            }
            _ => {}
        }
    }
    (texts.join("\n"), calls)
}

fn into_result_block(result: ToolResult) -> ContentBlock {
    ContentBlock::ToolResult {
        tool_use_id: result.id,
        content: result.content,
        is_error: result.is_error,
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: ToolRegistry::new(),
            config: AgentConfig::default(),
        }
    }

    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    #[must_use]
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    #[must_use]
    pub const fn max_tokens(mut self, max: u32) -> Self {
        self.config.generation.max_tokens = max;
        self
    }

    #[must_use]
    pub const fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        Ok(Agent::new(provider, Arc::new(self.tools), self.config))
    }
}
