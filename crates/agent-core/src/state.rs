//! Conversation State
//!
//! Per-run state owned by the orchestrator loop: history, token counters,
//! interaction count and the outbound event sender. The state becomes
//! terminal exactly once; after that its event stream is closed.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::event::AgentEvent;
use crate::message::{Conversation, Message};
use crate::provider::TokenUsage;

/// Result text when the model returns an empty response
pub const IMPLICIT_COMPLETION_RESULT: &str = "Task considered complete";

/// Result text when the iteration cap is reached
pub const MAX_ITERATIONS_RESULT: &str = "Maximum iterations reached";

/// Result text for a run ended through its control channel
pub const CANCELLED_RESULT: &str = "Cancelled";

/// Unique run identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Live counters shared between a run and its handle
#[derive(Debug, Default)]
pub struct UsageCounters {
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    interactions: AtomicU32,
}

impl UsageCounters {
    pub fn add(&self, usage: TokenUsage) {
        self.input_tokens.fetch_add(usage.input_tokens, Ordering::Relaxed);
        self.output_tokens.fetch_add(usage.output_tokens, Ordering::Relaxed);
    }

    /// Count one model interaction, returning the new total
    pub fn record_interaction(&self) -> u32 {
        self.interactions.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn tokens(&self) -> TokenUsage {
        TokenUsage {
            input_tokens: self.input_tokens.load(Ordering::Relaxed),
            output_tokens: self.output_tokens.load(Ordering::Relaxed),
        }
    }

    pub fn interactions(&self) -> u32 {
        self.interactions.load(Ordering::Relaxed)
    }
}

/// How a run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Completion tool called, or the model returned no content
    Completed,
    /// Iteration cap reached; reported as a result, not an error
    MaxIterations,
    /// Aborted through the control channel
    Cancelled,
}

/// Final result of a successful run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub result: String,
    pub status: RunStatus,
    pub usage: TokenUsage,
    pub interactions: u32,
}

/// State of one orchestrator run
#[derive(Debug)]
pub struct ConversationState {
    pub id: RunId,
    conversation: Conversation,
    counters: Arc<UsageCounters>,
    events: Option<mpsc::UnboundedSender<AgentEvent>>,
}

impl ConversationState {
    pub fn new(events: mpsc::UnboundedSender<AgentEvent>, counters: Arc<UsageCounters>) -> Self {
        Self {
            id: RunId::new(),
            conversation: Conversation::new(),
            counters,
            events: Some(events),
        }
    }

    pub const fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn counters(&self) -> &UsageCounters {
        &self.counters
    }

    /// Append a message to the history
    pub fn push(&mut self, message: Message) {
        self.conversation.push(message);
    }

    /// Emit a non-terminal event. Consumers that went away are ignored.
    pub fn emit(&self, event: AgentEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Whether the terminal event has been emitted
    pub const fn is_terminal(&self) -> bool {
        self.events.is_none()
    }

    /// Emit the terminal event and close the stream.
    ///
    /// Returns `false` if the state was already terminal.
    pub fn finish(&mut self, event: AgentEvent) -> bool {
        match self.events.take() {
            Some(tx) => {
                let _ = tx.send(event);
                true
            }
            None => false,
        }
    }

    /// Build the outcome from the current counters
    pub fn outcome(&self, result: impl Into<String>, status: RunStatus) -> RunOutcome {
        RunOutcome {
            result: result.into(),
            status,
            usage: self.counters.tokens(),
            interactions: self.counters.interactions(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::event_channel;

    #[tokio::test]
    async fn test_state_finishes_exactly_once() {
        let (tx, stream) = event_channel();
        let mut state = ConversationState::new(tx, Arc::default());

        state.emit(AgentEvent::User { content: "hi".into() });
        assert!(state.finish(AgentEvent::Error { cause: "first".into() }));
        assert!(!state.finish(AgentEvent::Error { cause: "second".into() }));
        state.emit(AgentEvent::User { content: "late".into() });
        assert!(state.is_terminal());

        let events = stream.collect_all().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], AgentEvent::Error { cause: "first".into() });
    }

    #[test]
    fn test_counters() {
        let counters = UsageCounters::default();
        counters.add(TokenUsage { input_tokens: 7, output_tokens: 2 });
        assert_eq!(counters.record_interaction(), 1);
        assert_eq!(counters.record_interaction(), 2);
        assert_eq!(counters.tokens().input_tokens, 7);
        assert_eq!(counters.interactions(), 2);
    }
}
