//! Run Events and Control Messages
//!
//! A run talks to its caller through two unbounded queues: an outbound
//! [`EventStream`] any consumer can drain, and an inbound [`ControlHandle`]
//! the loop polls once per iteration. Closing the outbound queue is the
//! end-of-stream marker.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::provider::TokenUsage;

/// Event emitted by a conversation run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// User input appended to the conversation
    User { content: String },

    /// Assistant text from one model response
    Assistant { content: String },

    /// Run finished with a result
    Complete {
        result: String,
        tokens: TokenUsage,
        interactions: u32,
    },

    /// Run was cancelled through its control channel
    Cancelled { interactions: u32 },

    /// Run failed
    Error { cause: String },
}

impl AgentEvent {
    /// Whether this event ends the run
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Complete { .. } | Self::Cancelled { .. } | Self::Error { .. }
        )
    }
}

/// Directive sent into a running conversation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlMessage {
    /// Stop at the next loop check
    Abort,
    /// Follow-up user input, appended before the next model request
    UserMessage(String),
}

/// Create a linked event sender and stream
pub(crate) fn event_channel() -> (mpsc::UnboundedSender<AgentEvent>, EventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, EventStream { rx })
}

/// Create a linked control handle and receiver
pub(crate) fn control_channel() -> (ControlHandle, mpsc::UnboundedReceiver<ControlMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ControlHandle { tx }, rx)
}

/// Outbound event queue of one run
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<AgentEvent>,
}

impl EventStream {
    /// Next event, or `None` once the run has closed its stream
    pub async fn next(&mut self) -> Option<AgentEvent> {
        self.rx.recv().await
    }

    /// Drain everything until end of stream
    pub async fn collect_all(mut self) -> Vec<AgentEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event);
        }
        events
    }
}

impl Stream for EventStream {
    type Item = AgentEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Write-only inbound channel of one run
#[derive(Clone, Debug)]
pub struct ControlHandle {
    tx: mpsc::UnboundedSender<ControlMessage>,
}

impl ControlHandle {
    /// Request cancellation. Returns `false` if the run has already ended.
    pub fn abort(&self) -> bool {
        self.tx.send(ControlMessage::Abort).is_ok()
    }

    /// Queue a follow-up user message. Returns `false` if the run has already ended.
    pub fn send_message(&self, content: impl Into<String>) -> bool {
        self.tx
            .send(ControlMessage::UserMessage(content.into()))
            .is_ok()
    }

    /// Whether the run still listens on this channel
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}
