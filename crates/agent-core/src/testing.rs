//! Scripted provider for unit tests.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::message::{ContentBlock, Message};
use crate::provider::{Completion, CompletionRequest, LlmProvider, TokenUsage, ToolChoice};

/// What the provider saw for one request
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub system: String,
    pub tool_names: Vec<String>,
    pub tool_choice: ToolChoice,
}

/// Replays queued responses; repeats `fallback` once the queue is empty
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<Completion>>>,
    fallback: Option<Completion>,
    requests: Mutex<Vec<RecordedRequest>>,
    latency: Duration,
    credentials_ok: bool,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<Completion>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
            credentials_ok: true,
        }
    }

    pub fn repeating(completion: Completion) -> Self {
        Self {
            fallback: Some(completion),
            ..Self::new(Vec::new())
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn without_credentials(mut self) -> Self {
        self.credentials_ok = false;
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn check_credentials(&self) -> Result<()> {
        if self.credentials_ok {
            Ok(())
        } else {
            Err(AgentError::Config("missing API key".into()))
        }
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<Completion> {
        self.requests.lock().push(RecordedRequest {
            messages: request.messages.to_vec(),
            system: request.system.to_string(),
            tool_names: request.tools.iter().map(|t| t.name.clone()).collect(),
            tool_choice: request.tool_choice,
        });

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let next = self.script.lock().pop_front();
        match next {
            Some(result) => result,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| AgentError::Provider("script exhausted".into())),
        }
    }
}

pub fn usage(input_tokens: u64, output_tokens: u64) -> TokenUsage {
    TokenUsage { input_tokens, output_tokens }
}

pub fn text_reply(text: &str) -> Completion {
    Completion {
        content: vec![ContentBlock::text(text)],
        usage: usage(10, 5),
        ..Completion::default()
    }
}

pub fn tool_reply(text: Option<&str>, calls: &[(&str, &str, Value)]) -> Completion {
    let mut content: Vec<ContentBlock> = text.map(ContentBlock::text).into_iter().collect();
    content.extend(calls.iter().map(|(id, name, input)| ContentBlock::ToolUse {
        id: (*id).to_string(),
        name: (*name).to_string(),
        input: input.clone(),
    }));
    Completion {
        content,
        usage: usage(10, 5),
        ..Completion::default()
    }
}

pub fn empty_reply() -> Completion {
    Completion {
        usage: usage(10, 0),
        ..Completion::default()
    }
}
