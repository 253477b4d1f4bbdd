//! Ask User Tool
//!
//! Puts a question to the human at the terminal and waits for one line of
//! answer. Interactive, so nested agents never receive it.

use agent_core::tool::ParameterSchema;
use agent_core::{AgentError, Result, Tool, ToolCall, ToolContext, ToolSchema};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use crate::error::ToolError;

type Input = Box<dyn AsyncBufRead + Unpin + Send>;
type Output = Box<dyn AsyncWrite + Unpin + Send>;

/// `ask_user` - question in, one line of answer out
pub struct AskUserTool {
    // Held together so concurrent questions do not interleave
    io: Mutex<(Input, Output)>,
}

impl Default for AskUserTool {
    fn default() -> Self {
        Self::new()
    }
}

impl AskUserTool {
    /// Ask on stderr, read the answer from stdin
    pub fn new() -> Self {
        Self::with_io(BufReader::new(tokio::io::stdin()), tokio::io::stderr())
    }

    pub fn with_io<R, W>(input: R, output: W) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self {
            io: Mutex::new((Box::new(input), Box::new(output))),
        }
    }
}

#[async_trait]
impl Tool for AskUserTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "ask_user".into(),
            description: "Ask the user a question and wait for their typed answer. Use only when the task cannot proceed without human input.".into(),
            parameters: vec![ParameterSchema::required("question", "string", "The question to ask")],
        }
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> Result<String> {
        let question = call.required_str("question")?;

        let mut io = self.io.lock().await;
        let (input, output) = &mut *io;

        output
            .write_all(format!("\n? {question}\n> ").as_bytes())
            .await
            .map_err(ToolError::from)?;
        output.flush().await.map_err(ToolError::from)?;

        let mut answer = String::new();
        let read = input.read_line(&mut answer).await.map_err(ToolError::from)?;
        if read == 0 {
            return Err(AgentError::ToolExecution("No answer: input stream closed".into()));
        }
        Ok(answer.trim_end_matches(['\r', '\n']).to_string())
    }

    fn is_interactive(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call() -> ToolCall {
        ToolCall::new("q1", "ask_user", json!({"question": "Proceed?"}))
    }

    #[tokio::test]
    async fn test_reads_one_line() {
        let tool = AskUserTool::with_io(BufReader::new(&b"yes please\r\nignored\n"[..]), tokio::io::sink());
        let call = call();
        let answer = tool.execute(&call, &ToolContext::new(&call)).await.unwrap();
        assert_eq!(answer, "yes please");
        assert!(tool.is_interactive());
    }

    #[tokio::test]
    async fn test_closed_input_is_an_error() {
        let tool = AskUserTool::with_io(BufReader::new(&b""[..]), tokio::io::sink());
        let call = call();
        let err = tool.execute(&call, &ToolContext::new(&call)).await.unwrap_err();
        assert_eq!(err.kind(), "tool_execution");
    }
}
