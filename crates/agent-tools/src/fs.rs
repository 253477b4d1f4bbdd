//! File Tools
//!
//! Read and write files on the host filesystem.

use std::fmt::Write as _;
use std::path::Path;

use agent_core::tool::ParameterSchema;
use agent_core::{Result, Tool, ToolCall, ToolContext, ToolSchema};
use async_trait::async_trait;
use serde_json::json;

use crate::error::ToolError;

/// Lines returned when no limit is given
pub const DEFAULT_LINE_LIMIT: u64 = 2_000;

/// `read_file` - numbered lines of a text file
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "read_file".into(),
            description: "Read a text file. Lines are returned numbered from 1; use offset and limit to page through large files.".into(),
            parameters: vec![
                ParameterSchema::required("path", "string", "Path of the file to read"),
                ParameterSchema::optional("offset", "integer", "Line number to start from (1-based)")
                    .with_default(json!(1)),
                ParameterSchema::optional("limit", "integer", "Maximum number of lines to return")
                    .with_default(json!(DEFAULT_LINE_LIMIT)),
            ],
        }
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> Result<String> {
        let path = call.required_str("path")?;
        let offset = usize::try_from(call.u64_arg("offset").unwrap_or(1).max(1)).unwrap_or(usize::MAX);
        let limit = usize::try_from(call.u64_arg("limit").unwrap_or(DEFAULT_LINE_LIMIT)).unwrap_or(usize::MAX);

        let content = tokio::fs::read_to_string(path).await.map_err(ToolError::from)?;

        let mut output = String::new();
        for (i, line) in content.lines().enumerate().skip(offset - 1).take(limit) {
            let _ = writeln!(output, "{:>6}\t{line}", i + 1);
        }

        if output.is_empty() {
            output = if content.is_empty() {
                "(empty file)".into()
            } else {
                format!("(no lines at offset {offset})")
            };
        }
        Ok(output)
    }
}

/// `write_file` - create or overwrite a file
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "write_file".into(),
            description: "Write content to a file, replacing it if it exists. Missing parent directories are created.".into(),
            parameters: vec![
                ParameterSchema::required("path", "string", "Path of the file to write"),
                ParameterSchema::required("content", "string", "Full file content"),
            ],
        }
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String> {
        let path = Path::new(call.required_str("path")?);
        let content = call.required_str("content")?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(ToolError::from)?;
        }
        tokio::fs::write(path, content).await.map_err(ToolError::from)?;

        ctx.info(&format!("wrote {} bytes to {}", content.len(), path.display()));
        Ok(format!("Wrote {} bytes to {}", content.len(), path.display()))
    }
}
