//! Tool System
//!
//! Extensible tool framework for agent capabilities.
//! Tools are registered at runtime and invoked through the dispatcher.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{AgentError, Result};

/// Name of the designated completion tool
pub const COMPLETE_TOOL_NAME: &str = "complete";

/// Tool call request from the LLM
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call identifier, unique within a conversation
    pub id: String,

    /// Tool identifier
    pub name: String,

    /// Arguments as key-value pairs
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Get a string argument
    pub fn str_arg(&self, name: &str) -> Option<&str> {
        self.arguments.get(name).and_then(Value::as_str)
    }

    /// Get an unsigned integer argument
    pub fn u64_arg(&self, name: &str) -> Option<u64> {
        self.arguments.get(name).and_then(Value::as_u64)
    }

    /// Get a required string argument
    pub fn required_str(&self, name: &str) -> Result<&str> {
        self.str_arg(name).ok_or_else(|| {
            AgentError::ToolValidation(format!("Missing required parameter: {name}"))
        })
    }
}

/// Result from tool execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResult {
    /// Call ID, mirrors the request
    pub id: String,

    /// Tool that was called
    pub name: String,

    /// Output text (success output or diagnostic)
    pub content: String,

    /// Whether execution failed
    pub is_error: bool,

    /// Set only for a successful call of the completion tool
    pub completes: bool,
}

impl ToolResult {
    pub fn success(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            content: content.into(),
            is_error: false,
            completes: false,
        }
    }

    /// Failed call; the diagnostic names the failure kind and message
    pub fn failure(call: &ToolCall, error: &AgentError) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            content: format!("Error ({}): {}", error.kind(), error),
            is_error: true,
            completes: false,
        }
    }

    pub const fn completing(mut self) -> Self {
        self.completes = true;
        self
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, integer, number, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

impl ParameterSchema {
    pub fn required(name: &str, param_type: &str, description: &str) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: true,
            default: None,
            enum_values: None,
        }
    }

    pub fn optional(name: &str, param_type: &str, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    fn matches_type(&self, value: &Value) -> bool {
        match self.param_type.as_str() {
            "string" => value.is_string(),
            "integer" => value.is_i64() || value.is_u64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "object" => value.is_object(),
            "array" => value.is_array(),
            _ => true,
        }
    }
}

/// Tool definition schema (for LLM function calling)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,
}

impl ToolSchema {
    /// Render the parameters as a JSON Schema object
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in &self.parameters {
            let mut prop = Map::new();
            prop.insert("type".into(), json!(param.param_type));
            prop.insert("description".into(), json!(param.description));
            if let Some(default) = &param.default {
                prop.insert("default".into(), default.clone());
            }
            if let Some(values) = &param.enum_values {
                prop.insert("enum".into(), Value::Array(values.clone()));
            }
            properties.insert(param.name.clone(), Value::Object(prop));
            if param.required {
                required.push(json!(param.name));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Check call arguments against the declared parameters
    pub fn validate(&self, arguments: &Map<String, Value>) -> Result<()> {
        for param in &self.parameters {
            match arguments.get(&param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(AgentError::ToolValidation(format!(
                        "Missing required parameter: {}",
                        param.name
                    )));
                }
                None | Some(Value::Null) => {}
                Some(value) => {
                    if !param.matches_type(value) {
                        return Err(AgentError::ToolValidation(format!(
                            "Parameter '{}' must be of type {}",
                            param.name, param.param_type
                        )));
                    }
                    if let Some(allowed) = &param.enum_values {
                        if !allowed.contains(value) {
                            return Err(AgentError::ToolValidation(format!(
                                "Parameter '{}' must be one of {}",
                                param.name,
                                Value::Array(allowed.clone())
                            )));
                        }
                    }
                }
            }
        }

        if let Some(unknown) = arguments
            .keys()
            .find(|key| !self.parameters.iter().any(|p| &p.name == *key))
        {
            return Err(AgentError::ToolValidation(format!(
                "Unknown parameter: {unknown}"
            )));
        }

        Ok(())
    }
}

/// Per-call execution context handed to tools
#[derive(Clone, Debug)]
pub struct ToolContext {
    pub call_id: String,
    pub tool_name: String,
    span: tracing::Span,
}

impl ToolContext {
    pub fn new(call: &ToolCall) -> Self {
        let span = tracing::info_span!("tool", name = %call.name, call_id = %call.id);
        Self {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            span,
        }
    }

    /// Span every log line of this call is recorded in
    pub const fn span(&self) -> &tracing::Span {
        &self.span
    }

    pub fn info(&self, message: &str) {
        self.span.in_scope(|| tracing::info!("{message}"));
    }

    pub fn warn(&self, message: &str) {
        self.span.in_scope(|| tracing::warn!("{message}"));
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema for LLM function calling
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with validated arguments
    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String>;

    /// Validate arguments before execution
    fn validate(&self, call: &ToolCall) -> Result<()> {
        self.schema().validate(&call.arguments)
    }

    /// Whether a successful call ends the conversation
    fn is_completion(&self) -> bool {
        false
    }

    /// Whether the tool needs a human at the terminal
    fn is_interactive(&self) -> bool {
        false
    }
}

/// Registry for available tools
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_boxed(Arc::new(tool));
    }

    /// Register a shared tool
    pub fn register_boxed(&mut self, tool: Arc<dyn Tool>) {
        let schema = tool.schema();
        self.tools.insert(schema.name, tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Copy of this registry without interactive tools
    #[must_use]
    pub fn without_interactive(&self) -> Self {
        Self {
            tools: self
                .tools
                .iter()
                .filter(|(_, tool)| !tool.is_interactive())
                .map(|(name, tool)| (name.clone(), Arc::clone(tool)))
                .collect(),
        }
    }

    /// Get all tool schemas, in name order
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// ============================================================================
// Built-in Tools
// ============================================================================

/// Completion tool - its input becomes the conversation's final answer
pub struct CompleteTool;

#[async_trait]
impl Tool for CompleteTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: COMPLETE_TOOL_NAME.into(),
            description: "Signal that the task is finished. The result is returned to the user verbatim as the final answer.".into(),
            parameters: vec![ParameterSchema::required(
                "result",
                "string",
                "The final answer or summary of the completed work",
            )],
        }
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> Result<String> {
        Ok(call.required_str("result")?.to_string())
    }

    fn is_completion(&self) -> bool {
        true
    }
}
