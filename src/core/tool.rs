// ! Tool specs and handlers
// !
// ! A tool is a named, schema-validated callable. The spec record is the
// ! wire-facing descriptor; the handler is the host-supplied implementation
// ! invoked on `tools/call`.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::context::RequestContext;
use crate::core::error::{McpError, McpResult};
use crate::protocol::messages::CallToolResult;
use crate::protocol::types::ContentBlock;

/// Valid artifact names: alphanumerics, underscore, dash
pub static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// Wire-facing tool descriptor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Always an object-typed JSON Schema; may declare zero properties
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Value>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema,
            annotations: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Check the registration invariants: name shape and object-typed schema
    pub fn validate(&self) -> McpResult<()> {
        if !NAME_PATTERN.is_match(&self.name) {
            return Err(McpError::validation(format!(
                "tool name '{}' must match [A-Za-z0-9_-]+",
                self.name
            )));
        }
        let is_object_schema = self
            .input_schema
            .as_object()
            .is_some_and(|o| o.get("type").and_then(Value::as_str).unwrap_or("object") == "object");
        if !is_object_schema {
            return Err(McpError::validation(format!(
                "tool '{}': input schema must be an object-typed JSON Schema",
                self.name
            )));
        }
        Ok(())
    }
}

/// Trait for implementing tool handlers
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Invoke the tool with validated, coerced arguments
    async fn call(
        &self,
        arguments: HashMap<String, Value>,
        context: &RequestContext,
    ) -> McpResult<CallToolResult>;
}

/// Closure adapter: wraps a plain function returning any JSON value and
/// formats the result as a text content block.
pub struct FnTool<F>(pub F)
where
    F: Fn(HashMap<String, Value>) -> McpResult<Value> + Send + Sync;

#[async_trait]
impl<F> ToolHandler for FnTool<F>
where
    F: Fn(HashMap<String, Value>) -> McpResult<Value> + Send + Sync,
{
    async fn call(
        &self,
        arguments: HashMap<String, Value>,
        _context: &RequestContext,
    ) -> McpResult<CallToolResult> {
        let value = (self.0)(arguments)?;
        Ok(CallToolResult {
            content: vec![format_value(value)],
            is_error: false,
        })
    }
}

/// Render a handler return value as a content block: strings verbatim,
/// everything else as compact JSON.
pub fn format_value(value: Value) -> ContentBlock {
    match value {
        Value::String(s) => ContentBlock::text(s),
        other => ContentBlock::text(other.to_string()),
    }
}

/// A registered tool: spec, handler, and the schema validator compiled once
/// at registration
#[derive(Clone)]
pub struct Tool {
    pub spec: ToolSpec,
    pub handler: Arc<dyn ToolHandler>,
    pub validator: Arc<jsonschema::Validator>,
}

impl Tool {
    /// Validate the spec and compile its input schema
    pub fn new<H>(spec: ToolSpec, handler: H) -> McpResult<Self>
    where
        H: ToolHandler + 'static,
    {
        spec.validate()?;
        let validator = jsonschema::validator_for(&spec.input_schema).map_err(|e| {
            McpError::validation(format!("tool '{}': schema does not compile: {e}", spec.name))
        })?;
        Ok(Self {
            spec,
            handler: Arc::new(handler),
            validator: Arc::new(validator),
        })
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool").field("spec", &self.spec).finish()
    }
}
