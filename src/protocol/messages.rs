// ! MCP protocol request parameters and response results
// !
// ! Module defines the typed params/results for every method the engine
// ! dispatches, with the camelCase field names the wire format requires.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::core::prompt::PromptSpec;
use crate::core::resource::{ResourceSpec, TemplateSpec};
use crate::core::tool::ToolSpec;
use crate::protocol::types::{
    ClientCapabilities, ContentBlock, Implementation, LoggingLevel, PromptMessage,
    ResourceContents, ServerCapabilities,
};

// ============================================================================
// Request Parameter Types
// ============================================================================

/// Parameters for the `initialize` request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitializeParams {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: ClientCapabilities,
    #[serde(rename = "clientInfo")]
    pub client_info: Implementation,
}

/// Parameters for `tools/call`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallToolParams {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<HashMap<String, Value>>,
}

/// Parameters for `resources/read`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadResourceParams {
    pub uri: String,
}

/// Parameters for `resources/subscribe` and `resources/unsubscribe`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscribeParams {
    pub uri: String,
}

/// Parameters for `prompts/get`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GetPromptParams {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<HashMap<String, String>>,
}

/// Shared pagination parameters for the `*/list` requests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ListParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Parameters for `completion/complete`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompleteParams {
    #[serde(rename = "ref")]
    pub reference: CompletionReference,
    pub argument: CompletionArgument,
}

/// The artifact a completion request refers to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum CompletionReference {
    #[serde(rename = "ref/prompt")]
    Prompt { name: String },
    #[serde(rename = "ref/resource")]
    Resource { uri: String },
}

/// The argument being completed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionArgument {
    pub name: String,
    pub value: String,
}

/// Parameters for `logging/setLevel`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetLevelParams {
    pub level: LoggingLevel,
}

// ============================================================================
// Response Result Types
// ============================================================================

/// Result of the `initialize` request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: Implementation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Result of `tools/list`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListToolsResult {
    pub tools: Vec<ToolSpec>,
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Result of `tools/call`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallToolResult {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl CallToolResult {
    /// A successful text result
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            is_error: false,
        }
    }

    /// A tool-level failure, surfaced inline rather than as a JSON-RPC error
    pub fn error<S: Into<String>>(message: S) -> Self {
        Self {
            content: vec![ContentBlock::text(message)],
            is_error: true,
        }
    }
}

/// Result of `resources/list`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListResourcesResult {
    pub resources: Vec<ResourceSpec>,
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Result of `resources/templates/list`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListResourceTemplatesResult {
    #[serde(rename = "resourceTemplates")]
    pub resource_templates: Vec<TemplateSpec>,
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Result of `resources/read`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadResourceResult {
    pub contents: Vec<ResourceContents>,
}

/// Result of `prompts/list`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListPromptsResult {
    pub prompts: Vec<PromptSpec>,
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Result of `prompts/get`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GetPromptResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub messages: Vec<PromptMessage>,
}

/// Result of `completion/complete`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompleteResult {
    pub completion: Completion,
}

/// Completion values, capped at 100 entries per the protocol
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Completion {
    pub values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(rename = "hasMore", skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,
}

impl Completion {
    /// Cap the value list at 100 entries, recording the uncut total
    pub fn capped(values: Vec<String>) -> Self {
        let total = values.len() as u64;
        if values.len() > 100 {
            Self {
                values: values.into_iter().take(100).collect(),
                total: Some(total),
                has_more: Some(true),
            }
        } else {
            Self {
                values,
                total: Some(total),
                has_more: Some(false),
            }
        }
    }
}

/// Params of a `notifications/message` log notification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingMessageParams {
    pub level: LoggingLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    pub data: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_initialize_params_wire_names() {
        let params: InitializeParams = serde_json::from_value(json!({
            "protocolVersion": "2024-11-05",
            "clientInfo": {"name": "c", "version": "1"}
        }))
        .unwrap();
        assert_eq!(params.protocol_version, "2024-11-05");
        assert_eq!(params.client_info.name, "c");
    }

    #[test]
    fn test_call_tool_result_shapes() {
        let ok = serde_json::to_value(CallToolResult::text("5")).unwrap();
        assert_eq!(ok["isError"], json!(false));
        assert_eq!(ok["content"][0]["text"], "5");

        let err = serde_json::to_value(CallToolResult::error("division by zero")).unwrap();
        assert_eq!(err["isError"], json!(true));
    }

    #[test]
    fn test_completion_reference_tags() {
        let prompt_ref: CompletionReference =
            serde_json::from_value(json!({"type": "ref/prompt", "name": "greet"})).unwrap();
        assert!(matches!(prompt_ref, CompletionReference::Prompt { .. }));

        let resource_ref: CompletionReference =
            serde_json::from_value(json!({"type": "ref/resource", "uri": "config://{key}"}))
                .unwrap();
        assert!(matches!(resource_ref, CompletionReference::Resource { .. }));
    }

    #[test]
    fn test_completion_cap() {
        let many: Vec<String> = (0..150).map(|i| i.to_string()).collect();
        let completion = Completion::capped(many);
        assert_eq!(completion.values.len(), 100);
        assert_eq!(completion.total, Some(150));
        assert_eq!(completion.has_more, Some(true));
    }
}
