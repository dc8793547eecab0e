// ! Core MCP protocol types
// !
// ! Module contains the JSON-RPC envelope types, server/client capability
// ! objects, and the content model shared by tool results, resource reads,
// ! and prompt messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// ============================================================================
// Protocol Constants
// ============================================================================

/// Latest MCP protocol revision the server speaks
pub const LATEST_PROTOCOL_VERSION: &str = "2025-06-18";

/// All protocol revisions the server accepts, newest first
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

pub const JSONRPC_VERSION: &str = "2.0";

// ============================================================================
// JSON-RPC Error Codes
// ============================================================================

/// JSON-RPC 2.0 standard error codes plus the MCP extensions
pub mod error_codes {
    /// Malformed JSON was received
    pub const PARSE_ERROR: i64 = -32700;
    /// The JSON sent is not a valid request envelope
    pub const INVALID_REQUEST: i64 = -32600;
    /// Method does not exist or its capability is disabled
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid method parameters, including schema validation failures
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal JSON-RPC error
    pub const INTERNAL_ERROR: i64 = -32603;
    /// MCP: request received before the initialization handshake completed
    pub const NOT_INITIALIZED: i64 = -32001;
    /// MCP: unsupported protocol version, or resource not found
    pub const RESOURCE_NOT_FOUND: i64 = -32002;
}

// ============================================================================
// JSON-RPC Envelopes
// ============================================================================

/// A JSON-RPC request. The `id` may be a string, a number, or an explicit
/// `null` (a null id still names a request; only an absent id makes a
/// notification).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC notification (no id, no response)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// A successful JSON-RPC response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    pub result: Value,
}

impl JsonRpcResponse {
    pub fn new(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result,
        }
    }
}

/// Error payload carried by an error response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A JSON-RPC error response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub jsonrpc: String,
    pub id: Value,
    pub error: ErrorObject,
}

impl JsonRpcError {
    pub fn new(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            error: ErrorObject {
                code,
                message: message.into(),
                data: None,
            },
        }
    }
}

/// Either kind of server-to-client reply for a single request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ServerMessage {
    Response(JsonRpcResponse),
    Error(JsonRpcError),
}

impl ServerMessage {
    /// The request id this reply answers
    pub fn id(&self) -> &Value {
        match self {
            ServerMessage::Response(r) => &r.id,
            ServerMessage::Error(e) => &e.id,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ServerMessage::Error(_))
    }
}

// ============================================================================
// Implementation Info
// ============================================================================

/// Name/version pair identifying an MCP implementation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Implementation {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Implementation {
    pub fn new<S: Into<String>>(name: S, version: S) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            title: None,
        }
    }
}

pub type ServerInfo = Implementation;
pub type ClientInfo = Implementation;

// ============================================================================
// Capabilities
// ============================================================================

/// Capabilities advertised by the server at initialize time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completions: Option<CompletionsCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, Value>>,
}

impl ServerCapabilities {
    /// Everything on: the default for a server hosting all artifact kinds
    pub fn all() -> Self {
        Self {
            tools: Some(ToolsCapability {
                list_changed: Some(true),
            }),
            resources: Some(ResourcesCapability {
                subscribe: Some(true),
                list_changed: Some(true),
            }),
            prompts: Some(PromptsCapability {
                list_changed: Some(true),
            }),
            logging: Some(LoggingCapability::default()),
            completions: Some(CompletionsCapability::default()),
            experimental: None,
        }
    }
}

/// Capabilities advertised by the client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ClientCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ToolsCapability {
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ResourcesCapability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<bool>,
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PromptsCapability {
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LoggingCapability {
    #[serde(flatten)]
    pub additional_properties: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CompletionsCapability {
    #[serde(flatten)]
    pub additional_properties: HashMap<String, Value>,
}

// ============================================================================
// Content Model
// ============================================================================

/// One element of a tool result or prompt message content list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ContentBlock {
    /// Plain text content
    #[serde(rename = "text")]
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        annotations: Option<Value>,
    },
    /// Base64-encoded image content
    #[serde(rename = "image")]
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        annotations: Option<Value>,
    },
    /// Base64-encoded audio content
    #[serde(rename = "audio")]
    Audio {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        annotations: Option<Value>,
    },
    /// An embedded resource
    #[serde(rename = "resource")]
    Resource {
        resource: ResourceContents,
        #[serde(skip_serializing_if = "Option::is_none")]
        annotations: Option<Value>,
    },
}

impl ContentBlock {
    /// Create a text content block
    pub fn text<S: Into<String>>(text: S) -> Self {
        ContentBlock::Text {
            text: text.into(),
            annotations: None,
        }
    }

    /// Create an image content block
    pub fn image<S: Into<String>>(data: S, mime_type: S) -> Self {
        ContentBlock::Image {
            data: data.into(),
            mime_type: mime_type.into(),
            annotations: None,
        }
    }
}

/// Contents of a resource read: text or binary blob, keyed by URI
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ResourceContents {
    Text {
        uri: String,
        #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        text: String,
    },
    Blob {
        uri: String,
        #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        blob: String,
    },
}

impl ResourceContents {
    pub fn text<S: Into<String>>(uri: S, text: S) -> Self {
        ResourceContents::Text {
            uri: uri.into(),
            mime_type: Some("text/plain".to_string()),
            text: text.into(),
        }
    }

    pub fn blob<S: Into<String>>(uri: S, blob: S, mime_type: S) -> Self {
        ResourceContents::Blob {
            uri: uri.into(),
            mime_type: Some(mime_type.into()),
            blob: blob.into(),
        }
    }

    pub fn uri(&self) -> &str {
        match self {
            ResourceContents::Text { uri, .. } | ResourceContents::Blob { uri, .. } => uri,
        }
    }
}

/// A message produced by a prompt handler
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptMessage {
    pub role: Role,
    pub content: ContentBlock,
}

impl PromptMessage {
    pub fn user<S: Into<String>>(text: S) -> Self {
        Self {
            role: Role::User,
            content: ContentBlock::text(text),
        }
    }

    pub fn assistant<S: Into<String>>(text: S) -> Self {
        Self {
            role: Role::Assistant,
            content: ContentBlock::text(text),
        }
    }
}

/// Message role in a prompt conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

// ============================================================================
// Logging Levels
// ============================================================================

/// RFC 5424 severity levels used by `logging/setLevel`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_roundtrip() {
        let req = JsonRpcRequest::new(json!(1), "ping", None);
        let encoded = serde_json::to_string(&req).unwrap();
        assert!(!encoded.contains("params"));
        let decoded: JsonRpcRequest = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn test_server_message_untagged_encoding() {
        let ok = ServerMessage::Response(JsonRpcResponse::new(json!(2), json!({})));
        let encoded = serde_json::to_value(&ok).unwrap();
        assert_eq!(encoded["result"], json!({}));
        assert!(encoded.get("error").is_none());

        let err = ServerMessage::Error(JsonRpcError::new(
            json!(3),
            error_codes::METHOD_NOT_FOUND,
            "no such method",
        ));
        let encoded = serde_json::to_value(&err).unwrap();
        assert_eq!(encoded["error"]["code"], json!(-32601));
    }

    #[test]
    fn test_content_block_tags() {
        let text = serde_json::to_value(ContentBlock::text("hi")).unwrap();
        assert_eq!(text["type"], "text");

        let image = serde_json::to_value(ContentBlock::image("aGk=", "image/png")).unwrap();
        assert_eq!(image["type"], "image");
        assert_eq!(image["mimeType"], "image/png");
    }

    #[test]
    fn test_resource_contents_variants() {
        let text = serde_json::to_value(ResourceContents::text("file:///a.txt", "body")).unwrap();
        assert_eq!(text["text"], "body");
        assert!(text.get("blob").is_none());

        let blob: ResourceContents =
            serde_json::from_value(json!({"uri": "file:///a.bin", "blob": "AAEC"})).unwrap();
        assert!(matches!(blob, ResourceContents::Blob { .. }));
    }

    #[test]
    fn test_capability_rename() {
        let caps = ServerCapabilities::all();
        let encoded = serde_json::to_value(&caps).unwrap();
        assert_eq!(encoded["tools"]["listChanged"], json!(true));
        assert_eq!(encoded["resources"]["subscribe"], json!(true));
    }

    #[test]
    fn test_logging_level_order() {
        assert!(LoggingLevel::Debug < LoggingLevel::Warning);
        assert!(LoggingLevel::Error < LoggingLevel::Emergency);
        let level: LoggingLevel = serde_json::from_value(json!("warning")).unwrap();
        assert_eq!(level, LoggingLevel::Warning);
    }
}
