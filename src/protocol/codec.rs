// ! Frame decoding for incoming JSON-RPC traffic
// !
// ! One frame is one JSON value: a single request/notification or a batch.
// ! Decoding distinguishes requests from notifications by the presence of the
// ! `id` field; an explicit `id: null` still names a request whose response
// ! id is null.

use serde_json::Value;

use crate::core::error::{McpError, McpResult};
use crate::protocol::types::{JsonRpcNotification, JsonRpcRequest, JSONRPC_VERSION};

/// A single decoded client-to-server message
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

impl ClientFrame {
    pub fn is_request(&self) -> bool {
        matches!(self, ClientFrame::Request(_))
    }
}

/// A decoded wire frame: one message or an ordered batch
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Single(ClientFrame),
    Batch(Vec<ClientFrame>),
}

impl ClientMessage {
    /// Number of request (response-bearing) entries in the frame
    pub fn request_count(&self) -> usize {
        match self {
            ClientMessage::Single(frame) => usize::from(frame.is_request()),
            ClientMessage::Batch(frames) => frames.iter().filter(|f| f.is_request()).count(),
        }
    }
}

/// Decode a raw frame into a client message.
///
/// Errors map onto the wire taxonomy: undecodable JSON is a parse error,
/// a structurally wrong envelope is an invalid request.
pub fn decode_frame(raw: &str) -> McpResult<ClientMessage> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| McpError::parse(format!("invalid JSON: {e}")))?;
    decode_value(value)
}

/// Decode an already-parsed JSON value into a client message
pub fn decode_value(value: Value) -> McpResult<ClientMessage> {
    match value {
        Value::Array(items) => {
            if items.is_empty() {
                return Err(McpError::InvalidRequest("empty batch".to_string()));
            }
            let frames = items
                .into_iter()
                .map(decode_single)
                .collect::<McpResult<Vec<_>>>()?;
            Ok(ClientMessage::Batch(frames))
        }
        other => Ok(ClientMessage::Single(decode_single(other)?)),
    }
}

fn decode_single(value: Value) -> McpResult<ClientFrame> {
    let obj = match value {
        Value::Object(obj) => obj,
        other => {
            return Err(McpError::InvalidRequest(format!(
                "message must be an object, got {}",
                type_name(&other)
            )));
        }
    };

    match obj.get("jsonrpc").and_then(Value::as_str) {
        Some(JSONRPC_VERSION) => {}
        _ => return Err(McpError::parse("missing or invalid 'jsonrpc' field")),
    }

    let method = match obj.get("method").and_then(Value::as_str) {
        Some(m) if !m.is_empty() => m.to_string(),
        Some(_) => return Err(McpError::InvalidRequest("empty method name".to_string())),
        None => {
            return Err(McpError::InvalidRequest(
                "missing 'method' field".to_string(),
            ));
        }
    };

    let params = obj.get("params").cloned();
    if let Some(p) = &params {
        if !p.is_object() && !p.is_array() && !p.is_null() {
            return Err(McpError::InvalidRequest(
                "'params' must be an object or array".to_string(),
            ));
        }
    }

    // Presence of the key decides, not its value: {"id": null} is a request.
    match obj.get("id") {
        Some(id) => {
            if !(id.is_string() || id.is_number() || id.is_null()) {
                return Err(McpError::InvalidRequest(
                    "'id' must be a string, number, or null".to_string(),
                ));
            }
            Ok(ClientFrame::Request(JsonRpcRequest {
                jsonrpc: JSONRPC_VERSION.to_string(),
                id: id.clone(),
                method,
                params,
            }))
        }
        None => Ok(ClientFrame::Notification(JsonRpcNotification {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method,
            params,
        })),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
