//! MCP protocol implementation
//!
//! This module contains the wire-level protocol types for the engine:
//! JSON-RPC envelopes, MCP request/response payloads, method name constants,
//! and the frame codec with its parse rules.

pub mod codec;
pub mod messages;
pub mod methods;
pub mod types;

// Re-export commonly used types and constants
pub use codec::{decode_frame, decode_value, ClientFrame, ClientMessage};
pub use messages::*;
pub use types::{
    error_codes, ClientCapabilities, ClientInfo, ContentBlock, ErrorObject, Implementation,
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, LoggingLevel,
    PromptMessage, ResourceContents, Role, ServerCapabilities, ServerInfo, ServerMessage,
    JSONRPC_VERSION, LATEST_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS,
};
