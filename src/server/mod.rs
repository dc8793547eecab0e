//! MCP server implementation
//!
//! The request processor (dispatch state machine), the protocol adapter
//! (transport binding), and the server facade tying them to the registry
//! and session store.

pub mod adapter;
pub mod mcp_server;
pub mod processor;

pub use adapter::ProtocolAdapter;
pub use mcp_server::{McpServer, ServerConfig};
pub use processor::RequestProcessor;
