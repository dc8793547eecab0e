// Copyright (c) 2025 Quartz MCP Contributors
// SPDX-License-Identifier: MIT

//! # Quartz MCP
//!
//! A server-side protocol engine for the
//! [Model Context Protocol (MCP)](https://modelcontextprotocol.io/): host
//! applications register tools, resources, and prompts; the engine speaks
//! JSON-RPC 2.0 to any number of clients over a line-delimited stdio channel
//! or a single-endpoint streamable HTTP transport (direct JSON and SSE).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "stdio")]
//! # {
//! use quartz_mcp::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> McpResult<()> {
//!     let server = McpServer::new("echo-server", "1.0.0");
//!
//!     server.add_tool(
//!         ToolSpec::new("echo", json!({
//!             "type": "object",
//!             "properties": {
//!                 "message": { "type": "string" }
//!             },
//!             "required": ["message"]
//!         })).with_description("Echo a message"),
//!         FnTool(|args: HashMap<String, Value>| {
//!             let message = args.get("message")
//!                 .and_then(Value::as_str)
//!                 .unwrap_or_default();
//!             Ok(Value::String(message.to_string()))
//!         }),
//!     ).await?;
//!
//!     server.run_with_stdio().await
//! }
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`core`]: error type, handler traits, artifact specs, validation, cache
//! - [`protocol`]: JSON-RPC envelopes, MCP payloads, method names, codec
//! - [`registry`]: the artifact catalog with origin precedence
//! - [`session`]: per-client session state and stores
//! - [`server`]: request processor, protocol adapter, server facade
//! - [`transport`]: stdio and streamable HTTP transports
//! - [`utils`]: URI validation and URI-template matching

pub mod core;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod transport;
pub mod utils;

// Re-export commonly used types for convenience
pub use crate::core::error::{McpError, McpResult};
pub use crate::protocol::types::*;
pub use crate::server::McpServer;

/// Prelude module for convenient imports
///
/// Use `use quartz_mcp::prelude::*;` to bring the common surface into scope.
pub mod prelude {
    // Core types and traits
    pub use crate::core::{
        completion::{CompletionProvider, FnCompletionProvider, ListCompletionProvider},
        context::RequestContext,
        error::{McpError, McpResult},
        prompt::{FnPrompt, PromptArgument, PromptHandler, PromptSpec},
        resource::{FnResource, ResourceHandler, ResourceSpec, TemplateSpec},
        tool::{FnTool, ToolHandler, ToolSpec},
    };

    // Protocol types and messages
    pub use crate::protocol::messages::*;
    pub use crate::protocol::types::*;

    // Catalog and sessions
    pub use crate::registry::{Registry, SpecOrigin};
    pub use crate::session::{
        CacheSessionStore, InMemorySessionStore, Session, SessionStore,
    };

    // Server
    pub use crate::server::{McpServer, ServerConfig};

    // Transport layer implementations
    #[cfg(feature = "stdio")]
    pub use crate::transport::StdioServerTransport;

    #[cfg(feature = "http")]
    pub use crate::transport::{
        HttpServerTransport, HttpTransportConfig, InMemoryEventStore,
    };

    // Essential external types
    pub use async_trait::async_trait;
    pub use serde_json::{json, Value};
    pub use std::collections::HashMap;
}
