//! Transport layer implementations
//!
//! This module provides the transport abstraction and its two concrete
//! implementations: the line-delimited stdio transport and the
//! single-endpoint streamable HTTP transport.

pub mod traits;

#[cfg(feature = "stdio")]
pub mod stdio;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub mod sse;

// Re-export commonly used types
pub use traits::{MessageContext, ServerTransport, TransportEvent};

#[cfg(feature = "stdio")]
pub use stdio::StdioServerTransport;

#[cfg(feature = "http")]
pub use http::{HttpServerTransport, HttpTransportConfig, SESSION_ID_HEADER};

#[cfg(feature = "http")]
pub use sse::{EventStore, InMemoryEventStore};
