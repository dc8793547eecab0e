// ! Transport layer traits and event model
// !
// ! A transport turns bytes into raw frames and back. Everything it learns
// ! is reported as a `TransportEvent` on a single channel; the protocol
// ! adapter consumes that stream and owns all protocol knowledge. Transports
// ! never decode JSON-RPC beyond the shallow inspection the HTTP POST flow
// ! needs for response counting.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::core::error::McpResult;

/// Events emitted by a bound transport, in arrival order
#[derive(Debug)]
pub enum TransportEvent {
    /// The transport is listening and ready for traffic
    Ready,
    /// A client session came into existence
    ClientConnected { session_id: String },
    /// A complete raw frame arrived
    Message {
        session_id: String,
        frame: String,
        context: MessageContext,
    },
    /// A client went away; the adapter drops its session
    ClientDisconnected {
        session_id: String,
        reason: Option<String>,
    },
    /// A transport-level failure not tied to one frame
    Error {
        session_id: Option<String>,
        message: String,
    },
    /// The transport shut down; no further events follow
    Closed { reason: Option<String> },
}

/// Routing context attached to an incoming frame.
///
/// Opaque to the processor. The HTTP transport uses it to steer responses to
/// the pending POST body or stream; the stdio transport leaves it empty and
/// responses go to the writer.
#[derive(Debug, Clone, Default)]
pub struct MessageContext {
    reply: Option<mpsc::UnboundedSender<String>>,
    /// When true, batch responses are delivered frame-by-frame as produced
    /// (SSE); otherwise the adapter assembles one frame per incoming frame.
    pub streamed: bool,
    /// Per-request dispatch deadline; late responses become -32603
    pub response_timeout: Option<Duration>,
}

impl MessageContext {
    /// Context routing responses into a channel (HTTP POST flows)
    pub fn with_reply(reply: mpsc::UnboundedSender<String>) -> Self {
        Self {
            reply: Some(reply),
            streamed: false,
            response_timeout: None,
        }
    }

    pub fn streamed(mut self) -> Self {
        self.streamed = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = Some(timeout);
        self
    }

    /// Forward a frame to the pending reply channel, if any. Returns whether
    /// the frame was taken.
    pub fn reply(&self, frame: String) -> bool {
        match &self.reply {
            Some(sender) => sender.send(frame).is_ok(),
            None => false,
        }
    }

    pub fn has_reply(&self) -> bool {
        self.reply.is_some()
    }
}

/// Server-side transport contract.
///
/// `start` binds the transport and hands back its event stream; `send`
/// routes an encoded frame to a session, honoring the frame's context when
/// present.
#[async_trait]
pub trait ServerTransport: Send + Sync {
    /// Bind and begin emitting events
    async fn start(&mut self) -> McpResult<mpsc::Receiver<TransportEvent>>;

    /// Deliver a frame to the given session
    async fn send(&self, session_id: &str, frame: String, context: &MessageContext)
        -> McpResult<()>;

    /// Stop the transport and release its resources
    async fn close(&mut self) -> McpResult<()>;

    /// Human-readable description for logs
    fn transport_info(&self) -> String {
        "unknown transport".to_string()
    }
}
