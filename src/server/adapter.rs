// ! Protocol adapter
// !
// ! Binds exactly one transport: consumes its event stream, decodes frames,
// ! pushes them through the request processor, and routes encoded replies
// ! back out with the context the frame arrived with. The transport owns
// ! nothing protocol-specific; all JSON-RPC knowledge lives here and below.

use serde_json::Value;
use std::sync::Arc;

use crate::core::error::{McpError, McpResult};
use crate::protocol::codec::{decode_frame, ClientFrame, ClientMessage};
use crate::protocol::types::{error_codes, JsonRpcError, ServerMessage};
use crate::server::processor::RequestProcessor;
use crate::session::SessionStore;
use crate::transport::traits::{MessageContext, ServerTransport, TransportEvent};

/// The adapter driving one bound transport
pub struct ProtocolAdapter<T: ServerTransport + 'static> {
    transport: Arc<T>,
    processor: Arc<RequestProcessor>,
    sessions: Arc<dyn SessionStore>,
}

impl<T: ServerTransport + 'static> ProtocolAdapter<T> {
    pub fn new(
        transport: T,
        processor: Arc<RequestProcessor>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            transport: Arc::new(transport),
            processor,
            sessions,
        }
    }

    /// Shared handle to the bound transport
    pub fn transport(&self) -> Arc<T> {
        Arc::clone(&self.transport)
    }

    /// Consume transport events until the transport closes.
    ///
    /// Each frame is handled on its own task, so dispatch order follows
    /// arrival order while slow handlers never block the event loop.
    pub async fn run(
        &self,
        mut events: tokio::sync::mpsc::Receiver<TransportEvent>,
    ) -> McpResult<()> {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Ready => {
                    tracing::info!(transport = %self.transport.transport_info(), "transport ready");
                }
                TransportEvent::ClientConnected { session_id } => {
                    // The HTTP transport creates sessions itself at
                    // initialize time; only create when missing.
                    if self.sessions.get(&session_id).await?.is_none() {
                        self.sessions.create(&session_id).await?;
                    }
                    tracing::debug!(session = %session_id, "client connected");
                }
                TransportEvent::Message {
                    session_id,
                    frame,
                    context,
                } => {
                    let transport = Arc::clone(&self.transport);
                    let processor = Arc::clone(&self.processor);
                    // Notifications mutate session state the very next
                    // request may depend on (notifications/initialized), so
                    // frames without requests complete inline. Request
                    // frames run on their own task: dispatch follows
                    // arrival order, completion need not.
                    if frame_bears_requests(&frame) {
                        tokio::spawn(async move {
                            handle_frame(transport, processor, session_id, frame, context).await;
                        });
                    } else {
                        handle_frame(transport, processor, session_id, frame, context).await;
                    }
                }
                TransportEvent::ClientDisconnected { session_id, reason } => {
                    tracing::debug!(
                        session = %session_id,
                        reason = reason.as_deref().unwrap_or("unknown"),
                        "client disconnected"
                    );
                    self.sessions.delete(&session_id).await?;
                }
                TransportEvent::Error {
                    session_id,
                    message,
                } => {
                    tracing::warn!(
                        session = session_id.as_deref().unwrap_or("-"),
                        "transport error: {message}"
                    );
                }
                TransportEvent::Closed { reason } => {
                    tracing::info!(
                        reason = reason.as_deref().unwrap_or("closed"),
                        "transport closed"
                    );
                    break;
                }
            }
        }
        Ok(())
    }
}

/// Shallow check for response-bearing content; undecodable frames count as
/// request-bearing so their parse-error reply is produced off the loop.
fn frame_bears_requests(frame: &str) -> bool {
    match decode_frame(frame) {
        Ok(message) => message.request_count() > 0,
        Err(_) => true,
    }
}

async fn handle_frame<T: ServerTransport>(
    transport: Arc<T>,
    processor: Arc<RequestProcessor>,
    session_id: String,
    frame: String,
    context: MessageContext,
) {
    let message = match decode_frame(&frame) {
        Ok(message) => message,
        Err(error) => {
            // Undecodable frames get a reply with a null id.
            let reply = JsonRpcError::new(
                Value::Null,
                error.jsonrpc_code(),
                error.public_message(),
            );
            send_encoded(&*transport, &session_id, &ServerMessage::Error(reply), &context).await;
            return;
        }
    };

    match message {
        ClientMessage::Single(ClientFrame::Notification(notification)) => {
            processor.process_notification(&session_id, notification).await;
        }
        ClientMessage::Single(ClientFrame::Request(request)) => {
            let response = dispatch_with_deadline(&processor, &session_id, request, &context).await;
            send_encoded(&*transport, &session_id, &response, &context).await;
        }
        ClientMessage::Batch(frames) => {
            // Batch entries dispatch sequentially in arrival order, which
            // keeps the response batch in request order.
            let mut responses = Vec::new();
            for entry in frames {
                match entry {
                    ClientFrame::Notification(notification) => {
                        processor.process_notification(&session_id, notification).await;
                    }
                    ClientFrame::Request(request) => {
                        let response =
                            dispatch_with_deadline(&processor, &session_id, request, &context)
                                .await;
                        if context.streamed {
                            send_encoded(&*transport, &session_id, &response, &context).await;
                        } else {
                            responses.push(response);
                        }
                    }
                }
            }
            // Non-streamed batches collapse into one frame; an
            // all-notification batch produces nothing.
            if !context.streamed && !responses.is_empty() {
                match serde_json::to_string(&responses) {
                    Ok(encoded) => send_raw(&*transport, &session_id, encoded, &context).await,
                    Err(e) => tracing::error!("failed to encode batch response: {e}"),
                }
            }
        }
    }
}

/// Dispatch one request, converting a missed context deadline into -32603
async fn dispatch_with_deadline(
    processor: &RequestProcessor,
    session_id: &str,
    request: crate::protocol::types::JsonRpcRequest,
    context: &MessageContext,
) -> ServerMessage {
    let id = request.id.clone();
    match context.response_timeout {
        Some(deadline) => {
            match tokio::time::timeout(deadline, processor.process_request(session_id, request))
                .await
            {
                Ok(response) => response,
                Err(_) => {
                    tracing::warn!(session = %session_id, "request dispatch timed out");
                    ServerMessage::Error(JsonRpcError::new(
                        id,
                        error_codes::INTERNAL_ERROR,
                        McpError::timeout("request timed out").public_message(),
                    ))
                }
            }
        }
        None => processor.process_request(session_id, request).await,
    }
}

async fn send_encoded<T: ServerTransport>(
    transport: &T,
    session_id: &str,
    response: &ServerMessage,
    context: &MessageContext,
) {
    match serde_json::to_string(response) {
        Ok(encoded) => send_raw(transport, session_id, encoded, context).await,
        Err(e) => tracing::error!("failed to encode response: {e}"),
    }
}

async fn send_raw<T: ServerTransport>(
    transport: &T,
    session_id: &str,
    frame: String,
    context: &MessageContext,
) {
    if let Err(e) = transport.send(session_id, frame, context).await {
        tracing::warn!(session = %session_id, "failed to send response: {e}");
    }
}
