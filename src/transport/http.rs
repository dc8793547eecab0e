// ! Streamable HTTP transport
// !
// ! A single endpoint (default `/mcp`) carries the whole protocol:
// !
// ! - POST delivers a JSON-RPC message or batch; the response is direct JSON
// !   or a POST-scoped SSE stream, chosen from the Accept header and the
// !   `prefer_direct_json` flag. Notification-only bodies get `202`.
// ! - GET opens the session's long-lived SSE stream for server-initiated
// !   notifications, with `Last-Event-ID` replay through the event store.
// ! - DELETE tears the session down: streams closed, session deleted,
// !   disconnect emitted.
// !
// ! Sessions are minted on the `initialize` POST and travel in the
// ! `Mcp-Session-Id` header from then on.

use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::get,
};
use futures::stream;
use serde_json::Value;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::{StreamExt, wrappers::UnboundedReceiverStream};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::core::error::{McpError, McpResult};
use crate::protocol::methods;
use crate::protocol::types::{JsonRpcError, error_codes};
use crate::session::SessionStore;
use crate::transport::sse::EventStore;
use crate::transport::traits::{MessageContext, ServerTransport, TransportEvent};

use async_trait::async_trait;

pub const SESSION_ID_HEADER: &str = "Mcp-Session-Id";
pub const LAST_EVENT_ID_HEADER: &str = "Last-Event-ID";

const EVENT_BUFFER: usize = 256;
const STREAM_TICK: Duration = Duration::from_millis(100);

/// Configuration for the HTTP transport
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Address to bind, e.g. "127.0.0.1:3000"
    pub bind_addr: String,
    /// Endpoint path for all MCP traffic
    pub mcp_path: String,
    /// CORS origins; `["*"]` allows any
    pub allowed_origins: Vec<String>,
    /// Prefer a direct JSON response when the client accepts both forms
    pub prefer_direct_json: bool,
    /// Per-request soft timeout for the direct-JSON flow
    pub request_timeout: Duration,
    /// Maximum accepted request body size in bytes
    pub max_body_bytes: usize,
    /// SSE keep-alive interval
    pub keep_alive: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            mcp_path: "/mcp".to_string(),
            allowed_origins: vec!["*".to_string()],
            prefer_direct_json: true,
            request_timeout: Duration::from_secs(30),
            max_body_bytes: 4 * 1024 * 1024,
            keep_alive: Duration::from_secs(15),
        }
    }
}

/// One session's live GET stream
struct GetStream {
    sender: mpsc::UnboundedSender<(Option<u64>, String)>,
    drain_task: JoinHandle<()>,
}

/// State shared with the axum handlers
struct HttpState {
    events: mpsc::Sender<TransportEvent>,
    sessions: Arc<dyn SessionStore>,
    event_store: Option<Arc<dyn EventStore>>,
    streams: Mutex<HashMap<String, GetStream>>,
    config: HttpTransportConfig,
}

/// Streamable HTTP server transport
pub struct HttpServerTransport {
    config: HttpTransportConfig,
    session_store: Arc<dyn SessionStore>,
    event_store: Option<Arc<dyn EventStore>>,
    state: Option<Arc<HttpState>>,
    server_task: Option<JoinHandle<()>>,
}

impl HttpServerTransport {
    pub fn new(session_store: Arc<dyn SessionStore>) -> Self {
        Self::with_config(session_store, HttpTransportConfig::default())
    }

    pub fn with_config(session_store: Arc<dyn SessionStore>, config: HttpTransportConfig) -> Self {
        Self {
            config,
            session_store,
            event_store: None,
            state: None,
            server_task: None,
        }
    }

    /// Attach an event store, enabling `Last-Event-ID` replay on GET streams
    pub fn with_event_store(mut self, event_store: Arc<dyn EventStore>) -> Self {
        self.event_store = Some(event_store);
        self
    }

    /// Build the router and event stream without binding a socket.
    ///
    /// `start` uses this internally; tests drive the router directly.
    pub fn build(&mut self) -> McpResult<(Router, mpsc::Receiver<TransportEvent>)> {
        if self.state.is_some() {
            return Err(McpError::transport("http transport already started"));
        }

        let (events, receiver) = mpsc::channel(EVENT_BUFFER);
        let state = Arc::new(HttpState {
            events,
            sessions: Arc::clone(&self.session_store),
            event_store: self.event_store.clone(),
            streams: Mutex::new(HashMap::new()),
            config: self.config.clone(),
        });

        let router = Router::new()
            .route(
                &self.config.mcp_path,
                get(handle_get).post(handle_post).delete(handle_delete),
            )
            .layer(cors_layer(&self.config.allowed_origins))
            .layer(DefaultBodyLimit::max(self.config.max_body_bytes))
            .with_state(Arc::clone(&state));

        self.state = Some(state);
        Ok((router, receiver))
    }
}

#[async_trait]
impl ServerTransport for HttpServerTransport {
    async fn start(&mut self) -> McpResult<mpsc::Receiver<TransportEvent>> {
        let (router, receiver) = self.build()?;
        let state = self
            .state
            .clone()
            .ok_or_else(|| McpError::internal("transport state missing after build"))?;

        let listener = tokio::net::TcpListener::bind(&self.config.bind_addr)
            .await
            .map_err(|e| {
                McpError::transport(format!("failed to bind {}: {e}", self.config.bind_addr))
            })?;
        let local_addr = listener.local_addr().map_err(McpError::from)?;
        tracing::info!(addr = %local_addr, path = %self.config.mcp_path, "http transport listening");

        let _ = state.events.send(TransportEvent::Ready).await;

        let serve_events = state.events.clone();
        self.server_task = Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("http server error: {}", e);
                let _ = serve_events
                    .send(TransportEvent::Error {
                        session_id: None,
                        message: e.to_string(),
                    })
                    .await;
            }
            let _ = serve_events
                .send(TransportEvent::Closed { reason: None })
                .await;
        }));

        Ok(receiver)
    }

    async fn send(
        &self,
        session_id: &str,
        frame: String,
        context: &MessageContext,
    ) -> McpResult<()> {
        // POST-scoped responses ride the reply channel; everything else is
        // queued for the session's GET stream drain.
        if context.reply(frame.clone()) {
            return Ok(());
        }
        self.session_store.queue_message(session_id, frame).await
    }

    async fn close(&mut self) -> McpResult<()> {
        tracing::debug!("closing http transport");
        if let Some(task) = self.server_task.take() {
            task.abort();
        }
        if let Some(state) = self.state.take() {
            let mut streams = state.streams.lock().await;
            for (_, stream) in streams.drain() {
                stream.drain_task.abort();
            }
        }
        Ok(())
    }

    fn transport_info(&self) -> String {
        format!(
            "streamable http transport ({} {})",
            self.config.bind_addr, self.config.mcp_path
        )
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            SESSION_ID_HEADER.parse().expect("valid header name"),
            LAST_EVENT_ID_HEADER.parse().expect("valid header name"),
        ])
        .expose_headers([SESSION_ID_HEADER
            .parse::<header::HeaderName>()
            .expect("valid header name")]);

    if origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        layer.allow_origin(AllowOrigin::list(parsed))
    }
}

// ============================================================================
// Accept / body inspection
// ============================================================================

fn accepts(headers: &HeaderMap, mime: &str) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains(mime) || accept.contains("*/*"))
}

fn content_type_is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

fn session_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Shallow frame inspection: which entries bear responses, and is one of
/// them the initialize request. Full decoding belongs to the adapter.
struct BodyShape {
    request_ids: Vec<Value>,
    has_initialize: bool,
}

fn inspect_body(body: &Value) -> BodyShape {
    let entries: Vec<&Value> = match body {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    let mut request_ids = Vec::new();
    let mut has_initialize = false;
    for entry in entries {
        let Some(obj) = entry.as_object() else {
            continue;
        };
        if obj.get("method").and_then(Value::as_str) == Some(methods::INITIALIZE) {
            has_initialize = true;
        }
        if obj.contains_key("method") && obj.contains_key("id") {
            request_ids.push(obj.get("id").cloned().unwrap_or(Value::Null));
        }
    }
    BodyShape {
        request_ids,
        has_initialize,
    }
}

fn parse_error_body(message: &str) -> Response {
    let body = JsonRpcError::new(Value::Null, error_codes::PARSE_ERROR, message);
    (
        StatusCode::BAD_REQUEST,
        [(header::CONTENT_TYPE, "application/json")],
        serde_json::to_string(&body).unwrap_or_default(),
    )
        .into_response()
}

// ============================================================================
// POST
// ============================================================================

async fn handle_post(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if !content_type_is_json(&headers) {
        return StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response();
    }
    let can_json = accepts(&headers, "application/json");
    let can_sse = accepts(&headers, "text/event-stream");
    if !can_json && !can_sse {
        return StatusCode::NOT_ACCEPTABLE.into_response();
    }

    let parsed: Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(e) => return parse_error_body(&format!("invalid JSON: {e}")),
    };
    let shape = inspect_body(&parsed);

    // Session lifecycle: initialize mints a new id (any supplied header is
    // ignored); every other POST must name an existing session.
    let session_id = if shape.has_initialize {
        let id = uuid::Uuid::new_v4().to_string();
        if let Err(e) = state.sessions.create(&id).await {
            tracing::error!("session create failed: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        let _ = state
            .events
            .send(TransportEvent::ClientConnected {
                session_id: id.clone(),
            })
            .await;
        id
    } else {
        let Some(id) = session_header(&headers) else {
            return StatusCode::BAD_REQUEST.into_response();
        };
        match state.sessions.get(&id).await {
            Ok(Some(_)) => id,
            Ok(None) => return StatusCode::NOT_FOUND.into_response(),
            Err(e) => {
                tracing::error!("session lookup failed: {}", e);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    };

    let expected = shape.request_ids.len();

    // Notification-only body: accept now, dispatch asynchronously.
    if expected == 0 {
        let _ = state
            .events
            .send(TransportEvent::Message {
                session_id,
                frame: body,
                context: MessageContext::default(),
            })
            .await;
        return StatusCode::ACCEPTED.into_response();
    }

    let direct_json = can_json && (state.config.prefer_direct_json || !can_sse);
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();

    if direct_json {
        let context = MessageContext::with_reply(reply_tx)
            .with_timeout(state.config.request_timeout);
        let _ = state
            .events
            .send(TransportEvent::Message {
                session_id: session_id.clone(),
                frame: body,
                context,
            })
            .await;

        // The adapter assembles one frame per incoming frame (batch or
        // single) and applies the per-request timeout itself; the outer
        // deadline here only guards against a wedged dispatch path.
        let deadline =
            state.config.request_timeout * (expected as u32) + Duration::from_secs(1);
        let frame = match tokio::time::timeout(deadline, reply_rx.recv()).await {
            Ok(Some(frame)) => frame,
            _ => {
                let errors: Vec<JsonRpcError> = shape
                    .request_ids
                    .iter()
                    .map(|id| {
                        JsonRpcError::new(
                            id.clone(),
                            error_codes::INTERNAL_ERROR,
                            "request timed out",
                        )
                    })
                    .collect();
                let body = if errors.len() == 1 {
                    serde_json::to_string(&errors[0])
                } else {
                    serde_json::to_string(&errors)
                }
                .unwrap_or_default();
                return with_session_header(
                    shape.has_initialize.then_some(&session_id),
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        [(header::CONTENT_TYPE, "application/json")],
                        body,
                    )
                        .into_response(),
                );
            }
        };

        with_session_header(
            shape.has_initialize.then_some(&session_id),
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                frame,
            )
                .into_response(),
        )
    } else {
        // POST-scoped SSE: each response is one `message` event, emitted as
        // produced; the stream closes once every request is answered.
        let context = MessageContext::with_reply(reply_tx).streamed();
        let _ = state
            .events
            .send(TransportEvent::Message {
                session_id: session_id.clone(),
                frame: body,
                context,
            })
            .await;

        let stream = UnboundedReceiverStream::new(reply_rx)
            .take(expected)
            .map(|frame| Ok::<_, Infallible>(Event::default().event("message").data(frame)));

        let sse = Sse::new(stream)
            .keep_alive(KeepAlive::new().interval(state.config.keep_alive))
            .into_response();
        with_session_header(shape.has_initialize.then_some(&session_id), sse)
    }
}

fn with_session_header(session_id: Option<&String>, mut response: Response) -> Response {
    if let Some(id) = session_id {
        if let Ok(value) = HeaderValue::from_str(id) {
            response.headers_mut().insert(SESSION_ID_HEADER, value);
        }
    }
    response
}

// ============================================================================
// GET
// ============================================================================

async fn handle_get(State(state): State<Arc<HttpState>>, headers: HeaderMap) -> Response {
    if !accepts(&headers, "text/event-stream") {
        return StatusCode::NOT_ACCEPTABLE.into_response();
    }
    let Some(session_id) = session_header(&headers) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    match state.sessions.get(&session_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::error!("session lookup failed: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    // Replay precedes any live event when the client resumes.
    let mut replayed: Vec<(Option<u64>, String)> = Vec::new();
    if let Some(event_store) = &state.event_store {
        let last_seen = headers
            .get(LAST_EVENT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if let Some(last_seen) = last_seen {
            match event_store.replay_after(&session_id, last_seen).await {
                Ok(events) => {
                    replayed = events
                        .into_iter()
                        .map(|(id, frame)| (Some(id), frame))
                        .collect();
                }
                Err(e) => tracing::warn!("event replay failed: {}", e),
            }
        }
    }

    let (tx, rx) = mpsc::unbounded_channel::<(Option<u64>, String)>();

    // Drain task: session queue -> live stream, stamping event ids through
    // the event store. Ends when the client goes away; the session stays.
    let drain_sessions = Arc::clone(&state.sessions);
    let drain_events = state.event_store.clone();
    let drain_id = session_id.clone();
    let drain_tx = tx.clone();
    let drain_task = tokio::spawn(async move {
        let mut tick = tokio::time::interval(STREAM_TICK);
        loop {
            tick.tick().await;
            let frames = match drain_sessions.drain(&drain_id).await {
                Ok(frames) => frames,
                Err(e) => {
                    tracing::warn!("stream drain failed: {}", e);
                    continue;
                }
            };
            for frame in frames {
                let event_id = match &drain_events {
                    Some(store) => store.append(&drain_id, frame.clone()).await.ok(),
                    None => None,
                };
                if drain_tx.send((event_id, frame)).is_err() {
                    return;
                }
            }
        }
    });

    // A reconnect replaces any previous stream for the session.
    {
        let mut streams = state.streams.lock().await;
        if let Some(previous) = streams.insert(
            session_id.clone(),
            GetStream {
                sender: tx,
                drain_task,
            },
        ) {
            previous.drain_task.abort();
        }
    }

    let stream = stream::iter(replayed)
        .chain(UnboundedReceiverStream::new(rx))
        .map(|(event_id, frame)| {
            let mut event = Event::default().event("message").data(frame);
            if let Some(id) = event_id {
                event = event.id(id.to_string());
            }
            Ok::<_, Infallible>(event)
        });

    Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(state.config.keep_alive))
        .into_response()
}

// ============================================================================
// DELETE
// ============================================================================

async fn handle_delete(State(state): State<Arc<HttpState>>, headers: HeaderMap) -> Response {
    let Some(session_id) = session_header(&headers) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    match state.sessions.get(&session_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::error!("session lookup failed: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    if let Some(stream) = state.streams.lock().await.remove(&session_id) {
        stream.drain_task.abort();
        drop(stream.sender);
    }
    if let Some(event_store) = &state.event_store {
        let _ = event_store.remove_stream(&session_id).await;
    }
    if let Err(e) = state.sessions.delete(&session_id).await {
        tracing::warn!("session delete failed: {}", e);
    }
    let _ = state
        .events
        .send(TransportEvent::ClientDisconnected {
            session_id,
            reason: Some("deleted".to_string()),
        })
        .await;

    StatusCode::NO_CONTENT.into_response()
}
