//! Session state and stores
//!
//! Per-client server state keyed by session id: handshake progress,
//! negotiated protocol version, resource subscriptions, the outbound message
//! queue, and an attribute bag. Sessions live in a pluggable store with
//! TTL-based reaping.

pub mod cache;
pub mod memory;

pub use cache::CacheSessionStore;
pub use memory::InMemorySessionStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::core::error::McpResult;
use crate::protocol::types::{Implementation, LoggingLevel};

/// Session id used by the stdio transport's single implicit client
pub const STDIO_SESSION_ID: &str = "stdio";

/// Default session time-to-live
pub const DEFAULT_SESSION_TTL_SECS: u64 = 3600;

/// Default interval between reaper sweeps
pub const DEFAULT_REAP_INTERVAL_SECS: u64 = 60;

/// Per-client session record. Serializable as JSON so the cache-backed
/// store can persist it verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: String,
    pub initialized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_info: Option<Implementation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub subscriptions: HashSet<String>,
    #[serde(default)]
    pub outbound: VecDeque<String>,
    /// Unix seconds of the last request or touch
    pub last_activity: i64,
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LoggingLevel>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            initialized: false,
            client_info: None,
            protocol_version: None,
            subscriptions: HashSet::new(),
            outbound: VecDeque::new(),
            last_activity: chrono::Utc::now().timestamp(),
            attributes: HashMap::new(),
            log_level: None,
        }
    }

    /// Append a raw frame to the outbound queue
    pub fn queue(&mut self, frame: String) {
        self.outbound.push_back(frame);
    }

    /// Take and clear the queued frames
    pub fn drain(&mut self) -> Vec<String> {
        self.outbound.drain(..).collect()
    }

    pub fn subscribe(&mut self, uri: impl Into<String>) {
        self.subscriptions.insert(uri.into());
    }

    pub fn unsubscribe(&mut self, uri: &str) -> bool {
        self.subscriptions.remove(uri)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    /// Dot-path attribute lookup over the plain map
    pub fn get_attribute(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.attributes.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Whether the session has been idle past the given TTL
    pub fn expired(&self, ttl_secs: u64, now: i64) -> bool {
        self.last_activity + (ttl_secs as i64) < now
    }
}

/// Storage contract for sessions.
///
/// `queue_message_for_all` is best-effort broadcast: frames land in each
/// initialized session's outbound queue and ride out on that session's next
/// writer tick; queues of deleted sessions are dropped with them.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create and store a fresh session, replacing any same-id record
    async fn create(&self, id: &str) -> McpResult<Session>;

    async fn get(&self, id: &str) -> McpResult<Option<Session>>;

    async fn put(&self, session: Session) -> McpResult<()>;

    /// Remove a session, reporting whether it existed
    async fn delete(&self, id: &str) -> McpResult<bool>;

    /// Update `last_activity`, resetting the TTL clock
    async fn touch(&self, id: &str) -> McpResult<()>;

    /// Remove sessions idle past the TTL; returns the removed ids
    async fn reap(&self) -> McpResult<Vec<String>>;

    /// Append a frame to one session's outbound queue
    async fn queue_message(&self, id: &str, frame: String) -> McpResult<()>;

    /// Atomically take and clear a session's outbound queue
    async fn drain(&self, id: &str) -> McpResult<Vec<String>>;

    /// Queue a frame for every initialized session
    async fn queue_message_for_all(&self, frame: String) -> McpResult<()>;

    /// Ids of all stored sessions
    async fn all_ids(&self) -> McpResult<Vec<String>>;
}
