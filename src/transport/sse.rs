// ! SSE event persistence for stream resumption
// !
// ! The HTTP transport's GET streams stamp every outbound frame with a
// ! monotonically increasing event id. When an event store is configured,
// ! frames are persisted per stream so a client reconnecting with
// ! `Last-Event-ID` can replay what it missed before attaching live.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

use crate::core::error::McpResult;

/// Persistence contract for per-stream event history.
///
/// Ids start at 1 and increase monotonically within a stream; appends are
/// serialized per stream.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persist a frame, returning its assigned event id
    async fn append(&self, stream_id: &str, frame: String) -> McpResult<u64>;

    /// Events with ids strictly greater than `after`, in id order
    async fn replay_after(&self, stream_id: &str, after: u64) -> McpResult<Vec<(u64, String)>>;

    /// Drop a stream's history (stream closed for good)
    async fn remove_stream(&self, stream_id: &str) -> McpResult<()>;
}

#[derive(Default)]
struct StreamHistory {
    next_id: u64,
    events: VecDeque<(u64, String)>,
}

/// Bounded in-memory event store; oldest events fall off per stream
pub struct InMemoryEventStore {
    streams: Mutex<HashMap<String, StreamHistory>>,
    max_events_per_stream: usize,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(max_events_per_stream: usize) -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
            max_events_per_stream,
        }
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, stream_id: &str, frame: String) -> McpResult<u64> {
        let mut streams = self.streams.lock().await;
        let history = streams.entry(stream_id.to_string()).or_default();
        history.next_id += 1;
        let id = history.next_id;
        history.events.push_back((id, frame));
        while history.events.len() > self.max_events_per_stream {
            history.events.pop_front();
        }
        Ok(id)
    }

    async fn replay_after(&self, stream_id: &str, after: u64) -> McpResult<Vec<(u64, String)>> {
        let streams = self.streams.lock().await;
        Ok(streams
            .get(stream_id)
            .map(|history| {
                history
                    .events
                    .iter()
                    .filter(|(id, _)| *id > after)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn remove_stream(&self, stream_id: &str) -> McpResult<()> {
        self.streams.lock().await.remove(stream_id);
        Ok(())
    }
}
