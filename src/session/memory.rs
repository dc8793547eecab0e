// ! In-memory session store
// !
// ! Single-process back-end: one RwLock'd map, no persistence. TTL is
// ! enforced by `reap`, which the server schedules periodically.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{Session, SessionStore, DEFAULT_SESSION_TTL_SECS};
use crate::core::error::McpResult;

pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl_secs: u64,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_SESSION_TTL_SECS)
    }

    pub fn with_ttl(ttl_secs: u64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl_secs,
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, id: &str) -> McpResult<Session> {
        let session = Session::new(id);
        self.sessions
            .write()
            .await
            .insert(id.to_string(), session.clone());
        Ok(session)
    }

    async fn get(&self, id: &str) -> McpResult<Option<Session>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn put(&self, session: Session) -> McpResult<()> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session);
        Ok(())
    }

    async fn delete(&self, id: &str) -> McpResult<bool> {
        Ok(self.sessions.write().await.remove(id).is_some())
    }

    async fn touch(&self, id: &str) -> McpResult<()> {
        if let Some(session) = self.sessions.write().await.get_mut(id) {
            session.last_activity = chrono::Utc::now().timestamp();
        }
        Ok(())
    }

    async fn reap(&self) -> McpResult<Vec<String>> {
        let now = chrono::Utc::now().timestamp();
        let mut sessions = self.sessions.write().await;
        let expired: Vec<String> = sessions
            .values()
            .filter(|s| s.expired(self.ttl_secs, now))
            .map(|s| s.id.clone())
            .collect();
        for id in &expired {
            sessions.remove(id);
            tracing::debug!(session = %id, "session expired, reaped");
        }
        Ok(expired)
    }

    async fn queue_message(&self, id: &str, frame: String) -> McpResult<()> {
        if let Some(session) = self.sessions.write().await.get_mut(id) {
            session.queue(frame);
        }
        Ok(())
    }

    async fn drain(&self, id: &str) -> McpResult<Vec<String>> {
        Ok(self
            .sessions
            .write()
            .await
            .get_mut(id)
            .map(Session::drain)
            .unwrap_or_default())
    }

    async fn queue_message_for_all(&self, frame: String) -> McpResult<()> {
        let mut sessions = self.sessions.write().await;
        for session in sessions.values_mut().filter(|s| s.initialized) {
            session.queue(frame.clone());
        }
        Ok(())
    }

    async fn all_ids(&self) -> McpResult<Vec<String>> {
        Ok(self.sessions.read().await.keys().cloned().collect())
    }
}
