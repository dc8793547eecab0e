// ! Cache-backed session store
// !
// ! Persists each session as a JSON value under a prefixed key in any
// ! `Cache` implementation; entry TTL is delegated to the cache. A local id
// ! index supports the cross-session operations (`reap`,
// ! `queue_message_for_all`) without a cache scan.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::{Session, SessionStore, DEFAULT_SESSION_TTL_SECS};
use crate::core::cache::Cache;
use crate::core::error::{McpError, McpResult};

const KEY_PREFIX: &str = "mcp_session:";

pub struct CacheSessionStore {
    cache: Arc<dyn Cache>,
    ttl: Duration,
    ids: RwLock<HashSet<String>>,
}

impl CacheSessionStore {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self::with_ttl(cache, Duration::from_secs(DEFAULT_SESSION_TTL_SECS))
    }

    pub fn with_ttl(cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self {
            cache,
            ttl,
            ids: RwLock::new(HashSet::new()),
        }
    }

    fn key(id: &str) -> String {
        format!("{KEY_PREFIX}{id}")
    }

    async fn load(&self, id: &str) -> McpResult<Option<Session>> {
        match self.cache.get(&Self::key(id)).await? {
            Some(raw) => {
                let session = serde_json::from_str(&raw)
                    .map_err(|e| McpError::Cache(format!("corrupt session '{id}': {e}")))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn store(&self, session: &Session) -> McpResult<()> {
        let raw = serde_json::to_string(session)?;
        self.cache
            .set(&Self::key(&session.id), raw, Some(self.ttl))
            .await?;
        self.ids.write().await.insert(session.id.clone());
        Ok(())
    }
}

#[async_trait]
impl SessionStore for CacheSessionStore {
    async fn create(&self, id: &str) -> McpResult<Session> {
        let session = Session::new(id);
        self.store(&session).await?;
        Ok(session)
    }

    async fn get(&self, id: &str) -> McpResult<Option<Session>> {
        let session = self.load(id).await?;
        if session.is_none() {
            // The cache may have expired the entry behind our index.
            self.ids.write().await.remove(id);
        }
        Ok(session)
    }

    async fn put(&self, session: Session) -> McpResult<()> {
        self.store(&session).await
    }

    async fn delete(&self, id: &str) -> McpResult<bool> {
        self.ids.write().await.remove(id);
        self.cache.delete(&Self::key(id)).await
    }

    async fn touch(&self, id: &str) -> McpResult<()> {
        if let Some(mut session) = self.load(id).await? {
            session.last_activity = chrono::Utc::now().timestamp();
            self.store(&session).await?;
        }
        Ok(())
    }

    async fn reap(&self) -> McpResult<Vec<String>> {
        let now = chrono::Utc::now().timestamp();
        let ids: Vec<String> = self.ids.read().await.iter().cloned().collect();
        let mut removed = Vec::new();
        for id in ids {
            match self.load(&id).await? {
                Some(session) if session.expired(self.ttl.as_secs(), now) => {
                    self.delete(&id).await?;
                    removed.push(id);
                }
                Some(_) => {}
                None => {
                    // Expired by the cache itself; drop from the index.
                    self.ids.write().await.remove(&id);
                    removed.push(id);
                }
            }
        }
        Ok(removed)
    }

    async fn queue_message(&self, id: &str, frame: String) -> McpResult<()> {
        if let Some(mut session) = self.load(id).await? {
            session.queue(frame);
            self.store(&session).await?;
        }
        Ok(())
    }

    async fn drain(&self, id: &str) -> McpResult<Vec<String>> {
        match self.load(id).await? {
            Some(mut session) => {
                let frames = session.drain();
                if !frames.is_empty() {
                    self.store(&session).await?;
                }
                Ok(frames)
            }
            None => Ok(Vec::new()),
        }
    }

    async fn queue_message_for_all(&self, frame: String) -> McpResult<()> {
        let ids: Vec<String> = self.ids.read().await.iter().cloned().collect();
        for id in ids {
            if let Some(mut session) = self.load(&id).await? {
                if session.initialized {
                    session.queue(frame.clone());
                    self.store(&session).await?;
                }
            }
        }
        Ok(())
    }

    async fn all_ids(&self) -> McpResult<Vec<String>> {
        Ok(self.ids.read().await.iter().cloned().collect())
    }
}
