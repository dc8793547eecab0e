// ! Key-value cache abstraction
// !
// ! The cache-backed session store persists serialized sessions through this
// ! trait; any store with string values and per-entry TTL fits. An in-memory
// ! implementation is provided for single-process deployments and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::core::error::McpResult;

/// Minimal TTL-capable key-value store contract
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> McpResult<Option<String>>;

    /// Store a value; `ttl = None` means no expiry
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> McpResult<()>;

    /// Remove a key, reporting whether it existed
    async fn delete(&self, key: &str) -> McpResult<bool>;
}

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

/// In-process cache with lazy expiry
#[derive(Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> McpResult<Option<String>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if entry.expires_at.is_none_or(|t| t > Instant::now()) => {
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => {}
            }
        }
        // Expired: drop it under the write lock
        self.entries.write().await.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> McpResult<()> {
        let entry = Entry {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> McpResult<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }
}
