/// In-process TTL store
use super::TtlStore;
use crate::error::ServerResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// TTL store backed by a lock-guarded map
#[derive(Default)]
pub struct MemoryTtlStore {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl MemoryTtlStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until purged
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl TtlStore for MemoryTtlStore {
    async fn get(&self, key: &str) -> ServerResult<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(value, _)| value.clone()))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> ServerResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> ServerResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> ServerResult<usize> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        Ok(before - entries.len())
    }
}
