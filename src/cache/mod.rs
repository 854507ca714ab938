/// Expiring key/value storage shared by resolution requests
///
/// Short-lived federation state (negative lookup answers, discovery
/// cooldowns) lives behind the [`TtlStore`] trait so it can be backed by
/// process memory or by Redis when several server processes share state.

pub mod memory;
pub mod redis_store;

pub use memory::MemoryTtlStore;
pub use redis_store::RedisTtlStore;

use crate::config::{CacheBackend, CacheConfig};
use crate::error::ServerResult;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Get / set-with-TTL storage
#[async_trait]
pub trait TtlStore: Send + Sync {
    /// Get a live value
    async fn get(&self, key: &str) -> ServerResult<Option<String>>;

    /// Set a value that expires after `ttl`
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> ServerResult<()>;

    /// Delete a value
    async fn delete(&self, key: &str) -> ServerResult<()>;

    /// Drop expired entries, returning how many were removed
    ///
    /// Backends that expire entries themselves keep the default.
    async fn purge_expired(&self) -> ServerResult<usize> {
        Ok(0)
    }
}

/// Build the configured TTL store
pub async fn build_store(config: &CacheConfig) -> ServerResult<Arc<dyn TtlStore>> {
    match config.backend {
        CacheBackend::Memory => {
            info!("Using in-process TTL store");
            Ok(Arc::new(MemoryTtlStore::new()))
        }
        CacheBackend::Redis => {
            let store = RedisTtlStore::connect(&config.redis_url, &config.key_prefix).await?;
            Ok(Arc::new(store))
        }
    }
}

/// Cache key namespaces
pub mod categories {
    pub const LOOKUP_MISS: &str = "lookup:miss:";
    pub const DISCOVERY_FAILURE: &str = "discovery:fail:";
}
