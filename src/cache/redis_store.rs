/// Redis-backed TTL store
///
/// Lets several server processes share negative-lookup answers and
/// discovery cooldowns.
use super::TtlStore;
use crate::error::{ServerError, ServerResult};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Redis TTL store
#[derive(Clone)]
pub struct RedisTtlStore {
    connection: ConnectionManager,
    key_prefix: String,
}

impl RedisTtlStore {
    /// Connect to Redis
    pub async fn connect(redis_url: &str, key_prefix: &str) -> ServerResult<Self> {
        info!("Connecting to Redis at {}", redis_url);

        let client = Client::open(redis_url).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            ServerError::Config(format!("Redis client creation failed: {}", e))
        })?;

        let connection = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to connect to Redis: {}", e);
            ServerError::Internal(format!("Redis connection failed: {}", e))
        })?;

        info!("Redis connection established");

        Ok(Self {
            connection,
            key_prefix: key_prefix.to_string(),
        })
    }

    fn build_key(&self, key: &str) -> String {
        prefixed(&self.key_prefix, key)
    }
}

fn prefixed(prefix: &str, key: &str) -> String {
    format!("{}{}", prefix, key)
}

#[async_trait]
impl TtlStore for RedisTtlStore {
    async fn get(&self, key: &str) -> ServerResult<Option<String>> {
        let cache_key = self.build_key(key);
        debug!("Cache GET: {}", cache_key);

        let mut conn = self.connection.clone();
        conn.get(&cache_key).await.map_err(|e| {
            warn!("Redis GET failed for {}: {}", cache_key, e);
            ServerError::Internal(format!("Cache get failed: {}", e))
        })
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> ServerResult<()> {
        let cache_key = self.build_key(key);
        // Redis rejects a zero expiry
        let ttl_secs = ttl.as_secs().max(1);
        debug!("Cache SET: {} (TTL: {}s)", cache_key, ttl_secs);

        let mut conn = self.connection.clone();
        let _: () = conn.set_ex(&cache_key, value, ttl_secs).await.map_err(|e| {
            warn!("Redis SET failed for {}: {}", cache_key, e);
            ServerError::Internal(format!("Cache set failed: {}", e))
        })?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> ServerResult<()> {
        let cache_key = self.build_key(key);
        debug!("Cache DELETE: {}", cache_key);

        let mut conn = self.connection.clone();
        let _: () = conn.del(&cache_key).await.map_err(|e| {
            warn!("Redis DELETE failed for {}: {}", cache_key, e);
            ServerError::Internal(format!("Cache delete failed: {}", e))
        })?;

        Ok(())
    }
}
