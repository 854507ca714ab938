/// Background task implementations
use crate::{context::AppContext, error::ServerResult};

/// Purge expired entries from the TTL store
///
/// Backends with native expiry report zero.
pub async fn sweep_ttl_store(ctx: &AppContext) -> ServerResult<usize> {
    ctx.ttl_store.purge_expired().await
}

/// Health check - verify the database answers and the local instance exists
pub async fn health_check(ctx: &AppContext) -> ServerResult<()> {
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;
    ctx.instances.get_local().await?;

    Ok(())
}
