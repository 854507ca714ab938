/// Federated identity server
///
/// Serves this instance's discovery document and user lookups, and resolves
/// local and remote handles for clients.

use federated_identity::{jobs, server, AppContext, ServerConfig, ServerResult};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ServerResult<()> {
    // Load configuration first so RUST_LOG from .env applies to logging
    let config = ServerConfig::from_env()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.logging.level)
                .unwrap_or_else(|_| "federated_identity=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "federated-identity v{} starting for {}",
        config.service.version,
        config.service.domain
    );

    // Create application context
    let ctx = Arc::new(AppContext::new(config).await?);

    // Start background jobs
    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    // Start server
    server::serve((*ctx).clone()).await?;

    Ok(())
}
