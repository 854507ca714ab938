use crate::{context::AppContext, metrics};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info};

pub mod tasks;

/// Job scheduler for background tasks
///
/// No job takes part in a resolution; these only keep shared state tidy and
/// report health.
pub struct JobScheduler {
    context: Arc<AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::ttl_sweep_job(Arc::clone(&self)));
        tokio::spawn(Self::health_check_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Drop expired TTL store entries (runs every minute)
    async fn ttl_sweep_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(60));

        loop {
            interval.tick().await;
            let start = Instant::now();

            match tasks::sweep_ttl_store(&scheduler.context).await {
                Ok(count) => {
                    metrics::record_background_job(
                        "ttl_sweep",
                        "success",
                        start.elapsed().as_secs_f64(),
                    );
                    if count > 0 {
                        debug!("Swept {} expired TTL store entries", count);
                    }
                }
                Err(e) => {
                    metrics::record_background_job(
                        "ttl_sweep",
                        "failure",
                        start.elapsed().as_secs_f64(),
                    );
                    error!("Failed to sweep TTL store: {}", e);
                }
            }
        }
    }

    /// Health check job (runs every 5 minutes)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300));

        loop {
            interval.tick().await;
            let start = Instant::now();

            match tasks::health_check(&scheduler.context).await {
                Ok(_) => metrics::record_background_job(
                    "health_check",
                    "success",
                    start.elapsed().as_secs_f64(),
                ),
                Err(e) => {
                    metrics::record_background_job(
                        "health_check",
                        "failure",
                        start.elapsed().as_secs_f64(),
                    );
                    error!("Health check failed: {}", e);
                }
            }
        }
    }
}
