/// Health and metrics endpoints
///
/// `/health/live` answers as long as the process serves requests.
/// `/health/ready` requires the database and the local instance row.
/// `/health/detailed` reports every component plus the current federation posture.
use crate::{context::AppContext, db::FederationMode, jobs, metrics};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Component status, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Result of probing one component
#[derive(Debug, Clone, Serialize)]
pub struct ComponentReport {
    pub name: &'static str,
    pub status: ComponentStatus,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Federation posture of this instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederationReport {
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<FederationMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peers: Option<usize>,
}

/// Body of `/health/detailed`
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: ComponentStatus,
    pub version: &'static str,
    pub components: Vec<ComponentReport>,
    pub federation: FederationReport,
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(liveness))
        .route("/health/live", get(liveness))
        .route("/health/ready", get(readiness))
        .route("/health/detailed", get(detailed))
        .route("/metrics", get(metrics_endpoint))
}

async fn liveness() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn readiness(State(ctx): State<AppContext>) -> Result<Json<serde_json::Value>, StatusCode> {
    if let Err(e) = jobs::tasks::health_check(&ctx).await {
        tracing::warn!(error = %e, "Readiness check failed");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(Json(serde_json::json!({
        "status": "ready",
        "domain": ctx.domain()
    })))
}

async fn detailed(State(ctx): State<AppContext>) -> (StatusCode, Json<HealthReport>) {
    let components = vec![probe_database(&ctx).await, probe_ttl_store(&ctx).await];
    let status = overall_status(&components);

    let federation = FederationReport {
        domain: ctx.domain().to_string(),
        mode: ctx
            .instances
            .federation_mode(&ctx.local_instance.id)
            .await
            .ok(),
        peers: ctx
            .peers
            .list(&ctx.local_instance.id)
            .await
            .ok()
            .map(|peers| peers.len()),
    };

    // A degraded TTL store only loses negative caching; keep serving
    let code = if status == ComponentStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        code,
        Json(HealthReport {
            status,
            version: env!("CARGO_PKG_VERSION"),
            components,
            federation,
        }),
    )
}

/// Prometheus scrape endpoint
async fn metrics_endpoint() -> String {
    metrics::render_metrics()
}

async fn probe_database(ctx: &AppContext) -> ComponentReport {
    let start = Instant::now();
    let result = jobs::tasks::health_check(ctx).await;

    report("database", ComponentStatus::Unhealthy, start, result.err().map(|e| e.to_string()))
}

async fn probe_ttl_store(ctx: &AppContext) -> ComponentReport {
    let start = Instant::now();
    let key = "health:probe";

    let result = match ctx
        .ttl_store
        .set_with_ttl(key, "1", Duration::from_secs(5))
        .await
    {
        Ok(()) => match ctx.ttl_store.get(key).await {
            Ok(_) => ctx.ttl_store.delete(key).await,
            Err(e) => Err(e),
        },
        Err(e) => Err(e),
    };

    report("ttl_store", ComponentStatus::Degraded, start, result.err().map(|e| e.to_string()))
}

fn report(
    name: &'static str,
    on_failure: ComponentStatus,
    start: Instant,
    error: Option<String>,
) -> ComponentReport {
    ComponentReport {
        name,
        status: if error.is_some() { on_failure } else { ComponentStatus::Healthy },
        latency_ms: start.elapsed().as_millis() as u64,
        error,
    }
}

/// Worst status across all components
fn overall_status(components: &[ComponentReport]) -> ComponentStatus {
    components
        .iter()
        .map(|c| c.status)
        .max()
        .unwrap_or(ComponentStatus::Healthy)
}
