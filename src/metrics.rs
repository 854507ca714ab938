/// Metrics and telemetry
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - handle resolutions by path and outcome
/// - outbound federation requests and their latency
/// - stub cache hit/miss rates
/// - HTTP requests served
/// - background job execution

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    // ========== HTTP Metrics ==========

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // ========== Resolution Metrics ==========

    /// Handle resolutions by path (local, cache, remote, stale_cache) and outcome
    pub static ref HANDLE_RESOLUTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "handle_resolutions_total",
        "Total number of handle resolutions",
        &["path", "outcome"]
    )
    .unwrap();

    /// Outbound federation requests by kind (discovery, lookup) and result
    pub static ref FEDERATION_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "federation_requests_total",
        "Total number of outbound federation requests",
        &["kind", "result"]
    )
    .unwrap();

    /// Outbound federation request duration in seconds
    pub static ref FEDERATION_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "federation_request_duration_seconds",
        "Outbound federation request latencies in seconds",
        &["kind"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // ========== Cache Metrics ==========

    /// Cache hits by cache type
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_hits_total",
        "Total number of cache hits",
        &["cache_type"]
    )
    .unwrap();

    /// Cache misses by cache type
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_misses_total",
        "Total number of cache misses",
        &["cache_type"]
    )
    .unwrap();

    // ========== Background Job Metrics ==========

    /// Background job executions by job type and status
    pub static ref BACKGROUND_JOBS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "background_jobs_total",
        "Total number of background job executions",
        &["job_type", "status"]
    )
    .unwrap();

    /// Background job duration in seconds
    pub static ref BACKGROUND_JOB_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "background_job_duration_seconds",
        "Background job execution time in seconds",
        &["job_type"],
        vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}

/// Record a finished handle resolution
pub fn record_resolution(path: &str, outcome: &str) {
    HANDLE_RESOLUTIONS_TOTAL
        .with_label_values(&[path, outcome])
        .inc();
}

/// Record an outbound federation request
pub fn record_federation_request(kind: &str, result: &str, duration: f64) {
    FEDERATION_REQUESTS_TOTAL
        .with_label_values(&[kind, result])
        .inc();
    FEDERATION_REQUEST_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(duration);
}

/// Record a cache access
pub fn record_cache_access(cache_type: &str, hit: bool) {
    if hit {
        CACHE_HITS_TOTAL.with_label_values(&[cache_type]).inc();
    } else {
        CACHE_MISSES_TOTAL.with_label_values(&[cache_type]).inc();
    }
}

/// Record a background job execution
pub fn record_background_job(job_type: &str, status: &str, duration: f64) {
    BACKGROUND_JOBS_TOTAL
        .with_label_values(&[job_type, status])
        .inc();
    BACKGROUND_JOB_DURATION_SECONDS
        .with_label_values(&[job_type])
        .observe(duration);
}
