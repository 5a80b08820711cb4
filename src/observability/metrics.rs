//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_rejections_total` (counter): pipeline rejections by stage, reason
//! - `gateway_rate_limited_total` (counter): 429s by policy
//! - `gateway_migrations_applied_total` (counter): migrations applied
//!
//! Recording is a no-op until [`init_metrics`] installs the Prometheus
//! recorder, so library code records unconditionally.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
///
/// Must run inside a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, started: Instant) {
    let status = status.to_string();
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.clone()
    )
    .increment(1);
    histogram!(
        "gateway_request_duration_seconds",
        "method" => method.to_string(),
        "status" => status
    )
    .record(started.elapsed().as_secs_f64());
}

pub fn record_rejection(stage: &'static str, reason: &'static str) {
    counter!("gateway_rejections_total", "stage" => stage, "reason" => reason).increment(1);
}

pub fn record_rate_limited(policy: &str) {
    counter!("gateway_rate_limited_total", "policy" => policy.to_string()).increment(1);
}

pub fn record_migration_applied(id: &str) {
    counter!("gateway_migrations_applied_total", "id" => id.to_string()).increment(1);
}
