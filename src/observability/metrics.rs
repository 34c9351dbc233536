//! Metrics collection and exposition.
//!
//! # Metrics
//! - `interceptor_requests_total` (counter): proxied requests by method, status
//! - `interceptor_request_duration_seconds` (histogram): time to upstream headers
//! - `interceptor_upstream_failures_total` (counter): transport errors by method
//! - `interceptor_captures_total` (counter): record writes by outcome
//!
//! Without an installed recorder every call is a no-op.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "interceptor_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "interceptor_request_duration_seconds",
        "method" => method.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_failure(method: &str) {
    metrics::counter!(
        "interceptor_upstream_failures_total",
        "method" => method.to_string()
    )
    .increment(1);
}

pub fn record_capture(written: bool) {
    let outcome = if written { "written" } else { "failed" };
    metrics::counter!("interceptor_captures_total", "outcome" => outcome).increment(1);
}
