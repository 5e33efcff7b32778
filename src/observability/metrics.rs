//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): completed requests by verb, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_in_flight_requests` (gauge): admission slots currently held
//! - `gateway_rejected_requests_total` (counter): admission rejections
//! - `gateway_upstream_healthy` (gauge): 1=healthy, 0=unhealthy per endpoint
//!
//! # Design Decisions
//! - `metrics` facade with a Prometheus HTTP exporter
//! - Updates are cheap enough for the hot path (atomic operations)

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on the given address.
pub fn init_metrics(addr: SocketAddr) {
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        tracing::error!(address = %addr, error = %e, "failed to install metrics exporter");
        return;
    }

    describe_counter!("gateway_requests_total", "Completed requests");
    describe_histogram!(
        "gateway_request_duration_seconds",
        "Request latency in seconds"
    );
    describe_gauge!("gateway_in_flight_requests", "Admission slots held");
    describe_counter!("gateway_rejected_requests_total", "Admission rejections");
    describe_gauge!("gateway_upstream_healthy", "Upstream endpoint health");

    tracing::info!(address = %addr, "metrics exporter started");
}

/// Record a completed request.
pub fn record_request(verb: &str, status: u16, elapsed: Duration) {
    counter!(
        "gateway_requests_total",
        "verb" => verb.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds").record(elapsed.as_secs_f64());
}

/// Record the current admission depth.
pub fn record_in_flight(depth: usize) {
    gauge!("gateway_in_flight_requests").set(depth as f64);
}

/// Record an admission rejection.
pub fn record_rejected() {
    counter!("gateway_rejected_requests_total").increment(1);
}

/// Record upstream endpoint health.
pub fn record_upstream_health(endpoint: &str, healthy: bool) {
    gauge!("gateway_upstream_healthy", "endpoint" => endpoint.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}
