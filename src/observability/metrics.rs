//! Metrics collection and exposition.
//!
//! # Metrics
//! - `streamgate_requests_total` (counter): requests by endpoint, status
//! - `streamgate_request_duration_seconds` (histogram): latency
//! - `streamgate_denials_total` (counter): gate denials by kind
//! - `streamgate_security_events_total` (counter): emitted events by kind
//! - `streamgate_security_events_dropped_total` (counter): backpressure drops
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - The exporter runs on its own listener, never the request path

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on its own listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one handled request.
pub fn record_request(endpoint: &str, status: u16, start: Instant) {
    counter!(
        "streamgate_requests_total",
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "streamgate_request_duration_seconds",
        "endpoint" => endpoint.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a gate denial.
pub fn record_denial(kind: &str) {
    counter!("streamgate_denials_total", "kind" => kind.to_string()).increment(1);
}

/// Record a security event reaching the sink.
pub fn record_security_event(kind: &str) {
    counter!("streamgate_security_events_total", "kind" => kind.to_string()).increment(1);
}

/// Record a security event dropped under backpressure.
pub fn record_event_dropped() {
    counter!("streamgate_security_events_dropped_total").increment(1);
}
