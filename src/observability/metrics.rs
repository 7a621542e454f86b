//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by protocol, operation, outcome
//! - `gateway_request_duration_seconds` (histogram): latency by protocol, operation
//!
//! # Design Decisions
//! - Low-overhead metric updates (the `metrics` facade is a no-op until a
//!   recorder is installed)
//! - Outcome labels are the stable failure kinds, never free text

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "gateway_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "gateway_request_duration_seconds";

/// Start the Prometheus scrape endpoint. Needs a running Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Record one finished request.
pub fn record_request(protocol: &'static str, operation: &str, outcome: &'static str, start: Instant) {
    counter!(
        REQUESTS_TOTAL,
        "protocol" => protocol,
        "operation" => operation.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!(
        REQUEST_DURATION_SECONDS,
        "protocol" => protocol,
        "operation" => operation.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}
