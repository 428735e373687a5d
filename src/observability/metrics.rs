//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by strategy and final status
//! - `proxy_request_duration_seconds` (histogram): response handling latency by strategy
//! - `proxy_render_failures_total` (counter): failed requests by error kind
//! - `proxy_buffered_response_bytes` (histogram): size of buffered upstream bodies
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; nothing is recorded until an exporter is installed
//! - The Prometheus exporter serves its own scrape endpoint

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "proxy_requests_total";
pub const REQUEST_DURATION: &str = "proxy_request_duration_seconds";
pub const FAILURES_TOTAL: &str = "proxy_render_failures_total";
pub const BUFFERED_BYTES: &str = "proxy_buffered_response_bytes";

/// Install the Prometheus exporter with a scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!(REQUESTS_TOTAL, "Proxied requests by strategy and status");
    describe_histogram!(REQUEST_DURATION, Unit::Seconds, "Upstream response handling latency");
    describe_counter!(FAILURES_TOTAL, "Requests answered by the error responder, by error kind");
    describe_histogram!(BUFFERED_BYTES, Unit::Bytes, "Buffered upstream body size");

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(strategy: &'static str, status: u16, start: Instant) {
    counter!(REQUESTS_TOTAL, "strategy" => strategy, "status" => status.to_string()).increment(1);
    histogram!(REQUEST_DURATION, "strategy" => strategy).record(start.elapsed().as_secs_f64());
}

pub fn record_failure(kind: &'static str) {
    counter!(FAILURES_TOTAL, "kind" => kind).increment(1);
}

pub fn record_buffered_bytes(bytes: usize) {
    histogram!(BUFFERED_BYTES).record(bytes as f64);
}
