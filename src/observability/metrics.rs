//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define proxy metrics (exchanges, latency, upstream errors, connections)
//! - Expose a Prometheus-compatible scrape endpoint when enabled
//!
//! # Metrics
//! - `https_proxy_exchanges_total` (counter): exchanges by method, status
//! - `https_proxy_exchange_duration_seconds` (histogram): request read to response written
//! - `https_proxy_upstream_errors_total` (counter): upstream failures by kind
//! - `https_proxy_handshake_failures_total` (counter): failed TLS handshakes
//! - `https_proxy_active_connections` (gauge): current connection count
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; with no exporter
//!   installed every call is a no-op
//! - Labels are bounded: method, status code and error kind only

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const EXCHANGES_TOTAL: &str = "https_proxy_exchanges_total";
pub const EXCHANGE_DURATION_SECONDS: &str = "https_proxy_exchange_duration_seconds";
pub const UPSTREAM_ERRORS_TOTAL: &str = "https_proxy_upstream_errors_total";
pub const HANDSHAKE_FAILURES_TOTAL: &str = "https_proxy_handshake_failures_total";
pub const ACTIVE_CONNECTIONS: &str = "https_proxy_active_connections";

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe();
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

fn describe() {
    describe_counter!(EXCHANGES_TOTAL, Unit::Count, "Requests answered by the proxy.");
    describe_histogram!(
        EXCHANGE_DURATION_SECONDS,
        Unit::Seconds,
        "Time from request read to response written."
    );
    describe_counter!(
        UPSTREAM_ERRORS_TOTAL,
        Unit::Count,
        "Upstream exchanges that ended in a 502."
    );
    describe_counter!(HANDSHAKE_FAILURES_TOTAL, Unit::Count, "Failed TLS handshakes.");
    describe_gauge!(ACTIVE_CONNECTIONS, Unit::Count, "Open downstream connections.");
}

/// Record one answered request.
pub fn record_exchange(method: &str, status: u16, elapsed: Duration) {
    counter!(
        EXCHANGES_TOTAL,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(EXCHANGE_DURATION_SECONDS).record(elapsed.as_secs_f64());
}

pub fn record_upstream_error(kind: &'static str) {
    counter!(UPSTREAM_ERRORS_TOTAL, "kind" => kind).increment(1);
}

pub fn record_handshake_failure() {
    counter!(HANDSHAKE_FAILURES_TOTAL).increment(1);
}

pub fn connection_opened() {
    gauge!(ACTIVE_CONNECTIONS).increment(1.0);
}

pub fn connection_closed() {
    gauge!(ACTIVE_CONNECTIONS).decrement(1.0);
}
