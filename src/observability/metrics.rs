//! Metrics collection and exposition.
//!
//! # Metrics
//! - `edge_requests_total` (counter): forwarded requests by method, status, route
//! - `edge_request_duration_seconds` (histogram): forward latency
//! - `edge_credential_refresh_total` (counter): refresh outcomes
//!
//! Recording is a no-op until [`init_metrics`] installs the Prometheus recorder.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the global recorder and serve `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("route", route.to_string()),
    ];
    metrics::counter!("edge_requests_total", &labels).increment(1);
    metrics::histogram!("edge_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

/// `outcome` is one of `success`, `failure`, `initial_failure`, `rejected`, `missing_cookie`.
pub fn record_credential_refresh(outcome: &'static str) {
    metrics::counter!("edge_credential_refresh_total", "outcome" => outcome).increment(1);
}
