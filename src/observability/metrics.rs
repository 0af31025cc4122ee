//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gatehouse_auth_resolutions_total` (counter): by `mode`, `outcome`
//! - `gatehouse_rate_limit_decisions_total` (counter): by `limiter`, `decision`
//! - `gatehouse_rate_limit_reclaimed_total` (counter): entries removed by sweeps
//! - `gatehouse_rate_limit_entries` (gauge): entries left after the last sweep
//! - `gatehouse_gate_rejections_total` (counter): by `guard`
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_auth_resolution(mode: &'static str, outcome: &'static str) {
    counter!("gatehouse_auth_resolutions_total", "mode" => mode, "outcome" => outcome).increment(1);
}

pub fn record_rate_limit_decision(limiter: &str, decision: &'static str) {
    counter!(
        "gatehouse_rate_limit_decisions_total",
        "limiter" => limiter.to_string(),
        "decision" => decision
    )
    .increment(1);
}

pub fn record_reclaimed(removed: usize, remaining: usize) {
    counter!("gatehouse_rate_limit_reclaimed_total").increment(removed as u64);
    gauge!("gatehouse_rate_limit_entries").set(remaining as f64);
}

pub fn record_gate_rejection(guard: &'static str) {
    counter!("gatehouse_gate_rejections_total", "guard" => guard).increment(1);
}
