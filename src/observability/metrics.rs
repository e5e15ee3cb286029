//! Metrics collection and exposition.
//!
//! # Metrics
//! - `verify_ssh_probes_total` (counter): ping attempts by outcome
//! - `verify_hosts_reachable` / `verify_hosts_unreachable` (gauge): last tallies
//! - `verify_lb_probes_total` (counter): HTTP probes by outcome
//! - `verify_lb_backends_observed` (gauge): distinct backends in the current cycle
//!
//! Recording is a no-op until an exporter is installed.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`. Must run inside a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_ssh_probe(outcome: &'static str, reachable: usize, unreachable: usize) {
    metrics::counter!("verify_ssh_probes_total", "outcome" => outcome).increment(1);
    metrics::gauge!("verify_hosts_reachable").set(reachable as f64);
    metrics::gauge!("verify_hosts_unreachable").set(unreachable as f64);
}

pub fn record_lb_probe(outcome: &'static str) {
    metrics::counter!("verify_lb_probes_total", "outcome" => outcome).increment(1);
}

pub fn record_lb_backends(observed: usize) {
    metrics::gauge!("verify_lb_backends_observed").set(observed as f64);
}
