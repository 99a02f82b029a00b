//! Metrics collection and exposition.
//!
//! # Metrics
//! - `shutdown_phase_duration_seconds` (histogram): time spent per phase
//! - `shutdown_phase_total` (counter): phase outcomes by phase, outcome
//! - `shutdown_module_failures_total` (counter): failures by module
//! - `shutdown_total` (counter): whole-sequence outcomes
//! - `listener_connections_accepted_total` / `listener_connections_closed_total` (counters)
//! - `listener_open_connections` (gauge)
//! - `inflight_requests` (gauge)

use std::net::SocketAddr;
use std::time::Instant;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::error::{Phase, ShutdownError};

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

fn outcome(result: &Result<(), ShutdownError>) -> &'static str {
    match result {
        Ok(()) => "success",
        Err(err) if err.is_timeout() => "timeout",
        Err(_) => "failure",
    }
}

pub fn record_phase(phase: Phase, result: &Result<(), ShutdownError>, started: Instant) {
    metrics::histogram!("shutdown_phase_duration_seconds", "phase" => phase.as_str())
        .record(started.elapsed().as_secs_f64());
    metrics::counter!(
        "shutdown_phase_total",
        "phase" => phase.as_str(),
        "outcome" => outcome(result)
    )
    .increment(1);
}

pub fn record_shutdown(result: &Result<(), ShutdownError>, started: Instant) {
    metrics::histogram!("shutdown_duration_seconds").record(started.elapsed().as_secs_f64());
    metrics::counter!("shutdown_total", "outcome" => outcome(result)).increment(1);
}

pub fn record_module_failure(module: &str) {
    metrics::counter!("shutdown_module_failures_total", "module" => module.to_string()).increment(1);
}

pub fn record_connection_accepted(open: u64) {
    metrics::counter!("listener_connections_accepted_total").increment(1);
    metrics::gauge!("listener_open_connections").set(open as f64);
}

pub fn record_connection_closed(open: u64) {
    metrics::counter!("listener_connections_closed_total").increment(1);
    metrics::gauge!("listener_open_connections").set(open as f64);
}

pub fn set_inflight(count: u64) {
    metrics::gauge!("inflight_requests").set(count as f64);
}
