//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_metrics_ingested_total` (counter): accepted metric records
//! - `gateway_rate_limited_total` (counter): denied admissions
//! - `gateway_admission_fail_open_total` (counter): admissions granted
//!   because the store was unreachable
//! - `gateway_cache_lookups_total{outcome}` (counter): hit/miss
//! - `gateway_breaker_transitions_total{state}` (counter): state changes
//! - `gateway_breaker_short_circuits_total` (counter): calls rejected
//!   while open
//! - `gateway_downstream_calls_total{outcome}` (counter): success/failure

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on its own listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(error) => tracing::error!(error = %error, "Failed to install metrics exporter"),
    }
}

pub fn record_ingested(kind: &str) {
    metrics::counter!("gateway_metrics_ingested_total", "type" => kind.to_string()).increment(1);
}

pub fn record_rate_limited() {
    metrics::counter!("gateway_rate_limited_total").increment(1);
}

pub fn record_admission_fail_open() {
    metrics::counter!("gateway_admission_fail_open_total").increment(1);
}

pub fn record_cache_lookup(outcome: &'static str) {
    metrics::counter!("gateway_cache_lookups_total", "outcome" => outcome).increment(1);
}

pub fn record_breaker_transition(state: &'static str) {
    metrics::counter!("gateway_breaker_transitions_total", "state" => state).increment(1);
}

pub fn record_breaker_short_circuit() {
    metrics::counter!("gateway_breaker_short_circuits_total").increment(1);
}

pub fn record_downstream(outcome: &'static str) {
    metrics::counter!("gateway_downstream_calls_total", "outcome" => outcome).increment(1);
}
