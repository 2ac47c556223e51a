//! Unreliable downstream simulator.
//!
//! # Responsibilities
//! - Expose one async operation that succeeds or fails with a
//!   configurable probability
//! - Simulate network latency within a configured range
//! - Allow runtime adjustment of the failure rate, for resilience testing
//!   without restarting the process
//!
//! # Design Decisions
//! - Tuning lives behind an `ArcSwap` with an explicit, validated setter;
//!   no ambient global state
//! - No retry logic here: retries, if desired, belong to the caller,
//!   layered on top of the circuit breaker

use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use thiserror::Error;

use crate::observability::metrics;

/// Simulated downstream failure. Opaque to the breaker, which records it
/// and re-raises it unchanged.
#[derive(Debug, Error)]
#[error("external service unavailable for {kind}: {reason}")]
pub struct DownstreamError {
    pub kind: String,
    pub reason: String,
}

#[derive(Debug, Error)]
#[error("failure rate must be within 0.0..=1.0, got {0}")]
pub struct InvalidRate(pub f64);

/// Payload returned by a successful downstream call.
#[derive(Debug, Clone, Serialize)]
pub struct DownstreamSample {
    pub source: &'static str,
    #[serde(rename = "type")]
    pub kind: String,
    pub sample_value: u32,
    pub fetched_at: DateTime<Utc>,
}

/// Runtime-tunable behavior of the simulator.
#[derive(Debug, Clone)]
pub struct DownstreamTuning {
    /// Probability in 0.0..=1.0 that a call fails.
    pub failure_rate: f64,
    /// Simulated latency bounds in milliseconds.
    pub latency_min_ms: u64,
    pub latency_max_ms: u64,
}

/// Simulated external service with tunable failure behavior.
pub struct ExternalService {
    tuning: ArcSwap<DownstreamTuning>,
}

impl ExternalService {
    pub fn new(tuning: DownstreamTuning) -> Self {
        Self {
            tuning: ArcSwap::from_pointee(tuning),
        }
    }

    /// Adjust the simulated failure rate at runtime.
    pub fn set_failure_rate(&self, rate: f64) -> Result<(), InvalidRate> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(InvalidRate(rate));
        }
        self.tuning.rcu(|tuning| DownstreamTuning {
            failure_rate: rate,
            ..(**tuning).clone()
        });
        tracing::info!(rate = rate, "Downstream failure rate updated");
        Ok(())
    }

    pub fn failure_rate(&self) -> f64 {
        self.tuning.load().failure_rate
    }

    /// Attempt a unit of downstream work for `kind`.
    pub async fn fetch(&self, kind: &str) -> Result<DownstreamSample, DownstreamError> {
        let tuning = self.tuning.load_full();

        // Roll everything up front; the RNG handle is not held across await.
        let (delay_ms, roll, sample_value) = {
            let mut rng = rand::thread_rng();
            let delay_ms = if tuning.latency_max_ms > tuning.latency_min_ms {
                rng.gen_range(tuning.latency_min_ms..tuning.latency_max_ms)
            } else {
                tuning.latency_min_ms
            };
            (delay_ms, rng.gen::<f64>(), rng.gen_range(50..200))
        };

        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        if roll < tuning.failure_rate {
            tracing::error!(kind = %kind, "Simulated downstream failure");
            metrics::record_downstream("failure");
            return Err(DownstreamError {
                kind: kind.to_string(),
                reason: "high load".to_string(),
            });
        }

        metrics::record_downstream("success");
        tracing::debug!(kind = %kind, "Downstream returned data");
        Ok(DownstreamSample {
            source: "external_service",
            kind: kind.to_string(),
            sample_value,
            fetched_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(failure_rate: f64) -> ExternalService {
        ExternalService::new(DownstreamTuning {
            failure_rate,
            latency_min_ms: 0,
            latency_max_ms: 0,
        })
    }

    #[tokio::test]
    async fn test_always_fails_at_rate_one() {
        let service = service(1.0);
        for _ in 0..20 {
            assert!(service.fetch("cpu_usage").await.is_err());
        }
    }

    #[tokio::test]
    async fn test_never_fails_at_rate_zero() {
        let service = service(0.0);
        for _ in 0..20 {
            let sample = service.fetch("cpu_usage").await.unwrap();
            assert_eq!(sample.kind, "cpu_usage");
            assert!((50..200).contains(&sample.sample_value));
        }
    }

    #[tokio::test]
    async fn test_failure_rate_adjustable_at_runtime() {
        let service = service(1.0);
        assert!(service.fetch("x").await.is_err());

        service.set_failure_rate(0.0).unwrap();
        assert_eq!(service.failure_rate(), 0.0);
        assert!(service.fetch("x").await.is_ok());
    }

    #[test]
    fn test_setter_rejects_out_of_range_rates() {
        let service = service(0.1);
        assert!(service.set_failure_rate(-0.1).is_err());
        assert!(service.set_failure_rate(1.5).is_err());
        assert_eq!(service.failure_rate(), 0.1);
    }
}
