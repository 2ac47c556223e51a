//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, probability in 0..=1)
//! - Check addresses parse before anything binds them
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: GatewayConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every semantic constraint, collecting all violations.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut check = |ok: bool, field: &'static str, message: &str| {
        if !ok {
            errors.push(ValidationError {
                field,
                message: message.to_string(),
            });
        }
    };

    check(
        config.listener.bind_address.parse::<SocketAddr>().is_ok(),
        "listener.bind_address",
        "must be a valid socket address",
    );
    check(
        config.listener.request_timeout_secs > 0,
        "listener.request_timeout_secs",
        "must be greater than zero",
    );
    check(
        config.cache.ttl_secs > 0,
        "cache.ttl_secs",
        "must be greater than zero",
    );
    check(
        config.rate_limit.limit > 0,
        "rate_limit.limit",
        "must be greater than zero",
    );
    check(
        config.rate_limit.window_secs > 0,
        "rate_limit.window_secs",
        "must be greater than zero",
    );
    check(
        config.circuit_breaker.failure_threshold > 0,
        "circuit_breaker.failure_threshold",
        "must be greater than zero",
    );
    check(
        config.circuit_breaker.reset_timeout_secs > 0,
        "circuit_breaker.reset_timeout_secs",
        "must be greater than zero",
    );
    check(
        (0.0..=1.0).contains(&config.downstream.failure_rate),
        "downstream.failure_rate",
        "must be within 0.0..=1.0",
    );
    check(
        config.downstream.latency_min_ms <= config.downstream.latency_max_ms,
        "downstream.latency_min_ms",
        "must not exceed latency_max_ms",
    );
    if config.observability.metrics_enabled {
        check(
            config
                .observability
                .metrics_address
                .parse::<SocketAddr>()
                .is_ok(),
            "observability.metrics_address",
            "must be a valid socket address",
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_all_violations_reported_together() {
        let mut config = GatewayConfig::default();
        config.rate_limit.limit = 0;
        config.downstream.failure_rate = 1.5;
        config.circuit_breaker.failure_threshold = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert!(fields.contains(&"rate_limit.limit"));
        assert!(fields.contains(&"downstream.failure_rate"));
        assert!(fields.contains(&"circuit_breaker.failure_threshold"));
    }

    #[test]
    fn test_rejects_inverted_latency_bounds() {
        let mut config = GatewayConfig::default();
        config.downstream.latency_min_ms = 200;
        config.downstream.latency_max_ms = 100;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = GatewayConfig::default();
        config.observability.metrics_address = "not-an-address".to_string();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
