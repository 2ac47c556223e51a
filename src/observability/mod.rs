//! Observability subsystem.
//!
//! # Responsibilities
//! - Prometheus-compatible metrics exposition
//! - Named recorders for the events the gateway cares about
//!
//! Log setup lives in `main`; handlers and components emit structured
//! `tracing` events directly.

pub mod metrics;
