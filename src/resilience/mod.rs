//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Ingestion request:
//!     → rate_limit.rs (fixed-window admission against the shared store)
//!
//! Summary request:
//!     → cache.rs (read-through lookup of the aggregated result)
//!     → On miss: compute, with the downstream call wrapped by
//!       circuit_breaker.rs
//! ```
//!
//! # Design Decisions
//! - The three primitives are independent and composable; none reads the
//!   others' state
//! - Admission and cache share state across instances through the store;
//!   breaker state is process-local
//! - Store outages degrade per component (fail-open, treat-as-miss) and
//!   never bubble past this layer

pub mod cache;
pub mod circuit_breaker;
pub mod rate_limit;

pub use cache::ResultCache;
pub use circuit_breaker::{BreakerError, BreakerStatus, CircuitBreaker, CircuitState};
pub use rate_limit::{Decision, RateLimiter};
