//! Shared counter/cache store.
//!
//! # Responsibilities
//! - Atomic increment-with-expiry for admission counters
//! - TTL-backed get/set for cached results
//! - Remaining-TTL query (drives `Retry-After`)
//! - Connectivity probe for the health endpoint
//!
//! # Design Decisions
//! - Clients are constructed explicitly and injected into each component;
//!   there is no global store handle
//! - The store serializes increments itself, so admission needs no
//!   in-process locking
//! - Store errors never cross the core boundary: admission fails open,
//!   the cache treats them as misses

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Error raised by store operations. Internal only; each caller defines
/// its own degraded behavior instead of surfacing it.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(#[from] ::redis::RedisError),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Counter/cache store contract used by the resilience layer.
#[async_trait]
pub trait Store: Send + Sync {
    /// Atomically increment `key` and return the new value.
    ///
    /// The expiry is set only by the call that created the key; later
    /// increments within the same window never extend it.
    async fn incr_with_expiry(&self, key: &str, expiry: Duration) -> Result<i64, StoreError>;

    /// Remaining time until `key` expires, `None` if the key does not
    /// exist or carries no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;

    /// Fetch the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key` with the given TTL, overwriting any
    /// previous entry.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Connectivity probe.
    async fn ping(&self) -> Result<(), StoreError>;
}
