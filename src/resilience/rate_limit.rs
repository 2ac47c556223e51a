//! Fixed-window admission control.
//!
//! # Responsibilities
//! - Decide whether a unit of work may proceed under the rate budget
//! - Maintain per-client counters in the shared store (one window, one key)
//! - Report how long a denied client must wait
//!
//! # Design Decisions
//! - Fixed-window counting: the counter resets at window expiry rather
//!   than sliding; a burst straddling two windows can admit up to 2×limit
//! - The store's atomic increment is the sole correctness mechanism; no
//!   in-process locking
//! - Fail open on store errors: an infrastructure outage must not block
//!   all traffic

use std::sync::Arc;
use std::time::Duration;

use crate::observability::metrics;
use crate::store::Store;

/// Admission outcome. `retry_after` is populated on denial only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub retry_after: Option<Duration>,
}

impl Decision {
    fn allowed() -> Self {
        Self {
            allowed: true,
            retry_after: None,
        }
    }

    fn denied(retry_after: Duration) -> Self {
        Self {
            allowed: false,
            retry_after: Some(retry_after),
        }
    }
}

/// Request-rate admission controller backed by the shared store.
pub struct RateLimiter {
    store: Arc<dyn Store>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn Store>, limit: u32, window: Duration) -> Self {
        Self {
            store,
            limit,
            window,
        }
    }

    /// Counter key for a client. The window itself lives in the key's TTL.
    pub fn counter_key(client_key: &str) -> String {
        format!("rate:{client_key}")
    }

    /// Check whether a request from `client_key` may proceed.
    pub async fn admit(&self, client_key: &str) -> Decision {
        let key = Self::counter_key(client_key);

        let count = match self.store.incr_with_expiry(&key, self.window).await {
            Ok(count) => count,
            Err(error) => {
                tracing::warn!(
                    client = %client_key,
                    error = %error,
                    "Store unreachable, admitting request"
                );
                metrics::record_admission_fail_open();
                return Decision::allowed();
            }
        };

        if count <= i64::from(self.limit) {
            return Decision::allowed();
        }

        let retry_after = self.retry_after(&key).await;
        tracing::warn!(
            client = %client_key,
            count = count,
            limit = self.limit,
            retry_after_secs = retry_after.as_secs(),
            "Rate limit exceeded"
        );
        metrics::record_rate_limited();
        Decision::denied(retry_after)
    }

    /// Remaining wait for a denied client, clamped to [1s, window].
    async fn retry_after(&self, key: &str) -> Duration {
        match self.store.ttl(key).await {
            Ok(Some(ttl)) => ttl.clamp(Duration::from_secs(1), self.window),
            // Counter expired between increment and TTL query.
            Ok(None) => Duration::from_secs(1),
            Err(_) => self.window,
        }
    }
}
