//! In-process store.
//!
//! Backs tests and storeless development runs. Uses the tokio clock so
//! paused-time tests can drive window and TTL expiry deterministically.
//! Counts are not shared across instances, unlike the Redis store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::{Store, StoreError};

struct Entry {
    value: String,
    deadline: Option<Instant>,
}

impl Entry {
    fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// DashMap-backed store with TTL semantics matching the Redis client.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with `StoreError::Unavailable`.
    ///
    /// Lets tests exercise the degraded paths (fail-open admission,
    /// treat-as-miss caching) without a real outage.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("simulated store outage".into()))
        } else {
            Ok(())
        }
    }

    fn drop_if_expired(&self, key: &str) {
        self.entries.remove_if(key, |_, entry| entry.expired());
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn incr_with_expiry(&self, key: &str, expiry: Duration) -> Result<i64, StoreError> {
        self.check_available()?;
        self.drop_if_expired(key);

        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: "0".to_string(),
            // Expiry set once, when this call creates the key.
            deadline: Some(Instant::now() + expiry),
        });
        let count = entry.value.parse::<i64>().unwrap_or(0) + 1;
        entry.value = count.to_string();
        Ok(count)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        self.check_available()?;
        self.drop_if_expired(key);

        let remaining = self.entries.get(key).and_then(|entry| {
            entry
                .deadline
                .map(|d| d.saturating_duration_since(Instant::now()))
        });
        Ok(remaining)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check_available()?;
        self.drop_if_expired(key);

        Ok(self.entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.check_available()?;
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                deadline: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }
}
