//! Read-through result cache.
//!
//! # Responsibilities
//! - Memoize expensive computations in the shared store under a
//!   deterministic key
//! - Compute and store on miss, transparently to the caller
//!
//! # Design Decisions
//! - Overwrite semantics: entries are replaced whole with a fresh TTL,
//!   never mutated in place
//! - No single-flight deduplication: concurrent misses may both compute
//!   and both write; results are idempotent, last writer wins
//! - Caching is a performance optimization, not a correctness dependency:
//!   an unreachable store means a miss, and the store error stops here

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::observability::metrics;
use crate::store::Store;

/// Store-backed cache for computed results.
pub struct ResultCache {
    store: Arc<dyn Store>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(store: Arc<dyn Store>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Cache key for an aggregated summary. Covers every input that
    /// affects the result, so distinct queries never collide.
    pub fn summary_key(subject: &str, dimension: &str) -> String {
        format!("summary:{subject}:{dimension}")
    }

    /// Return the cached value for `key`, or compute, store, and return a
    /// fresh one. Only `compute` errors propagate.
    pub async fn get_or_compute<T, E, F, Fut>(&self, key: &str, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut store_reachable = true;
        match self.store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    tracing::debug!(key = %key, "Cache hit");
                    metrics::record_cache_lookup("hit");
                    return Ok(value);
                }
                Err(error) => {
                    tracing::warn!(key = %key, error = %error, "Undecodable cache entry, recomputing");
                }
            },
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(key = %key, error = %error, "Store unreachable, computing fresh");
                store_reachable = false;
            }
        }

        tracing::debug!(key = %key, "Cache miss");
        metrics::record_cache_lookup("miss");
        let value = compute().await?;

        if store_reachable {
            match serde_json::to_string(&value) {
                Ok(raw) => {
                    if let Err(error) = self.store.set_with_ttl(key, &raw, self.ttl).await {
                        tracing::warn!(key = %key, error = %error, "Cache write failed");
                    }
                }
                Err(error) => {
                    tracing::warn!(key = %key, error = %error, "Cache entry not serializable");
                }
            }
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn cache(store: Arc<MemoryStore>, ttl_secs: u64) -> ResultCache {
        ResultCache::new(store, Duration::from_secs(ttl_secs))
    }

    async fn counted(cache: &ResultCache, key: &str, calls: &AtomicU32) -> u32 {
        let result: Result<u32, Infallible> = cache
            .get_or_compute(key, || async {
                Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
            })
            .await;
        match result {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_computes_once_within_ttl() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache(store, 300);
        let calls = AtomicU32::new(0);

        assert_eq!(counted(&cache, "k", &calls).await, 1);
        assert_eq!(counted(&cache, "k", &calls).await, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recomputes_after_expiry() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache(store, 300);
        let calls = AtomicU32::new(0);

        assert_eq!(counted(&cache, "k", &calls).await, 1);
        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(counted(&cache, "k", &calls).await, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_keys_never_collide() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache(store, 300);
        let calls = AtomicU32::new(0);

        let a = counted(&cache, &ResultCache::summary_key("cpu_usage", "all"), &calls).await;
        let b = counted(&cache, &ResultCache::summary_key("cpu_usage", "daily"), &calls).await;
        assert_ne!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_outage_computes_fresh_without_error() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache(store.clone(), 300);
        let calls = AtomicU32::new(0);

        store.set_failing(true);
        assert_eq!(counted(&cache, "k", &calls).await, 1);
        assert_eq!(counted(&cache, "k", &calls).await, 2);

        // Recovery: the next miss is written back and served from cache.
        store.set_failing(false);
        assert_eq!(counted(&cache, "k", &calls).await, 3);
        assert_eq!(counted(&cache, "k", &calls).await, 3);
    }
}
