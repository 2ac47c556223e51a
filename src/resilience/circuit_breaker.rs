//! Circuit breaker for downstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: downstream judged unhealthy, calls fail fast
//! - Half-Open: testing whether the downstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures reach failure_threshold
//! Open → Half-Open: reset timeout elapsed; the observing call is the trial
//! Half-Open → Closed: trial call succeeds
//! Half-Open → Open: trial call fails or is abandoned (timeout clock
//! restarts)
//! ```
//!
//! # Design Decisions
//! - Per-call-site breaker with process-local state, guarded by one mutex
//! - Consecutive-failure counting, not a rate: insensitive to traffic
//!   volume, sensitive to runs of failures
//! - Single trial in Half-Open; concurrent callers are rejected rather
//!   than queued, so unrelated requests never block on the trial
//! - The lock is never held across the guarded call itself
//! - An abandoned call (dropped future, from a request timeout or client
//!   disconnect) must still resolve breaker state: a drop guard treats an
//!   unfinished trial as a trial failure

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::observability::metrics;

/// Breaker state machine positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a guarded call.
///
/// `Open` means the call was never attempted; `Inner` re-raises the
/// wrapped operation's failure unchanged.
#[derive(Debug, Error)]
pub enum BreakerError<E>
where
    E: std::error::Error,
{
    #[error("circuit open, call not attempted")]
    Open,

    #[error(transparent)]
    Inner(E),
}

/// Read-only snapshot for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStatus {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
}

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

#[derive(Clone, Copy)]
enum Attempt {
    Normal,
    Trial,
}

/// Reopens the circuit if a trial future is dropped before it resolves.
///
/// Disarmed once the guarded call completes; from then on the call path
/// itself records the outcome.
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.breaker.inner.lock().expect("breaker lock poisoned");
        // A manual reset may have landed mid-trial; only the trial still
        // on the books counts as a failure.
        if inner.state == CircuitState::HalfOpen && inner.trial_in_flight {
            inner.trial_in_flight = false;
            tracing::warn!("Trial call abandoned, circuit reopened");
            CircuitBreaker::open(&mut inner);
        }
    }
}

/// Failure-isolating wrapper around calls to an unreliable downstream.
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            reset_timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    /// Execute `op` under breaker protection.
    pub async fn call<T, E, F, Fut>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        E: std::error::Error,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempt = {
            let mut inner = self.inner.lock().expect("breaker lock poisoned");
            match inner.state {
                CircuitState::Closed => Attempt::Normal,
                CircuitState::Open => {
                    let timed_out = inner
                        .opened_at
                        .is_none_or(|at| at.elapsed() >= self.reset_timeout);
                    if !timed_out {
                        tracing::warn!("Circuit open, failing fast");
                        metrics::record_breaker_short_circuit();
                        return Err(BreakerError::Open);
                    }
                    // The call that observes timeout expiry becomes the
                    // first Half-Open trial.
                    inner.state = CircuitState::HalfOpen;
                    inner.consecutive_successes = 0;
                    inner.trial_in_flight = true;
                    tracing::info!("Circuit half-open, attempting trial call");
                    metrics::record_breaker_transition("half_open");
                    Attempt::Trial
                }
                CircuitState::HalfOpen => {
                    if inner.trial_in_flight {
                        tracing::warn!("Trial already in flight, failing fast");
                        metrics::record_breaker_short_circuit();
                        return Err(BreakerError::Open);
                    }
                    inner.trial_in_flight = true;
                    Attempt::Trial
                }
            }
        };

        let mut guard = match attempt {
            Attempt::Trial => Some(TrialGuard {
                breaker: self,
                armed: true,
            }),
            Attempt::Normal => None,
        };

        let result = op().await;

        if let Some(guard) = guard.as_mut() {
            guard.armed = false;
        }

        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match attempt {
            Attempt::Normal => match &result {
                Ok(_) => {
                    if inner.state == CircuitState::Closed {
                        inner.consecutive_failures = 0;
                        inner.consecutive_successes =
                            inner.consecutive_successes.saturating_add(1);
                    }
                }
                Err(error) => {
                    // Failures only count while Closed; a call that
                    // outlived a state change does not double-penalize.
                    if inner.state == CircuitState::Closed {
                        inner.consecutive_failures += 1;
                        inner.consecutive_successes = 0;
                        tracing::error!(
                            error = %error,
                            failures = inner.consecutive_failures,
                            "Guarded call failed"
                        );
                        if inner.consecutive_failures >= self.failure_threshold {
                            Self::open(&mut inner);
                        }
                    }
                }
            },
            Attempt::Trial => {
                inner.trial_in_flight = false;
                match &result {
                    Ok(_) => {
                        inner.state = CircuitState::Closed;
                        inner.consecutive_failures = 0;
                        inner.consecutive_successes =
                            inner.consecutive_successes.saturating_add(1);
                        inner.opened_at = None;
                        tracing::info!("Trial call succeeded, circuit closed");
                        metrics::record_breaker_transition("closed");
                    }
                    Err(error) => {
                        tracing::error!(error = %error, "Trial call failed, circuit reopened");
                        Self::open(&mut inner);
                    }
                }
            }
        }

        result.map_err(BreakerError::Inner)
    }

    /// Current state and counters. Does not mutate state and does not
    /// count as a trial call.
    pub fn status(&self) -> BreakerStatus {
        let inner = self.inner.lock().expect("breaker lock poisoned");
        BreakerStatus {
            state: inner.state,
            failure_count: inner.consecutive_failures,
            success_count: inner.consecutive_successes,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("breaker lock poisoned").state
    }

    /// Force the breaker back to Closed, clearing all counters.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.consecutive_successes = 0;
        inner.opened_at = None;
        inner.trial_in_flight = false;
        tracing::info!("Circuit manually reset to closed");
    }

    fn open(inner: &mut BreakerInner) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        inner.consecutive_successes = 0;
        tracing::warn!(
            failures = inner.consecutive_failures,
            "Circuit opened"
        );
        metrics::record_breaker_transition("open");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;

    fn breaker(threshold: u32, reset_secs: u64) -> CircuitBreaker {
        CircuitBreaker::new(threshold, Duration::from_secs(reset_secs))
    }

    async fn fail(breaker: &CircuitBreaker) -> Result<(), BreakerError<Boom>> {
        breaker.call(|| async { Err::<(), _>(Boom) }).await
    }

    async fn succeed(breaker: &CircuitBreaker) -> Result<(), BreakerError<Boom>> {
        breaker.call(|| async { Ok::<_, Boom>(()) }).await
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold_failures() {
        let breaker = breaker(5, 30);

        for _ in 0..4 {
            assert!(matches!(fail(&breaker).await, Err(BreakerError::Inner(_))));
            assert_eq!(breaker.state(), CircuitState::Closed);
        }

        assert!(matches!(fail(&breaker).await, Err(BreakerError::Inner(_))));
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failure_count() {
        let breaker = breaker(3, 30);

        fail(&breaker).await.unwrap_err();
        fail(&breaker).await.unwrap_err();
        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.status().failure_count, 0);

        fail(&breaker).await.unwrap_err();
        fail(&breaker).await.unwrap_err();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_rejects_without_invoking_operation() {
        let breaker = breaker(1, 30);
        let calls = Arc::new(AtomicU32::new(0));

        fail(&breaker).await.unwrap_err();
        assert_eq!(breaker.state(), CircuitState::Open);

        for _ in 0..3 {
            let calls = calls.clone();
            let result: Result<(), BreakerError<Boom>> = breaker
                .call(|| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .await;
            assert!(matches!(result, Err(BreakerError::Open)));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trial_success_closes_circuit() {
        let breaker = breaker(1, 30);

        fail(&breaker).await.unwrap_err();
        tokio::time::advance(Duration::from_secs(31)).await;

        succeed(&breaker).await.unwrap();
        let status = breaker.status();
        assert_eq!(status.state, CircuitState::Closed);
        assert_eq!(status.failure_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trial_failure_reopens_and_restarts_clock() {
        let breaker = breaker(1, 30);

        fail(&breaker).await.unwrap_err();
        tokio::time::advance(Duration::from_secs(31)).await;

        // Failed trial reopens the circuit.
        assert!(matches!(fail(&breaker).await, Err(BreakerError::Inner(_))));
        assert_eq!(breaker.state(), CircuitState::Open);

        // The clock restarted: 20s later the circuit is still rejecting.
        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(matches!(succeed(&breaker).await, Err(BreakerError::Open)));

        tokio::time::advance(Duration::from_secs(11)).await;
        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_caller_rejected_during_trial() {
        let breaker = Arc::new(breaker(1, 30));

        fail(&breaker).await.unwrap_err();
        tokio::time::advance(Duration::from_secs(31)).await;

        let (release, gate) = tokio::sync::oneshot::channel::<()>();
        let trial_breaker = breaker.clone();
        let trial = tokio::spawn(async move {
            trial_breaker
                .call(|| async move {
                    gate.await.expect("gate dropped");
                    Ok::<_, Boom>(())
                })
                .await
        });

        // Let the trial claim its slot before the second caller arrives.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(matches!(succeed(&breaker).await, Err(BreakerError::Open)));

        release.send(()).unwrap();
        trial.await.unwrap().unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_query_does_not_mutate() {
        let breaker = breaker(1, 30);

        fail(&breaker).await.unwrap_err();
        tokio::time::advance(Duration::from_secs(31)).await;

        // Reading status past the timeout must not start the trial.
        let status = breaker.status();
        assert_eq!(status.state, CircuitState::Open);
        assert_eq!(breaker.status().state, CircuitState::Open);

        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_trial_counts_as_trial_failure() {
        let breaker = Arc::new(breaker(1, 30));

        fail(&breaker).await.unwrap_err();
        tokio::time::advance(Duration::from_secs(31)).await;

        // Trial that never resolves, as when a request timeout or client
        // disconnect drops the handler future mid-call.
        let trial_breaker = breaker.clone();
        let trial = tokio::spawn(async move {
            trial_breaker
                .call(|| async move {
                    std::future::pending::<()>().await;
                    Ok::<_, Boom>(())
                })
                .await
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        trial.abort();
        let _ = trial.await;

        // The dropped trial reopened the circuit with a fresh clock; the
        // breaker is not latched and recovers normally.
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(matches!(succeed(&breaker).await, Err(BreakerError::Open)));

        tokio::time::advance(Duration::from_secs(31)).await;
        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_count_saturates() {
        let breaker = breaker(5, 30);
        breaker.inner.lock().unwrap().consecutive_successes = u32::MAX;

        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.status().success_count, u32::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_reset() {
        let breaker = breaker(1, 30);

        fail(&breaker).await.unwrap_err();
        assert_eq!(breaker.state(), CircuitState::Open);

        breaker.reset();
        let status = breaker.status();
        assert_eq!(status.state, CircuitState::Closed);
        assert_eq!(status.failure_count, 0);
        succeed(&breaker).await.unwrap();
    }
}
