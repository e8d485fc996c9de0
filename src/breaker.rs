//! # Circuit breaker: fail fast while a dependency is unhealthy.
//!
//! [`CircuitBreaker`] wraps fallible async operations and stops invoking
//! them after repeated failures, so a struggling handler is given time to
//! recover instead of being hammered.
//!
//! ## States
//! ```text
//!             failure_threshold reached
//!   CLOSED ─────────────────────────────► OPEN
//!     ▲                                    │ recovery_time elapsed
//!     │ probe succeeds                     ▼
//!     └───────────────────────────── HALF_OPEN ──probe fails──► OPEN
//! ```
//!
//! ## Rules
//! - **Closed**: every call runs; each failure increments the counter, any
//!   success resets it to zero.
//! - **Open**: calls are rejected with [`BreakerError::Open`] without
//!   invoking the operation. A rejection is not a failure and never
//!   increments the counter.
//! - **Half-open**: once `recovery_time` has elapsed, exactly one probe call
//!   is admitted. Concurrent calls are rejected until the probe resolves.
//!   Probe success closes the circuit and resets the counter; probe failure
//!   reopens it for a full `recovery_time`.
//! - A probe whose future is dropped mid-flight counts as a failed probe:
//!   the circuit reopens rather than staying stuck half-open.
//! - `failure_threshold = 0` opens on the first failure.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// # Breaker call failure.
///
/// Either the circuit refused the call, or the operation itself ran and
/// failed. Only the latter feeds the failure counter.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BreakerError<E> {
    /// The circuit is open; the operation was not invoked.
    #[error("circuit open, retry in {retry_in:?}")]
    Open {
        /// Time until the next probe is admitted. Zero while a probe is
        /// already in flight.
        retry_in: Duration,
    },
    /// The operation ran and returned this error.
    #[error("{0}")]
    Operation(E),
}

impl<E> BreakerError<E> {
    /// Stable machine-readable label.
    ///
    /// ```
    /// use taskgate::BreakerError;
    ///
    /// let err: BreakerError<&str> = BreakerError::Operation("boom");
    /// assert_eq!(err.as_label(), "operation_failed");
    /// ```
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Open { .. } => "circuit_open",
            Self::Operation(_) => "operation_failed",
        }
    }
}

/// Circuit state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// Calls flow through normally.
    Closed,
    /// Calls are rejected until `recovery_time` elapses.
    Open,
    /// One probe call is in flight; everything else is rejected.
    HalfOpen,
}

impl BreakerState {
    /// Stable machine-readable label.
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Point-in-time view of the breaker.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct BreakerSnapshot {
    /// Current circuit state.
    pub state: BreakerState,
    /// Consecutive failures recorded since the last success.
    pub failures: u32,
    /// Time until the next probe is admitted. `Some` only while open.
    pub retry_in: Option<Duration>,
}

struct BreakerInner {
    state: BreakerState,
    failures: u32,
    next_attempt: Option<Instant>,
}

enum Admission {
    Allow { probe: bool },
    Reject { retry_in: Duration },
}

/// Reopens the circuit if a probe future is dropped before resolving.
struct ProbeGuard<'a> {
    breaker: Option<&'a CircuitBreaker>,
}

impl ProbeGuard<'_> {
    fn complete(&mut self) {
        self.breaker = None;
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if let Some(breaker) = self.breaker {
            debug!("probe dropped mid-flight, counting as failure");
            breaker.record_failure();
        }
    }
}

/// Failure-rate circuit breaker around async operations.
///
/// Shared by reference between concurrent callers; all transitions happen
/// behind one lock, so exactly one caller can win the probe slot.
pub struct CircuitBreaker {
    failure_threshold: u32,
    recovery_time: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    ///
    /// The circuit opens after `failure_threshold` consecutive failures and
    /// admits a probe `recovery_time` after opening.
    #[must_use]
    pub fn new(failure_threshold: u32, recovery_time: Duration) -> Self {
        Self {
            failure_threshold,
            recovery_time,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failures: 0,
                next_attempt: None,
            }),
        }
    }

    /// Runs `op` under the circuit's policy.
    ///
    /// When the circuit rejects the call, `op` is never invoked and the
    /// error is [`BreakerError::Open`]. When `op` runs, its own result is
    /// passed through (wrapped in [`BreakerError::Operation`] on failure)
    /// and recorded as a success or failure.
    pub async fn execute<F, Fut, T, E>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let probe = match self.admit() {
            Admission::Reject { retry_in } => return Err(BreakerError::Open { retry_in }),
            Admission::Allow { probe } => probe,
        };

        let mut guard = ProbeGuard {
            breaker: probe.then_some(self),
        };
        let out = op().await;
        guard.complete();

        match out {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(BreakerError::Operation(err))
            }
        }
    }

    /// Current circuit state.
    #[must_use]
    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    /// Point-in-time view of state, failure count, and retry delay.
    #[must_use]
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        let retry_in = match (inner.state, inner.next_attempt) {
            (BreakerState::Open, Some(at)) => Some(at.saturating_duration_since(Instant::now())),
            _ => None,
        };
        BreakerSnapshot {
            state: inner.state,
            failures: inner.failures,
            retry_in,
        }
    }

    fn admit(&self) -> Admission {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => Admission::Allow { probe: false },
            BreakerState::HalfOpen => Admission::Reject {
                retry_in: Duration::ZERO,
            },
            BreakerState::Open => {
                let now = Instant::now();
                match inner.next_attempt {
                    Some(at) if now < at => Admission::Reject {
                        retry_in: at.saturating_duration_since(now),
                    },
                    _ => {
                        inner.state = BreakerState::HalfOpen;
                        drop(inner);
                        debug!("circuit half-open, admitting probe");
                        Admission::Allow { probe: true }
                    }
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.lock();
        let was = inner.state;
        inner.state = BreakerState::Closed;
        inner.failures = 0;
        inner.next_attempt = None;
        drop(inner);
        if was != BreakerState::Closed {
            info!("circuit closed after successful probe");
        }
    }

    fn record_failure(&self) {
        let mut inner = self.lock();
        inner.failures = inner.failures.saturating_add(1);
        let opens = inner.state == BreakerState::HalfOpen
            || inner.failures >= self.failure_threshold;
        if opens {
            inner.state = BreakerState::Open;
            inner.next_attempt = Some(Instant::now() + self.recovery_time);
            let failures = inner.failures;
            drop(inner);
            warn!(
                failures,
                recovery_ms = self.recovery_time.as_millis() as u64,
                "circuit opened"
            );
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
