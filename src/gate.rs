//! # Admission gate: bounded concurrency with priority queueing.
//!
//! [`AdmissionGate`] decides, per submission, whether an operation runs now,
//! waits, or is rejected. At most `max_concurrent` operations execute at a
//! time; at most `queue_limit` wait. Anything beyond both bounds fails fast
//! with [`AdmitError::QueueFull`]: backpressure instead of unbounded
//! buffering.
//!
//! ## Architecture
//! ```text
//! submit(priority, op)
//!        │
//!        ▼
//!  running < max? ──yes──► run op now (slot held for its duration)
//!        │no
//!        ▼
//!  waiting < queue_limit? ──no──► Err(QueueFull)
//!        │yes
//!        ▼
//!  park in priority heap ──(slot freed)──► highest priority wakes,
//!                                          FIFO within equal priority
//! ```
//!
//! ## Rules
//! - **Slot transfer**: a finishing operation hands its slot directly to the
//!   best waiter; a submission arriving at that instant cannot barge past
//!   the queue.
//! - **Strict priority**: a higher-priority waiter always wakes first, no
//!   matter how long lower-priority waiters have been parked.
//! - **Stable FIFO**: equal priorities wake in arrival order (monotonic
//!   tickets).
//! - **Cancel safety**: the grant travels through the waiter's channel as an
//!   owned permit; if the waiting future was dropped, the undelivered permit
//!   releases itself and the slot moves to the next waiter.
//! - `max_concurrent = 0` means unlimited: every submission runs at once and
//!   the queue is never used.
//!
//! ## Example
//! ```rust
//! use taskgate::AdmissionGate;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let gate = AdmissionGate::new(2, 16);
//!     let out = gate.submit(5, async { 40 + 2 }).await;
//!     assert_eq!(out.unwrap(), 42);
//! }
//! ```

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::oneshot;

/// # Admission failure.
///
/// `QueueFull` is the only error the gate originates: both the running set
/// and the waiting queue are at capacity, so the submission is rejected
/// without blocking.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitError {
    /// The waiting queue is at capacity.
    #[error("admission queue full (limit {limit})")]
    QueueFull {
        /// The configured queue limit that was hit.
        limit: usize,
    },
}

/// Point-in-time view of gate occupancy.
///
/// Produced by [`AdmissionGate::snapshot`]; counters may be stale by the time
/// the caller reads them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct GateSnapshot {
    /// Operations currently holding a slot.
    pub running: usize,
    /// Operations parked in the waiting queue.
    pub waiting: usize,
    /// Configured concurrency cap (`0` = unlimited).
    pub max_concurrent: usize,
    /// Configured waiting-queue bound.
    pub queue_limit: usize,
}

/// A parked submission: granted by dequeue order, not arrival order.
struct Waiter {
    priority: i64,
    ticket: u64,
    grant: oneshot::Sender<SlotPermit>,
}

impl PartialEq for Waiter {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Waiter {}

impl PartialOrd for Waiter {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Waiter {
    /// Max-heap order: higher priority first; equal priority pops the
    /// older ticket (stable FIFO).
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.ticket.cmp(&self.ticket))
    }
}

struct GateState {
    running: usize,
    waiters: BinaryHeap<Waiter>,
    next_ticket: u64,
}

struct GateInner {
    max_concurrent: usize,
    queue_limit: usize,
    state: Mutex<GateState>,
}

impl GateInner {
    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owned permission to run one operation.
///
/// Dropping the permit returns the slot: it transfers to the best waiter if
/// any, otherwise the running count decrements. Created only by the gate.
struct SlotPermit {
    inner: Arc<GateInner>,
    armed: bool,
}

impl SlotPermit {
    fn new(inner: Arc<GateInner>) -> Self {
        Self { inner, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        if self.armed {
            self.armed = false;
            release_slot(&self.inner);
        }
    }
}

/// Returns one slot to the gate: hand it to the best live waiter, or
/// decrement the running count when the queue is empty.
fn release_slot(inner: &Arc<GateInner>) {
    let mut state = inner.lock();
    let mut permit = SlotPermit::new(Arc::clone(inner));
    loop {
        match state.waiters.pop() {
            Some(waiter) => match waiter.grant.send(permit) {
                Ok(()) => return,
                // Waiter future was dropped; reclaim and try the next one.
                Err(bounced) => permit = bounced,
            },
            None => {
                state.running -= 1;
                // The slot went back to the counter; the undelivered permit
                // must not release it a second time.
                permit.disarm();
                return;
            }
        }
    }
}

/// Concurrency admission controller.
///
/// Cheap to clone (internally `Arc`-backed); all clones share one slot pool
/// and one waiting queue.
///
/// ### Properties
/// - At most `max_concurrent` admitted operations run at once.
/// - At most `queue_limit` submissions wait; the next one is rejected.
/// - Admission and release transitions run one at a time behind one lock,
///   so counts can never drift.
#[derive(Clone)]
pub struct AdmissionGate {
    inner: Arc<GateInner>,
}

impl AdmissionGate {
    /// Creates a gate with the given concurrency cap and queue bound.
    ///
    /// `max_concurrent = 0` disables the cap entirely (`queue_limit` is then
    /// irrelevant: nothing ever waits).
    #[must_use]
    pub fn new(max_concurrent: usize, queue_limit: usize) -> Self {
        Self {
            inner: Arc::new(GateInner {
                max_concurrent,
                queue_limit,
                state: Mutex::new(GateState {
                    running: 0,
                    waiters: BinaryHeap::new(),
                    next_ticket: 0,
                }),
            }),
        }
    }

    /// Runs `op` under a concurrency slot.
    ///
    /// Resolves `op` in the caller's future once a slot is available:
    /// immediately when under the cap, after waiting when queued. Returns
    /// [`AdmitError::QueueFull`] without polling `op` when both bounds are
    /// hit.
    ///
    /// The slot is held for exactly the lifetime of `op`, and is returned
    /// even if `op` panics or the returned future is dropped mid-flight.
    pub async fn submit<F>(&self, priority: i64, op: F) -> Result<F::Output, AdmitError>
    where
        F: Future,
    {
        let permit = self.acquire(priority).await?;
        let out = op.await;
        drop(permit);
        Ok(out)
    }

    /// Current occupancy counters. Point-in-time, no side effects.
    #[must_use]
    pub fn snapshot(&self) -> GateSnapshot {
        let state = self.inner.lock();
        GateSnapshot {
            running: state.running,
            waiting: state.waiters.len(),
            max_concurrent: self.inner.max_concurrent,
            queue_limit: self.inner.queue_limit,
        }
    }

    async fn acquire(&self, priority: i64) -> Result<SlotPermit, AdmitError> {
        let rx = {
            let mut state = self.inner.lock();
            if self.inner.max_concurrent == 0 || state.running < self.inner.max_concurrent {
                state.running += 1;
                return Ok(SlotPermit::new(Arc::clone(&self.inner)));
            }
            if state.waiters.len() >= self.inner.queue_limit {
                return Err(AdmitError::QueueFull {
                    limit: self.inner.queue_limit,
                });
            }
            let (tx, rx) = oneshot::channel();
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            state.waiters.push(Waiter {
                priority,
                ticket,
                grant: tx,
            });
            rx
        };

        match rx.await {
            Ok(permit) => Ok(permit),
            // The sender half lives in the gate state until a slot is handed
            // over and is never dropped unsent while this future is polled.
            Err(_) => Err(AdmitError::QueueFull {
                limit: self.inner.queue_limit,
            }),
        }
    }
}
