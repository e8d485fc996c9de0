//! # Lifecycle events emitted by the task processor.
//!
//! The [`EventKind`] enum classifies event types across two categories:
//! - **Task lifecycle**: queueing, execution start, completion, failure
//! - **Monitoring**: periodic metrics reports
//!
//! The [`Event`] struct carries additional metadata such as timestamps, the
//! task id, payloads, failure reasons, and latency.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! delivered out of order.
//!
//! ## Example
//! ```rust
//! use taskgate::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskFailed)
//!     .with_task("task-1f3a-0-9e2b41c7")
//!     .with_reason("execution failed: boom");
//!
//! assert_eq!(ev.kind, EventKind::TaskFailed);
//! assert_eq!(ev.task.as_deref(), Some("task-1f3a-0-9e2b41c7"));
//! assert_eq!(ev.reason.as_deref(), Some("execution failed: boom"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde_json::Value;

use crate::metrics::SystemMetrics;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of processor events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Task lifecycle events ===
    /// Task entered the pipeline: its record is persisted and it is about to
    /// be admitted or queued.
    ///
    /// Sets:
    /// - `task`: task id
    /// - `priority`: submission priority
    /// - `data`: opaque task payload
    /// - `recovered`: true when this is a startup replay
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    TaskQueued,

    /// Task was granted a concurrency slot and its execution begins.
    ///
    /// Sets:
    /// - `task`: task id
    /// - `priority`: submission priority
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    TaskStarted,

    /// Task executed successfully; its record has been removed.
    ///
    /// Sets:
    /// - `task`: task id
    /// - `result`: handler result payload
    /// - `latency_ms`: execution duration (ms)
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    TaskCompleted,

    /// Task was rejected or its execution failed.
    ///
    /// Sets:
    /// - `task`: task id
    /// - `reason`: rejection or failure message
    /// - `latency_ms`: execution duration (ms), only when the task ran
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    TaskFailed,

    // === Monitoring events ===
    /// Periodic system health snapshot.
    ///
    /// Sets:
    /// - `metrics`: full [`SystemMetrics`] snapshot
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    MetricsReport,
}

/// Processor event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Task id, if applicable.
    pub task: Option<Arc<str>>,
    /// Submission priority (higher runs first).
    pub priority: Option<i64>,
    /// Opaque task payload (set on `TaskQueued`).
    pub data: Option<Arc<Value>>,
    /// Handler result payload (set on `TaskCompleted`).
    pub result: Option<Arc<Value>>,
    /// Human-readable reason (rejections, execution failures).
    pub reason: Option<Arc<str>>,
    /// Execution duration in milliseconds (compact).
    pub latency_ms: Option<u64>,
    /// True when the event belongs to a startup recovery replay.
    pub recovered: bool,
    /// System health snapshot (set on `MetricsReport`).
    pub metrics: Option<Arc<SystemMetrics>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next
    /// sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            priority: None,
            data: None,
            result: None,
            reason: None,
            latency_ms: None,
            recovered: false,
            metrics: None,
        }
    }

    /// Attaches a task id.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches the submission priority.
    #[inline]
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Attaches the opaque task payload.
    #[inline]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(Arc::new(data));
        self
    }

    /// Attaches the handler result payload.
    #[inline]
    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(Arc::new(result));
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an execution duration (stored as milliseconds).
    #[inline]
    pub fn with_latency(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u64::MAX)) as u64;
        self.latency_ms = Some(ms);
        self
    }

    /// Marks whether the event belongs to a recovery replay.
    #[inline]
    pub fn with_recovered(mut self, recovered: bool) -> Self {
        self.recovered = recovered;
        self
    }

    /// Attaches a system health snapshot.
    #[inline]
    pub fn with_metrics(mut self, metrics: SystemMetrics) -> Self {
        self.metrics = Some(Arc::new(metrics));
        self
    }
}
