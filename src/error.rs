//! Error types used by the task processor and task handlers.
//!
//! This module defines two main error enums:
//!
//! - [`ProcessError`]: errors surfaced by [`TaskProcessor`](crate::TaskProcessor)
//!   for a single submission.
//! - [`TaskError`]: errors raised by individual task executions (handlers).
//!
//! Both types provide `as_label()` returning a short stable snake_case label
//! for logs and metrics.
//!
//! Component-local errors live next to their components:
//! [`AdmitError`](crate::AdmitError) in the gate, [`BreakerError`](crate::BreakerError)
//! in the breaker, and [`StoreError`](crate::StoreError) in the store.

use std::time::Duration;
use thiserror::Error;

/// # Errors surfaced for a single task submission.
///
/// Policy rejections (`QueueFull`, `CircuitOpen`) mean the task body never
/// ran; the processor does not retry them. Execution failures carry the
/// handler's [`TaskError`] and leave the task record in the store so a later
/// startup can replay it.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProcessError {
    /// Admission denied: the waiting queue is at capacity.
    ///
    /// The task record was rolled back; the task was never persisted as
    /// started.
    #[error("admission queue full (limit {limit})")]
    QueueFull {
        /// The configured queue limit that was hit.
        limit: usize,
    },

    /// The circuit breaker rejected the call without running the task.
    #[error("circuit open; next attempt in {retry_in:?}")]
    CircuitOpen {
        /// Time remaining until the circuit admits a probe.
        retry_in: Duration,
    },

    /// The task ran and failed.
    #[error("task execution failed: {0}")]
    Execution(#[from] TaskError),
}

impl ProcessError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskgate::ProcessError;
    ///
    /// let err = ProcessError::QueueFull { limit: 1000 };
    /// assert_eq!(err.as_label(), "queue_full");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ProcessError::QueueFull { .. } => "queue_full",
            ProcessError::CircuitOpen { .. } => "circuit_open",
            ProcessError::Execution(err) => err.as_label(),
        }
    }

    /// True for policy rejections that never ran the task body.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ProcessError::QueueFull { .. } | ProcessError::CircuitOpen { .. }
        )
    }
}

/// # Errors produced by task execution.
///
/// Returned by [`Handler`](crate::Handler) implementations (or synthesized by
/// the processor when an execution exceeds the configured timeout). A failed
/// execution keeps its persisted record, so the task is replayed by the next
/// recovery pass.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// Task execution failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Task execution exceeded its timeout duration.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },
}

impl TaskError {
    /// Creates a [`TaskError::Fail`] from any message.
    ///
    /// Shorthand for handlers:
    /// `return Err(TaskError::fail("connection refused"))`.
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskgate::TaskError;
    /// use std::time::Duration;
    ///
    /// let err = TaskError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "task_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Timeout { .. } => "task_timeout",
        }
    }
}
