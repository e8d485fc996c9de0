//! # Task handler abstraction.
//!
//! This module defines the [`Handler`] trait (the application's task
//! execution logic) and a convenient function-backed implementation
//! [`HandlerFn`]. The common handle type is [`HandlerRef`], an
//! `Arc<dyn Handler>` suitable for sharing across the processor.
//!
//! One handler instance serves every task: the payload and priority arrive
//! in the [`PendingTask`] record, and the handler dispatches on them.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TaskError;
use crate::store::PendingTask;

/// Shared handler handle used throughout the processor.
pub type HandlerRef = Arc<dyn Handler>;

/// # Application task logic.
///
/// Invoked once per admitted task with the persisted record. The returned
/// value becomes the task result (attached to the `TaskCompleted` event and
/// returned to the submitter); the returned error marks the task failed.
///
/// ### Delivery semantics
/// Execution is at-least-once: a task that completed just before a crash may
/// still have its record on disk and will run again during recovery. Handlers
/// should be idempotent with respect to `task.task_id`.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use serde_json::{json, Value};
/// use taskgate::{Handler, PendingTask, TaskError};
///
/// struct Echo;
///
/// #[async_trait]
/// impl Handler for Echo {
///     async fn run(&self, task: &PendingTask) -> Result<Value, TaskError> {
///         Ok(json!({ "echo": task.data }))
///     }
/// }
/// ```
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Executes one task to completion.
    ///
    /// Runs inside a concurrency slot, wrapped by the circuit breaker and
    /// the configured execution timeout.
    async fn run(&self, task: &PendingTask) -> Result<Value, TaskError>;
}

/// Function-backed handler implementation.
///
/// Wraps a closure that *creates* a new future per execution, so concurrent
/// tasks never share hidden mutable state. If shared state is needed, move
/// an `Arc<...>` into the closure explicitly.
#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F> HandlerFn<F> {
    /// Creates a new function-backed handler.
    ///
    /// Prefer [`HandlerFn::arc`] when you immediately need a [`HandlerRef`].
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the handler and returns it as a shared handle.
    ///
    /// ## Example
    /// ```rust
    /// use serde_json::json;
    /// use taskgate::{HandlerFn, HandlerRef, PendingTask, TaskError};
    ///
    /// let h: HandlerRef = HandlerFn::arc(|task: PendingTask| async move {
    ///     Ok::<_, TaskError>(json!({ "id": task.task_id }))
    /// });
    /// ```
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(PendingTask) -> Fut + Send + Sync + 'static, // Fn, not FnMut
    Fut: Future<Output = Result<Value, TaskError>> + Send + 'static,
{
    async fn run(&self, task: &PendingTask) -> Result<Value, TaskError> {
        (self.f)(task.clone()).await
    }
}
