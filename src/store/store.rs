//! # Store trait and persistence errors.
//!
//! [`TaskStore`] is the seam between the processor and task durability.
//! Implementations must serialize mutations internally; the processor calls
//! them concurrently from many in-flight submissions.
//!
//! ## Rules
//! - `insert` with an existing id **replaces** the record (no duplicates).
//! - `remove` is idempotent: removing a missing id is `Ok(false)`.
//! - `pending` returns records in stable insertion order.
//! - Errors are reported, never panicked; the processor degrades to its
//!   in-memory view when persistence fails.

use async_trait::async_trait;
use thiserror::Error;

use super::record::PendingTask;

/// # Errors produced by task stores.
///
/// Covers the two ways persistence can fail: the file could not be touched,
/// or the records could not be encoded/decoded.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying file I/O failed.
    #[error("store io: {0}")]
    Io(#[from] std::io::Error),

    /// Records could not be serialized or deserialized.
    #[error("store serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::Io(_) => "store_io",
            StoreError::Serialization(_) => "store_serialization",
        }
    }
}

/// Durable mapping from task id to pending-task record.
///
/// The processor writes a record before admitting a task and removes it only
/// after the task's success is confirmed. Everything still present at startup
/// is replayed by the recovery pass.
///
/// ### Implementation requirements
/// - Serialize mutations internally (callers submit concurrently).
/// - Keep at most one record per `task_id`.
/// - Survive process restart, or document that records are volatile
///   (see [`MemoryStore`](crate::MemoryStore)).
#[async_trait]
pub trait TaskStore: Send + Sync + 'static {
    /// Inserts a record, replacing any existing record with the same id.
    async fn insert(&self, task: PendingTask) -> Result<(), StoreError>;

    /// Removes the record with the given id.
    ///
    /// Returns `Ok(true)` if a record was removed, `Ok(false)` if no record
    /// with that id existed.
    async fn remove(&self, task_id: &str) -> Result<bool, StoreError>;

    /// Returns a snapshot of all pending records in insertion order.
    async fn pending(&self) -> Vec<PendingTask>;
}
