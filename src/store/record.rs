//! # Persisted pending-task record.
//!
//! [`PendingTask`] is the unit of durability: one record per accepted task,
//! written before admission and removed after confirmed completion. Whatever
//! set of records survives a crash is exactly what the next startup replays.
//!
//! ## Example
//! ```rust
//! use serde_json::json;
//! use taskgate::PendingTask;
//!
//! let task = PendingTask {
//!     task_id: "task-18f2-0-9e2b41c7".into(),
//!     data: json!({ "kind": "resize", "width": 640 }),
//!     priority: 5,
//! };
//!
//! let encoded = serde_json::to_string(&task).unwrap();
//! let decoded: PendingTask = serde_json::from_str(&encoded).unwrap();
//! assert_eq!(decoded, task);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A task accepted for processing but not yet confirmed complete.
///
/// ### Invariants
/// - `task_id` is unique and immutable for the lifetime of the record.
/// - A store never holds two records with the same `task_id`.
///
/// The payload is opaque to the processor; only the
/// [`Handler`](crate::Handler) interprets it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingTask {
    /// Unique task identifier, assigned at first submission.
    pub task_id: String,
    /// Opaque task payload, passed through to the handler.
    pub data: Value,
    /// Submission priority; higher values are admitted first.
    pub priority: i64,
}
