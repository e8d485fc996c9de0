//! Durable pending-task records.
//!
//! This module groups the persisted **record shape**, the **store trait**,
//! and the two bundled implementations.
//!
//! ## Contents
//! - [`PendingTask`] the persisted record (id, payload, priority)
//! - [`TaskStore`], [`StoreError`] the persistence seam and its failures
//! - [`JsonFileStore`] whole-file JSON persistence that survives restarts
//! - [`MemoryStore`] volatile store for tests and throwaway deployments
//!
//! ## Quick reference
//! - Records are written **before** admission and removed only after a
//!   confirmed success, so a crash can lose no accepted task.
//! - Store failures never abort processing: the processor logs them and
//!   continues with its in-memory view.

mod file;
mod memory;
mod record;
mod store;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use record::PendingTask;
pub use store::{StoreError, TaskStore};
