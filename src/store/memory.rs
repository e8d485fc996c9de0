//! # In-memory store.
//!
//! [`MemoryStore`] keeps records in a plain `Vec` and does not survive
//! restart. The default store for tests and for deployments that opt out of
//! durability.

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::record::PendingTask;
use super::store::{StoreError, TaskStore};

/// Volatile task store; records vanish when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<PendingTask>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert(&self, task: PendingTask) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        match records.iter_mut().find(|r| r.task_id == task.task_id) {
            Some(existing) => *existing = task,
            None => records.push(task),
        }
        Ok(())
    }

    async fn remove(&self, task_id: &str) -> Result<bool, StoreError> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|r| r.task_id != task_id);
        Ok(records.len() != before)
    }

    async fn pending(&self) -> Vec<PendingTask> {
        self.records.lock().await.clone()
    }
}
