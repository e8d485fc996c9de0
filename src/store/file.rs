//! # Whole-file JSON store.
//!
//! [`JsonFileStore`] persists pending tasks as a single JSON array. The file
//! is read once when the store opens and rewritten in full after every
//! mutation. Suited to the intended scale (at most a few thousand records);
//! no compaction or append log needed.
//!
//! ## Rules
//! - Missing file on open → empty store (first run, not an error).
//! - Malformed or unreadable content on open → empty store; the parse
//!   failure is logged and never raised.
//! - Mutations hold an internal lock across the rewrite, so concurrent
//!   inserts/removes serialize and the file never interleaves.
//! - Write failures surface as [`StoreError`]; the in-memory view has
//!   already been updated, so the processor keeps working for the cycle.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;

use super::record::PendingTask;
use super::store::{StoreError, TaskStore};

/// File-backed task store with an in-memory cache.
///
/// The cache is authoritative between flushes; the file is the crash-recovery
/// copy. Records keep insertion order in both.
pub struct JsonFileStore {
    path: PathBuf,
    records: Mutex<Vec<PendingTask>>,
}

impl JsonFileStore {
    /// Opens the store, loading any records persisted by a previous run.
    ///
    /// Never fails: a missing file yields an empty store, and corrupt or
    /// unreadable content is logged and discarded. Losing a corrupt file is
    /// preferable to refusing to start.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Vec<PendingTask>>(&bytes) {
                Ok(records) => records,
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "pending-task file is malformed; starting empty"
                    );
                    Vec::new()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => Vec::new(),
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "pending-task file is unreadable; starting empty"
                );
                Vec::new()
            }
        };
        Self {
            path,
            records: Mutex::new(records),
        }
    }

    /// Rewrites the whole file from the given records.
    async fn flush(&self, records: &[PendingTask]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec_pretty(records)?;
        fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl TaskStore for JsonFileStore {
    async fn insert(&self, task: PendingTask) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        match records.iter_mut().find(|r| r.task_id == task.task_id) {
            Some(existing) => *existing = task,
            None => records.push(task),
        }
        self.flush(&records).await
    }

    async fn remove(&self, task_id: &str) -> Result<bool, StoreError> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|r| r.task_id != task_id);
        if records.len() == before {
            return Ok(false);
        }
        self.flush(&records).await.map(|()| true)
    }

    async fn pending(&self) -> Vec<PendingTask> {
        self.records.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, priority: i64) -> PendingTask {
        PendingTask {
            task_id: id.to_string(),
            data: json!({ "id": id }),
            priority,
        }
    }

    #[tokio::test]
    async fn test_missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("pending.json")).await;
        assert!(store.pending().await.is_empty());
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending.json");

        let store = JsonFileStore::open(&path).await;
        store.insert(record("a", 1)).await.unwrap();
        store.insert(record("b", 2)).await.unwrap();

        let reopened = JsonFileStore::open(&path).await;
        let pending = reopened.pending().await;
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].task_id, "a");
        assert_eq!(pending[1].task_id, "b");
        assert_eq!(pending[1].priority, 2);
    }

    #[tokio::test]
    async fn test_remove_persists_and_reports_presence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending.json");

        let store = JsonFileStore::open(&path).await;
        store.insert(record("a", 1)).await.unwrap();
        store.insert(record("b", 1)).await.unwrap();

        assert!(store.remove("a").await.unwrap());
        assert!(!store.remove("missing").await.unwrap());

        let reopened = JsonFileStore::open(&path).await;
        let pending = reopened.pending().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].task_id, "b");
    }

    #[tokio::test]
    async fn test_insert_replaces_same_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending.json");

        let store = JsonFileStore::open(&path).await;
        store.insert(record("a", 1)).await.unwrap();
        store
            .insert(PendingTask {
                task_id: "a".to_string(),
                data: json!({ "updated": true }),
                priority: 9,
            })
            .await
            .unwrap();

        let pending = store.pending().await;
        assert_eq!(pending.len(), 1, "same id must not duplicate");
        assert_eq!(pending[0].priority, 9);
    }

    #[tokio::test]
    async fn test_malformed_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending.json");
        std::fs::write(&path, b"{ this is not json").unwrap();

        let store = JsonFileStore::open(&path).await;
        assert!(store.pending().await.is_empty());

        // The store stays usable after discarding the corrupt content.
        store.insert(record("a", 1)).await.unwrap();
        assert_eq!(JsonFileStore::open(&path).await.pending().await.len(), 1);
    }

    #[tokio::test]
    async fn test_creates_missing_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deep").join("pending.json");

        let store = JsonFileStore::open(&path).await;
        store.insert(record("a", 1)).await.unwrap();
        assert_eq!(JsonFileStore::open(&path).await.pending().await.len(), 1);
    }
}
