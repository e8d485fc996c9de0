//! # Processor construction.
//!
//! [`ProcessorBuilder`] assembles a [`TaskProcessor`] from its parts: the
//! configuration, a durable store, the task handler, and optional event
//! subscribers. Only the handler is mandatory; the store defaults to an
//! in-memory implementation (no crash recovery).

use std::sync::Arc;

use thiserror::Error;

use crate::config::Config;
use crate::store::{MemoryStore, TaskStore};
use crate::subscribers::{Subscribe, SubscriberSet};

use super::core::TaskProcessor;
use super::handler::Handler;

/// # Processor construction failure.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BuildError {
    /// No task handler was configured.
    #[error("no task handler configured")]
    MissingHandler,
}

impl BuildError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            BuildError::MissingHandler => "missing_handler",
        }
    }
}

/// Builder for constructing a [`TaskProcessor`].
///
/// ## Example
/// ```no_run
/// use std::sync::Arc;
/// use serde_json::json;
/// use taskgate::{Config, HandlerFn, LogWriter, PendingTask, ProcessorBuilder, TaskError};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let processor = ProcessorBuilder::new(Config::default())
///     .with_handler(HandlerFn::arc(|task: PendingTask| async move {
///         Ok::<_, TaskError>(json!({ "done": task.task_id }))
///     }))
///     .with_subscribers(vec![Arc::new(LogWriter)])
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ProcessorBuilder {
    cfg: Config,
    store: Option<Arc<dyn TaskStore>>,
    handler: Option<Arc<dyn Handler>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl ProcessorBuilder {
    /// Creates a new builder with the given configuration.
    #[must_use]
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            store: None,
            handler: None,
            subscribers: Vec::new(),
        }
    }

    /// Sets the durable task store.
    ///
    /// Defaults to [`MemoryStore`], which keeps records only for the process
    /// lifetime. Use [`JsonFileStore`](crate::JsonFileStore) when tasks must
    /// survive a restart.
    pub fn with_store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the task handler. Required.
    pub fn with_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive lifecycle events (queued, started, completed,
    /// failed, metrics reports) through dedicated workers with bounded
    /// queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds and returns the processor instance.
    ///
    /// Must be called within a Tokio runtime: this spawns the subscriber
    /// workers and, when `monitoring_interval` is non-zero, the metrics
    /// monitor task.
    ///
    /// # Errors
    /// Returns [`BuildError::MissingHandler`] when no handler was set.
    pub fn build(self) -> Result<Arc<TaskProcessor>, BuildError> {
        let handler = self.handler.ok_or(BuildError::MissingHandler)?;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn TaskStore>);
        let subscribers = SubscriberSet::new(self.subscribers);
        Ok(TaskProcessor::new_internal(
            self.cfg,
            store,
            handler,
            subscribers,
        ))
    }
}
