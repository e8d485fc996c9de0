//! # taskgate
//!
//! **Taskgate** is a bounded-concurrency task processing library for Rust.
//!
//! It accepts opaque JSON tasks, persists them for crash recovery, admits
//! them through a priority queue with a hard concurrency cap, shields the
//! handler behind a circuit breaker, and reports everything as events and
//! metrics. The crate is designed as a building block for job runners and
//! ingestion services that must fail fast instead of buffering without
//! bound.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!    process(data, priority)          recover()
//!            │                            │ (replay persisted records)
//!            ▼                            ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  TaskProcessor (coordinating pipeline)                            │
//! │  - TaskStore (durable pending-task records)                       │
//! │  - AdmissionGate (concurrency cap + bounded priority queue)       │
//! │  - CircuitBreaker (failure isolation around the handler)          │
//! │  - MetricsRecorder (counters, EWMA latency, derived rates)        │
//! │  - Bus (broadcast events) + SubscriberSet (buffered fan-out)      │
//! └──────┬──────────────────────┬─────────────────────────┬───────────┘
//!        ▼                      ▼                         ▼
//!  ┌───────────┐        ┌──────────────┐         ┌─────────────────┐
//!  │ TaskStore │        │ Handler::run │         │  Event stream   │
//!  │ (JSON file│        │ (app logic,  │         │ TaskQueued      │
//!  │ or memory)│        │ per task)    │         │ TaskStarted     │
//!  └───────────┘        └──────────────┘         │ TaskCompleted   │
//!                                                │ TaskFailed      │
//!                                                │ MetricsReport   │
//!                                                └────────┬────────┘
//!                                                         │
//!                                        ┌────────────────┼───────────────┐
//!                                        ▼                ▼               ▼
//!                                   subscribe()      LogWriter      custom subs
//!                                 (broadcast rx)   (worker queue)  (worker queues)
//! ```
//!
//! ### Lifecycle
//! ```text
//! process(data, priority)
//!   │
//!   ├─► generate task_id, persist PendingTask    (crash-safe from here)
//!   ├─► publish TaskQueued
//!   ├─► AdmissionGate::submit(priority, ...)
//!   │       ├─ slot free      ─► run now
//!   │       ├─ queue has room ─► wait (higher priority wakes first,
//!   │       │                         FIFO within equal priority)
//!   │       └─ both full      ─► QueueFull: roll back record, TaskFailed
//!   │
//!   ├─► publish TaskStarted
//!   ├─► CircuitBreaker::execute
//!   │       ├─ Open     ─► CircuitOpen: keep record, TaskFailed
//!   │       └─ admitted ─► handler.run(task)  [optional timeout]
//!   │               ├─ Ok(value) ─► remove record, TaskCompleted, metrics
//!   │               └─ Err(e)    ─► keep record, TaskFailed, metrics
//!   │
//!   └─► result returned to the caller
//! ```
//!
//! ## Features
//! | Area                | Description                                                          | Key types / traits                          |
//! |---------------------|----------------------------------------------------------------------|---------------------------------------------|
//! | **Admission**       | Concurrency cap with a bounded, priority-ordered waiting queue.      | [`AdmissionGate`], [`AdmitError`]           |
//! | **Circuit breaking**| Stop invoking a failing handler; probe again after a cooldown.       | [`CircuitBreaker`], [`BreakerState`]        |
//! | **Durability**      | Persist pending tasks; survive restarts and replay on startup.       | [`TaskStore`], [`JsonFileStore`]            |
//! | **Processing**      | One pipeline from submission to terminal state.                      | [`TaskProcessor`], [`ProcessorBuilder`]     |
//! | **Handlers**        | Application logic as a trait or a plain closure.                     | [`Handler`], [`HandlerFn`], [`HandlerRef`]  |
//! | **Subscriber API**  | Hook into lifecycle events (logging, metrics, custom subscribers).   | [`Subscribe`], [`LogWriter`]                |
//! | **Metrics**         | Counters, EWMA latency, throughput, error rate, component snapshots. | [`SystemMetrics`]                           |
//! | **Errors**          | Typed errors distinguishing rejections from execution failures.      | [`ProcessError`], [`TaskError`]             |
//! | **Configuration**   | Centralize runtime settings.                                         | [`Config`]                                  |
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use taskgate::{
//!     Config, HandlerFn, JsonFileStore, LogWriter, PendingTask, ProcessorBuilder, TaskError,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = Config::default();
//!     cfg.max_concurrent = 4;
//!     cfg.queue_limit = 64;
//!
//!     let store = Arc::new(JsonFileStore::open("tasks.json").await);
//!
//!     let processor = ProcessorBuilder::new(cfg)
//!         .with_store(store)
//!         .with_handler(HandlerFn::arc(|task: PendingTask| async move {
//!             // do the actual work here
//!             Ok::<_, TaskError>(json!({ "handled": task.task_id }))
//!         }))
//!         .with_subscribers(vec![Arc::new(LogWriter)])
//!         .build()?;
//!
//!     // Replay anything left behind by the previous run.
//!     let report = processor.recover().await;
//!     println!("recovered: {} of {}", report.succeeded, report.replayed);
//!
//!     let result = processor.process(json!({ "kind": "resize", "id": 42 }), 5).await?;
//!     println!("done: {result}");
//!
//!     let m = processor.metrics();
//!     println!("processed={} error_rate={:.3}", m.processed, m.error_rate);
//!     Ok(())
//! }
//! ```
mod breaker;
mod config;
mod error;
mod events;
mod gate;
mod metrics;
mod processor;
mod store;
mod subscribers;

// ---- Public re-exports ----

pub use breaker::{BreakerError, BreakerSnapshot, BreakerState, CircuitBreaker};
pub use config::Config;
pub use error::{ProcessError, TaskError};
pub use events::{Event, EventKind};
pub use gate::{AdmissionGate, AdmitError, GateSnapshot};
pub use metrics::SystemMetrics;
pub use processor::{
    BuildError, Handler, HandlerFn, HandlerRef, ProcessorBuilder, RecoveryReport, TaskProcessor,
};
pub use store::{JsonFileStore, MemoryStore, PendingTask, StoreError, TaskStore};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
