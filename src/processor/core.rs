//! # TaskProcessor: the coordinating pipeline.
//!
//! [`TaskProcessor`] owns every moving part and drives one task through the
//! full lifecycle:
//!
//! ```text
//!  process(data, priority)
//!        │
//!        ▼
//!  ┌───────────┐   insert    ┌────────────┐
//!  │ TaskStore │ ◄────────── │  processor │ ── publish TaskQueued
//!  └───────────┘             └─────┬──────┘
//!        ▲                         │ submit(priority, ...)
//!        │ remove on success       ▼
//!        │                  ┌──────────────┐     ┌────────────────┐
//!        │                  │ AdmissionGate│ ──► │ CircuitBreaker │
//!        │                  └──────────────┘     └───────┬────────┘
//!        │                                               │ handler.run()
//!        │                                               ▼
//!        └────────────── TaskCompleted / TaskFailed ── events + metrics
//! ```
//!
//! ## Lifecycle rules
//! - The record is persisted **before** admission; a crash anywhere later
//!   leaves it on disk for the next recovery pass.
//! - Success removes the record. Execution failure and circuit rejection
//!   keep it, so the task stays recovery-eligible.
//! - A fresh submission rejected with `QueueFull` rolls its record back;
//!   a recovery replay rejected the same way keeps it for the next attempt.
//! - A store write failure downgrades durability but never blocks the task:
//!   the error is logged and processing continues.
//!
//! ## Recovery
//! [`TaskProcessor::recover`] replays every persisted record through the
//! normal pipeline (same gate, breaker, events, metrics) with the events
//! marked `recovered`. Replays run concurrently, bounded by the gate like
//! any other work. Delivery is at-least-once; handlers must tolerate seeing
//! a task twice.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::future::join_all;
use futures::FutureExt;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::breaker::{BreakerError, CircuitBreaker};
use crate::config::Config;
use crate::error::{ProcessError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::gate::{AdmissionGate, AdmitError};
use crate::metrics::{MetricsRecorder, SystemMetrics};
use crate::store::{PendingTask, TaskStore};
use crate::subscribers::SubscriberSet;

use super::handler::Handler;

/// Outcome of a [`TaskProcessor::recover`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Records found in the store and resubmitted.
    pub replayed: usize,
    /// Replays that completed successfully.
    pub succeeded: usize,
    /// Replays that failed or were rejected; their records remain stored.
    pub failed: usize,
}

/// Bounded-concurrency task processor.
///
/// Constructed through [`ProcessorBuilder`](crate::ProcessorBuilder) and
/// shared as `Arc<TaskProcessor>`. All methods take `&self`; any number of
/// callers may submit concurrently.
pub struct TaskProcessor {
    cfg: Config,
    gate: AdmissionGate,
    breaker: CircuitBreaker,
    store: Arc<dyn TaskStore>,
    handler: Arc<dyn Handler>,
    bus: Bus,
    subscribers: SubscriberSet,
    metrics: MetricsRecorder,
    task_seq: AtomicU64,
    monitor_token: CancellationToken,
}

impl TaskProcessor {
    pub(crate) fn new_internal(
        cfg: Config,
        store: Arc<dyn TaskStore>,
        handler: Arc<dyn Handler>,
        subscribers: SubscriberSet,
    ) -> Arc<Self> {
        let gate = AdmissionGate::new(cfg.max_concurrent, cfg.queue_limit);
        let breaker = CircuitBreaker::new(cfg.failure_threshold, cfg.recovery_time);
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let metrics = MetricsRecorder::new(cfg.latency_alpha_clamped());
        let monitor_token = CancellationToken::new();

        let processor = Arc::new(Self {
            cfg,
            gate,
            breaker,
            store,
            handler,
            bus,
            subscribers,
            metrics,
            task_seq: AtomicU64::new(0),
            monitor_token,
        });

        if let Some(every) = processor.cfg.monitor_interval() {
            spawn_monitor(
                Arc::downgrade(&processor),
                every,
                processor.monitor_token.clone(),
            );
        }
        processor
    }

    /// Submits one task and drives it to a terminal state.
    ///
    /// The record is persisted first, then the task goes through admission
    /// and the circuit breaker. On success the handler's result value is
    /// returned and the record removed; on failure the error says whether
    /// the task ran ([`ProcessError::Execution`]) or was rejected without
    /// running ([`ProcessError::QueueFull`], [`ProcessError::CircuitOpen`]).
    ///
    /// Resolves only when the task reaches a terminal state; spawn this
    /// future when fire-and-forget submission is wanted.
    pub async fn process(&self, data: Value, priority: i64) -> Result<Value, ProcessError> {
        let task = PendingTask {
            task_id: self.next_task_id(),
            data,
            priority,
        };
        if let Err(err) = self.store.insert(task.clone()).await {
            warn!(
                task = %task.task_id,
                error = %err,
                "task not persisted, continuing without durability"
            );
        }
        self.process_inner(task, false).await
    }

    /// Replays every persisted record through the normal pipeline.
    ///
    /// Call once after construction (before accepting fresh traffic) to pick
    /// up tasks interrupted by the previous shutdown or crash. Replays are
    /// admitted by the gate like fresh work, so a large backlog drains at
    /// the configured concurrency. Failed replays keep their records for
    /// the next recovery pass.
    pub async fn recover(&self) -> RecoveryReport {
        let pending = self.store.pending().await;
        let mut report = RecoveryReport {
            replayed: pending.len(),
            ..RecoveryReport::default()
        };
        if pending.is_empty() {
            return report;
        }
        info!(count = report.replayed, "replaying persisted tasks");

        let replays = pending.into_iter().map(|task| {
            let task_id = task.task_id.clone();
            async move {
                let out = AssertUnwindSafe(self.process_inner(task, true))
                    .catch_unwind()
                    .await;
                (task_id, out)
            }
        });

        for (task_id, out) in join_all(replays).await {
            match out {
                Ok(Ok(_)) => report.succeeded += 1,
                Ok(Err(err)) => {
                    report.failed += 1;
                    warn!(task = %task_id, error = %err, "recovery replay failed");
                }
                Err(_panic) => {
                    report.failed += 1;
                    error!(task = %task_id, "recovery replay panicked");
                }
            }
        }
        report
    }

    /// Current system health snapshot.
    #[must_use]
    pub fn metrics(&self) -> SystemMetrics {
        self.metrics
            .snapshot(self.gate.snapshot(), self.breaker.snapshot())
    }

    /// Subscribes to the live event stream.
    ///
    /// Returns a broadcast receiver; slow receivers that fall more than
    /// `bus_capacity` events behind observe `Lagged` and skip ahead.
    /// Subscribers attached at build time get buffered delivery instead.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Stops the background metrics monitor.
    ///
    /// In-flight tasks are unaffected; subscriber workers drain when the
    /// processor is dropped.
    pub fn shutdown(&self) {
        self.monitor_token.cancel();
    }

    async fn process_inner(
        &self,
        task: PendingTask,
        recovered: bool,
    ) -> Result<Value, ProcessError> {
        self.publish_event(
            Event::new(EventKind::TaskQueued)
                .with_task(task.task_id.as_str())
                .with_priority(task.priority)
                .with_data(task.data.clone())
                .with_recovered(recovered),
        );

        let admitted = self
            .gate
            .submit(task.priority, self.execute(&task, recovered))
            .await;

        match admitted {
            Err(AdmitError::QueueFull { limit }) => {
                if !recovered {
                    if let Err(err) = self.store.remove(&task.task_id).await {
                        warn!(
                            task = %task.task_id,
                            error = %err,
                            "failed to roll back rejected task record"
                        );
                    }
                }
                let err = ProcessError::QueueFull { limit };
                self.publish_failed(&task, &err, None, recovered);
                Err(err)
            }
            Ok((latency, Ok(result))) => {
                self.metrics.record(latency, true);
                if let Err(err) = self.store.remove(&task.task_id).await {
                    warn!(
                        task = %task.task_id,
                        error = %err,
                        "failed to remove completed task record"
                    );
                }
                self.publish_event(
                    Event::new(EventKind::TaskCompleted)
                        .with_task(task.task_id.as_str())
                        .with_result(result.clone())
                        .with_latency(latency)
                        .with_recovered(recovered),
                );
                Ok(result)
            }
            Ok((_latency, Err(BreakerError::Open { retry_in }))) => {
                // The task never ran; its record stays recovery-eligible.
                self.metrics.record_rejection();
                let err = ProcessError::CircuitOpen { retry_in };
                self.publish_failed(&task, &err, None, recovered);
                Err(err)
            }
            Ok((latency, Err(BreakerError::Operation(task_err)))) => {
                self.metrics.record(latency, false);
                let err = ProcessError::Execution(task_err);
                self.publish_failed(&task, &err, Some(latency), recovered);
                Err(err)
            }
        }
    }

    /// Runs inside a gate slot: first poll happens only after admission.
    async fn execute(
        &self,
        task: &PendingTask,
        recovered: bool,
    ) -> (Duration, Result<Value, BreakerError<TaskError>>) {
        self.publish_event(
            Event::new(EventKind::TaskStarted)
                .with_task(task.task_id.as_str())
                .with_priority(task.priority)
                .with_recovered(recovered),
        );
        let started = Instant::now();
        let result = self.breaker.execute(|| self.run_handler(task)).await;
        (started.elapsed(), result)
    }

    async fn run_handler(&self, task: &PendingTask) -> Result<Value, TaskError> {
        match self.cfg.execution_timeout() {
            Some(limit) => match time::timeout(limit, self.handler.run(task)).await {
                Ok(out) => out,
                Err(_elapsed) => Err(TaskError::Timeout { timeout: limit }),
            },
            None => self.handler.run(task).await,
        }
    }

    fn publish_event(&self, event: Event) {
        self.subscribers.emit(&event);
        self.bus.publish(event);
    }

    fn publish_failed(
        &self,
        task: &PendingTask,
        err: &ProcessError,
        latency: Option<Duration>,
        recovered: bool,
    ) {
        let mut event = Event::new(EventKind::TaskFailed)
            .with_task(task.task_id.as_str())
            .with_reason(err.to_string())
            .with_recovered(recovered);
        if let Some(latency) = latency {
            event = event.with_latency(latency);
        }
        self.publish_event(event);
    }

    /// Unique id: wall-clock millis, process-local sequence, random salt.
    fn next_task_id(&self) -> String {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let seq = self.task_seq.fetch_add(1, Ordering::Relaxed);
        let salt: u32 = rand::random();
        format!("task-{now_ms:x}-{seq:x}-{salt:08x}")
    }
}

impl Drop for TaskProcessor {
    fn drop(&mut self) {
        self.monitor_token.cancel();
    }
}

/// Periodically publishes `MetricsReport` until cancelled or the processor
/// is gone.
fn spawn_monitor(processor: Weak<TaskProcessor>, every: Duration, token: CancellationToken) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                // Cancellation beats a due tick.
                biased;
                _ = token.cancelled() => break,
                _ = time::sleep(every) => {
                    let Some(p) = processor.upgrade() else { break };
                    let snapshot = p.metrics();
                    p.publish_event(Event::new(EventKind::MetricsReport).with_metrics(snapshot));
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::BreakerState;
    use crate::processor::builder::ProcessorBuilder;
    use crate::processor::handler::HandlerFn;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicU32;
    use tokio::sync::{watch, Notify, Semaphore};

    fn quiet_config() -> Config {
        Config {
            monitoring_interval: Duration::ZERO,
            ..Config::default()
        }
    }

    fn echo_processor(cfg: Config, store: Arc<dyn TaskStore>) -> Arc<TaskProcessor> {
        ProcessorBuilder::new(cfg)
            .with_store(store)
            .with_handler(HandlerFn::arc(|task: PendingTask| async move {
                Ok::<_, TaskError>(json!({ "echo": task.data }))
            }))
            .build()
            .unwrap()
    }

    async fn wait_until(cond: impl Fn() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_success_removes_record_and_returns_result() {
        let store = Arc::new(MemoryStore::new());
        let p = echo_processor(quiet_config(), store.clone());

        let out = p.process(json!({"n": 1}), 5).await.unwrap();
        assert_eq!(out, json!({"echo": {"n": 1}}));
        assert!(store.pending().await.is_empty());

        let m = p.metrics();
        assert_eq!(m.processed, 1);
        assert_eq!(m.errors, 0);
        assert!(m.avg_latency_ms >= 0.0);
    }

    #[tokio::test]
    async fn test_failure_keeps_record_for_recovery() {
        let store = Arc::new(MemoryStore::new());
        let p = ProcessorBuilder::new(quiet_config())
            .with_store(store.clone())
            .with_handler(HandlerFn::arc(|_task: PendingTask| async move {
                Err::<Value, _>(TaskError::fail("boom"))
            }))
            .build()
            .unwrap();

        let err = p.process(json!("x"), 0).await.unwrap_err();
        assert_eq!(err.as_label(), "task_failed");

        let pending = store.pending().await;
        assert_eq!(pending.len(), 1, "failed task stays recovery-eligible");

        let m = p.metrics();
        assert_eq!(m.processed, 0);
        assert_eq!(m.errors, 1);
    }

    #[tokio::test]
    async fn test_queue_full_rolls_back_fresh_record() {
        let cfg = Config {
            max_concurrent: 1,
            queue_limit: 0,
            ..quiet_config()
        };
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let handler = {
            let entered = Arc::clone(&entered);
            let release = Arc::clone(&release);
            HandlerFn::arc(move |_task: PendingTask| {
                let entered = Arc::clone(&entered);
                let release = Arc::clone(&release);
                async move {
                    entered.notify_one();
                    release.notified().await;
                    Ok::<_, TaskError>(json!("done"))
                }
            })
        };
        let store = Arc::new(MemoryStore::new());
        let p = ProcessorBuilder::new(cfg)
            .with_store(store.clone())
            .with_handler(handler)
            .build()
            .unwrap();
        let mut rx = p.subscribe();

        let first = {
            let p = Arc::clone(&p);
            tokio::spawn(async move { p.process(json!(1), 0).await })
        };
        entered.notified().await;

        let err = p.process(json!(2), 0).await.unwrap_err();
        assert!(matches!(err, ProcessError::QueueFull { limit: 0 }));
        assert_eq!(
            store.pending().await.len(),
            1,
            "rejected task's record must be rolled back"
        );

        release.notify_one();
        first.await.unwrap().unwrap();
        assert!(store.pending().await.is_empty());

        let m = p.metrics();
        assert_eq!(m.processed, 1);
        assert_eq!(m.errors, 0, "queue rejection is not an execution error");

        let mut saw_queue_full = false;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::TaskFailed {
                let reason = ev.reason.as_deref().unwrap_or_default().to_string();
                assert!(reason.contains("queue full"), "unexpected reason: {reason}");
                saw_queue_full = true;
            }
        }
        assert!(saw_queue_full);
    }

    #[tokio::test]
    async fn test_priority_admission_end_to_end() {
        // Cap 2, queue 1: two blocked tasks fill the slots, a third queues,
        // a fourth is rejected.
        let cfg = Config {
            max_concurrent: 2,
            queue_limit: 1,
            ..quiet_config()
        };
        let entered = Arc::new(Semaphore::new(0));
        let (go_tx, go_rx) = watch::channel(false);
        let handler = {
            let entered = Arc::clone(&entered);
            HandlerFn::arc(move |task: PendingTask| {
                let entered = Arc::clone(&entered);
                let mut go = go_rx.clone();
                async move {
                    if task.data["block"] == json!(true) {
                        entered.add_permits(1);
                        while !*go.borrow() {
                            if go.changed().await.is_err() {
                                break;
                            }
                        }
                    }
                    Ok::<_, TaskError>(task.data["name"].clone())
                }
            })
        };
        let store = Arc::new(MemoryStore::new());
        let p = ProcessorBuilder::new(cfg)
            .with_store(store.clone())
            .with_handler(handler)
            .build()
            .unwrap();

        let a = {
            let p = Arc::clone(&p);
            tokio::spawn(
                async move { p.process(json!({"name": "a", "block": true}), 0).await },
            )
        };
        let b = {
            let p = Arc::clone(&p);
            tokio::spawn(
                async move { p.process(json!({"name": "b", "block": true}), 0).await },
            )
        };
        entered
            .acquire_many(2)
            .await
            .unwrap()
            .forget();
        assert_eq!(p.metrics().gate.running, 2);

        let c = {
            let p = Arc::clone(&p);
            tokio::spawn(
                async move { p.process(json!({"name": "c", "block": false}), 5).await },
            )
        };
        wait_until(|| p.metrics().gate.waiting == 1).await;

        let err = p
            .process(json!({"name": "d", "block": false}), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::QueueFull { limit: 1 }));

        go_tx.send(true).unwrap();
        assert_eq!(a.await.unwrap().unwrap(), json!("a"));
        assert_eq!(b.await.unwrap().unwrap(), json!("b"));
        assert_eq!(c.await.unwrap().unwrap(), json!("c"));

        assert!(store.pending().await.is_empty());
        let m = p.metrics();
        assert_eq!(m.processed, 3);
        assert_eq!(m.errors, 0);
        assert_eq!(m.gate.running, 0);
        assert_eq!(m.gate.waiting, 0);
    }

    #[tokio::test]
    async fn test_recovery_replays_all_pending() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..3 {
            store
                .insert(PendingTask {
                    task_id: format!("r-{i}"),
                    data: json!(i),
                    priority: 0,
                })
                .await
                .unwrap();
        }

        let calls = Arc::new(AtomicU32::new(0));
        let handler = {
            let calls = Arc::clone(&calls);
            HandlerFn::arc(move |_task: PendingTask| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, TaskError>(json!(null))
                }
            })
        };
        let p = ProcessorBuilder::new(quiet_config())
            .with_store(store.clone())
            .with_handler(handler)
            .build()
            .unwrap();

        let report = p.recover().await;
        assert_eq!(
            report,
            RecoveryReport {
                replayed: 3,
                succeeded: 3,
                failed: 0
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(store.pending().await.is_empty());
        assert_eq!(p.metrics().processed, 3);
    }

    #[tokio::test]
    async fn test_recovery_isolates_failures_and_panics() {
        let store = Arc::new(MemoryStore::new());
        for (id, data) in [("good-1", "ok"), ("bad-1", "fail"), ("boom-1", "panic")] {
            store
                .insert(PendingTask {
                    task_id: id.to_string(),
                    data: json!(data),
                    priority: 0,
                })
                .await
                .unwrap();
        }

        let handler = HandlerFn::arc(|task: PendingTask| async move {
            match task.data.as_str() {
                Some("fail") => Err(TaskError::fail("handler says no")),
                Some("panic") => panic!("handler bug"),
                _ => Ok(json!(null)),
            }
        });
        let p = ProcessorBuilder::new(quiet_config())
            .with_store(store.clone())
            .with_handler(handler)
            .build()
            .unwrap();

        let report = p.recover().await;
        assert_eq!(report.replayed, 3);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 2);

        let kept: HashSet<String> = store
            .pending()
            .await
            .into_iter()
            .map(|t| t.task_id)
            .collect();
        assert_eq!(kept.len(), 2);
        assert!(kept.contains("bad-1"));
        assert!(kept.contains("boom-1"), "panicked replay keeps its record");
    }

    #[tokio::test]
    async fn test_recovery_overflow_keeps_records() {
        // Cap 1, queue 0: one replay wins the slot, the others are rejected
        // but their records must survive for the next recovery pass.
        let cfg = Config {
            max_concurrent: 1,
            queue_limit: 0,
            ..quiet_config()
        };
        let store = Arc::new(MemoryStore::new());
        for i in 0..3 {
            store
                .insert(PendingTask {
                    task_id: format!("r-{i}"),
                    data: json!(i),
                    priority: 0,
                })
                .await
                .unwrap();
        }

        let handler = HandlerFn::arc(|_task: PendingTask| async move {
            tokio::task::yield_now().await;
            Ok::<_, TaskError>(json!(null))
        });
        let p = ProcessorBuilder::new(cfg)
            .with_store(store.clone())
            .with_handler(handler)
            .build()
            .unwrap();

        let report = p.recover().await;
        assert_eq!(report.replayed, 3);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(
            store.pending().await.len(),
            2,
            "rejected replays keep their records"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_opens_then_recovers_through_processor() {
        let cfg = Config {
            failure_threshold: 2,
            recovery_time: Duration::from_millis(100),
            ..quiet_config()
        };
        let calls = Arc::new(AtomicU32::new(0));
        let handler = {
            let calls = Arc::clone(&calls);
            HandlerFn::arc(move |task: PendingTask| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if task.data == json!("fail") {
                        Err(TaskError::fail("dependency down"))
                    } else {
                        Ok(json!("fine"))
                    }
                }
            })
        };
        let store = Arc::new(MemoryStore::new());
        let p = ProcessorBuilder::new(cfg)
            .with_store(store.clone())
            .with_handler(handler)
            .build()
            .unwrap();

        for _ in 0..2 {
            let err = p.process(json!("fail"), 0).await.unwrap_err();
            assert_eq!(err.as_label(), "task_failed");
        }
        assert_eq!(p.metrics().breaker.state, BreakerState::Open);

        let err = p.process(json!("ok"), 0).await.unwrap_err();
        assert!(
            matches!(err, ProcessError::CircuitOpen { retry_in } if retry_in == Duration::from_millis(100))
        );
        assert_eq!(
            calls.load(Ordering::SeqCst),
            2,
            "open circuit must not invoke the handler"
        );

        time::advance(Duration::from_millis(50)).await;
        let err = p.process(json!("ok"), 0).await.unwrap_err();
        assert!(
            matches!(err, ProcessError::CircuitOpen { retry_in } if retry_in == Duration::from_millis(50))
        );

        time::advance(Duration::from_millis(50)).await;
        let out = p.process(json!("ok"), 0).await.unwrap();
        assert_eq!(out, json!("fine"));
        assert_eq!(p.metrics().breaker.state, BreakerState::Closed);

        // Two failed executions plus two circuit rejections; their records
        // all stay in the store. Only the probe's record was removed.
        let m = p.metrics();
        assert_eq!(m.processed, 1);
        assert_eq!(m.errors, 4);
        assert_eq!(store.pending().await.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let cfg = Config {
            timeout: Duration::from_millis(50),
            ..quiet_config()
        };
        let store = Arc::new(MemoryStore::new());
        let p = ProcessorBuilder::new(cfg)
            .with_store(store.clone())
            .with_handler(HandlerFn::arc(|_task: PendingTask| async move {
                std::future::pending::<Result<Value, TaskError>>().await
            }))
            .build()
            .unwrap();

        let err = p.process(json!("slow"), 0).await.unwrap_err();
        assert_eq!(err.as_label(), "task_timeout");
        assert_eq!(store.pending().await.len(), 1);

        let m = p.metrics();
        assert_eq!(m.errors, 1);
        assert_eq!(m.breaker.failures, 1, "timeout feeds the breaker");
    }

    #[tokio::test]
    async fn test_lifecycle_events_in_order() {
        let p = echo_processor(quiet_config(), Arc::new(MemoryStore::new()));
        let mut rx = p.subscribe();

        let out = p.process(json!({"k": 1}), 7).await.unwrap();

        let queued = rx.recv().await.unwrap();
        assert_eq!(queued.kind, EventKind::TaskQueued);
        assert_eq!(queued.priority, Some(7));
        assert_eq!(queued.data.as_deref(), Some(&json!({"k": 1})));
        assert!(!queued.recovered);

        let started = rx.recv().await.unwrap();
        assert_eq!(started.kind, EventKind::TaskStarted);
        assert_eq!(started.task, queued.task);

        let completed = rx.recv().await.unwrap();
        assert_eq!(completed.kind, EventKind::TaskCompleted);
        assert_eq!(completed.task, queued.task);
        assert_eq!(completed.result.as_deref(), Some(&out));
        assert!(completed.latency_ms.is_some());

        assert!(queued.seq < started.seq && started.seq < completed.seq);
    }

    #[tokio::test]
    async fn test_failed_event_carries_reason() {
        let p = ProcessorBuilder::new(quiet_config())
            .with_handler(HandlerFn::arc(|_task: PendingTask| async move {
                Err::<Value, _>(TaskError::fail("boom"))
            }))
            .build()
            .unwrap();
        let mut rx = p.subscribe();

        p.process(json!(1), 0).await.unwrap_err();

        let mut failed = None;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::TaskFailed {
                failed = Some(ev);
            }
        }
        let failed = failed.unwrap();
        let reason = failed.reason.as_deref().unwrap_or_default();
        assert!(reason.contains("boom"), "unexpected reason: {reason}");
        assert!(failed.latency_ms.is_some(), "execution failures are timed");
    }

    #[tokio::test]
    async fn test_recovery_events_marked_recovered() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert(PendingTask {
                task_id: "r-1".to_string(),
                data: json!("x"),
                priority: 3,
            })
            .await
            .unwrap();
        let p = echo_processor(quiet_config(), store);
        let mut rx = p.subscribe();

        let report = p.recover().await;
        assert_eq!(report.succeeded, 1);

        for _ in 0..3 {
            let ev = rx.recv().await.unwrap();
            assert!(ev.recovered, "{:?} must be marked as a replay", ev.kind);
            assert_eq!(ev.task.as_deref(), Some("r-1"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_emits_metrics_reports() {
        let cfg = Config {
            monitoring_interval: Duration::from_millis(100),
            ..Config::default()
        };
        let p = echo_processor(cfg, Arc::new(MemoryStore::new()));
        let mut rx = p.subscribe();

        p.process(json!(1), 0).await.unwrap();

        let report = loop {
            let ev = rx.recv().await.unwrap();
            if ev.kind == EventKind::MetricsReport {
                break ev;
            }
        };
        let m = report.metrics.as_deref().unwrap();
        assert_eq!(m.processed, 1);
        assert_eq!(m.errors, 0);

        p.shutdown();
        time::advance(Duration::from_millis(300)).await;
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_task_ids_are_unique() {
        let p = echo_processor(quiet_config(), Arc::new(MemoryStore::new()));
        let ids: HashSet<String> = (0..1000).map(|_| p.next_task_id()).collect();
        assert_eq!(ids.len(), 1000);
        assert!(ids.iter().all(|id| id.starts_with("task-")));
    }
}
