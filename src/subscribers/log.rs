//! # Logging subscriber.
//!
//! [`LogWriter`] renders every lifecycle event as a structured log line via
//! [`tracing`]. Useful as-is for services that already ship tracing output,
//! and as a template for custom subscribers.
//!
//! ## Output shape
//! ```text
//! INFO task queued      task=task-63f2-1-9a21c task_priority=5
//! INFO task started     task=task-63f2-1-9a21c recovered=false
//! INFO task completed   task=task-63f2-1-9a21c latency_ms=12
//! WARN task failed      task=task-63f2-1-9a21c reason=circuit_open
//! INFO metrics report   processed=42 errors=3 error_rate=0.066 ...
//! ```

use async_trait::async_trait;
use tracing::{info, warn};

use crate::events::{Event, EventKind};

use super::Subscribe;

/// Structured logging subscriber.
///
/// Emits one `tracing` line per event. Attach it through
/// `ProcessorBuilder::with_subscribers` when the host application wants task
/// lifecycle visibility without writing its own subscriber.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::TaskQueued => {
                info!(
                    task,
                    task_priority = e.priority.unwrap_or(0),
                    recovered = e.recovered,
                    "task queued"
                );
            }
            EventKind::TaskStarted => {
                info!(task, recovered = e.recovered, "task started");
            }
            EventKind::TaskCompleted => {
                info!(task, latency_ms = e.latency_ms.unwrap_or(0), "task completed");
            }
            EventKind::TaskFailed => {
                warn!(
                    task,
                    reason = e.reason.as_deref().unwrap_or("unknown"),
                    "task failed"
                );
            }
            EventKind::MetricsReport => {
                if let Some(m) = &e.metrics {
                    info!(
                        processed = m.processed,
                        errors = m.errors,
                        throughput_per_sec = m.throughput_per_sec,
                        error_rate = m.error_rate,
                        avg_latency_ms = m.avg_latency_ms,
                        running = m.gate.running,
                        waiting = m.gate.waiting,
                        breaker = m.breaker.state.as_label(),
                        "metrics report"
                    );
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_handles_every_event_kind() {
        let writer = LogWriter;
        let events = [
            Event::new(EventKind::TaskQueued)
                .with_task("t-1")
                .with_priority(5),
            Event::new(EventKind::TaskStarted).with_task("t-1"),
            Event::new(EventKind::TaskCompleted)
                .with_task("t-1")
                .with_result(json!({"ok": true}))
                .with_latency(Duration::from_millis(12)),
            Event::new(EventKind::TaskFailed)
                .with_task("t-1")
                .with_reason("task_failed"),
            Event::new(EventKind::MetricsReport),
        ];
        for ev in &events {
            writer.on_event(ev).await;
        }
    }
}
