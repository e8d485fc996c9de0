//! # Metrics: execution counters and derived rates.
//!
//! [`MetricsRecorder`] accumulates raw counters while tasks run;
//! [`SystemMetrics`] is the derived point-in-time view handed to callers
//! and attached to `MetricsReport` events.
//!
//! ## Derivation
//! ```text
//! avg_latency_ms' = α·sample_ms + (1 − α)·avg_latency_ms      (EWMA, starts at 0)
//! throughput_per_sec = processed / uptime_secs                 (0 before any uptime)
//! error_rate = errors / (processed + errors)                   (0 when nothing ran)
//! ```
//!
//! ### Notes
//! Only timed executions feed the latency average. A task rejected by the
//! open circuit still counts as an error, but contributes no latency sample
//! because nothing ran.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::breaker::BreakerSnapshot;
use crate::gate::GateSnapshot;

/// Point-in-time system health view.
///
/// Returned by `TaskProcessor::metrics` and carried on `MetricsReport`
/// events. All rates are derived at snapshot time from raw counters.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct SystemMetrics {
    /// Time since the processor was built.
    pub uptime: Duration,
    /// Tasks that completed successfully.
    pub processed: u64,
    /// Tasks that failed, timed out, or were rejected by the open circuit.
    pub errors: u64,
    /// Successful completions per second of uptime.
    pub throughput_per_sec: f64,
    /// `errors / (processed + errors)`, `0.0` when nothing has finished.
    pub error_rate: f64,
    /// Exponentially weighted moving average of execution latency.
    pub avg_latency_ms: f64,
    /// Admission gate occupancy.
    pub gate: GateSnapshot,
    /// Circuit breaker state.
    pub breaker: BreakerSnapshot,
}

struct Counters {
    processed: u64,
    errors: u64,
    avg_latency_ms: f64,
}

/// Shared accumulator behind the processor.
pub(crate) struct MetricsRecorder {
    started: Instant,
    alpha: f64,
    counters: Mutex<Counters>,
}

impl MetricsRecorder {
    pub(crate) fn new(alpha: f64) -> Self {
        Self {
            started: Instant::now(),
            alpha,
            counters: Mutex::new(Counters {
                processed: 0,
                errors: 0,
                avg_latency_ms: 0.0,
            }),
        }
    }

    /// Records one timed execution and folds its latency into the EWMA.
    pub(crate) fn record(&self, latency: Duration, success: bool) {
        let sample_ms = latency.as_secs_f64() * 1000.0;
        let mut c = self.lock();
        if success {
            c.processed += 1;
        } else {
            c.errors += 1;
        }
        c.avg_latency_ms = self.alpha * sample_ms + (1.0 - self.alpha) * c.avg_latency_ms;
    }

    /// Records a failure that produced no latency sample.
    pub(crate) fn record_rejection(&self) {
        self.lock().errors += 1;
    }

    /// Derives the public view, embedding the given component snapshots.
    pub(crate) fn snapshot(&self, gate: GateSnapshot, breaker: BreakerSnapshot) -> SystemMetrics {
        let uptime = self.started.elapsed();
        let c = self.lock();
        let total = c.processed + c.errors;
        let uptime_secs = uptime.as_secs_f64();
        SystemMetrics {
            uptime,
            processed: c.processed,
            errors: c.errors,
            throughput_per_sec: if uptime_secs > 0.0 {
                c.processed as f64 / uptime_secs
            } else {
                0.0
            },
            error_rate: if total > 0 {
                c.errors as f64 / total as f64
            } else {
                0.0
            },
            avg_latency_ms: c.avg_latency_ms,
            gate,
            breaker,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::BreakerState;
    use tokio::time;

    fn snaps() -> (GateSnapshot, BreakerSnapshot) {
        (
            GateSnapshot {
                running: 0,
                waiting: 0,
                max_concurrent: 2,
                queue_limit: 1,
            },
            BreakerSnapshot {
                state: BreakerState::Closed,
                failures: 0,
                retry_in: None,
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_ewma_blends_toward_samples() {
        let rec = MetricsRecorder::new(0.1);
        let (gate, breaker) = snaps();

        rec.record(Duration::from_millis(100), true);
        let m = rec.snapshot(gate, breaker);
        assert!((m.avg_latency_ms - 10.0).abs() < 1e-9);

        rec.record(Duration::from_millis(200), false);
        let m = rec.snapshot(gate, breaker);
        assert!((m.avg_latency_ms - 29.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rates_are_zero_before_any_activity() {
        let rec = MetricsRecorder::new(0.1);
        let (gate, breaker) = snaps();
        let m = rec.snapshot(gate, breaker);

        assert_eq!(m.processed, 0);
        assert_eq!(m.errors, 0);
        assert_eq!(m.error_rate, 0.0);
        assert_eq!(m.throughput_per_sec, 0.0);
        assert_eq!(m.avg_latency_ms, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_rate_counts_rejections() {
        let rec = MetricsRecorder::new(0.1);
        let (gate, breaker) = snaps();

        rec.record(Duration::from_millis(10), true);
        rec.record(Duration::from_millis(10), false);
        let m = rec.snapshot(gate, breaker);
        assert_eq!(m.error_rate, 0.5);

        rec.record_rejection();
        let m = rec.snapshot(gate, breaker);
        assert_eq!(m.processed, 1);
        assert_eq!(m.errors, 2);
        assert!((m.error_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_leaves_latency_untouched() {
        let rec = MetricsRecorder::new(0.1);
        let (gate, breaker) = snaps();

        rec.record_rejection();
        let m = rec.snapshot(gate, breaker);
        assert_eq!(m.errors, 1);
        assert_eq!(m.avg_latency_ms, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throughput_over_uptime() {
        let rec = MetricsRecorder::new(0.1);
        let (gate, breaker) = snaps();

        rec.record(Duration::from_millis(5), true);
        rec.record(Duration::from_millis(5), true);
        time::advance(Duration::from_secs(4)).await;

        let m = rec.snapshot(gate, breaker);
        assert_eq!(m.uptime, Duration::from_secs(4));
        assert_eq!(m.throughput_per_sec, 0.5);
    }
}
