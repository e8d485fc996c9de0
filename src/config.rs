//! # Processor configuration.
//!
//! Provides [`Config`], centralized settings for the task processor runtime.
//!
//! One `Config` covers every component: the admission gate (concurrency and
//! queueing), the circuit breaker (failure threshold and cooldown), metrics
//! (EWMA smoothing and report cadence), and the event bus.
//!
//! ## Sentinel values
//! - `max_concurrent = 0` → unlimited (tasks are never queued)
//! - `timeout = 0s` → no per-task execution timeout
//! - `monitoring_interval = 0s` → periodic metrics reports disabled

use std::time::Duration;

/// Global configuration for the task processor.
///
/// Defines:
/// - **Admission**: concurrency cap and waiting-queue bound
/// - **Failure isolation**: circuit breaker threshold and cooldown
/// - **Metrics**: latency smoothing factor and report cadence
/// - **Event system**: bus capacity for event delivery
///
/// ## Field semantics
/// - `max_concurrent`: simultaneous executions (`0` = unlimited)
/// - `queue_limit`: waiting tasks beyond the cap; the next submission is
///   rejected with `QueueFull`
/// - `failure_threshold`: failures that open the circuit
/// - `recovery_time`: cooldown before the open circuit admits a probe
/// - `monitoring_interval`: cadence of `MetricsReport` events (`0s` = off)
/// - `timeout`: per-task execution timeout (`0s` = none)
/// - `latency_alpha`: EWMA weight for the newest latency sample
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by the bus)
///
/// ## Notes
/// All fields are public for flexibility. Prefer the helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of tasks executing at the same time.
    ///
    /// - `0` = unlimited (admission never queues)
    /// - `n > 0` = at most `n` tasks run simultaneously
    pub max_concurrent: usize,

    /// Maximum number of tasks waiting for a slot.
    ///
    /// When `max_concurrent` tasks are running and `queue_limit` tasks are
    /// already waiting, the next submission fails fast with `QueueFull`.
    /// `0` means no waiting at all: every submission beyond the cap is
    /// rejected immediately.
    pub queue_limit: usize,

    /// Number of failures that trips the circuit breaker open.
    ///
    /// Counted while the circuit is closed; any success resets the count.
    pub failure_threshold: u32,

    /// How long an open circuit rejects calls before admitting a probe.
    pub recovery_time: Duration,

    /// Cadence of periodic `MetricsReport` events.
    ///
    /// - `Duration::ZERO` = reports disabled (no monitor task spawned)
    /// - `> 0` = one report per interval
    pub monitoring_interval: Duration,

    /// Per-task execution timeout.
    ///
    /// - `Duration::ZERO` = no timeout (task runs until completion)
    /// - `> 0` = the handler future is cancelled after this long and the
    ///   task fails with a timeout error
    pub timeout: Duration,

    /// EWMA smoothing factor for the average-latency metric.
    ///
    /// The newest sample is weighted by `latency_alpha`, the running average
    /// by `1 - latency_alpha`. Values outside `0.0..=1.0` are clamped.
    pub latency_alpha: f64,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow receivers that lag behind more than `bus_capacity` messages will
    /// observe `Lagged` and skip older items. Minimum value is 1.
    pub bus_capacity: usize,
}

impl Config {
    /// Returns the concurrency limit as an `Option`.
    ///
    /// - `None` → unlimited
    /// - `Some(n)` → at most `n` concurrent executions
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.max_concurrent == 0 {
            None
        } else {
            Some(self.max_concurrent)
        }
    }

    /// Returns the per-task execution timeout as an `Option`.
    ///
    /// - `None` → no timeout
    /// - `Some(d)` → the handler is given at most `d` per execution
    #[inline]
    pub fn execution_timeout(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Returns the metrics report cadence as an `Option`.
    ///
    /// - `None` → periodic reports disabled
    /// - `Some(d)` → one `MetricsReport` event per `d`
    #[inline]
    pub fn monitor_interval(&self) -> Option<Duration> {
        if self.monitoring_interval == Duration::ZERO {
            None
        } else {
            Some(self.monitoring_interval)
        }
    }

    /// Returns the EWMA smoothing factor clamped into `0.0..=1.0`.
    #[inline]
    pub fn latency_alpha_clamped(&self) -> f64 {
        self.latency_alpha.clamp(0.0, 1.0)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    ///
    /// The bus should use this value to avoid constructing an invalid channel.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `max_concurrent = 10`
    /// - `queue_limit = 1000`
    /// - `failure_threshold = 5`
    /// - `recovery_time = 5s`
    /// - `monitoring_interval = 30s`
    /// - `timeout = 0s` (no timeout)
    /// - `latency_alpha = 0.1`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            queue_limit: 1000,
            failure_threshold: 5,
            recovery_time: Duration::from_secs(5),
            monitoring_interval: Duration::from_secs(30),
            timeout: Duration::ZERO,
            latency_alpha: 0.1,
            bus_capacity: 1024,
        }
    }
}
