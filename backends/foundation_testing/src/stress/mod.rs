//! Stress test framework for synchronization primitives.
//!
//! Provides configurable high-contention testing with:
//! - Thread count control
//! - Iteration limits
//! - Time-based duration
//! - A completion budget enforced through `CompletionBarrier` timeouts
//!
//! Every worker runs inside its own [`CompletionBarrier`], so a worker that
//! wedges on a primitive shows up as unfinished instead of hanging the run.

use core::time::Duration;
use std::sync::Arc;
use std::time::Instant;

use foundation_sync::{AtomicCounter, AwaitTimeoutResult, CompletionBarrier, Outcome, VisibilityFlag};

pub mod config;
pub mod sync;

pub use config::StressConfig;

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressResult {
    /// Total operations completed successfully
    pub successes: usize,
    /// Total operations that failed
    pub failures: usize,
    /// Total time taken for the test
    pub duration: Duration,
    /// Number of threads used
    pub thread_count: usize,
    /// Workers that had not finished when the budget expired, or never started
    pub unfinished_workers: usize,
    /// Workers whose operation panicked
    pub panicked_workers: usize,
}

impl StressResult {
    /// Creates a new stress test result where every worker finished.
    #[must_use]
    pub const fn new(
        successes: usize,
        failures: usize,
        duration: Duration,
        thread_count: usize,
    ) -> Self {
        Self {
            successes,
            failures,
            duration,
            thread_count,
            unfinished_workers: 0,
            panicked_workers: 0,
        }
    }

    /// Returns the total number of operations.
    #[must_use]
    pub const fn total_operations(&self) -> usize {
        self.successes + self.failures
    }

    /// Returns true when every worker ran to completion within the budget.
    #[must_use]
    pub const fn all_finished(&self) -> bool {
        self.unfinished_workers == 0 && self.panicked_workers == 0
    }

    /// Returns the success rate as a value between 0.0 and 1.0.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total_operations() == 0 {
            0.0
        } else {
            self.successes as f64 / self.total_operations() as f64
        }
    }

    /// Returns operations per second.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn operations_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.total_operations() as f64 / secs
        }
    }
}

/// Base stress test harness.
///
/// Spawns multiple workers that execute a closure repeatedly
/// until the test completes (based on iteration count or duration).
pub struct StressHarness {
    config: StressConfig,
}

impl StressHarness {
    /// Creates a new stress test harness with the given configuration.
    #[must_use]
    pub const fn new(config: StressConfig) -> Self {
        Self { config }
    }

    /// Runs a stress test with the given operation closure.
    ///
    /// The closure receives:
    /// - `thread_id`: Index of the worker (`0..thread_count`)
    /// - `iteration`: Iteration number for this worker
    ///
    /// Returns `true` on success, `false` on failure.
    ///
    /// When the configuration carries a budget, workers still running once
    /// it expires are asked to stop and counted in
    /// [`StressResult::unfinished_workers`]; their threads are left to
    /// finish on their own.
    ///
    /// # Examples
    ///
    /// ```
    /// use foundation_testing::stress::{StressConfig, StressHarness};
    /// use foundation_sync::AtomicCounter;
    /// use std::sync::Arc;
    ///
    /// let counter = Arc::new(AtomicCounter::new(0));
    /// let config = StressConfig::new().threads(4).iterations(100);
    /// let harness = StressHarness::new(config);
    ///
    /// let counter_clone = Arc::clone(&counter);
    /// let result = harness.run(move |_thread_id, _iteration| {
    ///     counter_clone.increment_and_get();
    ///     true
    /// });
    ///
    /// assert_eq!(counter.get(), 400); // 4 threads * 100 iterations
    /// assert_eq!(result.successes, 400);
    /// ```
    pub fn run<F>(self, operation: F) -> StressResult
    where
        F: Fn(usize, usize) -> bool + Send + Sync + 'static,
    {
        let start = Instant::now();
        let operation = Arc::new(operation);

        let successes = Arc::new(AtomicCounter::new(0));
        let failures = Arc::new(AtomicCounter::new(0));
        let stop_flag = Arc::new(VisibilityFlag::new(false));
        let stop_at = self.config.get_duration().and_then(|d| start.checked_add(d));

        let _span = tracing::trace_span!(
            "stress_run",
            threads = self.config.get_thread_count(),
            iterations = self.config.get_iterations()
        )
        .entered();

        let mut unfinished_workers = 0;
        let mut workers = Vec::with_capacity(self.config.get_thread_count());

        for thread_id in 0..self.config.get_thread_count() {
            let operation = Arc::clone(&operation);
            let successes = Arc::clone(&successes);
            let failures = Arc::clone(&failures);
            let stop_flag = Arc::clone(&stop_flag);
            let iterations = self.config.get_iterations();

            let worker: CompletionBarrier<()> = CompletionBarrier::new();
            let started = worker.start(move |token| {
                for iteration in 0..iterations {
                    // Check stop condition
                    if stop_flag.get() || token.is_cancelled() {
                        break;
                    }
                    if stop_at.is_some_and(|at| Instant::now() >= at) {
                        break;
                    }

                    // Execute operation
                    if operation(thread_id, iteration) {
                        successes.increment_and_get();
                    } else {
                        failures.increment_and_get();
                    }
                }
                Ok(())
            });

            match started {
                Ok(()) => workers.push(worker),
                Err(err) => {
                    tracing::warn!("Stress worker {thread_id} did not start: {err}");
                    unfinished_workers += 1;
                }
            }
        }

        let deadline = self
            .config
            .get_budget()
            .and_then(|budget| start.checked_add(budget));

        let mut panicked_workers = 0;
        for worker in &workers {
            match await_until(worker, deadline) {
                Some(Outcome::Completed(())) => {}
                Some(Outcome::Failed(cause)) => {
                    tracing::warn!("Stress worker failed: {cause}");
                    panicked_workers += 1;
                }
                None => {
                    worker.request_cancellation();
                    unfinished_workers += 1;
                }
            }
        }

        if unfinished_workers > 0 {
            stop_flag.set(true);
            tracing::debug!(unfinished_workers, "Stress run exceeded its budget");
        }

        let duration = start.elapsed();

        StressResult {
            successes: counter_value(&successes),
            failures: counter_value(&failures),
            duration,
            thread_count: self.config.get_thread_count(),
            unfinished_workers,
            panicked_workers,
        }
    }
}

/// Awaits `worker` until `deadline`, or indefinitely without one.
///
/// Returns `None` when the deadline passes first.
pub(crate) fn await_until<T: Clone>(
    worker: &CompletionBarrier<T>,
    deadline: Option<Instant>,
) -> Option<Outcome<T>> {
    match deadline {
        None => Some(worker.await_completion()),
        Some(deadline) => {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match worker.await_completion_timeout(remaining) {
                AwaitTimeoutResult::Ready(outcome) => Some(outcome),
                AwaitTimeoutResult::TimedOut => None,
            }
        }
    }
}

fn counter_value(counter: &AtomicCounter) -> usize {
    usize::try_from(counter.get()).unwrap_or(0)
}
