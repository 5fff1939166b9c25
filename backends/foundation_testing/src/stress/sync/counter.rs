//! `AtomicCounter` lost-update stress runs.

use std::sync::Arc;

use foundation_sync::AtomicCounter;

use crate::stress::{StressConfig, StressHarness, StressResult};

/// Expected and observed totals of a counter stress run.
#[derive(Debug, Clone)]
pub struct CounterStressReport {
    /// `threads * iterations`.
    pub expected: i64,
    /// Final value read from the counter.
    pub actual: i64,
    /// Harness statistics for the run.
    pub stress: StressResult,
}

impl CounterStressReport {
    /// True when no increment was lost.
    #[must_use]
    pub const fn is_exact(&self) -> bool {
        self.expected == self.actual
    }
}

/// Increments one shared counter from N workers, M times each.
///
/// # Examples
///
/// ```
/// use foundation_testing::stress::{StressConfig, sync::run_counter_stress};
///
/// let report = run_counter_stress(StressConfig::new().threads(8).iterations(500));
/// assert!(report.is_exact());
/// assert_eq!(report.actual, 4000);
/// ```
#[must_use]
pub fn run_counter_stress(config: StressConfig) -> CounterStressReport {
    let counter = Arc::new(AtomicCounter::new(0));
    let expected = i64::try_from(config.get_thread_count() * config.get_iterations())
        .unwrap_or(i64::MAX);

    let counter_clone = Arc::clone(&counter);
    let stress = StressHarness::new(config).run(move |_thread_id, _iteration| {
        counter_clone.increment_and_get() > 0
    });

    CounterStressReport {
        expected,
        actual: counter.get(),
        stress,
    }
}
