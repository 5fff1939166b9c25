//! Visibility without atomicity.
//!
//! [`RacyCell`] publishes every write to other threads, but its increment is
//! a separate read and write. Two threads can read the same value and both
//! write `value + 1`, so one update disappears. The same run against an
//! [`AtomicCounter`] never loses anything.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::thread;

use foundation_sync::{AtomicCounter, BoxedError, CompletionBarrier, Outcome, VisibilityFlag};

/// A counter whose writes are visible across threads but whose increment
/// is a read followed by an independent write.
#[derive(Debug, Default)]
pub struct RacyCell {
    value: AtomicI64,
}

impl RacyCell {
    /// Creates a cell holding `value`.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self {
            value: AtomicI64::new(value),
        }
    }

    /// Reads the latest published value.
    #[must_use]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Reads, yields, then writes `read + 1`. Not atomic.
    pub fn racy_increment(&self) {
        let observed = self.value.load(Ordering::Acquire);
        thread::yield_now();
        self.value.store(observed.wrapping_add(1), Ordering::Release);
    }
}

/// Totals from one racy run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RacyReport {
    /// `threads * increments_per_thread`.
    pub expected: i64,
    /// Final value of the [`RacyCell`].
    pub racy_total: i64,
    /// Final value of the [`AtomicCounter`] incremented alongside it.
    pub atomic_total: i64,
}

impl RacyReport {
    /// Increments the racy cell dropped.
    #[must_use]
    pub const fn lost_updates(&self) -> i64 {
        self.expected - self.racy_total
    }
}

/// Increments a [`RacyCell`] and an [`AtomicCounter`] side by side from
/// `threads` workers.
///
/// Workers spin until a shared [`VisibilityFlag`] goes up so they overlap
/// as much as possible. The flag makes the start visible to everyone; it
/// does nothing for the increments that follow.
///
/// # Errors
///
/// Returns an error if a worker cannot be spawned or fails.
///
/// # Examples
///
/// ```
/// use foundation_testing::scenarios::run_racy_increments;
///
/// let report = run_racy_increments(4, 1000).expect("workers run");
/// assert_eq!(report.atomic_total, 4000);
/// assert!(report.racy_total <= 4000);
/// ```
pub fn run_racy_increments(
    threads: usize,
    increments_per_thread: usize,
) -> Result<RacyReport, BoxedError> {
    let cell = Arc::new(RacyCell::new(0));
    let counter = Arc::new(AtomicCounter::new(0));
    let go = Arc::new(VisibilityFlag::new(false));

    let mut workers: Vec<CompletionBarrier<()>> = Vec::with_capacity(threads);
    for _ in 0..threads {
        let cell = Arc::clone(&cell);
        let counter = Arc::clone(&counter);
        let go = Arc::clone(&go);

        let worker: CompletionBarrier<()> = CompletionBarrier::new();
        let started = worker.start(move |token| {
            while !go.get() {
                token.checkpoint()?;
                thread::yield_now();
            }
            for _ in 0..increments_per_thread {
                cell.racy_increment();
                counter.increment_and_get();
            }
            Ok(())
        });

        if let Err(err) = started {
            for worker in &workers {
                worker.request_cancellation();
            }
            return Err(err.into());
        }
        workers.push(worker);
    }

    go.set(true);

    for worker in &workers {
        if let Outcome::Failed(cause) = worker.await_completion() {
            return Err(cause.into());
        }
    }

    Ok(RacyReport {
        expected: i64::try_from(threads * increments_per_thread).unwrap_or(i64::MAX),
        racy_total: cell.get(),
        atomic_total: counter.get(),
    })
}
