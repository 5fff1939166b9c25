//! Lock-free atomic counter.
//!
//! Every operation is a single atomic instruction on one `AtomicI64`, so all
//! operations on a counter are linearizable and none of them block. N
//! concurrent `increment_and_get` calls always add exactly N.
//!
//! Arithmetic wraps on overflow.
//!
//! # Examples
//!
//! ```
//! use foundation_sync::AtomicCounter;
//!
//! let counter = AtomicCounter::new(0);
//! assert_eq!(counter.increment_and_get(), 1);
//! assert_eq!(counter.add_and_get(5), 6);
//! assert_eq!(counter.get(), 6);
//! ```

use core::fmt;
use core::sync::atomic::{AtomicI64, Ordering};

/// A signed 64-bit counter safe under unbounded concurrent updates.
pub struct AtomicCounter {
    value: AtomicI64,
}

impl AtomicCounter {
    #[inline]
    #[must_use]
    pub const fn new(initial: i64) -> Self {
        Self {
            value: AtomicI64::new(initial),
        }
    }

    /// Returns the current value.
    #[inline]
    #[must_use]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Adds one and returns the new value.
    #[inline]
    pub fn increment_and_get(&self) -> i64 {
        self.add_and_get(1)
    }

    /// Subtracts one and returns the new value.
    #[inline]
    pub fn decrement_and_get(&self) -> i64 {
        self.add_and_get(-1)
    }

    /// Adds `delta` and returns the new value.
    ///
    /// Uses `AcqRel` ordering for the read-modify-write.
    #[inline]
    pub fn add_and_get(&self, delta: i64) -> i64 {
        self.value
            .fetch_add(delta, Ordering::AcqRel)
            .wrapping_add(delta)
    }
}

impl Default for AtomicCounter {
    #[inline]
    fn default() -> Self {
        Self::new(0)
    }
}

impl fmt::Debug for AtomicCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicCounter")
            .field("value", &self.get())
            .finish()
    }
}

impl From<i64> for AtomicCounter {
    #[inline]
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    /// WHY: Validates the post-increment return contract
    /// WHAT: Each call returns the value after the update
    #[test]
    fn test_returns_post_update_value() {
        let counter = AtomicCounter::new(10);
        assert_eq!(counter.increment_and_get(), 11);
        assert_eq!(counter.decrement_and_get(), 10);
        assert_eq!(counter.add_and_get(-15), -5);
        assert_eq!(counter.get(), -5);
    }

    /// WHY: Overflow behaviour must be defined rather than a panic
    /// WHAT: Incrementing `i64::MAX` wraps to `i64::MIN`
    #[test]
    fn test_wraps_on_overflow() {
        let counter = AtomicCounter::new(i64::MAX);
        assert_eq!(counter.increment_and_get(), i64::MIN);
        assert_eq!(counter.get(), i64::MIN);
    }

    /// WHY: Validates Default and From implementations
    /// WHAT: Default starts at zero, From keeps the value
    #[test]
    fn test_default_and_from() {
        assert_eq!(AtomicCounter::default().get(), 0);
        assert_eq!(AtomicCounter::from(-3).get(), -3);
    }

    /// WHY: Validates Debug implementation
    /// WHAT: Debug formatting should show current value
    #[test]
    fn test_debug() {
        let counter = AtomicCounter::new(7);
        let debug = format!("{counter:?}");
        assert!(debug.contains("AtomicCounter"));
        assert!(debug.contains('7'));
    }

    /// WHY: Concurrent increments must never be lost
    /// WHAT: 8 threads x 1000 increments ends at 8000 and every return value is unique
    #[test]
    fn test_concurrent_increments_are_unique() {
        let counter = Arc::new(AtomicCounter::new(0));
        let mut handles = vec![];

        for _ in 0..8 {
            let counter = Arc::clone(&counter);
            handles.push(thread::spawn(move || {
                (0..1000)
                    .map(|_| counter.increment_and_get())
                    .collect::<Vec<_>>()
            }));
        }

        let mut seen: Vec<i64> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        seen.sort_unstable();

        assert_eq!(counter.get(), 8000);
        assert_eq!(seen, (1..=8000).collect::<Vec<_>>());
    }
}
