//! Cross-thread visibility flag.
//!
//! A `set` made by one thread is observed by any thread whose `get` is
//! ordered after it (for example, after that thread saw some other signal
//! emitted after the `set`). No lock is involved.
//!
//! This is a visibility primitive, not a synchronization primitive:
//!
//! - There is no compare-and-set. Two threads that `get` then `set` can both
//!   act on the same stale value.
//! - State derived from the flag (a counter updated whenever the flag is seen,
//!   say) gets no atomicity from it and will lose updates.
//! - It is no replacement for blocking coordination. Use
//!   [`crate::BoundedChannel`] or [`crate::CompletionBarrier`] instead of
//!   busy-polling a flag.
//!
//! # Examples
//!
//! ```
//! use foundation_sync::VisibilityFlag;
//!
//! let flag = VisibilityFlag::new(false);
//! assert!(!flag.get());
//!
//! flag.set(true);
//! assert!(flag.get());
//! ```

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

/// A boolean whose writes become visible to other threads without a lock.
pub struct VisibilityFlag {
    inner: AtomicBool,
}

impl VisibilityFlag {
    /// Creates a new `VisibilityFlag` with the given initial value.
    #[inline]
    #[must_use]
    pub const fn new(initial: bool) -> Self {
        Self {
            inner: AtomicBool::new(initial),
        }
    }

    /// Publishes `value`.
    ///
    /// Uses `Release` ordering so every write made before the `set` is visible
    /// to a thread that observes `value` through [`VisibilityFlag::get`].
    #[inline]
    pub fn set(&self, value: bool) {
        self.inner.store(value, Ordering::Release);
    }

    /// Reads the latest published value.
    ///
    /// Uses `Acquire` ordering, pairing with the `Release` in `set`.
    #[inline]
    #[must_use]
    pub fn get(&self) -> bool {
        self.inner.load(Ordering::Acquire)
    }
}

impl Default for VisibilityFlag {
    /// Creates a new `VisibilityFlag` initialized to `false`.
    #[inline]
    fn default() -> Self {
        Self::new(false)
    }
}

impl fmt::Debug for VisibilityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisibilityFlag")
            .field("value", &self.get())
            .finish()
    }
}

impl From<bool> for VisibilityFlag {
    #[inline]
    fn from(value: bool) -> Self {
        Self::new(value)
    }
}
