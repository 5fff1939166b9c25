//! Wake-up policy for monitor state changes.
//!
//! When waiters on one condition variable may be waiting for *different*
//! predicates (different watermarks, different thresholds), waking a single
//! thread can pick one whose predicate is still false. It re-blocks and the
//! thread that could have made progress never hears about the change.
//! [`WakePolicy::Broadcast`] wakes everyone and lets each waiter re-check its
//! own predicate, which is always safe.
//!
//! [`WakePolicy::Targeted`] is an optimization. Its precondition: every
//! waiter on the notified condition variable is waiting for the same
//! predicate, so any one of them can consume the change. `BoundedChannel`
//! satisfies this because producers only wait for "not full" and consumers
//! only wait for "not empty", each on their own condition variable.

use serde::{Deserialize, Serialize};
use std::sync::Condvar;

/// Which waiters a state change wakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub enum WakePolicy {
    /// Wake every waiter (`notify_all`). The default.
    #[default]
    #[serde(rename = "broadcast")]
    Broadcast,

    /// Wake a single waiter (`notify_one`).
    ///
    /// Only valid when all waiters share an identical predicate.
    #[serde(rename = "targeted")]
    Targeted,
}

impl WakePolicy {
    /// Delivers a wake-up on `condvar` according to this policy.
    #[inline]
    pub fn notify(self, condvar: &Condvar) {
        match self {
            Self::Broadcast => condvar.notify_all(),
            Self::Targeted => condvar.notify_one(),
        }
    }

    /// Returns `true` for [`WakePolicy::Broadcast`].
    #[inline]
    #[must_use]
    pub const fn is_broadcast(self) -> bool {
        matches!(self, Self::Broadcast)
    }
}
