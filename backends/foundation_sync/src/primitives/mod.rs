//! Coordination primitives.
//!
//! - [`AtomicCounter`] and [`VisibilityFlag`] sit directly on `core::sync::atomic`.
//! - [`BoundedChannel`] and [`CompletionBarrier`] are monitors built from
//!   `std::sync::{Mutex, Condvar}`.

// Public modules
pub mod atomic_counter;
pub mod bounded_channel;
pub mod completion_barrier;
pub mod visibility_flag;
pub mod wake_policy;

mod monitor;

// Re-export atomic types
pub use atomic_counter::AtomicCounter;
pub use visibility_flag::VisibilityFlag;

// Re-export monitor types
pub use bounded_channel::BoundedChannel;
pub use completion_barrier::{
    AwaitTimeoutResult, BarrierState, CancellationToken, CompletionBarrier, Outcome,
};
pub use wake_policy::WakePolicy;
