//! Monitor-based coordination primitives.
//!
//! This crate provides:
//! - **[`BoundedChannel`]**: a bounded FIFO handoff between producers and consumers
//! - **[`CompletionBarrier`]**: waiters block until one unit of work finishes, with
//!   timed waits and cooperative cancellation
//! - **[`AtomicCounter`]**: a lock-free linearizable counter
//! - **[`VisibilityFlag`]**: a lock-free boolean with release/acquire visibility
//!
//! The channel and the barrier are monitors: a `Mutex` paired with `Condvar`s.
//! Every state change wakes all waiters on the opposite side unless
//! [`WakePolicy::Targeted`] is chosen explicitly.
//!
//! # Examples
//!
//! ```rust
//! use foundation_sync::{BoundedChannel, CompletionBarrier, Outcome};
//!
//! let channel = BoundedChannel::new(4).expect("capacity is positive");
//! let barrier = CompletionBarrier::new();
//!
//! let producer = channel.clone();
//! barrier
//!     .start(move |_token| {
//!         for i in 0..10u32 {
//!             producer.put(i).expect("channel stays open");
//!         }
//!         Ok(10u32)
//!     })
//!     .expect("first start");
//!
//! let mut received = Vec::new();
//! for _ in 0..10 {
//!     received.push(channel.take().expect("channel stays open"));
//! }
//!
//! assert_eq!(received, (0..10).collect::<Vec<_>>());
//! assert_eq!(barrier.await_completion(), Outcome::Completed(10));
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod errors;
pub mod primitives;

pub use config::{BarrierConfig, ChannelConfig, SyncConfig};
pub use errors::{
    BarrierError, BoxedError, ConfigurationError, FailureCause, PutError, TakeError, WorkError,
};
pub use primitives::{
    AtomicCounter, AwaitTimeoutResult, BarrierState, BoundedChannel, CancellationToken,
    CompletionBarrier, Outcome, VisibilityFlag, WakePolicy,
};
