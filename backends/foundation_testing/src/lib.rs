//! Reusable stress testing infrastructure for the `foundation_sync` primitives.
//!
//! This crate provides:
//! - **Stress test framework**: configurable high-contention runs with a time budget
//! - **Channel and counter stress runs**: the producer/consumer grid and lost-update checks
//! - **Scenarios**: FIFO sampling, the targeted-wake hazard, visibility without atomicity
//!
//! # Examples
//!
//! ```rust
//! use foundation_testing::stress::{StressConfig, StressHarness};
//! use foundation_sync::AtomicCounter;
//! use std::sync::Arc;
//!
//! let config = StressConfig::new()
//!     .threads(10)
//!     .iterations(1000);
//!
//! let counter = Arc::new(AtomicCounter::new(0));
//! let harness = StressHarness::new(config);
//!
//! let counter_clone = Arc::clone(&counter);
//! let results = harness.run(move |_thread_id, _iteration| {
//!     counter_clone.increment_and_get();
//!     true
//! });
//!
//! assert_eq!(results.successes, 10000); // 10 threads * 1000 iterations
//! assert!(results.all_finished());
//! assert_eq!(counter.get(), 10000);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)] // Common for testing crates

pub mod scenarios;
pub mod stress;

// Re-export commonly used items
pub use stress::{StressConfig, StressHarness, StressResult};
