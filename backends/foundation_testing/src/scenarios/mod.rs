//! Common synchronization patterns and scenarios.
//!
//! Provides reusable demonstrations of classic concurrency behaviour:
//! - Producer-consumer ordering and bounds
//! - The lost wake-up hazard of single-waiter notification
//! - Visible but non-atomic updates losing increments

pub mod producer_consumer;
pub mod racy_counter;
pub mod single_wake;

pub use producer_consumer::{run_fifo_scenario, FifoReport};
pub use racy_counter::{run_racy_increments, RacyCell, RacyReport};
pub use single_wake::{run_single_wake_scenario, SingleWakeConfig, SingleWakeReport};
