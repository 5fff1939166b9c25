//! Stress tests for synchronization primitives.

pub mod channel;
pub mod counter;

pub use channel::{run_channel_stress, ChannelStressConfig, ChannelStressReport};
pub use counter::{run_counter_stress, CounterStressReport};
