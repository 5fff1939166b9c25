//! `BoundedChannel` producer/consumer stress runs.

use core::time::Duration;
use std::collections::HashMap;
use std::time::Instant;

use foundation_sync::{
    BoundedChannel, BoxedError, ChannelConfig, CompletionBarrier, Outcome, TakeError, WakePolicy,
    WorkError,
};

use crate::stress::await_until;

/// Shape of a channel stress run: P producers, Q consumers, capacity C.
#[derive(Debug, Clone, Copy)]
pub struct ChannelStressConfig {
    producers: usize,
    consumers: usize,
    capacity: usize,
    items_per_producer: u64,
    wake_policy: WakePolicy,
    budget: Duration,
}

impl ChannelStressConfig {
    /// Creates a configuration for `producers` x `consumers` over a channel
    /// of `capacity`.
    ///
    /// Defaults to 1000 items per producer, broadcast wake-ups and a
    /// 10 second budget.
    #[must_use]
    pub const fn new(producers: usize, consumers: usize, capacity: usize) -> Self {
        Self {
            producers,
            consumers,
            capacity,
            items_per_producer: 1000,
            wake_policy: WakePolicy::Broadcast,
            budget: Duration::from_secs(10),
        }
    }

    /// Sets how many items each producer puts.
    #[must_use]
    pub const fn items_per_producer(mut self, items: u64) -> Self {
        self.items_per_producer = items;
        self
    }

    /// Sets the wake policy of the channel under test.
    #[must_use]
    pub const fn wake_policy(mut self, policy: WakePolicy) -> Self {
        self.wake_policy = policy;
        self
    }

    /// Sets the time budget for the whole run.
    #[must_use]
    pub const fn budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    /// Total number of items the producers put, saturating at `u64::MAX`.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        let producers = u64::try_from(self.producers).unwrap_or(u64::MAX);
        self.items_per_producer.saturating_mul(producers)
    }
}

/// What a channel stress run observed.
#[derive(Debug, Clone)]
pub struct ChannelStressReport {
    /// Every item taken by any consumer, sorted ascending.
    pub consumed: Vec<u64>,
    /// Every consumer saw each producer's items in submission order.
    pub producer_order_kept: bool,
    /// Number of items the producers were asked to put.
    pub expected_items: u64,
    /// Participants still blocked when the budget expired.
    pub stuck_participants: usize,
    /// Participants whose work failed or panicked.
    pub failed_participants: usize,
    /// Highest buffer occupancy the channel recorded.
    pub high_water_mark: usize,
    /// Capacity of the channel under test.
    pub capacity: usize,
    /// Wall time of the run.
    pub duration: Duration,
}

impl ChannelStressReport {
    /// True when every participant finished within the budget.
    #[must_use]
    pub const fn completed(&self) -> bool {
        self.stuck_participants == 0 && self.failed_participants == 0
    }

    /// True when each produced item was consumed exactly once.
    #[must_use]
    pub fn all_items_consumed_once(&self) -> bool {
        u64::try_from(self.consumed.len()).is_ok_and(|len| len == self.expected_items)
            && self
                .consumed
                .iter()
                .zip(0u64..)
                .all(|(item, expected)| *item == expected)
    }

    /// True when the buffer never held more than its capacity.
    #[must_use]
    pub const fn within_capacity(&self) -> bool {
        self.high_water_mark <= self.capacity
    }
}

/// Returns true when, within `taken`, the items of each producer appear in
/// strictly increasing sequence order.
///
/// Producer `p` puts `p * items_per_producer + seq`, so the producer and
/// sequence number are recovered by division.
fn keeps_producer_order(taken: &[u64], items_per_producer: u64) -> bool {
    if items_per_producer == 0 {
        return taken.is_empty();
    }

    let mut last_seq: HashMap<u64, u64> = HashMap::new();
    taken.iter().all(|item| {
        let producer = item / items_per_producer;
        let seq = item % items_per_producer;
        last_seq
            .insert(producer, seq)
            .is_none_or(|previous| previous < seq)
    })
}

/// Runs P producers and Q consumers over one channel of capacity C.
///
/// Producer `p` puts the items `p * n .. (p + 1) * n`. Once every producer
/// has finished, the channel is closed so consumers drain it and exit.
/// If the budget expires first the channel is closed anyway, which releases
/// any participant still blocked on it.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or a participant
/// thread cannot be spawned.
///
/// # Examples
///
/// ```
/// use foundation_testing::stress::sync::{run_channel_stress, ChannelStressConfig};
///
/// let report = run_channel_stress(&ChannelStressConfig::new(3, 2, 4).items_per_producer(200))
///     .expect("valid configuration");
///
/// assert!(report.completed());
/// assert!(report.all_items_consumed_once());
/// assert!(report.within_capacity());
/// ```
pub fn run_channel_stress(
    config: &ChannelStressConfig,
) -> Result<ChannelStressReport, BoxedError> {
    let start = Instant::now();
    let channel: BoundedChannel<u64> = BoundedChannel::from_config(
        &ChannelConfig::new()
            .capacity(config.capacity)
            .wake_policy(config.wake_policy),
    )?;
    let deadline = start.checked_add(config.budget);

    let _span = tracing::trace_span!(
        "channel_stress",
        producers = config.producers,
        consumers = config.consumers,
        capacity = config.capacity
    )
    .entered();

    let mut consumers = Vec::with_capacity(config.consumers);
    for _ in 0..config.consumers {
        let channel_clone = channel.clone();
        let consumer: CompletionBarrier<Vec<u64>> = CompletionBarrier::new();
        let started = consumer.start(move |_token| {
            let mut taken = Vec::new();
            loop {
                match channel_clone.take() {
                    Ok(item) => taken.push(item),
                    Err(TakeError::Closed) => return Ok(taken),
                    Err(err) => return Err(WorkError::failed(err)),
                }
            }
        });
        if let Err(err) = started {
            channel.close();
            return Err(err.into());
        }
        consumers.push(consumer);
    }

    let mut producers = Vec::with_capacity(config.producers);
    for producer_id in 0..u64::try_from(config.producers)? {
        let channel_clone = channel.clone();
        let items = config.items_per_producer;
        let producer: CompletionBarrier<()> = CompletionBarrier::new();
        let started = producer.start(move |_token| {
            let first = producer_id.saturating_mul(items);
            for item in first..first.saturating_add(items) {
                channel_clone.put(item).map_err(WorkError::failed)?;
            }
            Ok(())
        });
        if let Err(err) = started {
            channel.close();
            return Err(err.into());
        }
        producers.push(producer);
    }

    let mut stuck_participants = 0;
    let mut failed_participants = 0;

    for producer in &producers {
        match await_until(producer, deadline) {
            Some(Outcome::Completed(())) => {}
            Some(Outcome::Failed(cause)) => {
                tracing::warn!("Producer failed: {cause}");
                failed_participants += 1;
            }
            None => stuck_participants += 1,
        }
    }

    // Consumers exit on Closed once the buffer is drained.
    channel.close();

    let mut all_taken = Vec::new();
    let mut producer_order_kept = true;
    for consumer in &consumers {
        match await_until(consumer, deadline) {
            Some(Outcome::Completed(taken)) => {
                producer_order_kept &= keeps_producer_order(&taken, config.items_per_producer);
                all_taken.extend(taken);
            }
            Some(Outcome::Failed(cause)) => {
                tracing::warn!("Consumer failed: {cause}");
                failed_participants += 1;
            }
            None => stuck_participants += 1,
        }
    }
    all_taken.sort_unstable();

    if stuck_participants > 0 {
        tracing::debug!(stuck_participants, "Channel stress run exceeded its budget");
    }

    Ok(ChannelStressReport {
        consumed: all_taken,
        producer_order_kept,
        expected_items: config.total_items(),
        stuck_participants,
        failed_participants,
        high_water_mark: channel.high_water_mark(),
        capacity: channel.capacity(),
        duration: start.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    /// WHY: A single producer and consumer over a one-slot channel is the tightest handoff
    /// WHAT: Every item arrives once and the buffer never exceeds one element
    #[test]
    #[ntest::timeout(20000)]
    fn test_single_slot_handoff() {
        let report = run_channel_stress(&ChannelStressConfig::new(1, 1, 1).items_per_producer(500))
            .expect("should run");

        assert!(report.completed());
        assert!(report.all_items_consumed_once());
        assert_eq!(report.high_water_mark, 1);
    }

    /// WHY: Items from one producer must never overtake each other
    /// WHAT: Each consumer sees every producer's sequence numbers strictly increasing
    #[test]
    #[ntest::timeout(30000)]
    fn test_per_producer_order_is_kept() {
        for policy in [WakePolicy::Broadcast, WakePolicy::Targeted] {
            let report = run_channel_stress(
                &ChannelStressConfig::new(5, 5, 3)
                    .items_per_producer(2000)
                    .wake_policy(policy),
            )
            .expect("should run");

            assert!(report.completed());
            assert!(report.producer_order_kept, "{policy:?} reordered a producer");
            assert!(report.all_items_consumed_once());
        }
    }

    /// WHY: The order check must actually catch a reordering
    /// WHAT: A swapped pair from one producer fails, interleaved producers pass
    #[test]
    fn test_keeps_producer_order_detects_swaps() {
        // Producer 0 owns 0..10, producer 1 owns 10..20.
        assert!(keeps_producer_order(&[0, 10, 1, 11, 2, 12], 10));
        assert!(!keeps_producer_order(&[0, 2, 1], 10));
        assert!(!keeps_producer_order(&[10, 11, 11], 10));
        assert!(keeps_producer_order(&[], 0));
    }

    /// WHY: Huge configurations must not overflow the item count
    /// WHAT: `total_items` saturates instead of panicking
    #[test]
    fn test_total_items_saturates() {
        let config = ChannelStressConfig::new(usize::MAX, 1, 1).items_per_producer(u64::MAX);
        assert_eq!(config.total_items(), u64::MAX);
        assert_eq!(ChannelStressConfig::new(3, 1, 1).items_per_producer(7).total_items(), 21);
    }

    /// WHY: Exceeding the budget is reported through tracing as well as the report
    /// WHAT: A producer with no consumers emits the budget debug event
    #[test]
    #[traced_test]
    #[ntest::timeout(10000)]
    fn test_budget_overrun_is_logged() {
        let report = run_channel_stress(
            &ChannelStressConfig::new(1, 0, 1)
                .items_per_producer(5)
                .budget(Duration::from_millis(50)),
        )
        .expect("should run");

        assert_eq!(report.stuck_participants, 1);
        assert!(logs_contain("Channel stress run exceeded its budget"));
    }

    /// WHY: Zero capacity is rejected before any thread is spawned
    /// WHAT: The run returns an error
    #[test]
    fn test_zero_capacity_is_rejected() {
        assert!(run_channel_stress(&ChannelStressConfig::new(1, 1, 0)).is_err());
    }

    /// WHY: Producers without consumers must be released by the budget
    /// WHAT: The producer blocks on a full channel and is reported stuck
    #[test]
    #[ntest::timeout(10000)]
    fn test_budget_releases_blocked_producer() {
        let report = run_channel_stress(
            &ChannelStressConfig::new(1, 0, 2)
                .items_per_producer(10)
                .budget(Duration::from_millis(100)),
        )
        .expect("should run");

        assert_eq!(report.stuck_participants, 1);
        assert!(!report.completed());
        assert!(report.consumed.is_empty());
        assert!(report.within_capacity());
    }

    /// WHY: Zero producers is a degenerate but valid run
    /// WHAT: Consumers see Closed immediately and nothing is consumed
    #[test]
    #[ntest::timeout(10000)]
    fn test_no_producers() {
        let report =
            run_channel_stress(&ChannelStressConfig::new(0, 3, 2)).expect("should run");

        assert!(report.completed());
        assert!(report.all_items_consumed_once());
        assert_eq!(report.expected_items, 0);
    }
}
