//! Single producer, single consumer ordering over a `BoundedChannel`.

use foundation_sync::{
    BoundedChannel, BoxedError, CompletionBarrier, Outcome, PutError, TakeError, WorkError,
};

/// What the consumer observed while draining the channel.
#[derive(Debug, Clone)]
pub struct FifoReport {
    /// Items in the order they were taken.
    pub consumed: Vec<u64>,
    /// Number of items the producer put.
    pub expected_items: u64,
    /// Largest `len()` the consumer sampled.
    pub max_sampled_len: usize,
    /// Highest occupancy the channel itself recorded.
    pub high_water_mark: usize,
    /// Capacity of the channel.
    pub capacity: usize,
}

impl FifoReport {
    /// True when items came out as `0, 1, 2, ...` with none missing.
    #[must_use]
    pub fn is_in_order(&self) -> bool {
        u64::try_from(self.consumed.len()).is_ok_and(|len| len == self.expected_items)
            && self
                .consumed
                .iter()
                .zip(0u64..)
                .all(|(item, expected)| *item == expected)
    }

    /// True when neither the samples nor the channel exceeded capacity.
    #[must_use]
    pub const fn within_capacity(&self) -> bool {
        self.max_sampled_len <= self.capacity && self.high_water_mark <= self.capacity
    }
}

/// Puts `0..items` from a producer barrier and takes them on the calling
/// thread, sampling the channel length after every take.
///
/// # Errors
///
/// Returns an error if `capacity` is zero, the producer cannot be started,
/// or either side fails.
///
/// # Examples
///
/// ```
/// use foundation_testing::scenarios::run_fifo_scenario;
///
/// let report = run_fifo_scenario(3, 100).expect("scenario runs");
/// assert!(report.is_in_order());
/// assert_eq!(report.consumed.len(), 100);
/// assert!(report.within_capacity());
/// ```
pub fn run_fifo_scenario(capacity: usize, items: u64) -> Result<FifoReport, BoxedError> {
    let channel: BoundedChannel<u64> = BoundedChannel::new(capacity)?;

    let producer: CompletionBarrier<()> = CompletionBarrier::new();
    let producer_channel = channel.clone();
    producer.start(move |_token| {
        for item in 0..items {
            producer_channel
                .put(item)
                .map_err(|err: PutError<u64>| WorkError::failed(err))?;
        }
        producer_channel.close();
        Ok(())
    })?;

    let mut consumed = Vec::new();
    let mut max_sampled_len = 0;
    loop {
        match channel.take() {
            Ok(item) => {
                consumed.push(item);
                max_sampled_len = max_sampled_len.max(channel.len());
            }
            Err(TakeError::Closed) => break,
            Err(err) => {
                channel.close();
                return Err(err.into());
            }
        }
    }

    if let Outcome::Failed(cause) = producer.await_completion() {
        return Err(cause.into());
    }

    Ok(FifoReport {
        consumed,
        expected_items: items,
        max_sampled_len,
        high_water_mark: channel.high_water_mark(),
        capacity: channel.capacity(),
    })
}
