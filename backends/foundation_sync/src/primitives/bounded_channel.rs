//! Monitor-guarded bounded FIFO channel.
//!
//! Producers block while the buffer holds `capacity` items, consumers block
//! while it is empty. Both re-check their condition in a loop after every
//! wake, so spurious and stale wake-ups are harmless. Every mutation that
//! changes the length wakes the opposite side according to the channel's
//! [`WakePolicy`] (broadcast by default).
//!
//! `close` is the shutdown path: blocked producers get their item back in
//! [`PutError::Closed`], consumers drain what is left and then receive
//! [`TakeError::Closed`].

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::ChannelConfig;
use crate::errors::{ConfigResult, PutError, TakeError};
use crate::primitives::monitor::{self, CondVar, CondVarMutex};
use crate::primitives::WakePolicy;

/// A thread-safe bounded producer-consumer channel.
///
/// Cloning yields another handle to the same channel.
///
/// # Examples
///
/// ```
/// use foundation_sync::BoundedChannel;
/// use std::thread;
///
/// let channel = BoundedChannel::new(2).unwrap();
///
/// // Producer thread
/// let producer = channel.clone();
/// let handle = thread::spawn(move || {
///     for i in 0..5 {
///         producer.put(i).unwrap();
///     }
/// });
///
/// // Consumer
/// let received: Vec<i32> = (0..5).map(|_| channel.take().unwrap()).collect();
/// handle.join().unwrap();
///
/// assert_eq!(received, vec![0, 1, 2, 3, 4]);
/// ```
pub struct BoundedChannel<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    state: CondVarMutex<ChannelState<T>>,
    not_empty: CondVar,
    not_full: CondVar,
    capacity: usize,
    wake_policy: WakePolicy,
    default_timeout: Option<Duration>,
}

struct ChannelState<T> {
    buffer: VecDeque<T>,
    closed: bool,
    high_water_mark: usize,
}

impl<T> BoundedChannel<T> {
    /// Creates a channel holding at most `capacity` items, with broadcast wake.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ConfigurationError::ZeroCapacity`] if `capacity` is 0.
    pub fn new(capacity: usize) -> ConfigResult<Self> {
        Self::from_config(&ChannelConfig::new().capacity(capacity))
    }

    /// Creates a channel from a full [`ChannelConfig`].
    ///
    /// # Errors
    ///
    /// Returns the configuration's validation error.
    pub fn from_config(config: &ChannelConfig) -> ConfigResult<Self> {
        config.validate()?;

        let capacity = config.get_capacity();
        tracing::debug!(
            capacity,
            wake_policy = ?config.get_wake_policy(),
            "Creating bounded channel"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                state: CondVarMutex::new(ChannelState {
                    buffer: VecDeque::with_capacity(capacity),
                    closed: false,
                    high_water_mark: 0,
                }),
                not_empty: CondVar::new(),
                not_full: CondVar::new(),
                capacity,
                wake_policy: config.get_wake_policy(),
                default_timeout: config.get_default_timeout(),
            }),
        })
    }

    /// Appends `item`, blocking while the channel is full.
    ///
    /// # Errors
    ///
    /// Returns [`PutError::Closed`] with the item if the channel is closed
    /// before space becomes available.
    pub fn put(&self, item: T) -> Result<(), PutError<T>> {
        self.put_until(item, None)
    }

    /// Appends `item`, blocking at most `timeout` for space.
    ///
    /// A timeout too large to represent as a deadline blocks indefinitely.
    ///
    /// # Errors
    ///
    /// Returns [`PutError::TimedOut`] with the item, leaving the channel
    /// untouched, if no space appeared in time; [`PutError::Closed`] if the
    /// channel was closed.
    pub fn put_timeout(&self, item: T, timeout: Duration) -> Result<(), PutError<T>> {
        self.put_until(item, Instant::now().checked_add(timeout))
    }

    /// [`BoundedChannel::put_timeout`] with the configured default timeout,
    /// or [`BoundedChannel::put`] when none is configured.
    ///
    /// # Errors
    ///
    /// Same as [`BoundedChannel::put_timeout`].
    pub fn put_timed(&self, item: T) -> Result<(), PutError<T>> {
        match self.inner.default_timeout {
            Some(timeout) => self.put_timeout(item, timeout),
            None => self.put(item),
        }
    }

    /// Appends `item` only if there is space right now.
    ///
    /// # Errors
    ///
    /// Returns [`PutError::Full`] or [`PutError::Closed`] with the item.
    pub fn try_put(&self, item: T) -> Result<(), PutError<T>> {
        let mut guard = monitor::lock(&self.inner.state);

        if guard.closed {
            return Err(PutError::Closed(item));
        }
        if guard.buffer.len() >= self.inner.capacity {
            return Err(PutError::Full(item));
        }

        guard.push(item);
        drop(guard);

        self.inner.wake_policy.notify(&self.inner.not_empty);
        Ok(())
    }

    /// Removes the head item, blocking while the channel is empty.
    ///
    /// # Errors
    ///
    /// Returns [`TakeError::Closed`] once the channel is closed and drained.
    pub fn take(&self) -> Result<T, TakeError> {
        self.take_until(None)
    }

    /// Removes the head item, blocking at most `timeout` for one to arrive.
    ///
    /// # Errors
    ///
    /// Returns [`TakeError::TimedOut`] if nothing arrived in time and
    /// [`TakeError::Closed`] once the channel is closed and drained.
    pub fn take_timeout(&self, timeout: Duration) -> Result<T, TakeError> {
        self.take_until(Instant::now().checked_add(timeout))
    }

    /// [`BoundedChannel::take_timeout`] with the configured default timeout,
    /// or [`BoundedChannel::take`] when none is configured.
    ///
    /// # Errors
    ///
    /// Same as [`BoundedChannel::take_timeout`].
    pub fn take_timed(&self) -> Result<T, TakeError> {
        match self.inner.default_timeout {
            Some(timeout) => self.take_timeout(timeout),
            None => self.take(),
        }
    }

    /// Removes the head item only if one is queued right now.
    ///
    /// # Errors
    ///
    /// Returns [`TakeError::Empty`], or [`TakeError::Closed`] when closed and
    /// drained.
    pub fn try_take(&self) -> Result<T, TakeError> {
        let mut guard = monitor::lock(&self.inner.state);

        let Some(item) = guard.buffer.pop_front() else {
            return Err(if guard.closed {
                TakeError::Closed
            } else {
                TakeError::Empty
            });
        };
        drop(guard);

        self.inner.wake_policy.notify(&self.inner.not_full);
        Ok(item)
    }

    /// Closes the channel and wakes every blocked producer and consumer.
    ///
    /// Queued items stay available to `take`. Closing twice is a no-op.
    pub fn close(&self) {
        let mut guard = monitor::lock(&self.inner.state);
        if guard.closed {
            return;
        }
        guard.closed = true;
        let remaining = guard.buffer.len();
        drop(guard);

        tracing::debug!(remaining, "Closing bounded channel");

        // Both sides wait on different outcomes of the close, always broadcast.
        self.inner.not_empty.notify_all();
        self.inner.not_full.notify_all();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        monitor::lock(&self.inner.state).closed
    }

    /// Returns the number of queued items.
    ///
    /// Advisory only: the value may be stale as soon as it is returned.
    #[must_use]
    pub fn len(&self) -> usize {
        monitor::lock(&self.inner.state).buffer.len()
    }

    /// Advisory, like [`BoundedChannel::len`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    #[must_use]
    pub fn wake_policy(&self) -> WakePolicy {
        self.inner.wake_policy
    }

    /// Returns the largest length the buffer has ever reached.
    ///
    /// Never exceeds [`BoundedChannel::capacity`].
    #[must_use]
    pub fn high_water_mark(&self) -> usize {
        monitor::lock(&self.inner.state).high_water_mark
    }

    fn put_until(&self, item: T, deadline: Option<Instant>) -> Result<(), PutError<T>> {
        let mut guard = monitor::lock(&self.inner.state);

        loop {
            if guard.closed {
                return Err(PutError::Closed(item));
            }
            if guard.buffer.len() < self.inner.capacity {
                break;
            }

            tracing::trace!(capacity = self.inner.capacity, "Channel full, producer waiting");
            guard = match deadline {
                None => monitor::wait(&self.inner.not_full, guard),
                Some(deadline) => {
                    let Ok(guard) = monitor::wait_until(&self.inner.not_full, guard, deadline)
                    else {
                        tracing::debug!("Timed out waiting for channel capacity");
                        return Err(PutError::TimedOut(item));
                    };
                    guard
                }
            };
        }

        guard.push(item);
        drop(guard);

        self.inner.wake_policy.notify(&self.inner.not_empty);
        Ok(())
    }

    fn take_until(&self, deadline: Option<Instant>) -> Result<T, TakeError> {
        let mut guard = monitor::lock(&self.inner.state);

        let item = loop {
            if let Some(item) = guard.buffer.pop_front() {
                break item;
            }
            if guard.closed {
                return Err(TakeError::Closed);
            }

            tracing::trace!("Channel empty, consumer waiting");
            guard = match deadline {
                None => monitor::wait(&self.inner.not_empty, guard),
                Some(deadline) => {
                    let Ok(guard) = monitor::wait_until(&self.inner.not_empty, guard, deadline)
                    else {
                        tracing::debug!("Timed out waiting for a channel item");
                        return Err(TakeError::TimedOut);
                    };
                    guard
                }
            };
        };
        drop(guard);

        self.inner.wake_policy.notify(&self.inner.not_full);
        Ok(item)
    }
}

impl<T> ChannelState<T> {
    fn push(&mut self, item: T) {
        self.buffer.push_back(item);
        self.high_water_mark = self.high_water_mark.max(self.buffer.len());
    }
}

impl<T> Clone for BoundedChannel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for BoundedChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = monitor::lock(&self.inner.state);
        f.debug_struct("BoundedChannel")
            .field("capacity", &self.inner.capacity)
            .field("len", &guard.buffer.len())
            .field("closed", &guard.closed)
            .field("wake_policy", &self.inner.wake_policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ConfigurationError;
    use ntest::timeout;
    use std::thread;

    /// WHY: Capacity zero can never make progress
    /// WHAT: new(0) fails with `ZeroCapacity`
    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            BoundedChannel::<u8>::new(0),
            Err(ConfigurationError::ZeroCapacity)
        ));
    }

    /// WHY: Validates FIFO ordering on a single thread
    /// WHAT: Items come out in insertion order
    #[test]
    fn test_fifo_single_thread() {
        let channel = BoundedChannel::new(3).unwrap();
        channel.put(1).unwrap();
        channel.put(2).unwrap();
        channel.put(3).unwrap();

        assert_eq!(channel.len(), 3);
        assert_eq!(channel.take().unwrap(), 1);
        assert_eq!(channel.take().unwrap(), 2);
        assert_eq!(channel.take().unwrap(), 3);
        assert!(channel.is_empty());
    }

    /// WHY: `try_put` must not block or exceed capacity
    /// WHAT: Third `try_put` on a capacity-2 channel returns Full with the item
    #[test]
    fn test_try_put_full() {
        let channel = BoundedChannel::new(2).unwrap();
        channel.try_put('a').unwrap();
        channel.try_put('b').unwrap();

        let err = channel.try_put('c').unwrap_err();
        assert!(err.is_full());
        assert_eq!(err.into_inner(), 'c');
        assert_eq!(channel.len(), 2);
        assert_eq!(channel.high_water_mark(), 2);
    }

    /// WHY: `try_take` must not block
    /// WHAT: Empty channel yields `TakeError::Empty`
    #[test]
    fn test_try_take_empty() {
        let channel = BoundedChannel::<u8>::new(1).unwrap();
        assert_eq!(channel.try_take(), Err(TakeError::Empty));
    }

    /// WHY: Timed put on a full channel must leave it unchanged
    /// WHAT: `put_timeout` returns `TimedOut` with the item, buffer untouched
    #[test]
    fn test_put_timeout_leaves_channel_unchanged() {
        let channel = BoundedChannel::new(1).unwrap();
        channel.put(10).unwrap();

        let err = channel
            .put_timeout(11, Duration::from_millis(20))
            .unwrap_err();
        assert!(err.is_timed_out());
        assert_eq!(err.into_inner(), 11);

        assert_eq!(channel.len(), 1);
        assert_eq!(channel.take().unwrap(), 10);
    }

    /// WHY: Timed take on an empty channel returns instead of hanging
    /// WHAT: `take_timeout` yields `TimedOut` after roughly the timeout
    #[test]
    fn test_take_timeout_on_empty() {
        let channel = BoundedChannel::<u8>::new(1).unwrap();
        let start = Instant::now();

        assert_eq!(
            channel.take_timeout(Duration::from_millis(30)),
            Err(TakeError::TimedOut)
        );
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    /// WHY: A zero timeout acts as a non-blocking attempt
    /// WHAT: `take_timeout`(0) on a non-empty channel still returns the item
    #[test]
    fn test_zero_timeout_takes_available_item() {
        let channel = BoundedChannel::new(1).unwrap();
        channel.put(5).unwrap();
        assert_eq!(channel.take_timeout(Duration::ZERO), Ok(5));
    }

    /// WHY: The configured default timeout drives the *_timed operations
    /// WHAT: `take_timed` on an empty channel times out
    #[test]
    fn test_take_timed_uses_default_timeout() {
        let config = ChannelConfig::new()
            .capacity(1)
            .default_timeout(Duration::from_millis(10));
        let channel = BoundedChannel::<u8>::from_config(&config).unwrap();

        assert_eq!(channel.take_timed(), Err(TakeError::TimedOut));
        channel.put_timed(1).unwrap();
        assert!(channel.put_timed(2).unwrap_err().is_timed_out());
    }

    /// WHY: Closing must interrupt blocked consumers with a distinct result
    /// WHAT: A consumer blocked on an empty channel wakes with Closed
    #[test]
    #[timeout(5000)]
    fn test_close_wakes_blocked_consumer() {
        let channel = BoundedChannel::<u32>::new(1).unwrap();

        let consumer = {
            let channel = channel.clone();
            thread::spawn(move || channel.take())
        };

        thread::sleep(Duration::from_millis(20));
        channel.close();

        assert_eq!(consumer.join().unwrap(), Err(TakeError::Closed));
    }

    /// WHY: Closing must hand blocked producers their item back
    /// WHAT: A producer blocked on a full channel wakes with Closed(item)
    #[test]
    #[timeout(5000)]
    fn test_close_wakes_blocked_producer() {
        let channel = BoundedChannel::new(1).unwrap();
        channel.put(1u32).unwrap();

        let producer = {
            let channel = channel.clone();
            thread::spawn(move || channel.put(2).map_err(PutError::into_inner))
        };

        thread::sleep(Duration::from_millis(20));
        channel.close();

        assert_eq!(producer.join().unwrap(), Err(2));
    }

    /// WHY: A closed channel still drains queued items
    /// WHAT: take returns queued items, then Closed; put is rejected
    #[test]
    fn test_closed_channel_drains() {
        let channel = BoundedChannel::new(2).unwrap();
        channel.put(1).unwrap();
        channel.put(2).unwrap();
        channel.close();
        channel.close();

        assert!(channel.is_closed());
        assert!(channel.put(3).unwrap_err().is_closed());
        assert_eq!(channel.take(), Ok(1));
        assert_eq!(channel.try_take(), Ok(2));
        assert_eq!(channel.take(), Err(TakeError::Closed));
        assert_eq!(channel.try_take(), Err(TakeError::Closed));
    }

    /// WHY: Blocked producers resume once a consumer makes room
    /// WHAT: Producer of 100 items through capacity 1 finishes in order
    #[test]
    #[timeout(10000)]
    fn test_blocking_handoff_capacity_one() {
        let channel = BoundedChannel::new(1).unwrap();

        let producer = {
            let channel = channel.clone();
            thread::spawn(move || {
                for i in 0..100 {
                    channel.put(i).unwrap();
                }
            })
        };

        let received: Vec<i32> = (0..100).map(|_| channel.take().unwrap()).collect();
        producer.join().unwrap();

        assert_eq!(received, (0..100).collect::<Vec<_>>());
        assert_eq!(channel.high_water_mark(), 1);
    }

    /// WHY: Targeted wake is valid for plain put/take waiters
    /// WHAT: Many producers and consumers finish under `WakePolicy::Targeted`
    /// and each consumer sees every producer's items in the order they were put
    #[test]
    #[timeout(10000)]
    fn test_targeted_wake_with_uniform_predicates() {
        let config = ChannelConfig::new()
            .capacity(2)
            .wake_policy(WakePolicy::Targeted);
        let channel = BoundedChannel::from_config(&config).unwrap();
        assert_eq!(channel.wake_policy(), WakePolicy::Targeted);

        let mut producers = vec![];
        for p in 0..4u32 {
            let channel = channel.clone();
            producers.push(thread::spawn(move || {
                for i in 0..50 {
                    channel.put(p * 1000 + i).unwrap();
                }
            }));
        }

        let mut consumers = vec![];
        for _ in 0..4 {
            let channel = channel.clone();
            consumers.push(thread::spawn(move || {
                (0..50).map(|_| channel.take().unwrap()).collect::<Vec<_>>()
            }));
        }

        for producer in producers {
            producer.join().unwrap();
        }
        let per_consumer: Vec<Vec<u32>> = consumers
            .into_iter()
            .map(|consumer| consumer.join().unwrap())
            .collect();

        for taken in &per_consumer {
            let mut last_seq = [None::<u32>; 4];
            for item in taken {
                let (p, i) = (usize::try_from(item / 1000).unwrap(), item % 1000);
                if let Some(previous) = last_seq[p] {
                    assert!(previous < i, "producer {p} reordered: {previous} then {i}");
                }
                last_seq[p] = Some(i);
            }
        }

        let mut received: Vec<u32> = per_consumer.into_iter().flatten().collect();
        received.sort_unstable();

        let mut expected: Vec<u32> = (0..4u32)
            .flat_map(|p| (0..50).map(move |i| p * 1000 + i))
            .collect();
        expected.sort_unstable();
        assert_eq!(received, expected);
    }

    /// WHY: Validates Debug implementation
    /// WHAT: Debug output names the capacity and closed state
    #[test]
    fn test_debug() {
        let channel = BoundedChannel::<u8>::new(4).unwrap();
        let debug = format!("{channel:?}");
        assert!(debug.contains("BoundedChannel"));
        assert!(debug.contains("capacity: 4"));
        assert!(debug.contains("closed: false"));
    }
}
