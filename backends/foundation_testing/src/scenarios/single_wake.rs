//! The lost wake-up hazard of single-waiter notification.
//!
//! One producer and several consumers share a single condition variable,
//! but consumer `k` only proceeds once the buffer holds more than
//! `thresholds[k]` items. With [`WakePolicy::Targeted`] a notification can
//! land on a participant whose condition is still false. It re-parks and
//! the signal is gone. Eventually every live participant is parked with no
//! wake-up in flight and nobody will ever run again.
//!
//! [`WakePolicy::Broadcast`] wakes everyone on every change, each participant
//! re-checks its own condition, and the run drains.
//!
//! The scenario never hangs the caller: a supervisor watches for that
//! quiescent state, records who is stranded, then releases everyone.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use foundation_sync::{BoxedError, CompletionBarrier, ConfigurationError, WakePolicy};

const PRODUCER: usize = 0;
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// How long the board must stay unchanged before it counts as quiescent.
const QUIESCENCE_WINDOW: Duration = Duration::from_millis(25);

/// Shape of a single-wake run.
#[derive(Debug, Clone)]
pub struct SingleWakeConfig {
    thresholds: Vec<usize>,
    capacity: usize,
    items: usize,
    policy: WakePolicy,
    budget: Duration,
}

impl SingleWakeConfig {
    /// Four consumers with thresholds `0, 1, 2, 3`, capacity 2 and ten items.
    #[must_use]
    pub fn new(policy: WakePolicy) -> Self {
        Self {
            thresholds: vec![0, 1, 2, 3],
            capacity: 2,
            items: 10,
            policy,
            budget: Duration::from_secs(5),
        }
    }

    /// Sets one consumer per threshold.
    #[must_use]
    pub fn thresholds(mut self, thresholds: Vec<usize>) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Sets the buffer capacity.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets how many items the producer puts.
    #[must_use]
    pub fn items(mut self, items: usize) -> Self {
        self.items = items;
        self
    }

    /// Sets how long the supervisor watches before giving up.
    #[must_use]
    pub fn budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }
}

/// What the supervisor saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleWakeReport {
    /// Policy the participants notified with.
    pub policy: WakePolicy,
    /// Items the producer was asked to put.
    pub items: usize,
    /// Items actually put.
    pub produced: usize,
    /// Items actually taken.
    pub consumed: usize,
    /// The producer was parked on a full buffer when the run stalled.
    pub producer_stranded: bool,
    /// Indices of consumers parked when the run stalled.
    pub stranded_consumers: Vec<usize>,
    /// False when the budget ran out while participants were still moving.
    pub settled: bool,
}

impl SingleWakeReport {
    /// True when the run stalled with someone parked forever.
    #[must_use]
    pub fn hazard_observed(&self) -> bool {
        self.producer_stranded || !self.stranded_consumers.is_empty()
    }

    /// True when every participant exited and every item was consumed.
    #[must_use]
    pub fn completed(&self) -> bool {
        self.settled && !self.hazard_observed() && self.consumed == self.items
    }
}

struct Board {
    buffer: VecDeque<usize>,
    done: bool,
    abandoned: bool,
    parked: Vec<bool>,
    finished: Vec<bool>,
    wakes_in_flight: usize,
    version: u64,
    produced: usize,
    consumed: usize,
}

impl Board {
    fn new(participants: usize) -> Self {
        Self {
            buffer: VecDeque::new(),
            done: false,
            abandoned: false,
            parked: vec![false; participants],
            finished: vec![false; participants],
            wakes_in_flight: 0,
            version: 0,
            produced: 0,
            consumed: 0,
        }
    }

    fn parked_count(&self) -> usize {
        self.parked.iter().filter(|parked| **parked).count()
    }

    fn live(&self) -> Vec<usize> {
        (0..self.finished.len())
            .filter(|id| !self.finished[*id])
            .collect()
    }

    fn consumers_idle(&self) -> bool {
        (PRODUCER + 1..self.parked.len()).all(|id| self.finished[id] || self.parked[id])
            && self.wakes_in_flight == 0
    }

    /// Every live participant is parked and no wake-up is on its way.
    fn quiescent(&self) -> bool {
        let live = self.live();
        !live.is_empty() && live.iter().all(|id| self.parked[*id]) && self.wakes_in_flight == 0
    }
}

struct Shared {
    board: Mutex<Board>,
    changed: Condvar,
    policy: WakePolicy,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Board> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, board: &mut Board) {
        let parked = board.parked_count();
        board.wakes_in_flight = match self.policy {
            WakePolicy::Broadcast => parked,
            WakePolicy::Targeted => (board.wakes_in_flight + 1).min(parked),
        };
        self.policy.notify(&self.changed);
    }

    fn park<'a>(&self, mut board: MutexGuard<'a, Board>, id: usize) -> MutexGuard<'a, Board> {
        board.parked[id] = true;
        board.version += 1;

        let mut board = self
            .changed
            .wait(board)
            .unwrap_or_else(PoisonError::into_inner);

        board.parked[id] = false;
        board.wakes_in_flight = board.wakes_in_flight.saturating_sub(1);
        board.version += 1;
        board
    }

    fn produce(&self, items: usize, capacity: usize) -> MutexGuard<'_, Board> {
        for item in 0..items {
            let mut board = self.lock();
            while board.buffer.len() >= capacity && !board.abandoned {
                board = self.park(board, PRODUCER);
            }
            if board.abandoned {
                return board;
            }

            board.buffer.push_back(item);
            board.produced += 1;
            board.version += 1;
            self.notify(&mut board);
        }

        // Let consumers settle so the final signal is the one being observed.
        let mut board = loop {
            let board = self.lock();
            if board.abandoned || board.consumers_idle() {
                break board;
            }
            drop(board);
            thread::sleep(POLL_INTERVAL);
        };

        if !board.abandoned {
            board.done = true;
            board.version += 1;
            self.notify(&mut board);
        }
        board
    }

    fn consume(&self, id: usize, threshold: usize) -> MutexGuard<'_, Board> {
        let mut board = self.lock();
        loop {
            while board.buffer.len() <= threshold && !board.done && !board.abandoned {
                board = self.park(board, id);
            }
            if board.abandoned {
                return board;
            }

            if board.buffer.pop_front().is_none() {
                // Done and drained.
                return board;
            }
            board.consumed += 1;
            board.version += 1;
            self.notify(&mut board);
        }
    }

    fn finish(mut board: MutexGuard<'_, Board>, id: usize) {
        board.finished[id] = true;
        board.version += 1;
    }

    fn abandon(&self) {
        let mut board = self.lock();
        board.abandoned = true;
        board.version += 1;
        self.changed.notify_all();
    }
}

/// Runs one producer and one consumer per threshold on a shared condition
/// variable and reports whether anyone was left parked forever.
///
/// # Errors
///
/// Returns an error if `capacity` is zero or a participant cannot be spawned.
///
/// # Examples
///
/// ```
/// use foundation_sync::WakePolicy;
/// use foundation_testing::scenarios::{run_single_wake_scenario, SingleWakeConfig};
///
/// let report = run_single_wake_scenario(&SingleWakeConfig::new(WakePolicy::Broadcast))
///     .expect("scenario runs");
/// assert!(report.completed());
/// ```
pub fn run_single_wake_scenario(
    config: &SingleWakeConfig,
) -> Result<SingleWakeReport, BoxedError> {
    if config.capacity == 0 {
        return Err(ConfigurationError::ZeroCapacity.into());
    }

    let participants = config.thresholds.len() + 1;
    let shared = Arc::new(Shared {
        board: Mutex::new(Board::new(participants)),
        changed: Condvar::new(),
        policy: config.policy,
    });

    let _span = tracing::trace_span!(
        "single_wake",
        policy = ?config.policy,
        consumers = config.thresholds.len()
    )
    .entered();

    let mut workers: Vec<CompletionBarrier<()>> = Vec::with_capacity(participants);

    for (index, threshold) in config.thresholds.iter().copied().enumerate() {
        let id = index + 1;
        let shared_clone = Arc::clone(&shared);
        let consumer = CompletionBarrier::new();
        let started = consumer.start(move |_token| {
            Shared::finish(shared_clone.consume(id, threshold), id);
            Ok(())
        });
        if let Err(err) = started {
            shared.abandon();
            return Err(err.into());
        }
        workers.push(consumer);
    }

    let shared_clone = Arc::clone(&shared);
    let (items, capacity) = (config.items, config.capacity);
    let producer = CompletionBarrier::new();
    let started = producer.start(move |_token| {
        Shared::finish(shared_clone.produce(items, capacity), PRODUCER);
        Ok(())
    });
    if let Err(err) = started {
        shared.abandon();
        return Err(err.into());
    }
    workers.push(producer);

    let (stranded, settled) = supervise(&shared, config.budget);
    let (produced, consumed) = {
        let board = shared.lock();
        (board.produced, board.consumed)
    };

    shared.abandon();
    for worker in &workers {
        if worker.await_completion_timeout(config.budget).is_timed_out() {
            tracing::warn!("Single wake participant did not exit after release");
        }
    }

    let report = SingleWakeReport {
        policy: config.policy,
        items: config.items,
        produced,
        consumed,
        producer_stranded: stranded.contains(&PRODUCER),
        stranded_consumers: stranded
            .into_iter()
            .filter(|id| *id != PRODUCER)
            .map(|id| id - 1)
            .collect(),
        settled,
    };

    tracing::debug!(
        hazard = report.hazard_observed(),
        consumed = report.consumed,
        "Single wake scenario finished"
    );

    Ok(report)
}

/// Polls the board until every participant exits, the board is quiescent
/// for a full window, or the budget runs out.
///
/// Returns the stranded participant ids and whether the run settled.
fn supervise(shared: &Shared, budget: Duration) -> (Vec<usize>, bool) {
    let deadline = Instant::now().checked_add(budget);
    let mut stable_since: Option<(u64, Instant)> = None;

    loop {
        let board = shared.lock();
        let live = board.live();
        if live.is_empty() {
            return (Vec::new(), true);
        }

        if board.quiescent() {
            match stable_since {
                Some((version, since)) if version == board.version => {
                    if since.elapsed() >= QUIESCENCE_WINDOW {
                        return (live, true);
                    }
                }
                _ => stable_since = Some((board.version, Instant::now())),
            }
        } else {
            stable_since = None;
        }
        drop(board);

        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return (Vec::new(), false);
        }
        thread::sleep(POLL_INTERVAL);
    }
}
