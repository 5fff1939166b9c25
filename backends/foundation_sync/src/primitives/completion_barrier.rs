//! Completion barrier for one unit of concurrent work.
//!
//! ```text
//!  Pending --start()--> Running --(work returns Ok)-------------> Completed
//!                          |----(work returns Err / panics)-----> Failed
//!                          |----(work observes cancellation)----> Failed(Cancelled)
//!                          '----(awaiter times out)-------------> Running (unchanged)
//! ```
//!
//! Terminal states are absorbing. Only the spawned work thread moves the
//! barrier out of `Running`; any number of threads may await it and all of
//! them are released together when it finishes.
//!
//! Cancellation is cooperative. [`CompletionBarrier::request_cancellation`]
//! raises a flag the work polls through its [`CancellationToken`]. If the work
//! returns a value before it next looks at the flag the outcome is
//! `Completed`: that race is inherent to cooperative cancellation and is
//! reported as-is. No thread is ever killed.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::BarrierConfig;
use crate::errors::{BarrierError, ConfigResult, FailureCause, WorkError};
use crate::primitives::monitor::{self, CondVar, CondVarMutex};
use crate::primitives::{AtomicCounter, VisibilityFlag};

static NEXT_BARRIER_ID: AtomicCounter = AtomicCounter::new(0);

/// Lifecycle of a [`CompletionBarrier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarrierState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl BarrierState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Terminal result of a unit of work.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Completed(T),
    Failed(FailureCause),
}

impl<T> Outcome<T> {
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Returns `true` when the work stopped because it observed cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Failed(FailureCause::Cancelled))
    }

    /// # Errors
    ///
    /// Returns the [`FailureCause`] of a failed outcome.
    pub fn into_result(self) -> Result<T, FailureCause> {
        match self {
            Self::Completed(value) => Ok(value),
            Self::Failed(cause) => Err(cause),
        }
    }
}

/// Result of a bounded wait on a [`CompletionBarrier`].
///
/// `TimedOut` is local to the awaiting caller: the barrier and its work are
/// left exactly as they were.
#[derive(Debug, Clone, PartialEq)]
pub enum AwaitTimeoutResult<T> {
    Ready(Outcome<T>),
    TimedOut,
}

impl<T> AwaitTimeoutResult<T> {
    #[must_use]
    pub const fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }

    #[must_use]
    pub fn into_outcome(self) -> Option<Outcome<T>> {
        match self {
            Self::Ready(outcome) => Some(outcome),
            Self::TimedOut => None,
        }
    }
}

/// The work's view of a cancellation request.
#[derive(Clone)]
pub struct CancellationToken {
    flag: Arc<VisibilityFlag>,
    poll_interval: Duration,
}

impl CancellationToken {
    /// Returns `true` once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.get()
    }

    /// A cancellation point for `?`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkError::Cancelled`] if cancellation has been requested.
    pub fn checkpoint(&self) -> Result<(), WorkError> {
        if self.is_cancelled() {
            return Err(WorkError::Cancelled);
        }
        Ok(())
    }

    /// Sleeps for `duration` in slices of the poll interval, checking for
    /// cancellation between slices.
    ///
    /// # Errors
    ///
    /// Returns [`WorkError::Cancelled`] as soon as a request is observed.
    pub fn sleep(&self, duration: Duration) -> Result<(), WorkError> {
        let deadline = Instant::now().checked_add(duration);

        loop {
            self.checkpoint()?;

            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(());
                    }
                    self.poll_interval.min(deadline - now)
                }
                None => self.poll_interval,
            };
            thread::sleep(slice);
        }
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

/// Lets any number of threads wait for one unit of work to finish.
///
/// Cloning yields another handle to the same barrier.
///
/// # Examples
///
/// ```
/// use foundation_sync::{CompletionBarrier, Outcome};
/// use std::time::Duration;
///
/// let barrier = CompletionBarrier::new();
/// barrier
///     .start(|token| {
///         token.sleep(Duration::from_millis(50))?;
///         Ok("done")
///     })
///     .unwrap();
///
/// // Bounded wait first, then wait for the real result.
/// let early = barrier.await_completion_timeout(Duration::from_millis(1));
/// assert!(early.is_timed_out());
/// assert_eq!(barrier.await_completion(), Outcome::Completed("done"));
/// ```
pub struct CompletionBarrier<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    id: i64,
    slot: CondVarMutex<Slot<T>>,
    finished: CondVar,
    cancel_requested: Arc<VisibilityFlag>,
    config: BarrierConfig,
}

struct Slot<T> {
    state: BarrierState,
    outcome: Option<Outcome<T>>,
}

impl<T> CompletionBarrier<T> {
    /// Creates a `Pending` barrier with the default [`BarrierConfig`].
    #[must_use]
    pub fn new() -> Self {
        Self::build(BarrierConfig::new())
    }

    /// Creates a `Pending` barrier with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns the configuration's validation error.
    pub fn with_config(config: BarrierConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: BarrierConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: NEXT_BARRIER_ID.increment_and_get(),
                slot: CondVarMutex::new(Slot {
                    state: BarrierState::Pending,
                    outcome: None,
                }),
                finished: CondVar::new(),
                cancel_requested: Arc::new(VisibilityFlag::new(false)),
                config,
            }),
        }
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BarrierState {
        monitor::lock(&self.inner.slot).state
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    #[must_use]
    pub fn is_cancellation_requested(&self) -> bool {
        self.inner.cancel_requested.get()
    }

    /// Asks the running work to stop.
    ///
    /// Best effort: the work must observe the request through its
    /// [`CancellationToken`]. Requests against a finished barrier are ignored;
    /// requests against a `Pending` barrier are seen as soon as it starts.
    pub fn request_cancellation(&self) {
        let guard = monitor::lock(&self.inner.slot);
        if guard.state.is_terminal() {
            tracing::trace!(barrier = self.inner.id, "Ignoring cancellation of finished barrier");
            return;
        }
        self.inner.cancel_requested.set(true);
        drop(guard);

        tracing::debug!(barrier = self.inner.id, "Cancellation requested");
    }

    fn token(&self) -> CancellationToken {
        CancellationToken {
            flag: Arc::clone(&self.inner.cancel_requested),
            poll_interval: self.inner.config.get_cancellation_poll_interval(),
        }
    }
}

impl<T: Send + 'static> CompletionBarrier<T> {
    /// Moves the barrier to `Running` and runs `work` on a new thread.
    ///
    /// # Errors
    ///
    /// Returns [`BarrierError::AlreadyStarted`] if the barrier is not
    /// `Pending`, or [`BarrierError::SpawnFailed`] if no thread could be
    /// spawned (the barrier is `Pending` again in that case).
    pub fn start<F>(&self, work: F) -> Result<(), BarrierError>
    where
        F: FnOnce(&CancellationToken) -> Result<T, WorkError> + Send + 'static,
    {
        let span = tracing::trace_span!("CompletionBarrier::start", barrier = self.inner.id);
        let _enter = span.enter();

        {
            let mut guard = monitor::lock(&self.inner.slot);
            if guard.state != BarrierState::Pending {
                return Err(BarrierError::AlreadyStarted);
            }
            guard.state = BarrierState::Running;
        }

        let inner = Arc::clone(&self.inner);
        let token = self.token();
        let spawned = thread::Builder::new()
            .name(format!("completion_barrier_{}", self.inner.id))
            .spawn(move || inner.run(work, &token));

        if let Err(err) = spawned {
            tracing::warn!("Could not spawn work thread: {err}");
            monitor::lock(&self.inner.slot).state = BarrierState::Pending;
            return Err(BarrierError::SpawnFailed(err));
        }

        tracing::debug!("Started completion barrier");
        Ok(())
    }
}

impl<T: Clone> CompletionBarrier<T> {
    /// Blocks until the work finishes and returns its outcome.
    ///
    /// Blocks forever on a barrier that is never started.
    #[must_use]
    pub fn await_completion(&self) -> Outcome<T> {
        let mut guard = monitor::lock(&self.inner.slot);
        loop {
            if let Some(outcome) = &guard.outcome {
                return outcome.clone();
            }
            guard = monitor::wait(&self.inner.finished, guard);
        }
    }

    /// Blocks at most `timeout` for the work to finish.
    ///
    /// Timing out changes nothing: the work keeps running and a later await
    /// still receives its outcome.
    #[must_use]
    pub fn await_completion_timeout(&self, timeout: Duration) -> AwaitTimeoutResult<T> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return AwaitTimeoutResult::Ready(self.await_completion());
        };

        let mut guard = monitor::lock(&self.inner.slot);
        loop {
            if let Some(outcome) = &guard.outcome {
                return AwaitTimeoutResult::Ready(outcome.clone());
            }
            let Ok(next) = monitor::wait_until(&self.inner.finished, guard, deadline) else {
                tracing::debug!(barrier = self.inner.id, "Timed out awaiting completion");
                return AwaitTimeoutResult::TimedOut;
            };
            guard = next;
        }
    }

    /// [`CompletionBarrier::await_completion_timeout`] with the configured
    /// default timeout, or an unbounded wait when none is configured.
    #[must_use]
    pub fn await_timed(&self) -> AwaitTimeoutResult<T> {
        match self.inner.config.get_default_timeout() {
            Some(timeout) => self.await_completion_timeout(timeout),
            None => AwaitTimeoutResult::Ready(self.await_completion()),
        }
    }

    /// Returns the outcome if the work has already finished, without blocking.
    #[must_use]
    pub fn try_outcome(&self) -> Option<Outcome<T>> {
        monitor::lock(&self.inner.slot).outcome.clone()
    }
}

impl<T> Inner<T> {
    fn run<F>(&self, work: F, token: &CancellationToken)
    where
        F: FnOnce(&CancellationToken) -> Result<T, WorkError>,
    {
        let span = tracing::trace_span!("CompletionBarrier::run", barrier = self.id);
        let _enter = span.enter();

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| work(token))) {
            Ok(Ok(value)) => Outcome::Completed(value),
            Ok(Err(err)) => Outcome::Failed(FailureCause::from(err)),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!("Work panicked: {message}");
                Outcome::Failed(FailureCause::Panicked(message))
            }
        };

        self.finish(outcome);
    }

    fn finish(&self, outcome: Outcome<T>) {
        let state = match &outcome {
            Outcome::Completed(_) => BarrierState::Completed,
            Outcome::Failed(_) => BarrierState::Failed,
        };

        let mut guard = monitor::lock(&self.slot);
        guard.state = state;
        guard.outcome = Some(outcome);
        drop(guard);

        tracing::debug!(barrier = self.id, ?state, "Completion barrier finished");
        self.finished.notify_all();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("non-string panic payload")
    }
}

impl<T> Default for CompletionBarrier<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CompletionBarrier<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for CompletionBarrier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionBarrier")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("cancellation_requested", &self.is_cancellation_requested())
            .finish_non_exhaustive()
    }
}
