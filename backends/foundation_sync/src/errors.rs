//! Error and failure types surfaced by the coordination primitives.
//!
//! Nothing in this crate logs an error and carries on: every failure path
//! returns one of these to the direct caller.

use std::fmt;
use std::sync::Arc;

use derive_more::From;
use thiserror::Error;

pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type ConfigResult<T> = std::result::Result<T, ConfigurationError>;

/// Invalid construction parameters or an unreadable configuration source.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("channel capacity must be at least 1")]
    ZeroCapacity,

    #[error("cancellation poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("could not read configuration: {0}")]
    IOError(#[from] std::io::Error),

    #[error("configuration is invalid due to: {0}")]
    DeserializationFailed(#[from] toml::de::Error),
}

/// Errors returned synchronously by [`crate::CompletionBarrier::start`].
#[derive(Debug, Error)]
pub enum BarrierError {
    /// `start` was called on a barrier that is no longer `Pending`.
    #[error("completion barrier was already started")]
    AlreadyStarted,

    /// The OS refused to spawn the work thread; the barrier is `Pending` again.
    #[error("could not spawn the work thread: {0}")]
    SpawnFailed(#[source] std::io::Error),
}

/// Failure returned by the blocking, timed and non-blocking `put` variants.
///
/// The rejected item is always handed back.
pub enum PutError<T> {
    /// The channel was full (`try_put` only).
    Full(T),
    /// The channel was closed before the item could be queued.
    Closed(T),
    /// The deadline passed with the channel still full; nothing changed.
    TimedOut(T),
}

impl<T> PutError<T> {
    /// Recovers the item that could not be queued.
    #[must_use]
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(item) | Self::Closed(item) | Self::TimedOut(item) => item,
        }
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }

    #[must_use]
    pub const fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }

    #[must_use]
    pub const fn is_full(&self) -> bool {
        matches!(self, Self::Full(_))
    }
}

impl<T> fmt::Debug for PutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(_) => f.write_str("Full(..)"),
            Self::Closed(_) => f.write_str("Closed(..)"),
            Self::TimedOut(_) => f.write_str("TimedOut(..)"),
        }
    }
}

impl<T> fmt::Display for PutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(_) => f.write_str("channel is full"),
            Self::Closed(_) => f.write_str("channel is closed"),
            Self::TimedOut(_) => f.write_str("timed out waiting for channel capacity"),
        }
    }
}

impl<T> std::error::Error for PutError<T> {}

/// Failure returned by the blocking, timed and non-blocking `take` variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TakeError {
    /// The channel was empty (`try_take` only).
    #[error("channel is empty")]
    Empty,

    /// The channel is closed and every queued item has been taken.
    #[error("channel is closed and drained")]
    Closed,

    /// The deadline passed with the channel still empty; nothing changed.
    #[error("timed out waiting for an item")]
    TimedOut,
}

/// What a unit of work returns instead of a value.
#[derive(Debug, From)]
pub enum WorkError {
    /// The work observed a cancellation request and stopped.
    #[from(ignore)]
    Cancelled,

    Failed(BoxedError),
}

impl WorkError {
    /// Wraps any error (or message) as a work failure.
    pub fn failed<E: Into<BoxedError>>(err: E) -> Self {
        Self::Failed(err.into())
    }
}

impl std::error::Error for WorkError {}

impl core::fmt::Display for WorkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Why a completion barrier ended in `Failed`.
///
/// Cloneable so every awaiter can receive its own copy.
#[derive(Debug, Clone, Error)]
pub enum FailureCause {
    #[error("work stopped after observing a cancellation request")]
    Cancelled,

    #[error("work failed: {0}")]
    Errored(Arc<dyn std::error::Error + Send + Sync + 'static>),

    #[error("work panicked: {0}")]
    Panicked(String),
}

impl FailureCause {
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<WorkError> for FailureCause {
    fn from(value: WorkError) -> Self {
        match value {
            WorkError::Cancelled => Self::Cancelled,
            WorkError::Failed(err) => Self::Errored(Arc::from(err)),
        }
    }
}

impl PartialEq for FailureCause {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Cancelled, Self::Cancelled) => true,
            (Self::Errored(a), Self::Errored(b)) => a.to_string() == b.to_string(),
            (Self::Panicked(a), Self::Panicked(b)) => a == b,
            _ => false,
        }
    }
}
