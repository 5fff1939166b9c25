//! Configuration surface for the coordination primitives.
//!
//! Only three knobs exist: channel capacity, default timeouts and the
//! cancellation poll granularity. Configuration can be built in code with the
//! `const fn` builders or loaded from TOML:
//!
//! ```toml
//! [channel]
//! capacity = 8
//! wake_policy = "broadcast"
//! default_timeout_ms = 250
//!
//! [barrier]
//! cancellation_poll_interval_ms = 5
//! default_timeout_ms = 1000
//! ```

use core::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};

use crate::errors::{ConfigResult, ConfigurationError};
use crate::primitives::WakePolicy;

/// Default channel capacity when none is configured.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Default slice length used by [`crate::CancellationToken::sleep`].
pub const DEFAULT_CANCELLATION_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration for a [`crate::BoundedChannel`].
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Maximum number of queued items, must be at least 1
    capacity: usize,
    /// How producers and consumers wake each other
    wake_policy: WakePolicy,
    /// Timeout used by `put_timed` / `take_timed`
    #[serde(rename = "default_timeout_ms")]
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    default_timeout: Option<Duration>,
}

impl ChannelConfig {
    /// Creates a channel configuration with default values.
    ///
    /// Defaults:
    /// - `capacity`: 16
    /// - `wake_policy`: `Broadcast`
    /// - `default_timeout`: None (block indefinitely)
    #[must_use]
    pub const fn new() -> Self {
        Self {
            capacity: DEFAULT_CHANNEL_CAPACITY,
            wake_policy: WakePolicy::Broadcast,
            default_timeout: None,
        }
    }

    /// Sets the channel capacity.
    #[must_use]
    pub const fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the wake policy.
    ///
    /// See [`WakePolicy::Targeted`] for its precondition.
    #[must_use]
    pub const fn wake_policy(mut self, policy: WakePolicy) -> Self {
        self.wake_policy = policy;
        self
    }

    /// Sets the timeout used by the `*_timed` operations.
    #[must_use]
    pub const fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub const fn get_capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub const fn get_wake_policy(&self) -> WakePolicy {
        self.wake_policy
    }

    #[must_use]
    pub const fn get_default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Checks the configuration can build a channel.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ZeroCapacity`] when capacity is 0.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.capacity == 0 {
            return Err(ConfigurationError::ZeroCapacity);
        }
        Ok(())
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for a [`crate::CompletionBarrier`].
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BarrierConfig {
    /// Slice length for cooperative sleeps inside the work
    #[serde(rename = "cancellation_poll_interval_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    cancellation_poll_interval: Duration,
    /// Timeout used by `await_timed`
    #[serde(rename = "default_timeout_ms")]
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    default_timeout: Option<Duration>,
}

impl BarrierConfig {
    /// Creates a barrier configuration with default values.
    ///
    /// Defaults:
    /// - `cancellation_poll_interval`: 10ms
    /// - `default_timeout`: None (block indefinitely)
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cancellation_poll_interval: DEFAULT_CANCELLATION_POLL_INTERVAL,
            default_timeout: None,
        }
    }

    #[must_use]
    pub const fn cancellation_poll_interval(mut self, interval: Duration) -> Self {
        self.cancellation_poll_interval = interval;
        self
    }

    #[must_use]
    pub const fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub const fn get_cancellation_poll_interval(&self) -> Duration {
        self.cancellation_poll_interval
    }

    #[must_use]
    pub const fn get_default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// # Errors
    ///
    /// Returns [`ConfigurationError::ZeroPollInterval`] for a zero interval.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.cancellation_poll_interval.is_zero() {
            return Err(ConfigurationError::ZeroPollInterval);
        }
        Ok(())
    }
}

impl Default for BarrierConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Top-level configuration grouping both monitors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    pub channel: ChannelConfig,
    pub barrier: BarrierConfig,
}

impl SyncConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::DeserializationFailed`] for malformed
    /// TOML, or the validation error of either section.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::IOError`] when the file cannot be read,
    /// otherwise the same errors as [`SyncConfig::from_toml_str`].
    pub fn from_path<V: Into<std::path::PathBuf>>(target: V) -> ConfigResult<Self> {
        let config: Self = from_path(target)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns the first invalid section's error.
    pub fn validate(&self) -> ConfigResult<()> {
        self.channel.validate()?;
        self.barrier.validate()
    }
}

/// Deserializes any TOML-backed type from a file path, without validation.
///
/// # Errors
///
/// Returns [`ConfigurationError::IOError`] or
/// [`ConfigurationError::DeserializationFailed`].
pub fn from_path<T, V>(target: V) -> ConfigResult<T>
where
    T: DeserializeOwned,
    V: Into<std::path::PathBuf>,
{
    let target_path = target.into();
    let config_content = std::fs::read_to_string(target_path)?;
    let config_obj: T = toml::from_str(&config_content)?;
    Ok(config_obj)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// WHY: Validates defaults match the documented values
    /// WHAT: `new()` and `default()` agree and are valid
    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.channel.get_capacity(), DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.channel.get_wake_policy(), WakePolicy::Broadcast);
        assert_eq!(config.channel.get_default_timeout(), None);
        assert_eq!(
            config.barrier.get_cancellation_poll_interval(),
            DEFAULT_CANCELLATION_POLL_INTERVAL
        );
        assert!(config.validate().is_ok());
    }

    /// WHY: Capacity zero is a configuration error, never a runtime hang
    /// WHAT: `validate()` rejects capacity 0
    #[test]
    fn test_zero_capacity_rejected() {
        let config = ChannelConfig::new().capacity(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::ZeroCapacity)
        ));
    }

    /// WHY: A zero poll interval would turn cooperative sleeps into spins
    /// WHAT: `validate()` rejects a zero interval
    #[test]
    fn test_zero_poll_interval_rejected() {
        let config = BarrierConfig::new().cancellation_poll_interval(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::ZeroPollInterval)
        ));
    }

    /// WHY: Validates TOML loading with millisecond durations
    /// WHAT: All fields parse into the expected values
    #[test]
    fn test_from_toml_str() {
        let config = SyncConfig::from_toml_str(
            r#"
            [channel]
            capacity = 8
            wake_policy = "targeted"
            default_timeout_ms = 250

            [barrier]
            cancellation_poll_interval_ms = 5
            default_timeout_ms = 1000
            "#,
        )
        .unwrap();

        assert_eq!(config.channel.get_capacity(), 8);
        assert_eq!(config.channel.get_wake_policy(), WakePolicy::Targeted);
        assert_eq!(
            config.channel.get_default_timeout(),
            Some(Duration::from_millis(250))
        );
        assert_eq!(
            config.barrier.get_cancellation_poll_interval(),
            Duration::from_millis(5)
        );
        assert_eq!(
            config.barrier.get_default_timeout(),
            Some(Duration::from_secs(1))
        );
    }

    /// WHY: Missing sections fall back to defaults
    /// WHAT: An empty document yields `SyncConfig::default()`
    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = SyncConfig::from_toml_str("").unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    /// WHY: Loaded configuration is validated, not just parsed
    /// WHAT: capacity = 0 in TOML surfaces `ZeroCapacity`
    #[test]
    fn test_from_toml_str_validates() {
        let result = SyncConfig::from_toml_str("[channel]\ncapacity = 0\n");
        assert!(matches!(result, Err(ConfigurationError::ZeroCapacity)));
    }

    /// WHY: Malformed documents must report a deserialization error
    /// WHAT: A string capacity fails with `DeserializationFailed`
    #[test]
    fn test_from_toml_str_malformed() {
        let result = SyncConfig::from_toml_str("[channel]\ncapacity = \"lots\"\n");
        assert!(matches!(
            result,
            Err(ConfigurationError::DeserializationFailed(_))
        ));
    }

    /// WHY: Missing files surface as IO errors
    /// WHAT: `from_path` on a nonexistent path fails with IOError
    #[test]
    fn test_from_path_missing_file() {
        let result = SyncConfig::from_path("/nonexistent/foundation_sync/config.toml");
        assert!(matches!(result, Err(ConfigurationError::IOError(_))));
    }

    /// WHY: Validates loading from an actual file
    /// WHAT: A written file round-trips through `from_path`
    #[test]
    fn test_from_path_reads_file() {
        let path = std::env::temp_dir().join(format!(
            "foundation_sync_config_{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[channel]\ncapacity = 3\n").unwrap();

        let config = SyncConfig::from_path(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.channel.get_capacity(), 3);
    }
}
