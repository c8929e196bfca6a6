//! Flush scheduling configuration.

use std::time::Duration;
use thiserror::Error;

/// Default flush period: five minutes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Invalid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A zero flush interval would spin the scheduler.
    #[error("flush interval must be greater than zero")]
    ZeroInterval,
}

/// How and when pending views are flushed.
///
/// With the `serde` feature the interval is (de)serialized as whole seconds
/// under `interval_secs`, and every field is optional:
///
/// ```rust,ignore
/// let config: FlushConfig = serde_json::from_str(r#"{ "interval_secs": 60 }"#)?;
/// assert_eq!(config.interval, Duration::from_secs(60));
/// assert!(config.evict_idle);
/// ```
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use visite::config::FlushConfig;
///
/// let config = FlushConfig::default()
///     .with_interval(Duration::from_secs(30))
///     .with_evict_idle(false);
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.interval, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FlushConfig {
    /// Time between scheduled flush cycles.
    #[cfg_attr(
        feature = "serde",
        serde(rename = "interval_secs", with = "duration_secs")
    )]
    pub interval: Duration,
    /// Drop entries that saw no views since the previous flush.
    pub evict_idle: bool,
    /// Run one last flush when the scheduler is shut down gracefully.
    pub flush_on_shutdown: bool,
}

impl FlushConfig {
    /// Sets the flush interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Enables or disables eviction of idle entries.
    pub fn with_evict_idle(mut self, evict_idle: bool) -> Self {
        self.evict_idle = evict_idle;
        self
    }

    /// Enables or disables the final flush on graceful shutdown.
    pub fn with_flush_on_shutdown(mut self, flush_on_shutdown: bool) -> Self {
        self.flush_on_shutdown = flush_on_shutdown;
        self
    }

    /// Checks the configuration for values the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_FLUSH_INTERVAL,
            evict_idle: true,
            flush_on_shutdown: true,
        }
    }
}

#[cfg(feature = "serde")]
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FlushConfig::default();
        assert_eq!(config.interval, Duration::from_secs(300));
        assert!(config.evict_idle);
        assert!(config.flush_on_shutdown);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = FlushConfig::default().with_interval(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::ZeroInterval));
    }

    #[test]
    fn test_builders() {
        let config = FlushConfig::default()
            .with_interval(Duration::from_millis(250))
            .with_evict_idle(false)
            .with_flush_on_shutdown(false);
        assert_eq!(config.interval, Duration::from_millis(250));
        assert!(!config.evict_idle);
        assert!(!config.flush_on_shutdown);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_partial() {
        let config: FlushConfig = serde_json::from_str(r#"{ "interval_secs": 60 }"#).unwrap();
        assert_eq!(config.interval, Duration::from_secs(60));
        assert!(config.evict_idle);
        assert!(config.flush_on_shutdown);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serialize_interval_as_secs() {
        let json = serde_json::to_string(&FlushConfig::default()).unwrap();
        assert!(json.contains(r#""interval_secs":300"#));
    }
}
