//! JSON observer for tracker statistics.
//!
//! # Feature Flag
//!
//! This module requires the `json` feature:
//!
//! ```toml
//! [dependencies]
//! visite = { version = "0.1", features = ["json"] }
//! ```
//!
//! # Examples
//!
//! ```rust
//! use visite::observers::json::JsonObserver;
//! use visite::stats::StatsSnapshot;
//!
//! let snapshot = StatsSnapshot {
//!     views_recorded: 1000,
//!     pending_views: 5,
//!     ..StatsSnapshot::default()
//! };
//!
//! let json = JsonObserver::new().to_json(&snapshot).unwrap();
//! assert!(json.contains(r#""views_recorded":1000"#));
//! assert!(json.contains(r#""pending_views":5"#));
//! ```

use super::Result;
use crate::stats::StatsSnapshot;
use serde::Serialize;

/// A snapshot stamped with the wall-clock time it was rendered.
#[derive(Debug, Serialize)]
struct StampedSnapshot<'a> {
    timestamp_ms: u64,
    #[serde(flatten)]
    stats: &'a StatsSnapshot,
}

/// Configuration for the JSON observer.
#[derive(Debug, Clone, Default)]
pub struct JsonConfig {
    /// Whether to pretty-print the JSON output.
    pub pretty: bool,
    /// Whether to add a `timestamp_ms` field (milliseconds since Unix epoch).
    pub include_timestamp: bool,
}

/// Serializes a [`StatsSnapshot`] to JSON.
///
/// ```rust
/// use visite::observers::json::JsonObserver;
///
/// let observer = JsonObserver::new().pretty(true).include_timestamp(true);
/// ```
#[derive(Debug, Clone, Default)]
pub struct JsonObserver {
    config: JsonConfig,
}

impl JsonObserver {
    /// Creates a new JSON observer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new JSON observer with the specified configuration.
    pub fn with_config(config: JsonConfig) -> Self {
        Self { config }
    }

    /// Enables or disables pretty-printing.
    pub fn pretty(mut self, enabled: bool) -> Self {
        self.config.pretty = enabled;
        self
    }

    /// Enables or disables the render timestamp.
    pub fn include_timestamp(mut self, enabled: bool) -> Self {
        self.config.include_timestamp = enabled;
        self
    }

    /// Serializes the snapshot to a JSON string.
    pub fn to_json(&self, snapshot: &StatsSnapshot) -> Result<String> {
        let json = if self.config.include_timestamp {
            let stamped = StampedSnapshot {
                timestamp_ms: current_timestamp_ms(),
                stats: snapshot,
            };
            self.encode(&stamped)?
        } else {
            self.encode(snapshot)?
        };
        Ok(json)
    }

    /// Serializes the snapshot to a JSON byte vector.
    pub fn to_json_bytes(&self, snapshot: &StatsSnapshot) -> Result<Vec<u8>> {
        Ok(self.to_json(snapshot)?.into_bytes())
    }

    fn encode<T: Serialize>(&self, value: &T) -> serde_json::Result<String> {
        if self.config.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
    }
}

fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
