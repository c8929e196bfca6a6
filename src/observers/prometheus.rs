//! Prometheus observer built on the official `prometheus` crate.
//!
//! Each render registers the snapshot's metrics in a fresh
//! [`Registry`](prometheus::Registry) and encodes it with
//! [`TextEncoder`](prometheus::TextEncoder). Metrics marked
//! [`MetricKind::Counter`] become `IntCounter`s; gauges become `IntGauge`s.
//!
//! # Feature Flag
//!
//! ```toml
//! [dependencies]
//! visite = { version = "0.1", features = ["prometheus"] }
//! ```
//!
//! # Examples
//!
//! ```rust
//! use visite::observers::prometheus::PrometheusObserver;
//! use visite::stats::StatsSnapshot;
//!
//! let snapshot = StatsSnapshot {
//!     views_recorded: 100,
//!     ..StatsSnapshot::default()
//! };
//!
//! let output = PrometheusObserver::new()
//!     .with_namespace("blog")
//!     .render(&snapshot)
//!     .unwrap();
//!
//! assert!(output.contains("# TYPE blog_views_recorded counter"));
//! assert!(output.contains("blog_views_recorded 100"));
//! ```

use super::{PrometheusError, Result};
use crate::stats::{MetricKind, StatsSnapshot};
use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::collections::HashMap;

/// Renders a [`StatsSnapshot`] in Prometheus exposition format.
#[derive(Debug, Clone, Default)]
pub struct PrometheusObserver {
    namespace: Option<String>,
    subsystem: Option<String>,
    const_labels: HashMap<String, String>,
}

impl PrometheusObserver {
    /// Creates an observer with no namespace and no labels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the namespace (prefix) for all metrics.
    ///
    /// Namespace "blog" + metric "views_recorded" = "blog_views_recorded".
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    /// Sets the subsystem, placed between namespace and metric name.
    pub fn with_subsystem(mut self, subsystem: &str) -> Self {
        self.subsystem = Some(subsystem.to_string());
        self
    }

    /// Adds a constant label to all metrics.
    pub fn with_const_label(mut self, name: &str, value: &str) -> Self {
        self.const_labels
            .insert(name.to_string(), value.to_string());
        self
    }

    /// Renders the snapshot to exposition text.
    ///
    /// # Errors
    ///
    /// Returns an error if a namespace, subsystem or label name is not a
    /// valid Prometheus identifier, or if encoding fails.
    pub fn render(&self, snapshot: &StatsSnapshot) -> Result<String> {
        let registry = Registry::new();

        for (name, value, kind) in snapshot.metrics() {
            let opts = self.opts(name);
            match kind {
                MetricKind::Counter => {
                    let counter = IntCounter::with_opts(opts)?;
                    counter.inc_by(value);
                    registry.register(Box::new(counter))?;
                }
                MetricKind::Gauge => {
                    let gauge = IntGauge::with_opts(opts)?;
                    gauge.set(i64::try_from(value).unwrap_or(i64::MAX));
                    registry.register(Box::new(gauge))?;
                }
            }
        }

        encode_registry(&registry)
    }

    /// Renders the snapshot to bytes, ready for an HTTP response body.
    pub fn render_bytes(&self, snapshot: &StatsSnapshot) -> Result<Vec<u8>> {
        Ok(self.render(snapshot)?.into_bytes())
    }

    fn opts(&self, name: &str) -> Opts {
        let mut opts = Opts::new(name, help_for(name)).const_labels(self.const_labels.clone());
        if let Some(namespace) = &self.namespace {
            opts = opts.namespace(namespace.clone());
        }
        if let Some(subsystem) = &self.subsystem {
            opts = opts.subsystem(subsystem.clone());
        }
        opts
    }
}

fn help_for(name: &str) -> &'static str {
    match name {
        "views_recorded" => "Views recorded since start",
        "pending_entries" => "Identifiers currently tracked in memory",
        "pending_views" => "Views recorded but not yet persisted",
        "cycles_completed" => "Flush cycles completed",
        "cycles_skipped" => "Flush cycles skipped because another was running",
        "views_persisted" => "Views written to durable storage",
        "entities_removed" => "Pending entries dropped because the entity was deleted",
        "entries_evicted" => "Idle pending entries evicted",
        "flush_failures" => "Per-identifier flush failures",
        "views_recredited" => "Views put back after a failed write",
        "last_flush_age_ms" => "Milliseconds since the last completed flush",
        _ => "view tracker metric",
    }
}

fn encode_registry(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| PrometheusError::Encode(e.to_string()))?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> StatsSnapshot {
        StatsSnapshot {
            views_recorded: 120,
            pending_entries: 4,
            pending_views: 9,
            cycles_completed: 3,
            views_persisted: 111,
            ..StatsSnapshot::default()
        }
    }

    #[test]
    fn test_render_types() {
        let output = PrometheusObserver::new().render(&snapshot()).unwrap();

        assert!(output.contains("# TYPE views_recorded counter"));
        assert!(output.contains("views_recorded 120"));
        assert!(output.contains("# TYPE pending_views gauge"));
        assert!(output.contains("pending_views 9"));
        assert!(output.contains("# HELP views_persisted Views written to durable storage"));
    }

    #[test]
    fn test_render_omits_missing_flush_age() {
        let output = PrometheusObserver::new().render(&snapshot()).unwrap();
        assert!(!output.contains("last_flush_age_ms"));

        let flushed = StatsSnapshot {
            last_flush_age_ms: Some(250),
            ..snapshot()
        };
        let output = PrometheusObserver::new().render(&flushed).unwrap();
        assert!(output.contains("last_flush_age_ms 250"));
    }

    #[test]
    fn test_render_with_namespace_and_subsystem() {
        let output = PrometheusObserver::new()
            .with_namespace("blog")
            .with_subsystem("posts")
            .render(&snapshot())
            .unwrap();

        assert!(output.contains("blog_posts_cycles_completed 3"));
    }

    #[test]
    fn test_render_with_const_label() {
        let output = PrometheusObserver::new()
            .with_const_label("instance", "web-1")
            .render(&snapshot())
            .unwrap();

        assert!(output.contains(r#"views_recorded{instance="web-1"} 120"#));
    }

    #[test]
    fn test_render_is_repeatable() {
        let observer = PrometheusObserver::new();
        let first = observer.render(&snapshot()).unwrap();
        let second = observer.render(&snapshot()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_namespace_is_error() {
        let result = PrometheusObserver::new()
            .with_namespace("not a namespace")
            .render(&snapshot());
        assert!(result.is_err());
    }

    #[test]
    fn test_render_bytes() {
        let bytes = PrometheusObserver::new().render_bytes(&snapshot()).unwrap();
        assert!(!bytes.is_empty());
    }
}
