//! Live tracker statistics and their serializable snapshot.
//!
//! [`TrackerStats`] is updated from two places: request handlers bump
//! `views_recorded` on every view (hence the sharded [`Tally`]), and the
//! flusher records the outcome of each cycle. [`StatsSnapshot`] is the
//! point-in-time view handed to observers.

use crate::flush::FlushReport;
use crate::tally::Tally;
use atomic_time::AtomicOptionInstant;
use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Cumulative counters describing tracker activity.
pub struct TrackerStats {
    views_recorded: Tally,
    cycles_completed: AtomicU64,
    cycles_skipped: AtomicU64,
    views_persisted: AtomicU64,
    entities_removed: AtomicU64,
    entries_evicted: AtomicU64,
    flush_failures: AtomicU64,
    views_recredited: AtomicU64,
    last_flush: AtomicOptionInstant,
}

impl TrackerStats {
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self {
            views_recorded: Tally::new(),
            cycles_completed: AtomicU64::new(0),
            cycles_skipped: AtomicU64::new(0),
            views_persisted: AtomicU64::new(0),
            entities_removed: AtomicU64::new(0),
            entries_evicted: AtomicU64::new(0),
            flush_failures: AtomicU64::new(0),
            views_recredited: AtomicU64::new(0),
            last_flush: AtomicOptionInstant::none(),
        }
    }

    #[inline]
    pub(crate) fn record_view(&self) {
        self.views_recorded.add(1);
    }

    pub(crate) fn record_skip(&self) {
        self.cycles_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cycle(&self, report: &FlushReport) {
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
        self.views_persisted
            .fetch_add(report.views_persisted, Ordering::Relaxed);
        self.entities_removed
            .fetch_add(report.removed as u64, Ordering::Relaxed);
        self.entries_evicted
            .fetch_add(report.evicted as u64, Ordering::Relaxed);
        self.flush_failures
            .fetch_add(report.failed as u64, Ordering::Relaxed);
        self.views_recredited
            .fetch_add(report.views_recredited, Ordering::Relaxed);
        self.last_flush.store(Some(Instant::now()), Ordering::Relaxed);
    }

    /// Total views recorded since start.
    pub fn views_recorded(&self) -> u64 {
        self.views_recorded.get()
    }

    /// Number of cycles that ran to completion.
    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed.load(Ordering::Relaxed)
    }

    /// Number of cycles skipped because another was in progress.
    pub fn cycles_skipped(&self) -> u64 {
        self.cycles_skipped.load(Ordering::Relaxed)
    }

    /// Instant of the last completed cycle.
    pub fn last_flush(&self) -> Option<Instant> {
        self.last_flush.load(Ordering::Relaxed)
    }

    /// Captures the counters together with the store's live gauges.
    ///
    /// Fields are read one by one; concurrent updates may land between reads.
    pub fn snapshot(&self, pending_entries: u64, pending_views: u64) -> StatsSnapshot {
        StatsSnapshot {
            views_recorded: self.views_recorded.get(),
            pending_entries,
            pending_views,
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            cycles_skipped: self.cycles_skipped.load(Ordering::Relaxed),
            views_persisted: self.views_persisted.load(Ordering::Relaxed),
            entities_removed: self.entities_removed.load(Ordering::Relaxed),
            entries_evicted: self.entries_evicted.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
            views_recredited: self.views_recredited.load(Ordering::Relaxed),
            last_flush_age_ms: self
                .last_flush()
                .map(|at| at.elapsed().as_millis() as u64),
        }
    }
}

impl Default for TrackerStats {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for TrackerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackerStats")
            .field("views_recorded", &self.views_recorded())
            .field("cycles_completed", &self.cycles_completed())
            .field("cycles_skipped", &self.cycles_skipped())
            .finish_non_exhaustive()
    }
}

/// Whether a metric only ever grows or can go up and down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Monotonically increasing.
    Counter,
    /// Current level.
    Gauge,
}

/// A point-in-time capture of [`TrackerStats`] plus live store gauges.
///
/// # Examples
///
/// ```rust
/// use visite::stats::{MetricKind, StatsSnapshot};
///
/// let snapshot = StatsSnapshot {
///     views_recorded: 12,
///     pending_views: 4,
///     ..StatsSnapshot::default()
/// };
///
/// let (_, value, kind) = snapshot
///     .metrics()
///     .into_iter()
///     .find(|(name, _, _)| *name == "pending_views")
///     .unwrap();
/// assert_eq!(value, 4);
/// assert_eq!(kind, MetricKind::Gauge);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatsSnapshot {
    /// Views recorded since start.
    pub views_recorded: u64,
    /// Identifiers currently tracked by the store.
    pub pending_entries: u64,
    /// Views recorded but not yet persisted.
    pub pending_views: u64,
    /// Flush cycles completed.
    pub cycles_completed: u64,
    /// Flush cycles skipped due to overlap.
    pub cycles_skipped: u64,
    /// Views written to durable storage.
    pub views_persisted: u64,
    /// Entries dropped because their entity was deleted.
    pub entities_removed: u64,
    /// Idle entries evicted.
    pub entries_evicted: u64,
    /// Per-identifier flush failures.
    pub flush_failures: u64,
    /// Views put back into the store after a failed write.
    pub views_recredited: u64,
    /// Milliseconds since the last completed flush, if any.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub last_flush_age_ms: Option<u64>,
}

impl StatsSnapshot {
    /// Flattens the snapshot into `(name, value, kind)` triples.
    ///
    /// `last_flush_age_ms` is omitted when no flush has completed.
    pub fn metrics(&self) -> Vec<(&'static str, u64, MetricKind)> {
        let mut metrics = vec![
            ("views_recorded", self.views_recorded, MetricKind::Counter),
            ("pending_entries", self.pending_entries, MetricKind::Gauge),
            ("pending_views", self.pending_views, MetricKind::Gauge),
            ("cycles_completed", self.cycles_completed, MetricKind::Counter),
            ("cycles_skipped", self.cycles_skipped, MetricKind::Counter),
            ("views_persisted", self.views_persisted, MetricKind::Counter),
            ("entities_removed", self.entities_removed, MetricKind::Counter),
            ("entries_evicted", self.entries_evicted, MetricKind::Counter),
            ("flush_failures", self.flush_failures, MetricKind::Counter),
            ("views_recredited", self.views_recredited, MetricKind::Counter),
        ];
        if let Some(age) = self.last_flush_age_ms {
            metrics.push(("last_flush_age_ms", age, MetricKind::Gauge));
        }
        metrics
    }
}
