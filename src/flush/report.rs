//! Results of a flush cycle.

use std::time::Duration;

/// What one completed flush cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlushReport {
    /// Identifiers in the snapshot taken at cycle start.
    pub scanned: usize,
    /// Identifiers whose drained views were written.
    pub persisted: usize,
    /// Total views written.
    pub views_persisted: u64,
    /// Entries dropped because the entity no longer exists.
    pub removed: usize,
    /// Idle entries evicted.
    pub evicted: usize,
    /// Identifiers whose flush failed and will be retried.
    pub failed: usize,
    /// Views put back into the store after a failed write.
    pub views_recredited: u64,
    /// Wall time spent in the cycle.
    pub elapsed: Duration,
}

/// Outcome of asking for a flush cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The cycle ran.
    Completed(FlushReport),
    /// Another cycle was in progress; nothing was drained.
    Skipped,
}

impl FlushOutcome {
    /// Returns `true` if the cycle was skipped.
    pub fn is_skipped(&self) -> bool {
        matches!(self, FlushOutcome::Skipped)
    }

    /// The report of a completed cycle.
    pub fn report(&self) -> Option<&FlushReport> {
        match self {
            FlushOutcome::Completed(report) => Some(report),
            FlushOutcome::Skipped => None,
        }
    }

    /// Consumes the outcome, returning the report of a completed cycle.
    pub fn into_report(self) -> Option<FlushReport> {
        match self {
            FlushOutcome::Completed(report) => Some(report),
            FlushOutcome::Skipped => None,
        }
    }
}
