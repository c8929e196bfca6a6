//! Reconciliation of pending deltas into durable storage.
//!
//! A [`Flusher`] sweeps the [`CounterStore`] once per cycle:
//!
//! ```text
//!   list_known_ids() ──► for each id (independently):
//!                          exists? ── no ──► remove(id)
//!                            │ yes
//!                            ▼
//!                          drain_and_reset(id) ── 0 ──► evict_if_idle(id)
//!                            │ n > 0
//!                            ▼
//!                          add_to_persisted_count(id, n)
//!                            │ error or cancelled
//!                            ▼
//!                          increment_by(id, n)   (re-credit, retried next cycle)
//! ```
//!
//! The drained amount is held by a guard until the write succeeds, so a cycle
//! future dropped mid-write (a caller timeout, an aborted task) puts its
//! views back instead of losing them.
//!
//! Failures are isolated per identifier and never abort the sweep. Only one
//! cycle runs at a time: [`Flusher::run_cycle`] takes the cycle lock with
//! `try_lock` and reports [`FlushOutcome::Skipped`] if it is held.
//!
//! The recurring timer lives in [`scheduler`].

mod report;
pub mod scheduler;

pub use report::{FlushOutcome, FlushReport};

use crate::config::FlushConfig;
use crate::stats::TrackerStats;
use crate::storage::ViewStorage;
use crate::store::{CounterStore, EntityId};
use log::{debug, info, warn};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// Drains the counter store into durable storage, one cycle at a time.
pub struct Flusher<K: EntityId, S: ViewStorage<K> + ?Sized> {
    store: Arc<CounterStore<K>>,
    storage: Arc<S>,
    stats: Arc<TrackerStats>,
    evict_idle: bool,
    cycle_lock: Mutex<()>,
    _id: PhantomData<fn(K)>,
}

impl<K: EntityId, S: ViewStorage<K> + ?Sized> Flusher<K, S> {
    /// Creates a flusher over a shared store and storage.
    pub fn new(
        store: Arc<CounterStore<K>>,
        storage: Arc<S>,
        stats: Arc<TrackerStats>,
        config: &FlushConfig,
    ) -> Self {
        Self {
            store,
            storage,
            stats,
            evict_idle: config.evict_idle,
            cycle_lock: Mutex::new(()),
            _id: PhantomData,
        }
    }

    /// Returns `true` while a cycle holds the cycle lock.
    pub fn is_running(&self) -> bool {
        self.cycle_lock.try_lock().is_err()
    }

    /// Runs one cycle unless another is already in progress.
    pub async fn run_cycle(&self) -> FlushOutcome {
        let _guard = match self.cycle_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                self.stats.record_skip();
                warn!("event=flush_cycle module=flush status=skipped reason=cycle_in_progress");
                return FlushOutcome::Skipped;
            }
        };
        FlushOutcome::Completed(self.sweep().await)
    }

    /// Waits for any in-flight cycle to finish, then runs one more.
    ///
    /// Used on graceful shutdown, where skipping would strand pending views.
    pub async fn run_cycle_waiting(&self) -> FlushReport {
        let _guard = self.cycle_lock.lock().await;
        self.sweep().await
    }

    async fn sweep(&self) -> FlushReport {
        let started_at = Instant::now();
        let ids = self.store.list_known_ids();
        info!(
            "event=flush_cycle module=flush status=start tracked={}",
            ids.len()
        );

        let mut report = FlushReport {
            scanned: ids.len(),
            ..FlushReport::default()
        };
        for id in &ids {
            self.flush_one(id, &mut report).await;
        }
        report.elapsed = started_at.elapsed();

        self.stats.record_cycle(&report);
        info!(
            "event=flush_cycle module=flush status=ok duration_ms={} scanned={} persisted={} views={} removed={} evicted={} failed={} recredited={}",
            report.elapsed.as_millis(),
            report.scanned,
            report.persisted,
            report.views_persisted,
            report.removed,
            report.evicted,
            report.failed,
            report.views_recredited
        );
        report
    }

    async fn flush_one(&self, id: &K, report: &mut FlushReport) {
        match self.storage.exists(id).await {
            Ok(true) => {}
            Ok(false) => {
                let dropped = self.store.remove(id).unwrap_or(0);
                report.removed += 1;
                debug!(
                    "event=flush_entity module=flush status=removed id={} dropped={}",
                    id, dropped
                );
                return;
            }
            Err(err) => {
                // Nothing drained yet; the entry stays as is.
                report.failed += 1;
                warn!(
                    "event=flush_entity module=flush status=error stage=exists id={} error={}",
                    id, err
                );
                return;
            }
        }

        let drained = self.store.drain_and_reset(id);
        if drained == 0 {
            if self.evict_idle && self.store.evict_if_idle(id) {
                report.evicted += 1;
                debug!("event=flush_entity module=flush status=evicted id={}", id);
            }
            return;
        }

        let pending = Drained {
            store: &self.store,
            id,
            amount: drained,
        };
        match self.storage.add_to_persisted_count(id, drained).await {
            Ok(total) => {
                pending.disarm();
                report.persisted += 1;
                report.views_persisted += drained;
                debug!(
                    "event=flush_entity module=flush status=ok id={} views={} total={}",
                    id, drained, total
                );
            }
            Err(err) => {
                drop(pending);
                report.failed += 1;
                report.views_recredited += drained;
                warn!(
                    "event=flush_entity module=flush status=error stage=persist id={} recredited={} error={}",
                    id, drained, err
                );
            }
        }
    }
}

/// A drained amount not yet persisted. Dropping it re-credits the store.
struct Drained<'a, K: EntityId> {
    store: &'a CounterStore<K>,
    id: &'a K,
    amount: u64,
}

impl<K: EntityId> Drained<'_, K> {
    /// The write went through; nothing to give back.
    fn disarm(mut self) {
        self.amount = 0;
    }
}

impl<K: EntityId> Drop for Drained<'_, K> {
    fn drop(&mut self) {
        if self.amount > 0 {
            self.store.increment_by(self.id, self.amount);
            debug!(
                "event=flush_entity module=flush status=recredited id={} views={}",
                self.id, self.amount
            );
        }
    }
}
