//! Recurring flush task.
//!
//! [`spawn_scheduler`] starts a tokio task that ticks every
//! [`FlushConfig::interval`]. Each tick spawns the cycle as its own task, so
//! a slow storage backend never delays tick delivery; an overlapping tick
//! then hits the flusher's cycle lock and is skipped.

use crate::config::{ConfigError, FlushConfig};
use crate::flush::{FlushReport, Flusher};
use crate::storage::ViewStorage;
use crate::store::EntityId;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Control handle for a running scheduler.
///
/// Dropping the handle stops the scheduler without a final flush.
#[must_use = "dropping the handle stops the scheduler"]
pub struct FlushHandle<K: EntityId, S: ViewStorage<K> + ?Sized> {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    flusher: Arc<Flusher<K, S>>,
    flush_on_shutdown: bool,
}

impl<K: EntityId, S: ViewStorage<K> + ?Sized + 'static> FlushHandle<K, S> {
    /// Stops the scheduler and, if configured, runs a final flush.
    ///
    /// The final flush waits for an in-flight cycle rather than skipping.
    /// Returns its report, or `None` when the final flush is disabled.
    pub async fn shutdown(self) -> Option<FlushReport> {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            warn!(
                "event=scheduler_stop module=flush status=error error={}",
                err
            );
        }
        if !self.flush_on_shutdown {
            return None;
        }
        Some(self.flusher.run_cycle_waiting().await)
    }

    /// Stops the scheduler immediately. Pending views stay in the store.
    pub fn abort(self) {
        self.task.abort();
    }

    /// Returns `true` once the scheduler loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawns the recurring flush task on the current tokio runtime.
///
/// The first cycle runs one full interval after start.
///
/// # Errors
///
/// Returns [`ConfigError`] if `config` does not validate.
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
pub fn spawn_scheduler<K, S>(
    flusher: Arc<Flusher<K, S>>,
    config: &FlushConfig,
) -> Result<FlushHandle<K, S>, ConfigError>
where
    K: EntityId,
    S: ViewStorage<K> + ?Sized + 'static,
{
    config.validate()?;
    Ok(spawn_validated(flusher, config))
}

/// Spawns the scheduler for a configuration that already passed
/// [`FlushConfig::validate`].
pub(crate) fn spawn_validated<K, S>(
    flusher: Arc<Flusher<K, S>>,
    config: &FlushConfig,
) -> FlushHandle<K, S>
where
    K: EntityId,
    S: ViewStorage<K> + ?Sized + 'static,
{
    let period = config.interval;
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let task_flusher = Arc::clone(&flusher);

    let task = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        ticker.tick().await;
        info!(
            "event=scheduler_start module=flush status=ok interval_ms={}",
            period.as_millis()
        );

        loop {
            tokio::select! {
                // Fires on shutdown and when the handle is dropped.
                _ = shutdown_rx.changed() => break,
                _ = ticker.tick() => {
                    let flusher = Arc::clone(&task_flusher);
                    tokio::spawn(async move {
                        flusher.run_cycle().await;
                    });
                }
            }
        }

        info!("event=scheduler_stop module=flush status=ok");
    });

    FlushHandle {
        shutdown: shutdown_tx,
        task,
        flusher,
        flush_on_shutdown: config.flush_on_shutdown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::TrackerStats;
    use crate::storage::memory::InMemoryStorage;
    use crate::storage::{StorageError, StorageResult};
    use crate::store::CounterStore;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// Holds every write until a permit is released.
    struct SlowWrites {
        inner: InMemoryStorage<&'static str>,
        gate: Semaphore,
    }

    #[async_trait]
    impl ViewStorage<&'static str> for SlowWrites {
        async fn exists(&self, id: &&'static str) -> StorageResult<bool> {
            self.inner.exists(id).await
        }

        async fn persisted_count(&self, id: &&'static str) -> StorageResult<u64> {
            self.inner.persisted_count(id).await
        }

        async fn add_to_persisted_count(
            &self,
            id: &&'static str,
            delta: u64,
        ) -> StorageResult<u64> {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|err| StorageError::Unavailable(err.to_string()))?;
            permit.forget();
            self.inner.add_to_persisted_count(id, delta).await
        }
    }

    struct Fixture {
        store: Arc<CounterStore<&'static str>>,
        storage: Arc<InMemoryStorage<&'static str>>,
        stats: Arc<TrackerStats>,
        flusher: Arc<Flusher<&'static str, InMemoryStorage<&'static str>>>,
    }

    fn fixture(config: &FlushConfig) -> Fixture {
        let store = Arc::new(CounterStore::new());
        let storage = Arc::new(InMemoryStorage::new());
        let stats = Arc::new(TrackerStats::new());
        let flusher = Arc::new(Flusher::new(
            Arc::clone(&store),
            Arc::clone(&storage),
            Arc::clone(&stats),
            config,
        ));
        Fixture {
            store,
            storage,
            stats,
            flusher,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_flushes_on_interval() {
        let config = FlushConfig::default();
        let f = fixture(&config);
        f.storage.insert("post-1", 10);
        let handle = spawn_scheduler(Arc::clone(&f.flusher), &config).unwrap();

        for _ in 0..3 {
            f.store.increment(&"post-1");
        }

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(f.storage.count(&"post-1"), Some(10));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(f.storage.count(&"post-1"), Some(13));
        assert_eq!(f.stats.cycles_completed(), 1);

        assert!(!handle.is_finished());
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_during_slow_cycle_is_skipped() {
        let config = FlushConfig::default().with_interval(Duration::from_secs(1));
        let inner = InMemoryStorage::new();
        inner.insert("post-1", 10);
        let storage = Arc::new(SlowWrites {
            inner,
            gate: Semaphore::new(0),
        });
        let store = Arc::new(CounterStore::new());
        let stats = Arc::new(TrackerStats::new());
        let flusher = Arc::new(Flusher::new(
            Arc::clone(&store),
            Arc::clone(&storage),
            Arc::clone(&stats),
            &config,
        ));
        let handle = spawn_scheduler(Arc::clone(&flusher), &config).unwrap();

        for _ in 0..3 {
            store.increment(&"post-1");
        }

        // The tick at 1s starts a cycle that blocks on the write; the tick at
        // 2s finds it still running.
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(flusher.is_running());
        assert!(stats.cycles_skipped() >= 1);
        assert_eq!(stats.cycles_completed(), 0);

        storage.gate.add_permits(1);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(stats.cycles_completed(), 1);
        assert_eq!(storage.inner.write_calls(), 1);
        assert_eq!(storage.inner.count(&"post-1"), Some(13));
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_runs_final_flush() {
        let config = FlushConfig::default();
        let f = fixture(&config);
        f.storage.insert("post-1", 0);
        let handle = spawn_scheduler(Arc::clone(&f.flusher), &config).unwrap();

        f.store.increment_by(&"post-1", 7);
        let report = handle.shutdown().await.unwrap();

        assert_eq!(report.views_persisted, 7);
        assert_eq!(f.storage.count(&"post-1"), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_without_final_flush() {
        let config = FlushConfig::default().with_flush_on_shutdown(false);
        let f = fixture(&config);
        f.storage.insert("post-1", 0);
        let handle = spawn_scheduler(Arc::clone(&f.flusher), &config).unwrap();

        f.store.increment(&"post-1");
        assert!(handle.shutdown().await.is_none());

        assert_eq!(f.storage.count(&"post-1"), Some(0));
        assert_eq!(f.store.peek_delta(&"post-1"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_scheduler() {
        let config = FlushConfig::default().with_interval(Duration::from_secs(1));
        let f = fixture(&config);
        f.storage.insert("post-1", 0);
        let handle = spawn_scheduler(Arc::clone(&f.flusher), &config).unwrap();
        drop(handle);

        f.store.increment(&"post-1");
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(f.stats.cycles_completed(), 0);
        assert_eq!(f.storage.count(&"post-1"), Some(0));
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let config = FlushConfig::default().with_interval(Duration::ZERO);
        let f = fixture(&config);
        let result = spawn_scheduler(Arc::clone(&f.flusher), &config);
        assert!(matches!(result, Err(ConfigError::ZeroInterval)));
    }
}
