//! Request-facing facade over the view-count subsystem.
//!
//! A [`ViewTracker`] bundles the counter store, read composer, flusher and
//! statistics behind the handful of calls a request handler needs. It is
//! cheap to clone; every clone shares the same state.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use visite::config::FlushConfig;
//! use visite::storage::memory::InMemoryStorage;
//! use visite::tracker::ViewTracker;
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! # rt.block_on(async {
//! let storage = Arc::new(InMemoryStorage::new());
//! storage.insert("post-1", 10);
//!
//! let tracker = ViewTracker::new(storage, FlushConfig::default()).unwrap();
//! tracker.record_view(&"post-1");
//! tracker.record_view(&"post-1");
//! tracker.record_view(&"post-1");
//!
//! assert_eq!(tracker.display_count(&"post-1").await.unwrap(), 13);
//!
//! tracker.flush_now().await;
//! assert_eq!(tracker.store().peek_delta(&"post-1"), 0);
//! assert_eq!(tracker.display_count(&"post-1").await.unwrap(), 13);
//! # });
//! ```

use crate::composer::ReadComposer;
use crate::config::{ConfigError, FlushConfig};
use crate::flush::scheduler::{spawn_validated, FlushHandle};
use crate::flush::{FlushOutcome, Flusher};
use crate::stats::{StatsSnapshot, TrackerStats};
use crate::storage::{StorageResult, ViewStorage};
use crate::store::{CounterStore, EntityId};
use log::trace;
use std::sync::Arc;

/// Records views and serves display counts for one entity kind.
pub struct ViewTracker<K: EntityId, S: ViewStorage<K> + ?Sized> {
    store: Arc<CounterStore<K>>,
    storage: Arc<S>,
    composer: ReadComposer<K, S>,
    flusher: Arc<Flusher<K, S>>,
    stats: Arc<TrackerStats>,
    config: FlushConfig,
}

impl<K: EntityId, S: ViewStorage<K> + ?Sized + 'static> ViewTracker<K, S> {
    /// Creates a tracker over `storage`.
    ///
    /// No background task is started; call [`ViewTracker::start`] for that.
    pub fn new(storage: Arc<S>, config: FlushConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let store = Arc::new(CounterStore::new());
        let stats = Arc::new(TrackerStats::new());
        let composer = ReadComposer::new(Arc::clone(&store), Arc::clone(&storage));
        let flusher = Arc::new(Flusher::new(
            Arc::clone(&store),
            Arc::clone(&storage),
            Arc::clone(&stats),
            &config,
        ));

        Ok(Self {
            store,
            storage,
            composer,
            flusher,
            stats,
            config,
        })
    }

    /// Records one view. Never waits on storage.
    #[inline]
    pub fn record_view(&self, id: &K) {
        let pending = self.store.increment(id);
        self.stats.record_view();
        trace!("event=record_view module=tracker id={} pending={}", id, pending);
    }

    /// Best-effort current count: persisted plus pending.
    pub async fn display_count(&self, id: &K) -> StorageResult<u64> {
        self.composer.current_count(id).await
    }

    /// Records a view on an entity known to storage and returns the new count.
    ///
    /// The persisted count is read first, so an unknown entity fails with
    /// `NotFound` and no view is recorded.
    pub async fn record_view_counted(&self, id: &K) -> StorageResult<u64> {
        let persisted = self.storage.persisted_count(id).await?;
        let pending = self.store.increment(id);
        self.stats.record_view();
        trace!("event=record_view module=tracker id={} pending={}", id, pending);
        Ok(persisted + pending)
    }

    /// Runs one flush cycle now, unless one is already running.
    pub async fn flush_now(&self) -> FlushOutcome {
        self.flusher.run_cycle().await
    }

    /// Starts the periodic flush on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start(&self) -> FlushHandle<K, S> {
        spawn_validated(Arc::clone(&self.flusher), &self.config)
    }

    /// Counter store shared by this tracker.
    pub fn store(&self) -> &CounterStore<K> {
        &self.store
    }

    /// Flush configuration in effect.
    pub fn config(&self) -> &FlushConfig {
        &self.config
    }

    /// Current statistics, including live store gauges.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats
            .snapshot(self.store.len() as u64, self.store.pending_total())
    }
}

impl<K: EntityId, S: ViewStorage<K> + ?Sized> Clone for ViewTracker<K, S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            storage: Arc::clone(&self.storage),
            composer: self.composer.clone(),
            flusher: Arc::clone(&self.flusher),
            stats: Arc::clone(&self.stats),
            config: self.config.clone(),
        }
    }
}
