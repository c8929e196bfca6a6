//! Best-effort current counts for display.
//!
//! `current_count(id) = storage.persisted_count(id) + store.peek_delta(id)`
//!
//! The two reads are not taken atomically. If a flush persists a drained
//! delta between them, the result is off by at most that one delta, in
//! either direction. Views that completed before the call began are never
//! missing from both sides.

use crate::storage::{StorageResult, ViewStorage};
use crate::store::{CounterStore, EntityId};
use std::marker::PhantomData;
use std::sync::Arc;

/// Blends durable counts with pending deltas.
pub struct ReadComposer<K: EntityId, S: ViewStorage<K> + ?Sized> {
    store: Arc<CounterStore<K>>,
    storage: Arc<S>,
    _id: PhantomData<fn(K)>,
}

impl<K: EntityId, S: ViewStorage<K> + ?Sized> ReadComposer<K, S> {
    /// Creates a composer over a shared store and storage.
    pub fn new(store: Arc<CounterStore<K>>, storage: Arc<S>) -> Self {
        Self {
            store,
            storage,
            _id: PhantomData,
        }
    }

    /// Persisted count plus pending delta.
    ///
    /// A `NotFound` from storage is returned unchanged.
    pub async fn current_count(&self, id: &K) -> StorageResult<u64> {
        let persisted = self.storage.persisted_count(id).await?;
        Ok(persisted + self.store.peek_delta(id))
    }
}

impl<K: EntityId, S: ViewStorage<K> + ?Sized> Clone for ReadComposer<K, S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            storage: Arc::clone(&self.storage),
            _id: PhantomData,
        }
    }
}
