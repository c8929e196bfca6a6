//! In-process [`ViewStorage`] backed by a concurrent map.
//!
//! Besides serving as a real backend for single-process use, it can simulate
//! outages and per-entity write failures so flush recovery paths can be
//! exercised without a database.

use crate::storage::{StorageError, StorageResult, ViewStorage};
use crate::store::EntityId;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Map-backed storage with failure injection.
///
/// # Examples
///
/// ```rust
/// use visite::storage::memory::InMemoryStorage;
///
/// let storage = InMemoryStorage::new();
/// storage.insert("post-1", 10);
/// assert_eq!(storage.count(&"post-1"), Some(10));
///
/// storage.delete(&"post-1");
/// assert_eq!(storage.count(&"post-1"), None);
/// ```
pub struct InMemoryStorage<K: EntityId> {
    counts: DashMap<K, u64>,
    failing_writes: DashMap<K, u32>,
    available: AtomicBool,
    write_calls: AtomicU64,
}

impl<K: EntityId> InMemoryStorage<K> {
    /// Creates an empty, available storage.
    pub fn new() -> Self {
        Self {
            counts: DashMap::new(),
            failing_writes: DashMap::new(),
            available: AtomicBool::new(true),
            write_calls: AtomicU64::new(0),
        }
    }

    /// Creates or overwrites an entity with the given persisted count.
    pub fn insert(&self, id: K, count: u64) {
        self.counts.insert(id, count);
    }

    /// Deletes an entity.
    pub fn delete(&self, id: &K) -> Option<u64> {
        self.counts.remove(id).map(|(_, count)| count)
    }

    /// Persisted count, bypassing availability checks.
    pub fn count(&self, id: &K) -> Option<u64> {
        self.counts.get(id).map(|count| *count)
    }

    /// When `false`, every call fails with [`StorageError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Makes the next `times` writes for `id` fail with
    /// [`StorageError::Unavailable`].
    pub fn fail_next_writes(&self, id: K, times: u32) {
        self.failing_writes.insert(id, times);
    }

    /// Number of `add_to_persisted_count` calls received, failed ones included.
    pub fn write_calls(&self) -> u64 {
        self.write_calls.load(Ordering::Relaxed)
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StorageError::Unavailable("storage offline".to_string()))
        }
    }

    fn take_injected_failure(&self, id: &K) -> bool {
        let taken = match self.failing_writes.get_mut(id) {
            Some(mut remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        };
        self.failing_writes.remove_if(id, |_, remaining| *remaining == 0);
        taken
    }
}

impl<K: EntityId> Default for InMemoryStorage<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K: EntityId> ViewStorage<K> for InMemoryStorage<K> {
    async fn exists(&self, id: &K) -> StorageResult<bool> {
        self.check_available()?;
        Ok(self.counts.contains_key(id))
    }

    async fn persisted_count(&self, id: &K) -> StorageResult<u64> {
        self.check_available()?;
        self.count(id).ok_or_else(|| StorageError::not_found(id))
    }

    async fn add_to_persisted_count(&self, id: &K, delta: u64) -> StorageResult<u64> {
        self.write_calls.fetch_add(1, Ordering::Relaxed);
        self.check_available()?;
        if self.take_injected_failure(id) {
            return Err(StorageError::Unavailable(format!(
                "injected write failure for {id}"
            )));
        }
        let mut count = self
            .counts
            .get_mut(id)
            .ok_or_else(|| StorageError::not_found(id))?;
        *count += delta;
        Ok(*count)
    }
}
