//! Per-entity pending view deltas.
//!
//! [`CounterStore`] maps an entity identifier to the number of views recorded
//! since that entity's last successful flush. It never holds authoritative
//! counts: the durable total lives in the storage collaborator, and the
//! store only layers a transient delta on top of it.
//!
//! # Concurrency
//!
//! Entries live in a [`DashMap`], so identifiers hashing to different shards
//! never contend. Within an entry, the delta is an [`AtomicU64`]:
//!
//! - `increment` is a `fetch_add` performed while holding the entry's shard
//!   guard; it never waits on I/O.
//! - `drain_and_reset` is a single `swap(0)`. An increment racing with it is
//!   either included in the swapped-out value or lands on the zeroed counter.
//!   It is never lost and never claimed by two drains.
//! - `evict_if_idle` checks for zero and removes under the shard's write lock,
//!   which excludes any in-flight increment on the same identifier.

use dashmap::DashMap;
use std::fmt::{self, Debug, Display};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

/// Bounds required of an entity identifier.
///
/// Blanket-implemented; `&'static str`, `String`, integer ids and UUID types
/// all qualify.
pub trait EntityId: Eq + Hash + Clone + Display + Send + Sync + 'static {}

impl<T> EntityId for T where T: Eq + Hash + Clone + Display + Send + Sync + 'static {}

/// Concurrent accumulator of unflushed view increments.
///
/// # Examples
///
/// ```rust
/// use visite::store::CounterStore;
///
/// let store = CounterStore::new();
/// store.increment(&"post-1");
/// store.increment(&"post-1");
/// assert_eq!(store.peek_delta(&"post-1"), 2);
///
/// // Claim the pending views for persistence.
/// assert_eq!(store.drain_and_reset(&"post-1"), 2);
/// assert_eq!(store.peek_delta(&"post-1"), 0);
/// ```
pub struct CounterStore<K: EntityId> {
    deltas: DashMap<K, AtomicU64>,
}

impl<K: EntityId> CounterStore<K> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            deltas: DashMap::new(),
        }
    }

    /// Creates an empty store sized for `capacity` identifiers.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            deltas: DashMap::with_capacity(capacity),
        }
    }

    /// Records one view, returning the pending delta after the add.
    #[inline]
    pub fn increment(&self, id: &K) -> u64 {
        self.increment_by(id, 1)
    }

    /// Adds `amount` to the pending delta in one atomic step.
    ///
    /// Creates the entry if absent. Also used to re-credit a drained amount
    /// whose persistence failed.
    pub fn increment_by(&self, id: &K, amount: u64) -> u64 {
        // Fast path: existing entry, shard read lock only.
        if let Some(delta) = self.deltas.get(id) {
            return delta.fetch_add(amount, Ordering::AcqRel) + amount;
        }
        self.deltas
            .entry(id.clone())
            .or_default()
            .fetch_add(amount, Ordering::AcqRel)
            + amount
    }

    /// Returns the pending delta without claiming it, 0 if untracked.
    #[inline]
    pub fn peek_delta(&self, id: &K) -> u64 {
        self.deltas
            .get(id)
            .map(|delta| delta.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    /// Atomically reads the pending delta and resets it to zero.
    ///
    /// The entry itself is kept. Returns 0 for an untracked identifier.
    pub fn drain_and_reset(&self, id: &K) -> u64 {
        self.deltas
            .get(id)
            .map(|delta| delta.swap(0, Ordering::AcqRel))
            .unwrap_or(0)
    }

    /// Point-in-time copy of the tracked identifiers.
    ///
    /// Identifiers added after the snapshot is taken are picked up by the
    /// next caller; no lock is held once this returns.
    pub fn list_known_ids(&self) -> Vec<K> {
        self.deltas.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Removes an entry, returning the pending delta it still held.
    pub fn remove(&self, id: &K) -> Option<u64> {
        self.deltas
            .remove(id)
            .map(|(_, delta)| delta.into_inner())
    }

    /// Removes the entry only if its delta is zero.
    ///
    /// Returns `true` if the entry was evicted.
    pub fn evict_if_idle(&self, id: &K) -> bool {
        self.deltas
            .remove_if(id, |_, delta| delta.load(Ordering::Acquire) == 0)
            .is_some()
    }

    /// Returns `true` if the identifier has an entry (possibly zero).
    pub fn contains(&self, id: &K) -> bool {
        self.deltas.contains_key(id)
    }

    /// Number of tracked identifiers.
    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    /// Returns `true` if no identifier is tracked.
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// Sum of all pending deltas. Not atomic across entries.
    pub fn pending_total(&self) -> u64 {
        self.deltas
            .iter()
            .map(|entry| entry.value().load(Ordering::Relaxed))
            .sum()
    }
}

impl<K: EntityId> Default for CounterStore<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: EntityId> Debug for CounterStore<K> {
    /// Formats as `CounterStore{ id:delta ... }`, omitting zero entries.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CounterStore{{")?;
        for entry in self.deltas.iter() {
            let val = entry.value().load(Ordering::Relaxed);
            if val != 0 {
                write!(f, " {}:{}", entry.key(), val)?;
            }
        }
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_increment_creates_entry() {
        let store = CounterStore::new();
        assert!(!store.contains(&"post-1"));
        assert_eq!(store.increment(&"post-1"), 1);
        assert!(store.contains(&"post-1"));
        assert_eq!(store.increment(&"post-1"), 2);
        assert_eq!(store.peek_delta(&"post-1"), 2);
    }

    #[test]
    fn test_with_capacity_starts_empty() {
        let store: CounterStore<u64> = CounterStore::with_capacity(128);
        assert!(store.is_empty());
        store.increment(&7);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_peek_untracked_is_zero() {
        let store: CounterStore<&str> = CounterStore::new();
        assert_eq!(store.peek_delta(&"missing"), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_drain_resets_but_keeps_entry() {
        let store = CounterStore::new();
        store.increment_by(&"post-1", 3);

        assert_eq!(store.drain_and_reset(&"post-1"), 3);
        assert_eq!(store.peek_delta(&"post-1"), 0);
        assert!(store.contains(&"post-1"));

        // second drain with no intervening views claims nothing
        assert_eq!(store.drain_and_reset(&"post-1"), 0);
    }

    #[test]
    fn test_drain_untracked_is_zero() {
        let store: CounterStore<u64> = CounterStore::new();
        assert_eq!(store.drain_and_reset(&42), 0);
        assert!(!store.contains(&42));
    }

    #[test]
    fn test_remove_returns_pending() {
        let store = CounterStore::new();
        store.increment_by(&"post-1", 4);
        assert_eq!(store.remove(&"post-1"), Some(4));
        assert_eq!(store.remove(&"post-1"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_evict_if_idle() {
        let store = CounterStore::new();
        store.increment(&"busy");
        store.increment(&"idle");
        store.drain_and_reset(&"idle");

        assert!(!store.evict_if_idle(&"busy"));
        assert!(store.evict_if_idle(&"idle"));
        assert!(store.contains(&"busy"));
        assert!(!store.contains(&"idle"));
    }

    #[test]
    fn test_list_known_ids_is_snapshot() {
        let store = CounterStore::new();
        store.increment(&"a");
        store.increment(&"b");

        let mut ids = store.list_known_ids();
        store.increment(&"c");
        ids.sort();

        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_pending_total() {
        let store = CounterStore::new();
        store.increment_by(&"a", 2);
        store.increment_by(&"b", 5);
        assert_eq!(store.pending_total(), 7);
    }

    #[test]
    fn test_debug_skips_zero_entries() {
        let store = CounterStore::new();
        store.increment_by(&"hot", 9);
        store.increment(&"cold");
        store.drain_and_reset(&"cold");

        let debug_str = format!("{:?}", store);
        assert!(debug_str.contains("hot:9"));
        assert!(!debug_str.contains("cold"));
    }

    #[test]
    fn test_concurrent_increments() {
        let store = Arc::new(CounterStore::new());
        let mut handles = vec![];

        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    store.increment(&"post-1");
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.peek_delta(&"post-1"), 8000);
    }

    #[test]
    fn test_concurrent_drain_loses_nothing() {
        let store = Arc::new(CounterStore::new());
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..5000 {
                        store.increment(&"post-1");
                    }
                })
            })
            .collect();

        let drainer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut claimed = 0;
                for _ in 0..500 {
                    claimed += store.drain_and_reset(&"post-1");
                    thread::yield_now();
                }
                claimed
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        let claimed = drainer.join().unwrap();

        assert_eq!(claimed + store.peek_delta(&"post-1"), 20_000);
    }

    #[test]
    fn test_concurrent_evict_loses_nothing() {
        let store = Arc::new(CounterStore::new());
        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..10_000 {
                    store.increment(&"post-1");
                }
            })
        };

        let evictor = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut claimed = 0;
                for _ in 0..1000 {
                    claimed += store.drain_and_reset(&"post-1");
                    store.evict_if_idle(&"post-1");
                }
                claimed
            })
        };

        writer.join().unwrap();
        let claimed = evictor.join().unwrap();

        assert_eq!(claimed + store.peek_delta(&"post-1"), 10_000);
    }
}
