//! Sharded monotone tally for hot-path statistics.
//!
//! Every recorded view bumps a process-wide statistic. A single atomic would
//! make every request handler thread fight over one cache line, so [`Tally`]
//! spreads updates across [`NUM_SHARDS`] cache-padded slots and sums them on
//! read.
//!
//! # Thread Slot Assignment
//!
//! ```text
//!                          ┌─────────────────────────────────────┐
//!                          │               Tally                 │
//!                          ├─────────────────────────────────────┤
//!   Thread 0 ──writes──►   │ [Slot 0] ████████ (CachePadded)     │
//!   Thread 1 ──writes──►   │ [Slot 1] ████████ (CachePadded)     │
//!        ...               │    ...                              │
//!   Thread 63 ─writes──►   │ [Slot 63] ███████ (CachePadded)     │
//!                          └─────────────────────────────────────┘
//!                                          │
//!                                          ▼
//!                                    get() sums all
//!                                    slots on read
//! ```
//!
//! Slots are handed out round-robin on a thread's first update and stay fixed
//! for the thread's lifetime. After 64 threads the assignment wraps around.

use crossbeam_utils::CachePadded;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Number of shards per tally (64 slots × 64 bytes = 4KB).
pub const NUM_SHARDS: usize = 64;

static NEXT_SLOT_ID: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static THREAD_SLOT_INDEX: usize = next_slot_id();
}

fn next_slot_id() -> usize {
    NEXT_SLOT_ID.fetch_add(1, Ordering::Relaxed) % NUM_SHARDS
}

/// A monotone counter using sharded atomic storage.
///
/// Writes are a single relaxed `fetch_add` on the calling thread's slot.
/// Reads iterate all slots, so [`Tally::get`] is not a linearizable snapshot
/// under concurrent writes; it never reports less than the adds that
/// completed before the read began.
///
/// # Examples
///
/// ```rust
/// use visite::tally::Tally;
/// use std::sync::Arc;
/// use std::thread;
///
/// let tally = Arc::new(Tally::new());
/// let mut handles = vec![];
///
/// for _ in 0..4 {
///     let t = Arc::clone(&tally);
///     handles.push(thread::spawn(move || {
///         for _ in 0..1000 {
///             t.add(1);
///         }
///     }));
/// }
///
/// for h in handles {
///     h.join().unwrap();
/// }
///
/// assert_eq!(tally.get(), 4000);
/// ```
pub struct Tally {
    shards: [CachePadded<AtomicU64>; NUM_SHARDS],
}

impl Tally {
    /// Creates a tally initialized to zero.
    pub const fn new() -> Self {
        const ZERO: CachePadded<AtomicU64> = CachePadded::new(AtomicU64::new(0));
        Tally {
            shards: [ZERO; NUM_SHARDS],
        }
    }

    #[inline]
    fn local_shard(&self) -> &AtomicU64 {
        THREAD_SLOT_INDEX.with(|idx| &self.shards[*idx])
    }

    /// Adds `value` to the current thread's shard.
    #[inline]
    pub fn add(&self, value: u64) {
        self.local_shard().fetch_add(value, Ordering::Relaxed);
    }

    /// Returns this thread's contribution to the total.
    #[inline]
    pub fn local(&self) -> u64 {
        self.local_shard().load(Ordering::Relaxed)
    }

    /// Sums all shards.
    #[inline]
    pub fn get(&self) -> u64 {
        self.shards
            .iter()
            .map(|shard| shard.load(Ordering::Relaxed))
            .sum()
    }
}

impl Default for Tally {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Tally {
    /// Formats the non-zero shards as `Tally{ [slot]:value ... }`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tally{{")?;
        for (i, shard) in self.shards.iter().enumerate() {
            let val = shard.load(Ordering::Relaxed);
            if val != 0 {
                write!(f, " [{i}]:{val}")?;
            }
        }
        write!(f, " }}")
    }
}
