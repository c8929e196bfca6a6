//! # Visite - Write-Behind View Counters
//!
//! A small library for counting page views (or any other "hit") on entities
//! whose durable count lives in a database, without touching the database on
//! every request.
//!
//! ## The Problem
//!
//! Incrementing a row on every page view turns the hottest read path of a
//! blog or forum into a write path. Each view becomes a round trip and a row
//! lock, and popular posts serialize all of their readers on that one row.
//!
//! ## The Solution: Write-Behind Deltas
//!
//! Views are recorded as in-memory **deltas** per entity identifier. A
//! background task periodically **drains** each delta and adds it to the
//! persisted count in a single write.
//!
//! ```text
//!   request ──► record_view(id) ──► CounterStore  (delta += 1, no I/O)
//!                                        │
//!                      every interval    │ drain_and_reset(id)
//!                                        ▼
//!                                    Flusher ──► ViewStorage::add_to_persisted_count(id, n)
//!
//!   display ──► display_count(id) = persisted_count(id) + peek_delta(id)
//! ```
//!
//! ### Guarantees
//!
//! 1. **No lost views**: a delta is drained with an atomic swap, and a failed
//!    write puts the drained amount back. Views recorded during a flush land
//!    in the next one.
//!
//! 2. **Bounded staleness**: durable counts lag by at most one interval
//!    (5 minutes by default) plus the time a cycle takes.
//!
//! 3. **Single flusher**: cycles never overlap; a tick that finds a cycle in
//!    progress is skipped.
//!
//! 4. **Deleted entities are forgotten**: a flush that finds the entity gone
//!    drops its delta instead of writing it.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use visite::{FlushConfig, InMemoryStorage, ViewTracker};
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! # rt.block_on(async {
//! let storage = Arc::new(InMemoryStorage::new());
//! storage.insert(42u64, 100);
//!
//! let tracker = ViewTracker::new(storage, FlushConfig::default()).unwrap();
//! let handle = tracker.start();
//!
//! tracker.record_view(&42);
//! assert_eq!(tracker.display_count(&42).await.unwrap(), 101);
//!
//! // Stops the timer and flushes whatever is still pending.
//! let report = handle.shutdown().await.unwrap();
//! assert_eq!(report.views_persisted, 1);
//! # });
//! ```
//!
//! ## Plugging In a Database
//!
//! Implement [`ViewStorage`] for your persistence layer. The trait is
//! object-safe, so `Arc<dyn ViewStorage<K>>` works as well as a concrete type.
//!
//! ## Observers
//!
//! Statistics are exposed as a [`StatsSnapshot`]. Optional observer modules
//! render it for export, each gated behind a feature flag:
//!
//! | Feature | Module | Description |
//! |---------|--------|-------------|
//! | `json` | `observers::json` | Serialize statistics to JSON |
//! | `prometheus` | `observers::prometheus` | Export in Prometheus exposition format |
//! | `full` | All observers | Enables all observer modules |
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade in `event=... key=value` form.
//! Cycle summaries are `info`, per-identifier failures `warn`, and
//! per-identifier progress `debug`/`trace`. Install any `log` backend to see
//! them.

pub mod composer;
pub mod config;
pub mod flush;
pub mod observers;
pub mod stats;
pub mod storage;
pub mod store;
pub mod tally;
pub mod tracker;

pub use composer::ReadComposer;
pub use config::{ConfigError, FlushConfig};
pub use flush::scheduler::{spawn_scheduler, FlushHandle};
pub use flush::{FlushOutcome, FlushReport, Flusher};
pub use stats::{StatsSnapshot, TrackerStats};
pub use storage::memory::InMemoryStorage;
pub use storage::{StorageError, StorageResult, ViewStorage};
pub use store::{CounterStore, EntityId};
pub use tracker::ViewTracker;
