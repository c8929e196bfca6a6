//! Durable view-count storage contract.
//!
//! The tracker never owns authoritative counts. It talks to whatever holds
//! them (a relational table, a document store, a remote service) through
//! [`ViewStorage`]. Implementations may perform I/O; these are the only calls
//! in the crate allowed to incur latency.
//!
//! [`memory::InMemoryStorage`] is a reference implementation suitable for
//! tests, demos and single-process deployments.

pub mod memory;

use crate::store::EntityId;
use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by a [`ViewStorage`] implementation.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The entity does not exist in durable storage.
    #[error("entity not found: {id}")]
    NotFound {
        /// Display form of the missing identifier.
        id: String,
    },

    /// The backend could not be reached or refused the request.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure.
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StorageError {
    /// Builds a [`StorageError::NotFound`] from an identifier.
    pub fn not_found(id: &impl EntityId) -> Self {
        StorageError::NotFound { id: id.to_string() }
    }

    /// Returns `true` for [`StorageError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Durable counterpart of the pending deltas.
///
/// `add_to_persisted_count` is not assumed idempotent: the flusher calls it
/// at most once per drained amount.
#[async_trait]
pub trait ViewStorage<K: EntityId>: Send + Sync {
    /// Whether the entity still exists.
    async fn exists(&self, id: &K) -> StorageResult<bool>;

    /// The durable view count. Fails with [`StorageError::NotFound`] if the
    /// entity is absent.
    async fn persisted_count(&self, id: &K) -> StorageResult<u64>;

    /// Adds `delta` to the durable view count, returning the new total.
    async fn add_to_persisted_count(&self, id: &K, delta: u64) -> StorageResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_not_found_display() {
        let err = StorageError::not_found(&"post-9");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "entity not found: post-9");
    }

    #[test]
    fn test_backend_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err = StorageError::Backend(Box::new(io));
        assert!(!err.is_not_found());
        assert!(err.source().is_some());
        assert!(err.to_string().contains("disk on fire"));
    }
}
