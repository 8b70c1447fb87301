//! Collaborator contracts for the record store and the duplicate queue.
//!
//! Both are shared, multi-writer resources owned outside this crate. The
//! engine never locks them; it relies on idempotent queue deletion and on
//! computing every record write from a snapshot read just before it.

use thiserror::Error;

use crate::duplicate::{DuplicateId, DuplicateItem};
use crate::lead::{Lead, LeadData, LeadId};
use crate::merge::LeadPatch;

use super::stream::SnapshotStream;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Record not found.
    #[error("Record not found: {0}")]
    RecordNotFound(LeadId),

    /// Key already exists.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Connection failed.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The backend's request timeout elapsed.
    #[error("Storage request timed out after {duration_ms}ms")]
    Timeout {
        /// Elapsed time before giving up.
        duration_ms: u64,
    },
}

/// Storage trait for existing records.
pub trait LeadStore: Send + Sync {
    /// Read every record, in the store's iteration order.
    fn list(&self) -> Result<Vec<Lead>, StorageError>;

    /// Get a record by id.
    fn get(&self, id: &LeadId) -> Result<Option<Lead>, StorageError>;

    /// Insert a new record; the store assigns and returns its id.
    fn insert(&self, data: LeadData) -> Result<LeadId, StorageError>;

    /// Apply a partial update. Fields the patch leaves unset are untouched.
    ///
    /// # Errors
    /// - `RecordNotFound`: if no record has `id`
    fn update(&self, id: &LeadId, patch: LeadPatch) -> Result<(), StorageError>;
}

/// Storage trait for the duplicate queue.
pub trait DuplicateQueue: Send + Sync {
    /// The current queue contents.
    fn snapshot(&self) -> Result<Vec<DuplicateItem>, StorageError>;

    /// Subscribe to the queue.
    ///
    /// The stream first yields the current snapshot, then the full snapshot
    /// again after every addition, modification or removal.
    fn subscribe(&self) -> Result<SnapshotStream, StorageError>;

    /// Append an item (ingestion side).
    fn enqueue(&self, item: DuplicateItem) -> Result<(), StorageError>;

    /// Remove an item. Removing an id that is not queued succeeds.
    fn delete(&self, id: &DuplicateId) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test: ensure traits are object-safe
    fn _assert_lead_store_object_safe(_: &dyn LeadStore) {}
    fn _assert_duplicate_queue_object_safe(_: &dyn DuplicateQueue) {}

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::RecordNotFound(LeadId::from("lead-1"));
        assert!(err.to_string().contains("Record not found: lead-1"));

        let err = StorageError::BackendError("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));

        let err = StorageError::Timeout { duration_ms: 30_000 };
        assert!(err.to_string().contains("30000ms"));
    }
}
