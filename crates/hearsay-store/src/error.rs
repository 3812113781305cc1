//! Error types for the storage layer.
//!
//! All errors are propagated via [`StoreError`], which carries the rumor
//! the failed operation was addressing.

use hearsay_types::RumorId;

/// Errors that can occur in the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record exists for the rumor.
    #[error("rumor not found: {0}")]
    NotFound(RumorId),

    /// A record with this ID already exists.
    #[error("rumor already exists: {0}")]
    Duplicate(RumorId),

    /// The record changed since the caller read it.
    #[error("version conflict on rumor {rumor_id}: expected {expected}, found {actual}")]
    VersionConflict {
        /// The contended rumor.
        rumor_id: RumorId,
        /// The version the caller read.
        expected: u64,
        /// The version currently stored.
        actual: u64,
    },

    /// A write would have left the record structurally invalid.
    #[error("integrity violation on rumor {rumor_id}: {reason}")]
    Integrity {
        /// The rumor whose write was rejected.
        rumor_id: RumorId,
        /// What was wrong.
        reason: String,
    },

    /// Reading or writing a snapshot file failed.
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A snapshot could not be serialized or parsed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
