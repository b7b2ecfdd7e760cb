//! Storage error types for schemagraph-storage.
//!
//! [`StorageError`] covers the persistence layer's failure modes: backend
//! errors, serialization, missing rows, stored data that no longer parses,
//! and a conditional update that lost its race.

use thiserror::Error;

use crate::types::{ProjectId, VersionId};

/// Errors produced by [`ProjectStore`](crate::traits::ProjectStore) backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite database error.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A project with the given ID was not found.
    #[error("project not found: {0}")]
    ProjectNotFound(ProjectId),

    /// A version snapshot with the given ID was not found.
    #[error("version not found: {0}")]
    SnapshotNotFound(VersionId),

    /// The conditional update matched no row: another writer advanced the
    /// project between the read and the write.
    #[error("project {project} version changed concurrently (expected {expected}, found {actual})")]
    VersionConflict {
        project: ProjectId,
        expected: i64,
        actual: i64,
    },

    /// A stored row could not be turned back into a domain value.
    #[error("integrity error: {reason}")]
    IntegrityError { reason: String },

    /// A lock guarding a shared connection was poisoned by a panicking writer.
    #[error("storage lock poisoned")]
    LockPoisoned,
}
