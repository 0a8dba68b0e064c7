//! Storage error types.

use thiserror::Error;

/// Result type for cache store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by the cache store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database file could not be opened even after a rebuild attempt.
    #[error("data store inaccessible: {0}")]
    Inaccessible(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),
}
