//! Error types for the persistent search store.

use thiserror::Error;

pub type SearchResult<T> = Result<T, SearchError>;

#[derive(Debug, Error)]
pub enum SearchError {
    /// Bad user input; surfaced to the editing form, never cached.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("data store inaccessible: {0}")]
    Inaccessible(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<adosync_types::UriError> for SearchError {
    fn from(e: adosync_types::UriError) -> Self {
        SearchError::Validation(e.to_string())
    }
}
