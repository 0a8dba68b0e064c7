//! The sync error taxonomy.
//!
//! Every dispatch resolves to exactly one terminal outcome: `Cancelled`
//! becomes a `Cancel` event, everything else an `Error` event. Updaters
//! never swallow; the cache is left in its last-consistent state by
//! transaction rollback.

use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Bad user input; surfaced to the editing form, never cached.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The local cache database is unavailable.
    #[error(transparent)]
    Store(#[from] adosync_storage::StorageError),

    /// The persistent definitions database failed.
    #[error(transparent)]
    Definitions(#[from] adosync_searches::SearchError),

    /// Network, auth, or 4xx/5xx failure from the remote service.
    #[error(transparent)]
    Remote(#[from] adosync_client::ClientError),

    /// Cooperative cancellation observed.
    #[error("operation cancelled")]
    Cancelled,

    /// A search shape this core does not evaluate (e.g. a temporary query).
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// No signed-in account to sync with.
    #[error("not signed in")]
    NotSignedIn,

    /// Should be unreachable.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl From<adosync_types::UriError> for SyncError {
    fn from(e: adosync_types::UriError) -> Self {
        SyncError::Validation(e.to_string())
    }
}
