//! Validation seam for definition saves.

use async_trait::async_trait;

use adosync_types::RemoteUri;

use crate::error::{SearchError, SearchResult};

/// Validates a parsed definition URL before it is persisted.
///
/// The production implementation checks project reachability against the
/// remote service with the signed-in account; repositories only see the
/// trait. Failures surface as [`SearchError::Validation`] and never touch
/// the store.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, uri: &RemoteUri) -> SearchResult<()>;
}

/// Accepts any well-formed URL without going to the network.
///
/// Well-formedness is already guaranteed by the caller's parse; this is the
/// validator for tests and offline scenarios.
pub struct OfflineValidator;

#[async_trait]
impl Validator for OfflineValidator {
    async fn validate(&self, _uri: &RemoteUri) -> SearchResult<()> {
        Ok(())
    }
}

/// Rejects everything; used in tests to prove failed validation leaves the
/// store untouched.
pub struct RejectingValidator(pub String);

#[async_trait]
impl Validator for RejectingValidator {
    async fn validate(&self, _uri: &RemoteUri) -> SearchResult<()> {
        Err(SearchError::Validation(self.0.clone()))
    }
}
