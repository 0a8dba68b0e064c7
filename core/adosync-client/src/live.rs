//! The narrow interface updaters pull from.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ClientResult;
use crate::types::*;

/// One authenticated connection to one organization.
///
/// Implementations are pooled by [`crate::ConnectionProvider`] keyed on
/// `(organization url, account)` and shared across updaters. Every method
/// maps remote failures to [`crate::ClientError::Remote`]; callers interleave
/// cancellation checks between calls.
#[async_trait]
pub trait LiveClient: Send + Sync {
    /// The identity the connection is authenticated as.
    async fn connection_user(&self) -> ClientResult<RemoteIdentityRef>;

    // ── Work items ──

    async fn get_query(&self, project: &str, query_id: Uuid) -> ClientResult<RemoteQuery>;

    /// Evaluate a saved query to its work-item ids.
    async fn run_query(&self, project: &str, query_id: Uuid) -> ClientResult<RemoteQueryResult>;

    /// Evaluate an ad-hoc WIQL statement to work-item ids.
    async fn run_wiql(&self, project: &str, wiql: &str) -> ClientResult<Vec<i64>>;

    /// Fetch full work items for up to one batch of ids.
    async fn get_work_items(&self, project: &str, ids: &[i64]) -> ClientResult<Vec<RemoteWorkItem>>;

    async fn get_work_item_type(
        &self,
        project: &str,
        name: &str,
    ) -> ClientResult<RemoteWorkItemType>;

    // ── Projects and repositories ──

    async fn get_project(&self, project: &str) -> ClientResult<RemoteProject>;

    async fn get_repository(&self, project: &str, name: &str) -> ClientResult<RemoteRepository>;

    // ── Pull requests ──

    async fn get_pull_requests(
        &self,
        project: &str,
        repository_id: &str,
        filter: &PullRequestFilter,
    ) -> ClientResult<Vec<RemotePullRequest>>;

    /// Policy evaluations for one pull request. `project_id` is the owning
    /// project's GUID (the evaluation artifact is keyed by it, not by name).
    async fn get_policy_evaluations(
        &self,
        project_id: &str,
        pull_request_id: i64,
    ) -> ClientResult<Vec<RemotePolicyEvaluation>>;

    // ── Pipelines ──

    async fn get_definition(
        &self,
        project: &str,
        definition_id: i64,
    ) -> ClientResult<RemoteDefinition>;

    async fn get_builds(&self, project: &str, definition_id: i64)
        -> ClientResult<Vec<RemoteBuild>>;

    // ── Identities ──

    /// Avatar image bytes for an identity, if the service has one.
    async fn get_avatar(&self, identity_id: &str) -> ClientResult<Option<Vec<u8>>>;
}
