//! The updater contract and shared sync plumbing.
//!
//! Every updater follows the same algorithm: resolve the account and a
//! pooled connection, fetch the remote result (outside any transaction),
//! then apply the diff in one transaction per search: upsert parents,
//! upsert items, touch join rows, delete join rows the sync did not touch.
//! Cancellation is checked between remote calls and before each
//! transaction.

mod my_work_items;
mod pipelines;
mod pull_requests;
mod query;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use adosync_client::{AccountProvider, ConnectionProvider, LiveClient, RemoteWorkItem};
use adosync_searches::SearchRepositories;
use adosync_storage::{
    BuildSummary, CacheStore, DefinitionRow, PullRequestSearchRow, PullRequestSummary, QueryRow,
    WorkItemSummary,
};
use adosync_types::{now_millis, DevAccount, Millis, RemoteUri, Search, SyncConfig, UpdateKind};

use crate::error::{SyncError, SyncResult};

pub use my_work_items::{MyWorkItemsUpdater, MY_WORK_ITEMS_WIQL};
pub use pipelines::PipelineUpdater;
pub use pull_requests::PullRequestUpdater;
pub use query::QueryUpdater;

/// The cached parent row a search resolves to, when one exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedSearch {
    Query(QueryRow),
    PullRequests(PullRequestSearchRow),
    Pipeline(DefinitionRow),
}

impl CachedSearch {
    pub fn time_updated(&self) -> Millis {
        match self {
            CachedSearch::Query(row) => row.time_updated,
            CachedSearch::PullRequests(row) => row.time_updated,
            CachedSearch::Pipeline(row) => row.time_updated,
        }
    }
}

/// The children of a search, ordered as rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchItems {
    WorkItems(Vec<WorkItemSummary>),
    PullRequests(Vec<PullRequestSummary>),
    Builds(Vec<BuildSummary>),
}

impl SearchItems {
    pub fn len(&self) -> usize {
        match self {
            SearchItems::WorkItems(v) => v.len(),
            SearchItems::PullRequests(v) => v.len(),
            SearchItems::Builds(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything an updater needs, shared across all four.
#[derive(Clone)]
pub struct UpdaterContext {
    pub store: CacheStore,
    pub repos: SearchRepositories,
    pub accounts: Arc<dyn AccountProvider>,
    pub connections: Arc<dyn ConnectionProvider>,
    pub config: SyncConfig,
}

impl UpdaterContext {
    pub(crate) fn require_account(&self) -> SyncResult<DevAccount> {
        self.accounts.default_account().ok_or(SyncError::NotSignedIn)
    }

    pub(crate) async fn connect(
        &self,
        uri: &RemoteUri,
        account: &DevAccount,
    ) -> SyncResult<Arc<dyn LiveClient>> {
        let client = self
            .connections
            .get_connection(&uri.organization_url(), account)
            .await?;
        Ok(client)
    }
}

/// One search kind's end-to-end sync.
#[async_trait]
pub trait Updater: Send + Sync {
    fn kind(&self) -> UpdateKind;

    /// Sync one search, or every saved search of this kind when `search` is
    /// `None` (the periodic path).
    async fn update_data(
        &self,
        search: Option<&Search>,
        cancel: &CancellationToken,
    ) -> SyncResult<()>;

    /// The cached parent row for a search's natural key.
    fn cached_search(&self, search: &Search) -> SyncResult<Option<CachedSearch>>;

    /// Cached children, ordered as rendered. Empty when nothing is cached.
    fn cached_children(&self, search: &Search) -> SyncResult<SearchItems>;

    /// True when the search has never synced or its last sync is older than
    /// the cooldown.
    fn is_new_or_stale(&self, search: &Search, cooldown: Duration) -> SyncResult<bool> {
        let cached = self.cached_search(search)?;
        Ok(stale(cached.map(|c| c.time_updated()), cooldown))
    }

    /// TTL and orphan deletes for this kind, TTL first.
    fn prune(&self) -> SyncResult<()>;
}

/// Staleness predicate shared by every updater.
pub(crate) fn stale(time_updated: Option<Millis>, cooldown: Duration) -> bool {
    match time_updated {
        None => true,
        Some(t) => now_millis() - t > cooldown.as_millis() as i64,
    }
}

/// Fail fast if cancellation was requested.
pub(crate) fn check_cancelled(cancel: &CancellationToken) -> SyncResult<()> {
    if cancel.is_cancelled() {
        return Err(SyncError::Cancelled);
    }
    Ok(())
}

/// Await a remote call, racing it against cancellation.
pub(crate) async fn guarded<T, E, F>(cancel: &CancellationToken, fut: F) -> SyncResult<T>
where
    E: Into<SyncError>,
    F: Future<Output = Result<T, E>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(SyncError::Cancelled),
        out = fut => out.map_err(Into::into),
    }
}

/// Run the owned apply closure on the blocking pool; SQLite work does not
/// belong on the async workers.
pub(crate) async fn apply_blocking<T, F>(f: F) -> SyncResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> SyncResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SyncError::Internal(format!("apply task panicked: {e}")))?
}

/// Fetch work items in concurrent fixed-size chunks.
///
/// Error policy is omit-failures: a failed chunk is logged and dropped so a
/// bad id cannot fail the whole batch. Cancellation aborts outstanding
/// chunks.
pub(crate) async fn fetch_work_items_chunked(
    client: &Arc<dyn LiveClient>,
    project: &str,
    ids: &[i64],
    batch_size: usize,
    cancel: &CancellationToken,
) -> SyncResult<Vec<RemoteWorkItem>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut set = JoinSet::new();
    for chunk in ids.chunks(batch_size.max(1)) {
        let client = client.clone();
        let project = project.to_string();
        let chunk = chunk.to_vec();
        set.spawn(async move { client.get_work_items(&project, &chunk).await });
    }

    let mut items = Vec::with_capacity(ids.len());
    loop {
        let joined = tokio::select! {
            _ = cancel.cancelled() => return Err(SyncError::Cancelled),
            joined = set.join_next() => joined,
        };
        match joined {
            None => break,
            Some(Ok(Ok(batch))) => items.extend(batch),
            Some(Ok(Err(e))) => warn!("[SYNC] omitting failed work item chunk: {e}"),
            Some(Err(e)) => warn!("[SYNC] work item chunk task panicked: {e}"),
        }
    }

    // The service returns chunks in completion order; re-establish the
    // query's ordering.
    let rank: std::collections::HashMap<i64, usize> =
        ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    items.sort_by_key(|item| rank.get(&item.id).copied().unwrap_or(usize::MAX));
    Ok(items)
}

/// Upsert the identity a remote reference points at, attaching a freshly
/// fetched avatar when one was collected for it. Runs inside an apply
/// transaction, hence the storage-level result.
pub(crate) fn upsert_identity_ref(
    tx: &adosync_storage::CacheTx<'_>,
    idref: &Option<adosync_client::RemoteIdentityRef>,
    avatars: &std::collections::HashMap<String, Vec<u8>>,
) -> adosync_storage::StorageResult<Option<i64>> {
    let Some(idref) = idref else {
        return Ok(None);
    };
    let row = tx.upsert_identity(
        &idref.display_name,
        &idref.id,
        idref.unique_name.as_deref(),
        avatars.get(&idref.id).map(Vec::as_slice),
    )?;
    Ok(Some(row.id))
}

/// Fetch avatar blobs for identities the cache has no image for yet.
/// Failures are non-fatal; an avatar is decoration, not data.
pub(crate) async fn fetch_missing_avatars(
    store: &CacheStore,
    client: &Arc<dyn LiveClient>,
    identity_ids: Vec<String>,
    cancel: &CancellationToken,
) -> SyncResult<std::collections::HashMap<String, Vec<u8>>> {
    let mut avatars = std::collections::HashMap::new();
    let mut seen = std::collections::HashSet::new();
    for id in identity_ids {
        if !seen.insert(id.clone()) {
            continue;
        }
        let already_cached = store
            .read(|tx| tx.identity_by_external_id(&id))?
            .is_some_and(|row| row.avatar.is_some());
        if already_cached {
            continue;
        }
        match guarded(cancel, client.get_avatar(&id)).await {
            Ok(Some(bytes)) => {
                avatars.insert(id, bytes);
            }
            Ok(None) => {}
            Err(SyncError::Cancelled) => return Err(SyncError::Cancelled),
            Err(e) => warn!("[SYNC] avatar fetch for {id} failed: {e}"),
        }
    }
    Ok(avatars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_when_never_synced() {
        assert!(stale(None, Duration::from_secs(60)));
    }

    #[test]
    fn fresh_within_cooldown() {
        assert!(!stale(Some(now_millis()), Duration::from_secs(60)));
    }

    #[test]
    fn stale_past_cooldown() {
        assert!(stale(Some(now_millis() - 61_000), Duration::from_secs(60)));
    }
}
