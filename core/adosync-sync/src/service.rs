//! Multiplexer over the updaters.
//!
//! Every dispatch resolves to exactly one terminal outcome, including the
//! aggregate `All` path: per-kind failures there are collected and folded
//! into a single `Error` carrying the first of them, so the state machine
//! can never be left waiting on an event that never comes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use adosync_storage::{CacheStore, META_LAST_UPDATED};
use adosync_types::{now_millis, Millis, UpdateKind, UpdateParams};

use crate::error::{SyncError, SyncResult};
use crate::updater::{
    MyWorkItemsUpdater, PipelineUpdater, PullRequestUpdater, QueryUpdater, Updater,
    UpdaterContext,
};

/// How a dispatch ended; exactly one of these per dispatch.
#[derive(Debug, Clone)]
pub enum TerminalOutcome {
    Success,
    Cancelled,
    Error(Arc<SyncError>),
}

pub struct DataUpdateService {
    updaters: HashMap<UpdateKind, Arc<dyn Updater>>,
    store: CacheStore,
}

impl DataUpdateService {
    pub fn new(ctx: UpdaterContext) -> Self {
        let store = ctx.store.clone();
        let mut updaters: HashMap<UpdateKind, Arc<dyn Updater>> = HashMap::new();
        updaters.insert(
            UpdateKind::Query,
            Arc::new(QueryUpdater::new(ctx.clone())) as Arc<dyn Updater>,
        );
        updaters.insert(
            UpdateKind::PullRequests,
            Arc::new(PullRequestUpdater::new(ctx.clone())),
        );
        updaters.insert(UpdateKind::Pipeline, Arc::new(PipelineUpdater::new(ctx.clone())));
        updaters.insert(
            UpdateKind::MyWorkItems,
            Arc::new(MyWorkItemsUpdater::new(ctx)),
        );
        Self { updaters, store }
    }

    pub fn updater(&self, kind: UpdateKind) -> Option<&Arc<dyn Updater>> {
        self.updaters.get(&kind)
    }

    /// Run one update. Never panics across the await boundary and always
    /// returns exactly one outcome.
    pub async fn dispatch(
        &self,
        params: &UpdateParams,
        cancel: &CancellationToken,
    ) -> TerminalOutcome {
        let result = self.dispatch_inner(params, cancel).await;
        match result {
            Ok(()) => {
                if let Err(e) = self.record_last_updated() {
                    warn!("[SYNC] failed to record last-updated: {e}");
                }
                TerminalOutcome::Success
            }
            Err(SyncError::Cancelled) => TerminalOutcome::Cancelled,
            Err(e) => {
                warn!("[SYNC] dispatch {} failed: {e}", params.kind);
                TerminalOutcome::Error(Arc::new(e))
            }
        }
    }

    async fn dispatch_inner(
        &self,
        params: &UpdateParams,
        cancel: &CancellationToken,
    ) -> SyncResult<()> {
        match params.kind {
            UpdateKind::All => {
                let mut first_error: Option<SyncError> = None;
                for updater in self.updaters.values() {
                    if cancel.is_cancelled() {
                        return Err(SyncError::Cancelled);
                    }
                    match updater.update_data(None, cancel).await {
                        Ok(()) => {}
                        Err(SyncError::Cancelled) => return Err(SyncError::Cancelled),
                        Err(e) => {
                            warn!("[SYNC] {} updater failed during All: {e}", updater.kind());
                            first_error.get_or_insert(e);
                        }
                    }
                }
                self.prune_all();
                match first_error {
                    None => Ok(()),
                    Some(e) => Err(e),
                }
            }
            kind => {
                let updater = self
                    .updaters
                    .get(&kind)
                    .ok_or_else(|| SyncError::Internal(format!("no updater for {kind}")))?;
                updater.update_data(params.search.as_ref(), cancel).await?;
                if let Err(e) = updater.prune() {
                    warn!("[SYNC] {kind} prune failed: {e}");
                }
                Ok(())
            }
        }
    }

    /// TTL prunes first, orphan collection inside each updater's pass.
    fn prune_all(&self) {
        for updater in self.updaters.values() {
            if let Err(e) = updater.prune() {
                warn!("[SYNC] {} prune failed: {e}", updater.kind());
            }
        }
    }

    /// Staleness check for a refresh request, delegated to the updater.
    /// `All` and parameterless requests are always considered stale.
    pub fn is_new_or_stale(&self, params: &UpdateParams, cooldown: Duration) -> bool {
        let Some(search) = &params.search else {
            return true;
        };
        match self.updaters.get(&params.kind) {
            Some(updater) => updater.is_new_or_stale(search, cooldown).unwrap_or(true),
            None => true,
        }
    }

    /// Drop and recreate the cache store.
    pub async fn purge_all_data(&self) -> SyncResult<()> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.reset())
            .await
            .map_err(|e| SyncError::Internal(format!("purge task panicked: {e}")))??;
        info!("[SYNC] cache purged");
        Ok(())
    }

    /// Wall clock of the last successful dispatch, if any.
    pub fn last_updated(&self) -> Option<Millis> {
        self.store
            .get_metadata(META_LAST_UPDATED)
            .ok()
            .flatten()
            .and_then(|v| v.parse().ok())
    }

    fn record_last_updated(&self) -> SyncResult<()> {
        self.store
            .set_metadata(META_LAST_UPDATED, &now_millis().to_string())?;
        Ok(())
    }
}
