//! Read-side facade: cached rows now, fresh rows soon.
//!
//! Warm reads return cached children immediately and fire a background
//! refresh; only a cold miss blocks, and then only until the next terminal
//! event for that search. This is the core's single latency guarantee:
//! warm reads never wait on the network.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use adosync_types::{Search, UpdateParams};

use crate::error::{SyncError, SyncResult};
use crate::events::CacheUpdate;
use crate::manager::CacheManagerHandle;
use crate::service::DataUpdateService;
use crate::updater::{CachedSearch, SearchItems, Updater};

pub struct LiveDataProvider {
    service: Arc<DataUpdateService>,
    manager: CacheManagerHandle,
}

impl LiveDataProvider {
    pub fn new(service: Arc<DataUpdateService>, manager: CacheManagerHandle) -> Self {
        Self { service, manager }
    }

    /// Children of a search, ordered as rendered.
    ///
    /// Cached data returns immediately with a background refresh requested;
    /// a cold miss blocks for exactly one update cycle and may legitimately
    /// come back empty (error, cancellation, or an empty remote result).
    pub async fn get_content_data(&self, search: &Search) -> SyncResult<SearchItems> {
        let updater = self.updater_for(search)?;

        if updater.cached_search(search)?.is_some() {
            let items = updater.cached_children(search)?;
            let _ = self
                .manager
                .refresh(UpdateParams::for_search(search.clone()))
                .await;
            return Ok(items);
        }

        debug!("[SYNC] cold miss for {search}, awaiting one update cycle");
        let rx = self.manager.subscribe();
        self.manager
            .refresh(UpdateParams::for_search(search.clone()))
            .await?;
        self.await_terminal(rx, search).await?;
        updater.cached_children(search)
    }

    /// The cached parent row for a search, refreshing in the background.
    /// `None` is returned for a cold miss that the following update cycle
    /// still could not fill (not signed in, remote error).
    pub async fn get_search_data(&self, search: &Search) -> SyncResult<Option<CachedSearch>> {
        let updater = self.updater_for(search)?;

        if let Some(cached) = updater.cached_search(search)? {
            let _ = self
                .manager
                .refresh(UpdateParams::for_search(search.clone()))
                .await;
            return Ok(Some(cached));
        }

        let rx = self.manager.subscribe();
        self.manager
            .refresh(UpdateParams::for_search(search.clone()))
            .await?;
        self.await_terminal(rx, search).await?;
        updater.cached_search(search)
    }

    /// Watch terminal events; dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheUpdate> {
        self.manager.subscribe()
    }

    fn updater_for(&self, search: &Search) -> SyncResult<Arc<dyn Updater>> {
        self.service
            .updater(search.kind())
            .cloned()
            .ok_or_else(|| SyncError::Internal(format!("no updater for {}", search.kind())))
    }

    /// Wait for the terminal event covering this search: either its own
    /// refresh, or any parameterless cycle (periodic `All`, clear-cache)
    /// that necessarily includes or supersedes it.
    async fn await_terminal(
        &self,
        mut rx: broadcast::Receiver<CacheUpdate>,
        search: &Search,
    ) -> SyncResult<()> {
        loop {
            match rx.recv().await {
                Ok(update) => {
                    let matches = match &update.params {
                        Some(params) => params.search.as_ref() == Some(search),
                        None => true,
                    };
                    if matches {
                        return Ok(());
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Missed events may have included ours; re-read the
                    // cache rather than waiting forever.
                    debug!("[SYNC] update bus lagged by {skipped}, returning cached state");
                    return Ok(());
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(SyncError::Internal("update bus closed".into()));
                }
            }
        }
    }
}
