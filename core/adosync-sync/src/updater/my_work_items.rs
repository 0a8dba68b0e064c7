//! The implicit "my work items" updater.
//!
//! There is no saved query to run; a WIQL statement is evaluated per
//! project and the result is cached under a synthesized query row keyed
//! `my-work-items:{org}|{project}` and scoped by the signed-in username.
//! The result set is user-local and volatile, so its join rows carry a
//! much tighter TTL than saved queries.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use adosync_types::{now_millis, MyWorkItemsSearch, Search, UpdateKind};

use crate::error::{SyncError, SyncResult};

use super::query::{apply_work_item_plan, sort_for_display, WorkItemPlan};
use super::{
    apply_blocking, check_cancelled, fetch_work_items_chunked, guarded, CachedSearch,
    SearchItems, Updater, UpdaterContext,
};

/// The WIQL the remote service evaluates for each watched project.
pub const MY_WORK_ITEMS_WIQL: &str = "SELECT [System.Id] FROM WorkItems \
     WHERE [System.AssignedTo] = @Me \
     AND [System.State] <> 'Closed' \
     AND [System.State] <> 'Removed' \
     ORDER BY [System.ChangedDate] DESC";

const SYNTHESIZED_QUERY_NAME: &str = "My Work Items";

pub struct MyWorkItemsUpdater {
    ctx: UpdaterContext,
}

impl MyWorkItemsUpdater {
    pub fn new(ctx: UpdaterContext) -> Self {
        Self { ctx }
    }

    /// Projects to sync: explicit project settings first, then every
    /// `(organization, project)` pair any other saved search mentions.
    /// Deduplicated case-insensitively on the scope key.
    fn discover(&self, username: &str) -> SyncResult<Vec<MyWorkItemsSearch>> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut searches = Vec::new();

        for settings in self.ctx.repos.project_settings.get_all()? {
            let search = settings.search(username)?;
            if seen.insert(search.uri.scope_key()) {
                searches.push(search);
            }
        }

        for (org_url, project) in self.ctx.repos.distinct_org_projects()? {
            let uri = format!("{}/{}", org_url.trim_end_matches('/'), project)
                .parse()
                .map_err(SyncError::from)?;
            let search = MyWorkItemsSearch {
                uri,
                username: username.to_string(),
            };
            if seen.insert(search.uri.scope_key()) {
                searches.push(search);
            }
        }

        Ok(searches)
    }

    async fn sync_search(
        &self,
        search: &MyWorkItemsSearch,
        cancel: &CancellationToken,
    ) -> SyncResult<()> {
        let account = self.ctx.require_account()?;
        let client = self.ctx.connect(&search.uri, &account).await?;
        let project_name = search.uri.project.clone();

        check_cancelled(cancel)?;
        let ids = guarded(cancel, client.run_wiql(&project_name, MY_WORK_ITEMS_WIQL)).await?;
        debug!(
            "[SYNC] my work items for {} returned {} ids",
            search.uri.scope_key(),
            ids.len()
        );

        let items = fetch_work_items_chunked(
            &client,
            &project_name,
            &ids,
            self.ctx.config.work_item_batch_size,
            cancel,
        )
        .await?;

        let types = {
            // The WIQL already scopes to the user; type lookups still dedupe
            // case-insensitively like the saved-query path.
            let mut seen: HashSet<String> = HashSet::new();
            let mut types = Vec::new();
            for item in &items {
                if item.work_item_type.is_empty()
                    || !seen.insert(item.work_item_type.to_lowercase())
                {
                    continue;
                }
                check_cancelled(cancel)?;
                if let Ok(t) =
                    guarded(cancel, client.get_work_item_type(&project_name, &item.work_item_type))
                        .await
                {
                    types.push(t);
                }
            }
            types
        };

        check_cancelled(cancel)?;
        let project = guarded(cancel, client.get_project(&project_name)).await?;

        check_cancelled(cancel)?;
        let ttl = self.ctx.config.my_work_items_ttl.as_millis() as i64;
        let plan = WorkItemPlan {
            organization_name: search.uri.organization.clone(),
            connection: search.uri.organization_url(),
            project,
            query_external_id: search.query_key(),
            query_name: SYNTHESIZED_QUERY_NAME.to_string(),
            username: search.username.clone(),
            types,
            items,
            avatars: Default::default(),
        };

        let store = self.ctx.store.clone();
        let count = apply_blocking(move || {
            let count = apply_work_item_plan(&store, &plan)?;
            // End-of-sync prune for the volatile result set.
            store.with_tx(|tx| {
                tx.delete_my_work_item_joins_before(now_millis() - ttl)?;
                Ok(())
            })?;
            Ok(count)
        })
        .await?;
        info!(
            "[SYNC] my work items for {} synced, {count} cached",
            search.uri.scope_key()
        );
        Ok(())
    }
}

#[async_trait]
impl Updater for MyWorkItemsUpdater {
    fn kind(&self) -> UpdateKind {
        UpdateKind::MyWorkItems
    }

    async fn update_data(
        &self,
        search: Option<&Search>,
        cancel: &CancellationToken,
    ) -> SyncResult<()> {
        match search {
            Some(Search::MyWorkItems(s)) => self.sync_search(s, cancel).await,
            Some(other) => Err(SyncError::Internal(format!(
                "my-work-items updater dispatched {other}"
            ))),
            None => {
                let account = self.ctx.require_account()?;
                for search in self.discover(&account.login_id)? {
                    check_cancelled(cancel)?;
                    self.sync_search(&search, cancel).await?;
                }
                Ok(())
            }
        }
    }

    fn cached_search(&self, search: &Search) -> SyncResult<Option<CachedSearch>> {
        let Search::MyWorkItems(s) = search else {
            return Ok(None);
        };
        let row = self
            .ctx
            .store
            .read(|tx| tx.query_by_key(&s.query_key(), &s.username))?;
        Ok(row.map(CachedSearch::Query))
    }

    fn cached_children(&self, search: &Search) -> SyncResult<SearchItems> {
        let Some(CachedSearch::Query(query)) = self.cached_search(search)? else {
            return Ok(SearchItems::WorkItems(Vec::new()));
        };
        let mut items = self
            .ctx
            .store
            .read(|tx| tx.work_items_for_query(query.id))?;
        sort_for_display(&mut items);
        Ok(SearchItems::WorkItems(items))
    }

    fn prune(&self) -> SyncResult<()> {
        let ttl = self.ctx.config.my_work_items_ttl.as_millis() as i64;
        self.ctx.store.with_tx(|tx| {
            tx.delete_my_work_item_joins_before(now_millis() - ttl)?;
            tx.delete_orphans()?;
            Ok(())
        })?;
        Ok(())
    }
}
