//! Saved-query updater.
//!
//! Runs the saved query remotely, fetches the resulting work items in
//! concurrent fixed-size chunks, then mirrors the result set into the cache
//! in one transaction per search.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use adosync_client::{LiveClient, RemoteProject, RemoteWorkItem, RemoteWorkItemType};
use adosync_storage::{CacheStore, WorkItemSummary};
use adosync_types::{now_millis, QuerySearch, Search, UpdateKind};

use crate::error::{SyncError, SyncResult};

use super::{
    apply_blocking, check_cancelled, fetch_work_items_chunked, guarded, CachedSearch,
    SearchItems, Updater, UpdaterContext,
};

pub struct QueryUpdater {
    ctx: UpdaterContext,
}

/// Everything the apply phase needs, collected outside the transaction.
pub(crate) struct WorkItemPlan {
    pub organization_name: String,
    pub connection: String,
    pub project: RemoteProject,
    pub query_external_id: String,
    pub query_name: String,
    pub username: String,
    pub types: Vec<RemoteWorkItemType>,
    pub items: Vec<RemoteWorkItem>,
    pub avatars: HashMap<String, Vec<u8>>,
}

impl QueryUpdater {
    pub fn new(ctx: UpdaterContext) -> Self {
        Self { ctx }
    }

    async fn sync_search(&self, search: &QuerySearch, cancel: &CancellationToken) -> SyncResult<()> {
        let account = self.ctx.require_account()?;
        let client = self.ctx.connect(&search.uri, &account).await?;
        let project_name = search.uri.project.clone();

        check_cancelled(cancel)?;
        let remote_query = guarded(cancel, client.get_query(&project_name, search.query_id)).await?;
        let kind = remote_query.kind.ok_or_else(|| {
            SyncError::Unsupported(format!(
                "query {} is temporary or of an unknown kind",
                search.query_id
            ))
        })?;

        let result = guarded(cancel, client.run_query(&project_name, search.query_id)).await?;
        debug!(
            "[SYNC] query {} ({kind:?}) returned {} ids",
            search.query_id,
            result.ids.len()
        );

        let items = fetch_work_items_chunked(
            &client,
            &project_name,
            &result.ids,
            self.ctx.config.work_item_batch_size,
            cancel,
        )
        .await?;

        let types = fetch_distinct_types(&client, &project_name, &items, cancel).await?;

        check_cancelled(cancel)?;
        let project = guarded(cancel, client.get_project(&project_name)).await?;

        let avatars = super::fetch_missing_avatars(
            &self.ctx.store,
            &client,
            identity_ids(&items),
            cancel,
        )
        .await?;

        check_cancelled(cancel)?;
        let plan = WorkItemPlan {
            organization_name: search.uri.organization.clone(),
            connection: search.uri.organization_url(),
            project,
            query_external_id: search.query_id.to_string(),
            query_name: remote_query.name,
            username: search.username.clone(),
            types,
            items,
            avatars,
        };

        let store = self.ctx.store.clone();
        let count = apply_blocking(move || apply_work_item_plan(&store, &plan)).await?;
        info!(
            "[SYNC] query {} synced, {count} work items cached",
            search.query_id
        );
        Ok(())
    }
}

#[async_trait]
impl Updater for QueryUpdater {
    fn kind(&self) -> UpdateKind {
        UpdateKind::Query
    }

    async fn update_data(
        &self,
        search: Option<&Search>,
        cancel: &CancellationToken,
    ) -> SyncResult<()> {
        match search {
            Some(Search::Query(s)) => self.sync_search(s, cancel).await,
            Some(other) => Err(SyncError::Internal(format!(
                "query updater dispatched {other}"
            ))),
            None => {
                let account = self.ctx.require_account()?;
                for def in self.ctx.repos.queries.get_all(false)? {
                    check_cancelled(cancel)?;
                    let s = def.search(&account.login_id)?;
                    self.sync_search(&s, cancel).await?;
                }
                Ok(())
            }
        }
    }

    fn cached_search(&self, search: &Search) -> SyncResult<Option<CachedSearch>> {
        let Search::Query(s) = search else {
            return Ok(None);
        };
        let row = self
            .ctx
            .store
            .read(|tx| tx.query_by_key(&s.query_id.to_string(), &s.username))?;
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
        let ttl = self.ctx.config.query_work_item_ttl.as_millis() as i64;
        self.ctx.store.with_tx(|tx| {
            tx.delete_query_work_items_before(now_millis() - ttl)?;
            tx.delete_orphans()?;
            Ok(())
        })?;
        Ok(())
    }
}

/// Display priority per work-item type; lower sorts first.
fn type_priority(name: &str) -> u8 {
    match name {
        "Bug" => 0,
        "Feature" => 1,
        "Product Backlog Item" => 2,
        "User Story" => 3,
        "Task" => 10,
        _ => 5,
    }
}

/// Primary by type priority, secondary by changed date descending.
pub(crate) fn sort_for_display(items: &mut [WorkItemSummary]) {
    items.sort_by(|a, b| {
        type_priority(&a.type_name)
            .cmp(&type_priority(&b.type_name))
            .then(b.changed_date.cmp(&a.changed_date))
    });
}

/// One type lookup per distinct name, case-insensitive.
async fn fetch_distinct_types(
    client: &Arc<dyn LiveClient>,
    project: &str,
    items: &[RemoteWorkItem],
    cancel: &CancellationToken,
) -> SyncResult<Vec<RemoteWorkItemType>> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut types = Vec::new();
    for item in items {
        if item.work_item_type.is_empty() || !seen.insert(item.work_item_type.to_lowercase()) {
            continue;
        }
        check_cancelled(cancel)?;
        match guarded(cancel, client.get_work_item_type(project, &item.work_item_type)).await {
            Ok(t) => types.push(t),
            Err(SyncError::Cancelled) => return Err(SyncError::Cancelled),
            Err(e) => warn!(
                "[SYNC] work item type '{}' lookup failed: {e}",
                item.work_item_type
            ),
        }
    }
    Ok(types)
}

fn identity_ids(items: &[RemoteWorkItem]) -> Vec<String> {
    let mut ids = Vec::new();
    for item in items {
        for idref in [&item.assigned_to, &item.created_by, &item.changed_by]
            .into_iter()
            .flatten()
        {
            ids.push(idref.id.clone());
        }
    }
    ids
}

pub(crate) fn apply_work_item_plan(store: &CacheStore, plan: &WorkItemPlan) -> SyncResult<usize> {
    let count = store.with_tx(|tx| {
        let org = tx.upsert_organization(&plan.organization_name, &plan.connection)?;
        let project = tx.upsert_project(
            &plan.project.name,
            &plan.project.id,
            &plan.project.description,
            org.id,
        )?;

        let mut type_ids: HashMap<String, i64> = HashMap::new();
        for t in &plan.types {
            let row =
                tx.upsert_work_item_type(&t.name, &t.icon_url, &t.color, &t.description, project.id)?;
            type_ids.insert(t.name.to_lowercase(), row.id);
        }

        let query = tx.upsert_query(
            &plan.query_external_id,
            &plan.query_name,
            &plan.username,
            project.id,
        )?;

        let sync_start = now_millis();
        for item in &plan.items {
            let type_id = match type_ids.get(&item.work_item_type.to_lowercase()) {
                Some(id) => *id,
                None => {
                    let row =
                        tx.upsert_work_item_type(&item.work_item_type, "", "", "", project.id)?;
                    type_ids.insert(item.work_item_type.to_lowercase(), row.id);
                    row.id
                }
            };
            let assigned_to_id = super::upsert_identity_ref(tx, &item.assigned_to, &plan.avatars)?;
            let created_by_id = super::upsert_identity_ref(tx, &item.created_by, &plan.avatars)?;
            let changed_by_id = super::upsert_identity_ref(tx, &item.changed_by, &plan.avatars)?;

            let work_item_id = tx.upsert_work_item(
                item.id,
                &item.title,
                &item.html_url,
                &item.state,
                &item.reason,
                assigned_to_id,
                item.created_date,
                created_by_id,
                item.changed_date,
                changed_by_id,
                type_id,
            )?;
            tx.upsert_query_work_item(query.id, work_item_id, now_millis())?;
        }

        tx.delete_stale_query_work_items(query.id, sync_start)?;
        tx.mark_organization_synced(org.id)?;
        Ok(plan.items.len())
    })?;
    Ok(count)
}
