//! Pipeline (build definition) updater.
//!
//! Builds refresh on every sync; the definition row itself is overwritten
//! only after the update threshold has elapsed since its last write.
//! Definitions no build references anymore are collected by prune.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use adosync_client::{RemoteBuild, RemoteDefinition, RemoteProject};
use adosync_storage::CacheStore;
use adosync_types::{now_millis, PipelineSearch, Search, UpdateKind};

use crate::error::{SyncError, SyncResult};

use super::{
    apply_blocking, check_cancelled, guarded, CachedSearch, SearchItems, Updater, UpdaterContext,
};

pub struct PipelineUpdater {
    ctx: UpdaterContext,
}

struct PipelinePlan {
    organization_name: String,
    connection: String,
    project: RemoteProject,
    definition_external_id: i64,
    /// `None` when the existing row is inside the update threshold.
    definition: Option<RemoteDefinition>,
    builds: Vec<RemoteBuild>,
    avatars: HashMap<String, Vec<u8>>,
}

impl PipelineUpdater {
    pub fn new(ctx: UpdaterContext) -> Self {
        Self { ctx }
    }

    /// Whether the definition row may be overwritten yet.
    fn definition_refresh_due(&self, project_external_id: &str, definition_id: i64) -> SyncResult<bool> {
        let threshold = self.ctx.config.definition_update_threshold.as_millis() as i64;
        let due = self.ctx.store.read(|tx| {
            let Some(project) = tx.project_by_external_id(project_external_id)? else {
                return Ok(true);
            };
            match tx.definition_by_key(definition_id, project.id)? {
                Some(row) => Ok(now_millis() - row.time_updated >= threshold),
                None => Ok(true),
            }
        })?;
        Ok(due)
    }

    async fn sync_search(
        &self,
        search: &PipelineSearch,
        cancel: &CancellationToken,
    ) -> SyncResult<()> {
        let account = self.ctx.require_account()?;
        let client = self.ctx.connect(&search.uri, &account).await?;
        let project_name = search.uri.project.clone();

        check_cancelled(cancel)?;
        let project = guarded(cancel, client.get_project(&project_name)).await?;

        let definition = if self.definition_refresh_due(&project.id, search.definition_id)? {
            Some(guarded(cancel, client.get_definition(&project_name, search.definition_id)).await?)
        } else {
            debug!(
                "[SYNC] definition {} within update threshold, skipping refetch",
                search.definition_id
            );
            None
        };

        let builds =
            guarded(cancel, client.get_builds(&project_name, search.definition_id)).await?;

        let requester_ids = builds
            .iter()
            .filter_map(|b| b.requested_for.as_ref().map(|r| r.id.clone()))
            .collect();
        let avatars =
            super::fetch_missing_avatars(&self.ctx.store, &client, requester_ids, cancel).await?;

        check_cancelled(cancel)?;
        let plan = PipelinePlan {
            organization_name: search.uri.organization.clone(),
            connection: search.uri.organization_url(),
            project,
            definition_external_id: search.definition_id,
            definition,
            builds,
            avatars,
        };

        let store = self.ctx.store.clone();
        let count = apply_blocking(move || apply_pipeline_plan(&store, &plan)).await?;
        info!(
            "[SYNC] pipeline {} synced, {count} builds cached",
            search.definition_id
        );
        Ok(())
    }
}

#[async_trait]
impl Updater for PipelineUpdater {
    fn kind(&self) -> UpdateKind {
        UpdateKind::Pipeline
    }

    async fn update_data(
        &self,
        search: Option<&Search>,
        cancel: &CancellationToken,
    ) -> SyncResult<()> {
        match search {
            Some(Search::Pipeline(s)) => self.sync_search(s, cancel).await,
            Some(other) => Err(SyncError::Internal(format!(
                "pipeline updater dispatched {other}"
            ))),
            None => {
                for def in self.ctx.repos.definitions.get_all(false)? {
                    check_cancelled(cancel)?;
                    let s = def.search()?;
                    self.sync_search(&s, cancel).await?;
                }
                Ok(())
            }
        }
    }

    fn cached_search(&self, search: &Search) -> SyncResult<Option<CachedSearch>> {
        let Search::Pipeline(s) = search else {
            return Ok(None);
        };
        let row = self.ctx.store.read(|tx| {
            let Some(org) = tx.organization_by_connection(&s.uri.organization_url())? else {
                return Ok(None);
            };
            let Some(project) = tx.project_by_name(org.id, &s.uri.project)? else {
                return Ok(None);
            };
            tx.definition_by_key(s.definition_id, project.id)
        })?;
        Ok(row.map(CachedSearch::Pipeline))
    }

    fn cached_children(&self, search: &Search) -> SyncResult<SearchItems> {
        let Some(CachedSearch::Pipeline(definition)) = self.cached_search(search)? else {
            return Ok(SearchItems::Builds(Vec::new()));
        };
        let builds = self
            .ctx
            .store
            .read(|tx| tx.builds_for_definition(definition.id))?;
        Ok(SearchItems::Builds(builds))
    }

    fn prune(&self) -> SyncResult<()> {
        let retention = self.ctx.config.build_retention.as_millis() as i64;
        self.ctx.store.with_tx(|tx| {
            tx.delete_builds_before(now_millis() - retention)?;
            tx.delete_orphans()?;
            Ok(())
        })?;
        Ok(())
    }
}

fn apply_pipeline_plan(store: &CacheStore, plan: &PipelinePlan) -> SyncResult<usize> {
    let count = store.with_tx(|tx| {
        let org = tx.upsert_organization(&plan.organization_name, &plan.connection)?;
        let project = tx.upsert_project(
            &plan.project.name,
            &plan.project.id,
            &plan.project.description,
            org.id,
        )?;

        let definition = match &plan.definition {
            Some(remote) => tx.upsert_definition(
                remote.id,
                &remote.name,
                project.id,
                remote.creation_date,
                &remote.html_url,
            )?,
            None => tx
                .definition_by_key(plan.definition_external_id, project.id)?
                .ok_or_else(|| {
                    adosync_storage::StorageError::NotFound(format!(
                        "definition {} vanished between throttle check and apply",
                        plan.definition_external_id
                    ))
                })?,
        };

        for build in &plan.builds {
            let requester_id = super::upsert_identity_ref(tx, &build.requested_for, &plan.avatars)?;
            tx.upsert_build(
                build.id,
                &build.build_number,
                &build.status,
                &build.result,
                build.queue_time,
                build.start_time,
                build.finish_time,
                &build.url,
                definition.id,
                &build.source_branch,
                &build.trigger_message,
                requester_id,
            )?;
        }

        tx.mark_organization_synced(org.id)?;
        Ok(plan.builds.len())
    })?;
    Ok(count)
}
