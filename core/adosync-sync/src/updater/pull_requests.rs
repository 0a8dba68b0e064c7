//! Pull-request updater.
//!
//! Lists active pull requests with the server-side filter the view implies,
//! then fetches policy evaluations per pull request and folds them to the
//! worst-severity outcome before mirroring into the cache.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use adosync_client::{
    PullRequestFilter, RemoteProject, RemotePolicyEvaluation, RemotePullRequest,
    RemoteRepository,
};
use adosync_storage::CacheStore;
use adosync_types::{now_millis, PolicyStatus, PullRequestsSearch, Search, UpdateKind};

use crate::error::{SyncError, SyncResult};

use super::{
    apply_blocking, check_cancelled, guarded, CachedSearch, SearchItems, Updater, UpdaterContext,
};

pub struct PullRequestUpdater {
    ctx: UpdaterContext,
}

struct PullRequestPlan {
    organization_name: String,
    connection: String,
    project: RemoteProject,
    repository: RemoteRepository,
    username: String,
    view_id: i64,
    pull_requests: Vec<(RemotePullRequest, PolicyStatus, String)>,
    avatars: HashMap<String, Vec<u8>>,
}

impl PullRequestUpdater {
    pub fn new(ctx: UpdaterContext) -> Self {
        Self { ctx }
    }

    async fn sync_search(
        &self,
        search: &PullRequestsSearch,
        cancel: &CancellationToken,
    ) -> SyncResult<()> {
        let account = self.ctx.require_account()?;
        let client = self.ctx.connect(&search.uri, &account).await?;
        let project_name = search.uri.project.clone();

        check_cancelled(cancel)?;
        let me = guarded(cancel, client.connection_user()).await?;
        let repository =
            guarded(cancel, client.get_repository(&project_name, &search.repository)).await?;

        let filter = PullRequestFilter::for_view(search.view, &me.id);
        let remote_prs = guarded(
            cancel,
            client.get_pull_requests(&project_name, &repository.id, &filter),
        )
        .await?;
        debug!(
            "[SYNC] {} pull requests for {}/{} ({})",
            remote_prs.len(),
            project_name,
            search.repository,
            search.view.as_str()
        );

        let mut pull_requests = Vec::with_capacity(remote_prs.len());
        for pr in remote_prs {
            check_cancelled(cancel)?;
            let evaluations = guarded(
                cancel,
                client.get_policy_evaluations(&repository.project_id, pr.id),
            )
            .await?;
            let (status, reason) = fold_policy(&evaluations);
            pull_requests.push((pr, status, reason));
        }

        check_cancelled(cancel)?;
        let project = guarded(cancel, client.get_project(&project_name)).await?;

        let creator_ids = pull_requests
            .iter()
            .filter_map(|(pr, _, _)| pr.created_by.as_ref().map(|c| c.id.clone()))
            .collect();
        let avatars =
            super::fetch_missing_avatars(&self.ctx.store, &client, creator_ids, cancel).await?;

        check_cancelled(cancel)?;
        let plan = PullRequestPlan {
            organization_name: search.uri.organization.clone(),
            connection: search.uri.organization_url(),
            project,
            repository,
            username: search.username.clone(),
            view_id: search.view.view_id(),
            pull_requests,
            avatars,
        };

        let store = self.ctx.store.clone();
        let count = apply_blocking(move || apply_pull_request_plan(&store, &plan)).await?;
        info!(
            "[SYNC] pull request search {}/{} synced, {count} cached",
            search.uri.scope_key(),
            search.repository
        );
        Ok(())
    }
}

#[async_trait]
impl Updater for PullRequestUpdater {
    fn kind(&self) -> UpdateKind {
        UpdateKind::PullRequests
    }

    async fn update_data(
        &self,
        search: Option<&Search>,
        cancel: &CancellationToken,
    ) -> SyncResult<()> {
        match search {
            Some(Search::PullRequests(s)) => self.sync_search(s, cancel).await,
            Some(other) => Err(SyncError::Internal(format!(
                "pull request updater dispatched {other}"
            ))),
            None => {
                let account = self.ctx.require_account()?;
                for def in self.ctx.repos.pull_requests.get_all(false)? {
                    check_cancelled(cancel)?;
                    let s = def.search(&account.login_id)?;
                    self.sync_search(&s, cancel).await?;
                }
                Ok(())
            }
        }
    }

    fn cached_search(&self, search: &Search) -> SyncResult<Option<CachedSearch>> {
        let Search::PullRequests(s) = search else {
            return Ok(None);
        };
        let row = self.ctx.store.read(|tx| {
            let Some(org) = tx.organization_by_connection(&s.uri.organization_url())? else {
                return Ok(None);
            };
            let Some(project) = tx.project_by_name(org.id, &s.uri.project)? else {
                return Ok(None);
            };
            let Some(repo) = tx.repository_by_name(project.id, &s.repository)? else {
                return Ok(None);
            };
            tx.pull_request_search_by_key(project.id, repo.id, &s.username, s.view.view_id())
        })?;
        Ok(row.map(CachedSearch::PullRequests))
    }

    fn cached_children(&self, search: &Search) -> SyncResult<SearchItems> {
        let Some(CachedSearch::PullRequests(row)) = self.cached_search(search)? else {
            return Ok(SearchItems::PullRequests(Vec::new()));
        };
        let items = self
            .ctx
            .store
            .read(|tx| tx.pull_requests_for_search(row.id))?;
        Ok(SearchItems::PullRequests(items))
    }

    fn prune(&self) -> SyncResult<()> {
        // Join rows for pull requests are trimmed by the per-sync diff;
        // only orphan collection applies here.
        self.ctx.store.with_tx(|tx| {
            tx.delete_orphans()?;
            Ok(())
        })?;
        Ok(())
    }
}

/// Fold evaluations to the worst-severity outcome and a short reason.
fn fold_policy(evaluations: &[RemotePolicyEvaluation]) -> (PolicyStatus, String) {
    let worst = evaluations
        .iter()
        .fold(PolicyStatus::NotApplicable, |acc, e| acc.worst(e.status));
    let reason = evaluations
        .iter()
        .find(|e| e.status == worst && !e.policy_name.is_empty())
        .map(|e| format!("{} ({})", worst.reason(), e.policy_name))
        .unwrap_or_else(|| worst.reason().to_string());
    (worst, reason)
}

fn apply_pull_request_plan(store: &CacheStore, plan: &PullRequestPlan) -> SyncResult<usize> {
    let count = store.with_tx(|tx| {
        let org = tx.upsert_organization(&plan.organization_name, &plan.connection)?;
        let project = tx.upsert_project(
            &plan.project.name,
            &plan.project.id,
            &plan.project.description,
            org.id,
        )?;
        let repo = tx.upsert_repository(
            &plan.repository.name,
            &plan.repository.id,
            project.id,
            &plan.repository.clone_url,
            plan.repository.is_private,
        )?;
        let search =
            tx.upsert_pull_request_search(project.id, repo.id, &plan.username, plan.view_id)?;

        let sync_start = now_millis();
        for (pr, status, reason) in &plan.pull_requests {
            let creator_id = super::upsert_identity_ref(tx, &pr.created_by, &plan.avatars)?;
            let pr_id = tx.upsert_pull_request(
                pr.id,
                &pr.title,
                &pr.url,
                repo.id,
                creator_id,
                &pr.status,
                *status,
                reason,
                &pr.target_branch,
                pr.creation_date,
                &pr.html_url,
            )?;
            tx.upsert_search_pull_request(search.id, pr_id, now_millis())?;
        }

        tx.delete_stale_search_pull_requests(search.id, sync_start)?;
        tx.mark_organization_synced(org.id)?;
        Ok(plan.pull_requests.len())
    })?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(status: PolicyStatus, name: &str) -> RemotePolicyEvaluation {
        RemotePolicyEvaluation {
            status,
            policy_name: name.to_string(),
        }
    }

    #[test]
    fn fold_empty_is_not_applicable() {
        let (status, reason) = fold_policy(&[]);
        assert_eq!(status, PolicyStatus::NotApplicable);
        assert_eq!(reason, PolicyStatus::NotApplicable.reason());
    }

    #[test]
    fn fold_picks_worst_and_names_the_policy() {
        let evals = [
            eval(PolicyStatus::Approved, "Build"),
            eval(PolicyStatus::Running, "Reviewers"),
            eval(PolicyStatus::Approved, "Comments"),
        ];
        let (status, reason) = fold_policy(&evals);
        assert_eq!(status, PolicyStatus::Running);
        assert!(reason.contains("Reviewers"));
    }

    #[test]
    fn fold_rejected_beats_running() {
        let evals = [
            eval(PolicyStatus::Running, "Build"),
            eval(PolicyStatus::Rejected, "Reviewers"),
        ];
        let (status, _) = fold_policy(&evals);
        assert_eq!(status, PolicyStatus::Rejected);
    }
}
