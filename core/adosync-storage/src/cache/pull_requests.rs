//! Pull-request search, pull-request, and join rows.

use rusqlite::{params, OptionalExtension, Row};

use adosync_types::{now_millis, Millis, PolicyStatus};

use super::CacheTx;
use crate::error::StorageResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestSearchRow {
    pub id: i64,
    pub repository_id: i64,
    pub username: String,
    pub project_id: i64,
    pub view_id: i64,
    pub time_updated: Millis,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRow {
    pub id: i64,
    pub external_id: i64,
    pub title: String,
    pub url: String,
    pub repository_id: i64,
    pub creator_id: Option<i64>,
    pub status: String,
    pub policy_status: String,
    pub policy_status_reason: String,
    pub target_branch: String,
    pub creation_date: Millis,
    pub html_url: String,
}

/// A pull request joined with its creator, as rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestSummary {
    pub external_id: i64,
    pub title: String,
    pub html_url: String,
    pub status: String,
    pub policy_status: String,
    pub policy_status_reason: String,
    pub target_branch: String,
    pub creation_date: Millis,
    pub creator: Option<String>,
}

fn search_from_row(row: &Row<'_>) -> rusqlite::Result<PullRequestSearchRow> {
    Ok(PullRequestSearchRow {
        id: row.get(0)?,
        repository_id: row.get(1)?,
        username: row.get(2)?,
        project_id: row.get(3)?,
        view_id: row.get(4)?,
        time_updated: row.get(5)?,
    })
}

impl CacheTx<'_> {
    // ── Search rows ──

    pub fn upsert_pull_request_search(
        &self,
        project_id: i64,
        repository_id: i64,
        username: &str,
        view_id: i64,
    ) -> StorageResult<PullRequestSearchRow> {
        let now = now_millis();
        self.conn.execute(
            "INSERT INTO pull_request_search (repository_id, username, project_id, view_id, time_updated)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(project_id, repository_id, username, view_id) DO UPDATE SET
                 time_updated = excluded.time_updated",
            params![repository_id, username, project_id, view_id, now],
        )?;
        self.pull_request_search_by_key(project_id, repository_id, username, view_id)?
            .ok_or_else(|| {
                crate::StorageError::NotFound(format!(
                    "pull request search {project_id}/{repository_id}/{username}/{view_id}"
                ))
            })
    }

    pub fn pull_request_search_by_key(
        &self,
        project_id: i64,
        repository_id: i64,
        username: &str,
        view_id: i64,
    ) -> StorageResult<Option<PullRequestSearchRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, repository_id, username, project_id, view_id, time_updated
                 FROM pull_request_search
                 WHERE project_id = ? AND repository_id = ? AND username = ? AND view_id = ?",
                params![project_id, repository_id, username, view_id],
                search_from_row,
            )
            .optional()?;
        Ok(row)
    }

    // ── Pull requests ──

    #[allow(clippy::too_many_arguments)]
    pub fn upsert_pull_request(
        &self,
        external_id: i64,
        title: &str,
        url: &str,
        repository_id: i64,
        creator_id: Option<i64>,
        status: &str,
        policy_status: PolicyStatus,
        policy_status_reason: &str,
        target_branch: &str,
        creation_date: Millis,
        html_url: &str,
    ) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO pull_request (external_id, title, url, repository_id, creator_id, status,
                                       policy_status, policy_status_reason, target_branch,
                                       creation_date, html_url)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(external_id) DO UPDATE SET
                 title = excluded.title,
                 url = excluded.url,
                 repository_id = excluded.repository_id,
                 creator_id = excluded.creator_id,
                 status = excluded.status,
                 policy_status = excluded.policy_status,
                 policy_status_reason = excluded.policy_status_reason,
                 target_branch = excluded.target_branch,
                 creation_date = excluded.creation_date,
                 html_url = excluded.html_url",
            params![
                external_id,
                title,
                url,
                repository_id,
                creator_id,
                status,
                policy_status.as_str(),
                policy_status_reason,
                target_branch,
                creation_date,
                html_url
            ],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM pull_request WHERE external_id = ?",
            [external_id],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn pull_request_by_external_id(
        &self,
        external_id: i64,
    ) -> StorageResult<Option<PullRequestRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, external_id, title, url, repository_id, creator_id, status,
                        policy_status, policy_status_reason, target_branch, creation_date, html_url
                 FROM pull_request WHERE external_id = ?",
                [external_id],
                |row| {
                    Ok(PullRequestRow {
                        id: row.get(0)?,
                        external_id: row.get(1)?,
                        title: row.get(2)?,
                        url: row.get(3)?,
                        repository_id: row.get(4)?,
                        creator_id: row.get(5)?,
                        status: row.get(6)?,
                        policy_status: row.get(7)?,
                        policy_status_reason: row.get(8)?,
                        target_branch: row.get(9)?,
                        creation_date: row.get(10)?,
                        html_url: row.get(11)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    // ── Join table ──

    pub fn upsert_search_pull_request(
        &self,
        search_id: i64,
        pull_request_id: i64,
        time_updated: Millis,
    ) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO pull_request_search_pull_request (search_id, pull_request_id, time_updated)
             VALUES (?, ?, ?)
             ON CONFLICT(search_id, pull_request_id) DO UPDATE SET
                 time_updated = excluded.time_updated",
            params![search_id, pull_request_id, time_updated],
        )?;
        Ok(())
    }

    pub fn delete_stale_search_pull_requests(
        &self,
        search_id: i64,
        sync_start: Millis,
    ) -> StorageResult<usize> {
        let n = self.conn.execute(
            "DELETE FROM pull_request_search_pull_request
             WHERE search_id = ? AND time_updated < ?",
            params![search_id, sync_start],
        )?;
        Ok(n)
    }

    /// Pull requests for a search, newest first, joined with the creator.
    pub fn pull_requests_for_search(
        &self,
        search_id: i64,
    ) -> StorageResult<Vec<PullRequestSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT pr.external_id, pr.title, pr.html_url, pr.status, pr.policy_status,
                    pr.policy_status_reason, pr.target_branch, pr.creation_date, creator.name
             FROM pull_request_search_pull_request j
             JOIN pull_request pr ON pr.id = j.pull_request_id
             LEFT JOIN identity creator ON creator.id = pr.creator_id
             WHERE j.search_id = ?
             ORDER BY pr.creation_date DESC, j.time_updated DESC",
        )?;

        let items = stmt
            .query_map([search_id], |row| {
                Ok(PullRequestSummary {
                    external_id: row.get(0)?,
                    title: row.get(1)?,
                    html_url: row.get(2)?,
                    status: row.get(3)?,
                    policy_status: row.get(4)?,
                    policy_status_reason: row.get(5)?,
                    target_branch: row.get(6)?,
                    creation_date: row.get(7)?,
                    creator: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }
}
