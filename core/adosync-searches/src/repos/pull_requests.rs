//! CRUD for saved pull-request search definitions.

use std::sync::Arc;

use rusqlite::{params, OptionalExtension};
use tracing::info;

use adosync_types::{now_millis, PullRequestView};

use crate::defs::PullRequestSearchDef;
use crate::error::{SearchError, SearchResult};
use crate::store::PersistentStore;
use crate::validator::Validator;

#[derive(Clone)]
pub struct PullRequestSearchRepository {
    store: PersistentStore,
    validator: Arc<dyn Validator>,
}

impl PullRequestSearchRepository {
    pub fn new(store: PersistentStore, validator: Arc<dyn Validator>) -> Self {
        Self { store, validator }
    }

    pub fn get_all(&self, top_level_only: bool) -> SearchResult<Vec<PullRequestSearchDef>> {
        let conn = self.store.lock_conn();
        let sql = if top_level_only {
            "SELECT id, name, url, view, is_top_level FROM pull_request_search_def
             WHERE is_top_level = 1 ORDER BY name"
        } else {
            "SELECT id, name, url, view, is_top_level FROM pull_request_search_def ORDER BY name"
        };
        let mut stmt = conn.prepare(sql)?;
        let defs = stmt
            .query_map([], |row| {
                let view: String = row.get(3)?;
                Ok(PullRequestSearchDef {
                    id: Some(row.get(0)?),
                    name: row.get(1)?,
                    url: row.get(2)?,
                    view: PullRequestView::parse(&view).unwrap_or(PullRequestView::All),
                    is_top_level: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(defs)
    }

    pub async fn add_or_update(
        &self,
        def: &PullRequestSearchDef,
    ) -> SearchResult<PullRequestSearchDef> {
        let (uri, repository) = def.parsed()?;
        self.validator.validate(&uri).await?;

        let conn = self.store.lock_conn();
        conn.execute(
            "INSERT INTO pull_request_search_def
                 (name, url, organization_url, project, repository, view, time_created, is_top_level)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(organization_url, project, repository, view) DO UPDATE SET
                 name = excluded.name,
                 url = excluded.url,
                 is_top_level = excluded.is_top_level",
            params![
                def.name,
                def.url,
                uri.organization_url(),
                uri.project,
                repository,
                def.view.as_str(),
                now_millis(),
                def.is_top_level
            ],
        )?;
        let id: i64 = conn.query_row(
            "SELECT id FROM pull_request_search_def
             WHERE organization_url = ? AND project = ? AND repository = ? AND view = ?",
            params![uri.organization_url(), uri.project, repository, def.view.as_str()],
            |row| row.get(0),
        )?;
        info!("[SEARCHES] saved pull request search '{}'", def.name);
        Ok(PullRequestSearchDef {
            id: Some(id),
            ..def.clone()
        })
    }

    pub fn remove(&self, def: &PullRequestSearchDef) -> SearchResult<()> {
        let (uri, repository) = def.parsed()?;
        let conn = self.store.lock_conn();
        let n = conn.execute(
            "DELETE FROM pull_request_search_def
             WHERE organization_url = ? AND project = ? AND repository = ? AND view = ?",
            params![uri.organization_url(), uri.project, repository, def.view.as_str()],
        )?;
        if n == 0 {
            return Err(SearchError::NotFound(def.name.clone()));
        }
        Ok(())
    }

    pub fn is_top_level(&self, def: &PullRequestSearchDef) -> SearchResult<bool> {
        let (uri, repository) = def.parsed()?;
        let conn = self.store.lock_conn();
        let flag = conn
            .query_row(
                "SELECT is_top_level FROM pull_request_search_def
                 WHERE organization_url = ? AND project = ? AND repository = ? AND view = ?",
                params![uri.organization_url(), uri.project, repository, def.view.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        flag.ok_or_else(|| SearchError::NotFound(def.name.clone()))
    }

    pub fn set_top_level(&self, def: &PullRequestSearchDef, top_level: bool) -> SearchResult<()> {
        let (uri, repository) = def.parsed()?;
        let conn = self.store.lock_conn();
        let n = conn.execute(
            "UPDATE pull_request_search_def SET is_top_level = ?
             WHERE organization_url = ? AND project = ? AND repository = ? AND view = ?",
            params![
                top_level,
                uri.organization_url(),
                uri.project,
                repository,
                def.view.as_str()
            ],
        )?;
        if n == 0 {
            return Err(SearchError::NotFound(def.name.clone()));
        }
        Ok(())
    }
}
