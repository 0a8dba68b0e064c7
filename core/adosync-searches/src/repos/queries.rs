//! CRUD for saved work-item query definitions.

use std::sync::Arc;

use rusqlite::{params, OptionalExtension};
use tracing::info;

use adosync_types::now_millis;

use crate::defs::QueryDef;
use crate::error::{SearchError, SearchResult};
use crate::store::PersistentStore;
use crate::validator::Validator;

#[derive(Clone)]
pub struct QueryRepository {
    store: PersistentStore,
    validator: Arc<dyn Validator>,
}

impl QueryRepository {
    pub fn new(store: PersistentStore, validator: Arc<dyn Validator>) -> Self {
        Self { store, validator }
    }

    /// All saved queries, optionally only the pinned ones.
    pub fn get_all(&self, top_level_only: bool) -> SearchResult<Vec<QueryDef>> {
        let conn = self.store.lock_conn();
        let sql = if top_level_only {
            "SELECT id, name, url, is_top_level FROM query_def WHERE is_top_level = 1 ORDER BY name"
        } else {
            "SELECT id, name, url, is_top_level FROM query_def ORDER BY name"
        };
        let mut stmt = conn.prepare(sql)?;
        let defs = stmt
            .query_map([], |row| {
                Ok(QueryDef {
                    id: Some(row.get(0)?),
                    name: row.get(1)?,
                    url: row.get(2)?,
                    is_top_level: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(defs)
    }

    /// Upsert by `(organization, project, query id)`; validation runs first
    /// and a failure leaves the store untouched.
    pub async fn add_or_update(&self, def: &QueryDef) -> SearchResult<QueryDef> {
        let (uri, query_id) = def.parsed()?;
        self.validator.validate(&uri).await?;

        let conn = self.store.lock_conn();
        conn.execute(
            "INSERT INTO query_def (name, url, organization_url, project, query_id, time_created, is_top_level)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(organization_url, project, query_id) DO UPDATE SET
                 name = excluded.name,
                 url = excluded.url,
                 is_top_level = excluded.is_top_level",
            params![
                def.name,
                def.url,
                uri.organization_url(),
                uri.project,
                query_id.to_string(),
                now_millis(),
                def.is_top_level
            ],
        )?;
        let id: i64 = conn.query_row(
            "SELECT id FROM query_def WHERE organization_url = ? AND project = ? AND query_id = ?",
            params![uri.organization_url(), uri.project, query_id.to_string()],
            |row| row.get(0),
        )?;
        info!("[SEARCHES] saved query definition '{}'", def.name);
        Ok(QueryDef {
            id: Some(id),
            ..def.clone()
        })
    }

    pub fn remove(&self, def: &QueryDef) -> SearchResult<()> {
        let (uri, query_id) = def.parsed()?;
        let conn = self.store.lock_conn();
        let n = conn.execute(
            "DELETE FROM query_def WHERE organization_url = ? AND project = ? AND query_id = ?",
            params![uri.organization_url(), uri.project, query_id.to_string()],
        )?;
        if n == 0 {
            return Err(SearchError::NotFound(def.name.clone()));
        }
        Ok(())
    }

    pub fn is_top_level(&self, def: &QueryDef) -> SearchResult<bool> {
        let (uri, query_id) = def.parsed()?;
        let conn = self.store.lock_conn();
        let flag = conn
            .query_row(
                "SELECT is_top_level FROM query_def
                 WHERE organization_url = ? AND project = ? AND query_id = ?",
                params![uri.organization_url(), uri.project, query_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        flag.ok_or_else(|| SearchError::NotFound(def.name.clone()))
    }

    pub fn set_top_level(&self, def: &QueryDef, top_level: bool) -> SearchResult<()> {
        let (uri, query_id) = def.parsed()?;
        let conn = self.store.lock_conn();
        let n = conn.execute(
            "UPDATE query_def SET is_top_level = ?
             WHERE organization_url = ? AND project = ? AND query_id = ?",
            params![top_level, uri.organization_url(), uri.project, query_id.to_string()],
        )?;
        if n == 0 {
            return Err(SearchError::NotFound(def.name.clone()));
        }
        Ok(())
    }
}
