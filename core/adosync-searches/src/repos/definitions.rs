//! CRUD for saved pipeline (build definition) search definitions.

use std::sync::Arc;

use rusqlite::{params, OptionalExtension};
use tracing::info;

use adosync_types::now_millis;

use crate::defs::DefinitionSearchDef;
use crate::error::{SearchError, SearchResult};
use crate::store::PersistentStore;
use crate::validator::Validator;

#[derive(Clone)]
pub struct DefinitionSearchRepository {
    store: PersistentStore,
    validator: Arc<dyn Validator>,
}

impl DefinitionSearchRepository {
    pub fn new(store: PersistentStore, validator: Arc<dyn Validator>) -> Self {
        Self { store, validator }
    }

    pub fn get_all(&self, top_level_only: bool) -> SearchResult<Vec<DefinitionSearchDef>> {
        let conn = self.store.lock_conn();
        let sql = if top_level_only {
            "SELECT id, name, definition_id, url, is_top_level FROM definition_search_def
             WHERE is_top_level = 1 ORDER BY name"
        } else {
            "SELECT id, name, definition_id, url, is_top_level FROM definition_search_def ORDER BY name"
        };
        let mut stmt = conn.prepare(sql)?;
        let defs = stmt
            .query_map([], |row| {
                Ok(DefinitionSearchDef {
                    id: Some(row.get(0)?),
                    name: row.get(1)?,
                    external_id: row.get(2)?,
                    url: row.get(3)?,
                    is_top_level: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(defs)
    }

    pub async fn add_or_update(&self, def: &DefinitionSearchDef) -> SearchResult<DefinitionSearchDef> {
        let uri = def.parsed()?;
        self.validator.validate(&uri).await?;

        let conn = self.store.lock_conn();
        conn.execute(
            "INSERT INTO definition_search_def
                 (name, url, organization_url, project, definition_id, time_created, is_top_level)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(organization_url, project, definition_id) DO UPDATE SET
                 name = excluded.name,
                 url = excluded.url,
                 is_top_level = excluded.is_top_level",
            params![
                def.name,
                def.url,
                uri.organization_url(),
                uri.project,
                def.external_id,
                now_millis(),
                def.is_top_level
            ],
        )?;
        let id: i64 = conn.query_row(
            "SELECT id FROM definition_search_def
             WHERE organization_url = ? AND project = ? AND definition_id = ?",
            params![uri.organization_url(), uri.project, def.external_id],
            |row| row.get(0),
        )?;
        info!("[SEARCHES] saved pipeline search '{}'", def.name);
        Ok(DefinitionSearchDef {
            id: Some(id),
            ..def.clone()
        })
    }

    pub fn remove(&self, def: &DefinitionSearchDef) -> SearchResult<()> {
        let uri = def.parsed()?;
        let conn = self.store.lock_conn();
        let n = conn.execute(
            "DELETE FROM definition_search_def
             WHERE organization_url = ? AND project = ? AND definition_id = ?",
            params![uri.organization_url(), uri.project, def.external_id],
        )?;
        if n == 0 {
            return Err(SearchError::NotFound(def.name.clone()));
        }
        Ok(())
    }

    pub fn is_top_level(&self, def: &DefinitionSearchDef) -> SearchResult<bool> {
        let uri = def.parsed()?;
        let conn = self.store.lock_conn();
        let flag = conn
            .query_row(
                "SELECT is_top_level FROM definition_search_def
                 WHERE organization_url = ? AND project = ? AND definition_id = ?",
                params![uri.organization_url(), uri.project, def.external_id],
                |row| row.get(0),
            )
            .optional()?;
        flag.ok_or_else(|| SearchError::NotFound(def.name.clone()))
    }

    pub fn set_top_level(&self, def: &DefinitionSearchDef, top_level: bool) -> SearchResult<()> {
        let uri = def.parsed()?;
        let conn = self.store.lock_conn();
        let n = conn.execute(
            "UPDATE definition_search_def SET is_top_level = ?
             WHERE organization_url = ? AND project = ? AND definition_id = ?",
            params![top_level, uri.organization_url(), uri.project, def.external_id],
        )?;
        if n == 0 {
            return Err(SearchError::NotFound(def.name.clone()));
        }
        Ok(())
    }
}
