//! CRUD for project settings rows.
//!
//! Each row implicitly defines a my-work-items search for its project.

use std::sync::Arc;

use rusqlite::params;
use tracing::info;

use adosync_types::now_millis;

use crate::defs::ProjectSettings;
use crate::error::{SearchError, SearchResult};
use crate::store::PersistentStore;
use crate::validator::Validator;

#[derive(Clone)]
pub struct ProjectSettingsRepository {
    store: PersistentStore,
    validator: Arc<dyn Validator>,
}

impl ProjectSettingsRepository {
    pub fn new(store: PersistentStore, validator: Arc<dyn Validator>) -> Self {
        Self { store, validator }
    }

    pub fn get_all(&self) -> SearchResult<Vec<ProjectSettings>> {
        let conn = self.store.lock_conn();
        let mut stmt = conn.prepare(
            "SELECT id, organization_url, project_name FROM project_settings
             ORDER BY organization_url, project_name",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ProjectSettings {
                    id: Some(row.get(0)?),
                    organization_url: row.get(1)?,
                    project_name: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub async fn add_or_update(&self, settings: &ProjectSettings) -> SearchResult<ProjectSettings> {
        let uri = settings.parsed()?;
        self.validator.validate(&uri).await?;

        let conn = self.store.lock_conn();
        conn.execute(
            "INSERT INTO project_settings (organization_url, project_name, time_created)
             VALUES (?, ?, ?)
             ON CONFLICT(organization_url, project_name) DO NOTHING",
            params![settings.organization_url, settings.project_name, now_millis()],
        )?;
        let id: i64 = conn.query_row(
            "SELECT id FROM project_settings WHERE organization_url = ? AND project_name = ?",
            params![settings.organization_url, settings.project_name],
            |row| row.get(0),
        )?;
        info!(
            "[SEARCHES] saved project settings {}/{}",
            settings.organization_url, settings.project_name
        );
        Ok(ProjectSettings {
            id: Some(id),
            ..settings.clone()
        })
    }

    pub fn remove(&self, settings: &ProjectSettings) -> SearchResult<()> {
        let conn = self.store.lock_conn();
        let n = conn.execute(
            "DELETE FROM project_settings WHERE organization_url = ? AND project_name = ?",
            params![settings.organization_url, settings.project_name],
        )?;
        if n == 0 {
            return Err(SearchError::NotFound(format!(
                "{}/{}",
                settings.organization_url, settings.project_name
            )));
        }
        Ok(())
    }
}
