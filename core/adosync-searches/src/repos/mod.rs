//! Definition repositories, one per search kind, plus the aggregate.

mod definitions;
mod project_settings;
mod pull_requests;
mod queries;

use std::sync::Arc;

use crate::error::SearchResult;
use crate::store::PersistentStore;
use crate::validator::Validator;

pub use definitions::DefinitionSearchRepository;
pub use project_settings::ProjectSettingsRepository;
pub use pull_requests::PullRequestSearchRepository;
pub use queries::QueryRepository;

/// All four repositories over one persistent store.
#[derive(Clone)]
pub struct SearchRepositories {
    pub queries: QueryRepository,
    pub pull_requests: PullRequestSearchRepository,
    pub definitions: DefinitionSearchRepository,
    pub project_settings: ProjectSettingsRepository,
    store: PersistentStore,
}

impl SearchRepositories {
    pub fn new(store: PersistentStore, validator: Arc<dyn Validator>) -> Self {
        Self {
            queries: QueryRepository::new(store.clone(), validator.clone()),
            pull_requests: PullRequestSearchRepository::new(store.clone(), validator.clone()),
            definitions: DefinitionSearchRepository::new(store.clone(), validator.clone()),
            project_settings: ProjectSettingsRepository::new(store.clone(), validator),
            store,
        }
    }

    /// Distinct `(organization url, project)` pairs across the three saved
    /// search kinds. Used as the my-work-items discovery fallback when no
    /// project settings exist; case-insensitive thanks to the columns'
    /// NOCASE collation.
    pub fn distinct_org_projects(&self) -> SearchResult<Vec<(String, String)>> {
        let conn = self.store.lock_conn();
        let mut stmt = conn.prepare(
            "SELECT organization_url, project FROM query_def
             UNION
             SELECT organization_url, project FROM pull_request_search_def
             UNION
             SELECT organization_url, project FROM definition_search_def
             ORDER BY 1, 2",
        )?;
        let pairs = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pairs)
    }
}
