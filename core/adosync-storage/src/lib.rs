//! SQLite cache store for the adosync core.
//!
//! One database (`AzureData.db`) holds the materialized remote state: parent
//! entities, per-search join tables, and a metadata table. The schema is
//! versioned; on a version mismatch the file is deleted and rebuilt, since
//! every row can be refetched. User-authored search definitions live in a
//! separate store (`adosync-searches`) precisely so this one stays
//! disposable.
//!
//! Referential integrity is enforced at the entity layer, not with SQL
//! foreign keys, so the two stores can evolve independently.

mod cache;
mod error;
mod schema;

pub use cache::{
    BuildRow, BuildSummary, CacheStore, CacheTx, DefinitionRow, IdentityRow, OrganizationRow,
    ProjectRow, PullRequestRow, PullRequestSearchRow, PullRequestSummary, QueryRow,
    RepositoryRow, WorkItemRow, WorkItemSummary, WorkItemTypeRow,
};
pub use error::{StorageError, StorageResult};
pub use schema::CACHE_SCHEMA_VERSION;

/// Metadata key under which the update service records its last successful
/// full refresh.
pub const META_LAST_UPDATED: &str = "LastUpdated";
