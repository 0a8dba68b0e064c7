//! Additive migrations for the persistent database.
//!
//! `user_version` records how many migrations have been applied. New
//! migrations append to the list; existing entries are frozen. Dropping or
//! rewriting a table here would destroy user intent, which is the one thing
//! this store must never do.

use rusqlite::Connection;

use crate::error::SearchResult;

/// Number of migrations below; stamped into `user_version` after open.
pub const PERSISTENT_SCHEMA_VERSION: i64 = 2;

const MIGRATION_1_BASE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS query_def (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    url TEXT NOT NULL,
    organization_url TEXT NOT NULL COLLATE NOCASE,
    project TEXT NOT NULL COLLATE NOCASE,
    query_id TEXT NOT NULL,
    time_created BIGINT NOT NULL,
    UNIQUE (organization_url, project, query_id)
);

CREATE TABLE IF NOT EXISTS pull_request_search_def (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    url TEXT NOT NULL,
    organization_url TEXT NOT NULL COLLATE NOCASE,
    project TEXT NOT NULL COLLATE NOCASE,
    repository TEXT NOT NULL COLLATE NOCASE,
    view TEXT NOT NULL,
    time_created BIGINT NOT NULL,
    UNIQUE (organization_url, project, repository, view)
);

CREATE TABLE IF NOT EXISTS definition_search_def (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    url TEXT NOT NULL,
    organization_url TEXT NOT NULL COLLATE NOCASE,
    project TEXT NOT NULL COLLATE NOCASE,
    definition_id BIGINT NOT NULL,
    time_created BIGINT NOT NULL,
    UNIQUE (organization_url, project, definition_id)
);

CREATE TABLE IF NOT EXISTS project_settings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    organization_url TEXT NOT NULL COLLATE NOCASE,
    project_name TEXT NOT NULL COLLATE NOCASE,
    time_created BIGINT NOT NULL,
    UNIQUE (organization_url, project_name)
);
"#;

const MIGRATION_2_TOP_LEVEL: &str = r#"
ALTER TABLE query_def ADD COLUMN is_top_level INTEGER NOT NULL DEFAULT 0;
ALTER TABLE pull_request_search_def ADD COLUMN is_top_level INTEGER NOT NULL DEFAULT 0;
ALTER TABLE definition_search_def ADD COLUMN is_top_level INTEGER NOT NULL DEFAULT 0;
"#;

const MIGRATIONS: &[&str] = &[MIGRATION_1_BASE_TABLES, MIGRATION_2_TOP_LEVEL];

/// Apply any migrations newer than the file's `user_version`.
pub(crate) fn migrate(conn: &Connection) -> SearchResult<()> {
    let applied: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    for (index, migration) in MIGRATIONS.iter().enumerate().skip(applied as usize) {
        conn.execute_batch(migration)?;
        conn.execute_batch(&format!("PRAGMA user_version = {};", index + 1))?;
    }
    Ok(())
}
