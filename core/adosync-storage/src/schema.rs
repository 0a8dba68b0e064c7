//! DDL for the cache database.

use rusqlite::Connection;

use crate::error::StorageResult;

/// Bumped whenever any DDL below changes shape. A mismatch against the
/// on-disk `user_version` causes the file to be deleted and rebuilt.
pub const CACHE_SCHEMA_VERSION: i64 = 16;

const METADATA_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

const ORGANIZATION_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS organization (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    connection TEXT NOT NULL UNIQUE,
    time_updated BIGINT NOT NULL,
    time_last_sync BIGINT NOT NULL DEFAULT 0
);
"#;

const PROJECT_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS project (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    external_id TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    organization_id INTEGER NOT NULL,
    time_updated BIGINT NOT NULL
);
"#;

const IDENTITY_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS identity (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    external_id TEXT NOT NULL UNIQUE,
    avatar BLOB,
    login_id TEXT,
    time_updated BIGINT NOT NULL
);
"#;

const REPOSITORY_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS repository (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    external_id TEXT NOT NULL UNIQUE,
    project_id INTEGER NOT NULL,
    clone_url TEXT NOT NULL DEFAULT '',
    is_private INTEGER NOT NULL DEFAULT 0,
    time_updated BIGINT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_repository_project ON repository(project_id);
"#;

const QUERY_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS query (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id TEXT NOT NULL,
    display_name TEXT NOT NULL,
    username TEXT NOT NULL,
    project_id INTEGER NOT NULL,
    time_updated BIGINT NOT NULL,
    UNIQUE (external_id, username)
);
"#;

const WORK_ITEM_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS work_item (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id BIGINT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    html_url TEXT NOT NULL DEFAULT '',
    state TEXT NOT NULL DEFAULT '',
    reason TEXT NOT NULL DEFAULT '',
    assigned_to_id INTEGER,
    created_date BIGINT NOT NULL DEFAULT 0,
    created_by_id INTEGER,
    changed_date BIGINT NOT NULL DEFAULT 0,
    changed_by_id INTEGER,
    work_item_type_id INTEGER NOT NULL
);
"#;

const WORK_ITEM_TYPE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS work_item_type (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    icon TEXT NOT NULL DEFAULT '',
    color TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    project_id INTEGER NOT NULL,
    UNIQUE (name, project_id)
);
"#;

const QUERY_WORK_ITEM_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS query_work_item (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    query_id INTEGER NOT NULL,
    work_item_id INTEGER NOT NULL,
    time_updated BIGINT NOT NULL,
    UNIQUE (query_id, work_item_id)
);
CREATE INDEX IF NOT EXISTS idx_query_work_item_query ON query_work_item(query_id);
"#;

const PULL_REQUEST_SEARCH_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS pull_request_search (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repository_id INTEGER NOT NULL,
    username TEXT NOT NULL,
    project_id INTEGER NOT NULL,
    view_id INTEGER NOT NULL,
    time_updated BIGINT NOT NULL,
    UNIQUE (project_id, repository_id, username, view_id)
);
"#;

const PULL_REQUEST_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS pull_request (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id BIGINT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    url TEXT NOT NULL DEFAULT '',
    repository_id INTEGER NOT NULL,
    creator_id INTEGER,
    status TEXT NOT NULL DEFAULT '',
    policy_status TEXT NOT NULL DEFAULT 'NotApplicable',
    policy_status_reason TEXT NOT NULL DEFAULT '',
    target_branch TEXT NOT NULL DEFAULT '',
    creation_date BIGINT NOT NULL DEFAULT 0,
    html_url TEXT NOT NULL DEFAULT ''
);
"#;

const PULL_REQUEST_SEARCH_PULL_REQUEST_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS pull_request_search_pull_request (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    search_id INTEGER NOT NULL,
    pull_request_id INTEGER NOT NULL,
    time_updated BIGINT NOT NULL,
    UNIQUE (search_id, pull_request_id)
);
CREATE INDEX IF NOT EXISTS idx_prspr_search ON pull_request_search_pull_request(search_id);
"#;

const DEFINITION_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS definition (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id BIGINT NOT NULL,
    name TEXT NOT NULL,
    project_id INTEGER NOT NULL,
    creation_date BIGINT NOT NULL DEFAULT 0,
    html_url TEXT NOT NULL DEFAULT '',
    time_updated BIGINT NOT NULL,
    UNIQUE (external_id, project_id)
);
"#;

const BUILD_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS build (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id BIGINT NOT NULL UNIQUE,
    build_number TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT '',
    result TEXT NOT NULL DEFAULT '',
    queue_time BIGINT NOT NULL DEFAULT 0,
    start_time BIGINT NOT NULL DEFAULT 0,
    finish_time BIGINT NOT NULL DEFAULT 0,
    url TEXT NOT NULL DEFAULT '',
    definition_id INTEGER NOT NULL,
    source_branch TEXT NOT NULL DEFAULT '',
    trigger_message TEXT NOT NULL DEFAULT '',
    requester_id INTEGER,
    time_updated BIGINT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_build_definition ON build(definition_id);
"#;

const ALL_DDL: &[&str] = &[
    METADATA_DDL,
    ORGANIZATION_DDL,
    PROJECT_DDL,
    IDENTITY_DDL,
    REPOSITORY_DDL,
    QUERY_DDL,
    WORK_ITEM_DDL,
    WORK_ITEM_TYPE_DDL,
    QUERY_WORK_ITEM_DDL,
    PULL_REQUEST_SEARCH_DDL,
    PULL_REQUEST_DDL,
    PULL_REQUEST_SEARCH_PULL_REQUEST_DDL,
    DEFINITION_DDL,
    BUILD_DDL,
];

/// Names of every cache table, in an order safe for dropping.
pub(crate) const ALL_TABLES: &[&str] = &[
    "query_work_item",
    "pull_request_search_pull_request",
    "build",
    "definition",
    "pull_request",
    "pull_request_search",
    "work_item",
    "work_item_type",
    "query",
    "repository",
    "identity",
    "project",
    "organization",
    "metadata",
];

/// Create all cache tables and stamp the schema version.
pub(crate) fn initialize_cache_schema(conn: &Connection) -> StorageResult<()> {
    for ddl in ALL_DDL {
        conn.execute_batch(ddl)?;
    }
    conn.execute_batch(&format!("PRAGMA user_version = {CACHE_SCHEMA_VERSION};"))?;
    Ok(())
}

/// Read the stamped schema version (0 for a freshly created file).
pub(crate) fn schema_version(conn: &Connection) -> StorageResult<i64> {
    let v: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(v)
}
