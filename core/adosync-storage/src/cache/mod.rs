//! Thread-safe cache store: schema bootstrap, transactions, metadata.
//!
//! All row operations live on [`CacheTx`], which borrows the connection
//! guard. `read` runs them in autocommit mode; `with_tx` wraps them in one
//! `BEGIN IMMEDIATE` transaction and holds the connection lock until commit
//! or rollback, so readers never observe half-synced state.

mod core_rows;
mod pipelines;
pub(crate) mod prune;
mod pull_requests;
mod work_items;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{info, warn};

use crate::error::{StorageError, StorageResult};
use crate::schema::{initialize_cache_schema, schema_version, ALL_TABLES, CACHE_SCHEMA_VERSION};

pub use core_rows::{IdentityRow, OrganizationRow, ProjectRow, RepositoryRow};
pub use pipelines::{BuildRow, BuildSummary, DefinitionRow};
pub use pull_requests::{PullRequestRow, PullRequestSearchRow, PullRequestSummary};
pub use work_items::{QueryRow, WorkItemRow, WorkItemSummary, WorkItemTypeRow};

/// Thread-safe store for materialized remote state, backed by SQLite.
#[derive(Clone)]
pub struct CacheStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

/// A borrowed connection scope; every row operation hangs off this.
pub struct CacheTx<'a> {
    pub(crate) conn: &'a Connection,
}

impl CacheStore {
    /// Open (or create) the cache database at the given path.
    ///
    /// On a schema-version mismatch the file is deleted and rebuilt; the
    /// cache is a mirror of remote state and loses nothing that cannot be
    /// refetched.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = match open_checked(path) {
            Ok(conn) => conn,
            Err(e) => {
                warn!("[CACHE] open failed ({e}), rebuilding cache database");
                rebuild(path)?
            }
        };

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory cache database (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_cache_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Acquire the connection lock, recovering from poison: the data under
    /// it is plain SQLite state that a panicked writer cannot corrupt
    /// mid-statement.
    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            warn!("[CACHE] recovering from poisoned connection mutex");
            poisoned.into_inner()
        })
    }

    /// Run read-only (or single-statement) operations in autocommit mode.
    pub fn read<T>(&self, f: impl FnOnce(&CacheTx<'_>) -> StorageResult<T>) -> StorageResult<T> {
        let conn = self.lock_conn();
        f(&CacheTx { conn: &conn })
    }

    /// Run a bulk write under one transaction. The connection lock is held
    /// for the whole scope; on error the transaction is rolled back.
    pub fn with_tx<T>(&self, f: impl FnOnce(&CacheTx<'_>) -> StorageResult<T>) -> StorageResult<T> {
        let conn = self.lock_conn();
        conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(&CacheTx { conn: &conn }) {
            Ok(value) => {
                conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rb) = conn.execute_batch("ROLLBACK") {
                    warn!("[CACHE] rollback failed: {rb}");
                }
                Err(e)
            }
        }
    }

    /// Drop every table and recreate the schema. Used by clear-cache.
    pub fn reset(&self) -> StorageResult<()> {
        let conn = self.lock_conn();
        let drops: String = ALL_TABLES
            .iter()
            .map(|t| format!("DROP TABLE IF EXISTS {t};"))
            .collect();
        conn.execute_batch(&drops)?;
        initialize_cache_schema(&conn)?;
        info!("[CACHE] cache store reset");
        Ok(())
    }

    /// Stamped schema version of the open database.
    pub fn schema_version(&self) -> StorageResult<i64> {
        schema_version(&self.lock_conn())
    }

    /// The file path, when the store is file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // ── Metadata ──

    pub fn get_metadata(&self, key: &str) -> StorageResult<Option<String>> {
        self.read(|tx| tx.get_metadata(key))
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> StorageResult<()> {
        self.read(|tx| tx.set_metadata(key, value))
    }
}

impl CacheTx<'_> {
    pub fn get_metadata(&self, key: &str) -> StorageResult<Option<String>> {
        let result = self.conn.query_row(
            "SELECT value FROM metadata WHERE key = ?",
            [key],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO metadata (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [key, value],
        )?;
        Ok(())
    }
}

/// Open an existing file and verify its schema version.
fn open_checked(path: &Path) -> StorageResult<Connection> {
    let conn = Connection::open(path)
        .map_err(|e| StorageError::Inaccessible(format!("{}: {e}", path.display())))?;

    let version = schema_version(&conn)?;
    if version == 0 {
        // Fresh file.
        initialize_cache_schema(&conn)?;
        return Ok(conn);
    }
    if version != CACHE_SCHEMA_VERSION {
        return Err(StorageError::Inaccessible(format!(
            "schema version {version}, expected {CACHE_SCHEMA_VERSION}"
        )));
    }
    Ok(conn)
}

/// Delete the file and create it from scratch. Failing here is terminal.
fn rebuild(path: &Path) -> StorageResult<Connection> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let conn = Connection::open(path)
        .map_err(|e| StorageError::Inaccessible(format!("{}: {e}", path.display())))?;
    initialize_cache_schema(&conn)?;
    Ok(conn)
}
