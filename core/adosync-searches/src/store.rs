//! Thread-safe persistent store wrapper.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::warn;

use crate::error::{SearchError, SearchResult};
use crate::schema::migrate;

/// Thread-safe store for user-defined search definitions, backed by SQLite.
#[derive(Clone)]
pub struct PersistentStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl PersistentStore {
    /// Open (or create) the persistent database at the given path and apply
    /// pending migrations.
    pub fn open(path: &Path) -> SearchResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| SearchError::Inaccessible(format!("{}: {e}", path.display())))?;
        migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory persistent database (for testing).
    pub fn open_in_memory() -> SearchResult<Self> {
        let conn = Connection::open_in_memory()?;
        migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    pub(crate) fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            warn!("[SEARCHES] recovering from poisoned connection mutex");
            poisoned.into_inner()
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
