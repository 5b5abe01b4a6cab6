//! Shared SQLite connection handle.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use rusqlite::{Connection, Transaction};
use tracing::debug;

use super::functions;
use super::schema;
use crate::config::DatabaseConfig;
use crate::error::{VectorError, VectorResult};

/// Cloneable handle to one SQLite connection.
///
/// Every clone shares the same connection; each operation holds the lock for
/// its own duration only. The scoring functions are registered when the
/// connection is opened.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Opens (or creates) the database file at `path`.
    ///
    /// Missing parent directories are created. The busy timeout and journal
    /// mode come from `config`.
    pub fn open(path: impl AsRef<Path>, config: &DatabaseConfig) -> VectorResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| VectorError::store("open", e))?;
        }

        let conn = Connection::open(path).map_err(|e| VectorError::store("open", e))?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .map_err(|e| VectorError::store("open", e))?;
        let journal_mode: String = conn
            .pragma_update_and_check(None, "journal_mode", &config.journal_mode, |row| {
                row.get(0)
            })
            .map_err(|e| VectorError::store("open", e))?;

        debug!(path = %path.display(), %journal_mode, busy_timeout_ms = config.busy_timeout_ms, "opened database");

        Self::from_connection(conn, Some(path.to_path_buf()))
    }

    /// Opens the database configured in `[database]`.
    pub fn open_with_config(config: &DatabaseConfig) -> VectorResult<Self> {
        Self::open(&config.path, config)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> VectorResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| VectorError::store("open", e))?;
        Self::from_connection(conn, None)
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> VectorResult<Self> {
        functions::register(&conn).map_err(|e| VectorError::store("register_functions", e))?;
        conn.execute_batch(&schema::create_category_table_sql())
            .map_err(|e| VectorError::schema(schema::CATEGORY_TABLE, e))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// File backing this database, `None` for in-memory databases.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Locks the connection for direct use.
    pub fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    /// Runs `f` against the connection, mapping SQLite failures to
    /// [`VectorError::StoreError`] tagged with `operation`.
    pub fn with_connection<T>(
        &self,
        operation: &str,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> VectorResult<T> {
        let conn = self.conn.lock();
        f(&conn).map_err(|e| VectorError::store(operation, e))
    }

    /// Runs `f` inside one transaction.
    ///
    /// Commits when `f` succeeds; rolls back when it fails and returns its
    /// error. Failures to begin or commit are mapped with `on_error`.
    pub fn transaction<T>(
        &self,
        on_error: impl Fn(rusqlite::Error) -> VectorError,
        f: impl FnOnce(&Transaction<'_>) -> VectorResult<T>,
    ) -> VectorResult<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(&on_error)?;

        // Dropping an uncommitted transaction rolls it back
        let value = f(&tx)?;
        tx.commit().map_err(&on_error)?;

        Ok(value)
    }
}
