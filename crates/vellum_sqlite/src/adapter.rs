//! The sqlite `DatabaseAdapter`.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::Connection;
use vellum_adapter::{
    AdapterQueries, AdapterTransaction, DatabaseAdapter, PerformanceHook, RepoError, RepoResult,
};

use crate::queries::SqliteSession;
use crate::schema::ensure_schema;

/// An embedded sqlite backend over one connection.
///
/// Sqlite is a single-writer engine; the connection is guarded by a mutex
/// and every session or transaction holds it exclusively. This is the
/// backend of choice for embedded and test deployments.
pub struct SqliteAdapter {
    conn: Mutex<Connection>,
    hook: Option<PerformanceHook>,
}

impl SqliteAdapter {
    /// Opens (and if necessary creates) a database file.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| RepoError::generic(format!("failed to open sqlite database: {e}")))?;
        Self::from_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> RepoResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| RepoError::generic(format!("failed to open sqlite database: {e}")))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> RepoResult<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| RepoError::generic(format!("failed to configure sqlite: {e}")))?;
        ensure_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            hook: None,
        })
    }

    /// Installs a callback reporting the duration of every query.
    pub fn with_performance_hook(mut self, hook: PerformanceHook) -> Self {
        self.hook = Some(hook);
        self
    }
}

impl DatabaseAdapter for SqliteAdapter {
    fn begin(&self) -> RepoResult<Box<dyn AdapterTransaction + '_>> {
        let session = SqliteSession::transaction(self.conn.lock(), self.hook.clone())?;
        Ok(Box::new(session))
    }

    fn queries(&self) -> RepoResult<Box<dyn AdapterQueries + '_>> {
        let session = SqliteSession::autocommit(self.conn.lock(), self.hook.clone());
        Ok(Box::new(session))
    }
}
