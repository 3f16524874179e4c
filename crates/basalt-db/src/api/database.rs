//! Database handle: owns the engine and hands out connections.

use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use super::connection::Connection;
use super::error::ApiError;
use crate::config::Config;
use crate::engine::Engine;

/// An opened database.
///
/// Dropping or closing the database invalidates every connection derived
/// from it; their later calls fail with a shutdown error.
#[derive(Debug)]
pub struct Database {
    engine: Arc<Engine>,
}

/// `None`, `""` and `":memory:"` all mean an in-memory database.
fn storage_path(path: Option<&Path>) -> Option<&Path> {
    path.filter(|p| !p.as_os_str().is_empty() && p.as_os_str() != ":memory:")
}

impl Database {
    /// Open a transient in-memory database.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the engine fails to start.
    pub fn open_in_memory() -> Result<Self, ApiError> {
        Self::open_ext(None, Config::default())
    }

    /// Open a database at `path` (`None` for in-memory) with defaults.
    ///
    /// # Errors
    ///
    /// Returns a connection error for an unusable path or engine failure.
    pub fn open(path: Option<&Path>) -> Result<Self, ApiError> {
        Self::open_ext(path, Config::default())
    }

    /// Open a database, consuming `config`.
    ///
    /// # Errors
    ///
    /// Returns a connection error for an unusable path or engine failure.
    pub fn open_ext(path: Option<&Path>, config: Config) -> Result<Self, ApiError> {
        let engine = Engine::open(storage_path(path), config).map_err(|e| match ApiError::from(e) {
            err @ ApiError::Connection { .. } => err,
            other => ApiError::connection(other.message()),
        })?;
        Ok(Self {
            engine: Arc::new(engine),
        })
    }

    /// Open a new connection.
    ///
    /// # Errors
    ///
    /// Returns a shutdown error if the database is closed.
    pub fn connect(&self) -> Result<Connection, ApiError> {
        self.engine.check_open()?;
        Ok(Connection::new(Arc::clone(&self.engine)))
    }

    /// Directory the database persists to, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.engine.path()
    }

    /// Configuration the database was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        self.engine.config()
    }

    /// Whether the database has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.engine.is_closed()
    }

    /// Close the database, writing a snapshot if it is path-backed.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written. The database is
    /// closed either way.
    pub fn close(self) -> Result<(), ApiError> {
        self.engine.close().map_err(ApiError::from)
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(e) = self.engine.close() {
            warn!(error = %e, "Failed to close database on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::codes;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.path().is_none());
        assert!(!db.is_closed());
        let _conn = db.connect().unwrap();
    }

    #[test]
    fn test_memory_aliases() {
        assert!(storage_path(Some(Path::new(":memory:"))).is_none());
        assert!(storage_path(Some(Path::new(""))).is_none());
        assert!(storage_path(Some(Path::new("db"))).is_some());
    }

    #[test]
    fn test_invalid_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, b"").unwrap();
        let err = Database::open(Some(&file)).unwrap_err();
        assert_eq!(err.code(), codes::INVALID_PATH);
    }

    #[test]
    fn test_close_invalidates_connections() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connect().unwrap();
        db.close().unwrap();
        let err = conn.query("SELECT 1").unwrap_err();
        assert_eq!(err.code(), codes::SHUTDOWN);
    }
}
