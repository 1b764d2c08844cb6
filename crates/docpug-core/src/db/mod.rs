//! Database layer: local persistence for registries, discharges, files and
//! server mirrors.

mod cache;
mod catalog;
mod discharges;
mod files;
mod schema;

pub use cache::*;
#[allow(unused_imports)]
pub use catalog::*;
#[allow(unused_imports)]
pub use discharges::*;
#[allow(unused_imports)]
pub use files::*;
pub use schema::*;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

impl DbError {
    /// Message suitable for a blocking alert.
    pub fn user_message(&self) -> String {
        match self {
            DbError::NotFound(what) => format!("Not found: {}", what),
            DbError::Constraint(reason) => reason.clone(),
            DbError::Sqlite(_) | DbError::Json(_) => "Local storage error".to_string(),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        debug!(path = %path.as_ref().display(), "opening database");
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a transaction.
    pub fn transaction(&mut self) -> DbResult<rusqlite::Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_schema_initialized() {
        let db = Database::open_in_memory().unwrap();

        let tables: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        for table in [
            "discharges",
            "files",
            "local_cache",
            "service_catalog",
            "stock_catalog",
            "visit_files",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
    }

    #[test]
    fn test_open_on_disk_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinic.sqlite3");

        {
            let db = Database::open(&path).unwrap();
            db.put_cached(CacheKey::Owners, &vec!["a".to_string()]).unwrap();
        }

        let db = Database::open(&path).unwrap();
        let owners: Option<Vec<String>> = db.get_cached(CacheKey::Owners).unwrap();
        assert_eq!(owners, Some(vec!["a".to_string()]));
    }
}
