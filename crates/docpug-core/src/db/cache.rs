//! Namespaced JSON mirrors of server-owned collections.

use rusqlite::{params, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};

use super::{Database, DbResult};

/// Keys of the local mirror table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Owners,
    Patients,
    Visits,
}

impl CacheKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKey::Owners => "docpug_owners_v1",
            CacheKey::Patients => "docpug_patients_v1",
            CacheKey::Visits => "docpug_visits_v1",
        }
    }
}

impl Database {
    /// Replace the mirrored value stored under `key`.
    pub fn put_cached<T: Serialize + ?Sized>(&self, key: CacheKey, value: &T) -> DbResult<()> {
        let json = serde_json::to_string(value)?;
        self.conn.execute(
            r#"
            INSERT INTO local_cache (key, value, updated_at)
            VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = datetime('now')
            "#,
            params![key.as_str(), json],
        )?;
        Ok(())
    }

    /// Read the mirrored value stored under `key`, if any.
    pub fn get_cached<T: DeserializeOwned>(&self, key: CacheKey) -> DbResult<Option<T>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM local_cache WHERE key = ?",
                [key.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Drop the mirrored value stored under `key`.
    pub fn clear_cached(&self, key: CacheKey) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM local_cache WHERE key = ?", [key.as_str()])?;
        Ok(rows_affected > 0)
    }
}
