//! File metadata and visit attachment persistence.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::{FileMeta, VisitFileLink};

const FILE_COLUMNS: &str = "f.file_id, f.name, f.stored_name, f.url, f.size, f.mime_type, f.uploaded_at";

impl Database {
    /// Insert or update file metadata.
    pub fn upsert_file(&self, meta: &FileMeta) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO files (file_id, name, stored_name, url, size, mime_type, uploaded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(file_id) DO UPDATE SET
                name = excluded.name,
                url = excluded.url,
                size = excluded.size,
                mime_type = excluded.mime_type
            "#,
            params![
                meta.file_id,
                meta.name,
                meta.stored_name,
                meta.url,
                meta.size,
                meta.mime_type,
                meta.uploaded_at,
            ],
        )?;
        Ok(())
    }

    /// Get file metadata by ID.
    pub fn get_file(&self, file_id: &str) -> DbResult<Option<FileMeta>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM files f WHERE f.file_id = ?", FILE_COLUMNS),
                [file_id],
                file_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Files attached to a visit, most recently linked first.
    pub fn files_for_visit(&self, visit_id: &str) -> DbResult<Vec<FileMeta>> {
        let sql = format!(
            r#"
            SELECT {} FROM files f
            JOIN visit_files vf ON vf.file_id = f.file_id
            WHERE vf.visit_id = ?
            ORDER BY vf.linked_at DESC, vf.rowid DESC
            "#,
            FILE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([visit_id], file_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Attach a file to a visit. Returns false if it was already attached.
    pub fn link_file(&self, link: &VisitFileLink) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO visit_files (visit_id, file_id, linked_at)
            VALUES (?1, ?2, ?3)
            "#,
            params![link.visit_id, link.file_id, link.linked_at],
        )?;
        Ok(rows_affected > 0)
    }

    /// Detach a file from a visit.
    pub fn unlink_file(&self, visit_id: &str, file_id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "DELETE FROM visit_files WHERE visit_id = ?1 AND file_id = ?2",
            params![visit_id, file_id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Detach every file from a visit (visit deleted).
    pub fn unlink_visit_files(&self, visit_id: &str) -> DbResult<usize> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM visit_files WHERE visit_id = ?", [visit_id])?;
        Ok(rows_affected)
    }

    /// Delete file metadata along with all of its visit links.
    pub fn delete_file(&self, file_id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM files WHERE file_id = ?", [file_id])?;
        Ok(rows_affected > 0)
    }
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileMeta> {
    Ok(FileMeta {
        file_id: row.get(0)?,
        name: row.get(1)?,
        stored_name: row.get(2)?,
        url: row.get(3)?,
        size: row.get(4)?,
        mime_type: row.get(5)?,
        uploaded_at: row.get(6)?,
    })
}
