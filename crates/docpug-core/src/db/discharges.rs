//! Discharge override persistence.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};
use crate::models::DischargeRecord;

impl Database {
    /// Insert or replace the discharge record of a visit.
    pub fn upsert_discharge(&self, record: &DischargeRecord) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO discharges (visit_id, complaint, diagnosis, rx, recommendations, follow_up, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(visit_id) DO UPDATE SET
                complaint = excluded.complaint,
                diagnosis = excluded.diagnosis,
                rx = excluded.rx,
                recommendations = excluded.recommendations,
                follow_up = excluded.follow_up,
                updated_at = excluded.updated_at
            "#,
            params![
                record.visit_id,
                record.complaint,
                record.diagnosis,
                record.rx,
                record.recommendations,
                record.follow_up,
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get the discharge record of a visit.
    pub fn get_discharge(&self, visit_id: &str) -> DbResult<Option<DischargeRecord>> {
        self.conn
            .query_row(
                r#"
                SELECT visit_id, complaint, diagnosis, rx, recommendations, follow_up, updated_at
                FROM discharges WHERE visit_id = ?
                "#,
                [visit_id],
                |row| {
                    Ok(DischargeRecord {
                        visit_id: row.get(0)?,
                        complaint: row.get(1)?,
                        diagnosis: row.get(2)?,
                        rx: row.get(3)?,
                        recommendations: row.get(4)?,
                        follow_up: row.get(5)?,
                        updated_at: row.get(6)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    /// Delete the discharge record of a visit.
    pub fn delete_discharge(&self, visit_id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM discharges WHERE visit_id = ?", [visit_id])?;
        Ok(rows_affected > 0)
    }
}
