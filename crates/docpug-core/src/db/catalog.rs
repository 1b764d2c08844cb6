//! Service and stock catalog database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{ServiceItem, StockItem};

const SERVICE_COLUMNS: &str = "id, name, price, active";
const STOCK_COLUMNS: &str = "id, name, price, unit, qty, active";

impl Database {
    // =========================================================================
    // Services
    // =========================================================================

    /// Insert or update a service item.
    pub fn upsert_service_item(&self, item: &ServiceItem) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO service_catalog (id, name, price, active, updated_at)
            VALUES (?1, ?2, ?3, ?4, datetime('now'))
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                price = excluded.price,
                active = excluded.active,
                updated_at = datetime('now')
            "#,
            params![item.id, item.name, item.price, item.active],
        )?;
        Ok(())
    }

    /// Get a service item by ID.
    pub fn get_service_item(&self, id: &str) -> DbResult<Option<ServiceItem>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM service_catalog WHERE id = ?", SERVICE_COLUMNS),
                [id],
                service_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List service items, newest first.
    pub fn list_service_items(&self, active_only: bool) -> DbResult<Vec<ServiceItem>> {
        let sql = format!(
            "SELECT {} FROM service_catalog {} ORDER BY rowid DESC",
            SERVICE_COLUMNS,
            if active_only { "WHERE active = 1" } else { "" }
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], service_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Set the active flag of a service item.
    pub fn set_service_active(&self, id: &str, active: bool) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE service_catalog SET active = ?2, updated_at = datetime('now') WHERE id = ?1",
            params![id, active],
        )?;
        Ok(rows_affected > 0)
    }

    /// Delete a service item. Visits keep their snapshots.
    pub fn delete_service_item(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM service_catalog WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }

    /// Count service items.
    pub fn count_service_items(&self) -> DbResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM service_catalog", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // =========================================================================
    // Stock
    // =========================================================================

    /// Insert or update a stock item.
    pub fn upsert_stock_item(&self, item: &StockItem) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO stock_catalog (id, name, price, unit, qty, active, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                price = excluded.price,
                unit = excluded.unit,
                qty = excluded.qty,
                active = excluded.active,
                updated_at = datetime('now')
            "#,
            params![item.id, item.name, item.price, item.unit, item.qty, item.active],
        )?;
        Ok(())
    }

    /// Get a stock item by ID.
    pub fn get_stock_item(&self, id: &str) -> DbResult<Option<StockItem>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM stock_catalog WHERE id = ?", STOCK_COLUMNS),
                [id],
                stock_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List stock items, newest first.
    pub fn list_stock_items(&self, active_only: bool) -> DbResult<Vec<StockItem>> {
        let sql = format!(
            "SELECT {} FROM stock_catalog {} ORDER BY rowid DESC",
            STOCK_COLUMNS,
            if active_only { "WHERE active = 1" } else { "" }
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], stock_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Set the active flag of a stock item.
    pub fn set_stock_active(&self, id: &str, active: bool) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE stock_catalog SET active = ?2, updated_at = datetime('now') WHERE id = ?1",
            params![id, active],
        )?;
        Ok(rows_affected > 0)
    }

    /// Overwrite the quantity on hand.
    pub fn set_stock_qty(&self, id: &str, qty: f64) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE stock_catalog SET qty = ?2, updated_at = datetime('now') WHERE id = ?1",
            params![id, qty],
        )?;
        Ok(rows_affected > 0)
    }

    /// Add `delta` (possibly negative) to the quantity on hand.
    ///
    /// Returns the new quantity. Fails with `Constraint` when the result
    /// would drop below zero, leaving the row unchanged.
    pub fn adjust_stock_qty(&self, id: &str, delta: f64) -> DbResult<f64> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE stock_catalog SET qty = qty + ?2, updated_at = datetime('now')
            WHERE id = ?1 AND qty + ?2 >= 0
            "#,
            params![id, delta],
        )?;

        let current: Option<f64> = self
            .conn
            .query_row("SELECT qty FROM stock_catalog WHERE id = ?", [id], |row| {
                row.get(0)
            })
            .optional()?;

        match (rows_affected, current) {
            (_, None) => Err(DbError::NotFound(format!("stock item {}", id))),
            (0, Some(qty)) => Err(DbError::Constraint(format!(
                "Insufficient stock for {}: {} on hand, {} requested",
                id, qty, -delta
            ))),
            (_, Some(qty)) => Ok(qty),
        }
    }

    /// Delete a stock item. Visits keep their snapshots.
    pub fn delete_stock_item(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM stock_catalog WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }

    /// Count stock items.
    pub fn count_stock_items(&self) -> DbResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM stock_catalog", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn service_from_row(row: &Row<'_>) -> rusqlite::Result<ServiceItem> {
    Ok(ServiceItem {
        id: row.get(0)?,
        name: row.get(1)?,
        price: row.get(2)?,
        active: row.get(3)?,
    })
}

fn stock_from_row(row: &Row<'_>) -> rusqlite::Result<StockItem> {
    Ok(StockItem {
        id: row.get(0)?,
        name: row.get(1)?,
        price: row.get(2)?,
        unit: row.get(3)?,
        qty: row.get(4)?,
        active: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_upsert_and_get_service() {
        let db = setup_db();

        let mut item = ServiceItem::with_id("svc_exam", "Огляд", 500.0);
        db.upsert_service_item(&item).unwrap();

        item.price = 600.0;
        db.upsert_service_item(&item).unwrap();

        let retrieved = db.get_service_item("svc_exam").unwrap().unwrap();
        assert_eq!(retrieved.name, "Огляд");
        assert_eq!(retrieved.price, 600.0);
        assert!(retrieved.active);
        assert_eq!(db.count_service_items().unwrap(), 1);
    }

    #[test]
    fn test_list_newest_first_and_active_filter() {
        let db = setup_db();

        db.upsert_service_item(&ServiceItem::with_id("svc_a", "A", 1.0))
            .unwrap();
        db.upsert_service_item(&ServiceItem::with_id("svc_b", "B", 2.0))
            .unwrap();
        db.set_service_active("svc_a", false).unwrap();

        let all = db.list_service_items(false).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "svc_b");

        let active = db.list_service_items(true).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "svc_b");
    }

    #[test]
    fn test_delete_service() {
        let db = setup_db();
        db.upsert_service_item(&ServiceItem::with_id("svc_a", "A", 1.0))
            .unwrap();

        assert!(db.delete_service_item("svc_a").unwrap());
        assert!(!db.delete_service_item("svc_a").unwrap());
        assert!(db.get_service_item("svc_a").unwrap().is_none());
    }

    #[test]
    fn test_adjust_stock_qty() {
        let db = setup_db();
        db.upsert_stock_item(&StockItem::with_id("stk_a", "A", 70.0, "шт", 7.0))
            .unwrap();

        assert_eq!(db.adjust_stock_qty("stk_a", 3.0).unwrap(), 10.0);
        assert_eq!(db.adjust_stock_qty("stk_a", -4.0).unwrap(), 6.0);

        let err = db.adjust_stock_qty("stk_a", -7.0).unwrap_err();
        assert!(matches!(err, DbError::Constraint(_)));
        assert_eq!(db.get_stock_item("stk_a").unwrap().unwrap().qty, 6.0);

        let err = db.adjust_stock_qty("stk_missing", 1.0).unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[test]
    fn test_stock_fields_persist() {
        let db = setup_db();
        let item = StockItem::with_id("stk_m", "Мелоксивет", 70.0, "фл", 10.0);
        db.upsert_stock_item(&item).unwrap();

        let retrieved = db.get_stock_item("stk_m").unwrap().unwrap();
        assert_eq!(retrieved, item);

        db.set_stock_qty("stk_m", 2.5).unwrap();
        db.set_stock_active("stk_m", false).unwrap();
        let retrieved = db.get_stock_item("stk_m").unwrap().unwrap();
        assert_eq!(retrieved.qty, 2.5);
        assert!(!retrieved.active);
        assert!(db.list_stock_items(true).unwrap().is_empty());
    }
}
