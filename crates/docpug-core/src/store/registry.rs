//! Local catalogs of billable services and stock items.

use strsim::{jaro_winkler, normalized_levenshtein};
use tracing::info;

use super::{required, StoreError, StoreResult};
use crate::db::{Database, DbError};
use crate::models::{clamp_non_negative, LineKind, ServiceItem, StockItem, DEFAULT_STOCK_UNIT};

/// Minimum fuzzy score for a search hit.
const SEARCH_THRESHOLD: f64 = 0.6;

/// Services installed into an empty catalog, in display order.
pub const DEFAULT_SERVICES: &[(&str, &str, f64)] = &[
    ("svc_exam", "Огляд", 500.0),
    ("svc_trip", "Виїзд", 1500.0),
    ("svc_vax", "Вакцинація", 800.0),
    ("svc_consult", "Консультація", 500.0),
    ("svc_cat_castr", "Кастрація кота", 2500.0),
    ("svc_dog_castr", "Кастрація пса", 3500.0),
];

/// Stock installed into an empty catalog: (id, name, price, unit, qty).
pub const DEFAULT_STOCK: &[(&str, &str, f64, &str, f64)] =
    &[("stk_meloxivet", "Мелоксивет", 70.0, DEFAULT_STOCK_UNIT, 10.0)];

/// Score `name` against a lowercase query: substring hits score 1.0.
fn match_score(name: &str, query_lower: &str) -> f64 {
    let name_lower = name.to_lowercase();
    if name_lower.contains(query_lower) {
        return 1.0;
    }
    fuzzy_match(&name_lower, query_lower)
}

/// Combined Jaro-Winkler and normalized Levenshtein similarity.
fn fuzzy_match(a: &str, b: &str) -> f64 {
    jaro_winkler(a, b) * 0.6 + normalized_levenshtein(a, b) * 0.4
}

/// Rank active items by name similarity.
fn rank<T>(items: Vec<T>, name: impl Fn(&T) -> &str, query: &str, limit: usize) -> Vec<T> {
    let query_lower = query.trim().to_lowercase();
    if query_lower.is_empty() {
        return items.into_iter().take(limit).collect();
    }

    let mut scored: Vec<(f64, T)> = items
        .into_iter()
        .map(|item| (match_score(name(&item), &query_lower), item))
        .filter(|(score, _)| *score >= SEARCH_THRESHOLD)
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(limit).map(|(_, item)| item).collect()
}

/// Catalog of billable services.
pub struct ServiceRegistry<'a> {
    db: &'a Database,
}

impl<'a> ServiceRegistry<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Add a service with a generated ID.
    pub fn add(&self, name: &str, price: f64) -> StoreResult<ServiceItem> {
        let name = required(name, "Service name")?;
        let item = ServiceItem::new(&name, price);
        self.db.upsert_service_item(&item)?;
        info!(id = %item.id, name = %item.name, price = item.price, "service added");
        Ok(item)
    }

    pub fn get(&self, id: &str) -> StoreResult<Option<ServiceItem>> {
        Ok(self.db.get_service_item(id)?)
    }

    /// Get or fail with `NotFound`.
    pub fn require(&self, id: &str) -> StoreResult<ServiceItem> {
        self.get(id)?
            .ok_or_else(|| StoreError::NotFound(format!("service {}", id)))
    }

    /// Newest first.
    pub fn list(&self, active_only: bool) -> StoreResult<Vec<ServiceItem>> {
        Ok(self.db.list_service_items(active_only)?)
    }

    /// Rename and/or reprice. Existing visit lines keep their snapshots.
    pub fn update(&self, id: &str, name: &str, price: f64) -> StoreResult<ServiceItem> {
        let mut item = self.require(id)?;
        item.name = required(name, "Service name")?;
        item.price = clamp_non_negative(price);
        self.db.upsert_service_item(&item)?;
        info!(id, "service updated");
        Ok(item)
    }

    pub fn toggle_active(&self, id: &str) -> StoreResult<ServiceItem> {
        let mut item = self.require(id)?;
        item.toggle_active();
        self.db.set_service_active(id, item.active)?;
        Ok(item)
    }

    pub fn set_active(&self, id: &str, active: bool) -> StoreResult<()> {
        if !self.db.set_service_active(id, active)? {
            return Err(StoreError::NotFound(format!("service {}", id)));
        }
        Ok(())
    }

    pub fn delete(&self, id: &str) -> StoreResult<bool> {
        let deleted = self.db.delete_service_item(id)?;
        if deleted {
            info!(id, "service deleted");
        }
        Ok(deleted)
    }

    /// Active services ranked by name similarity.
    pub fn search(&self, query: &str, limit: usize) -> StoreResult<Vec<ServiceItem>> {
        Ok(rank(self.list(true)?, |s| s.name.as_str(), query, limit))
    }

    /// Install the default catalog when empty. Returns the number installed.
    pub fn seed_defaults(&self) -> StoreResult<usize> {
        if self.db.count_service_items()? > 0 {
            return Ok(0);
        }
        for (id, name, price) in DEFAULT_SERVICES.iter().rev() {
            self.db
                .upsert_service_item(&ServiceItem::with_id(id, name, *price))?;
        }
        Ok(DEFAULT_SERVICES.len())
    }
}

/// Catalog of stock items with quantity on hand.
pub struct StockRegistry<'a> {
    db: &'a Database,
}

impl<'a> StockRegistry<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Add a stock item with a generated ID.
    pub fn add(&self, name: &str, price: f64, unit: &str, qty: f64) -> StoreResult<StockItem> {
        let name = required(name, "Stock item name")?;
        let item = StockItem::new(&name, price, unit, qty);
        self.db.upsert_stock_item(&item)?;
        info!(id = %item.id, name = %item.name, qty = item.qty, "stock item added");
        Ok(item)
    }

    pub fn get(&self, id: &str) -> StoreResult<Option<StockItem>> {
        Ok(self.db.get_stock_item(id)?)
    }

    /// Get or fail with `NotFound`.
    pub fn require(&self, id: &str) -> StoreResult<StockItem> {
        self.get(id)?
            .ok_or_else(|| StoreError::NotFound(format!("stock item {}", id)))
    }

    /// Newest first.
    pub fn list(&self, active_only: bool) -> StoreResult<Vec<StockItem>> {
        Ok(self.db.list_stock_items(active_only)?)
    }

    /// Rename, reprice or change the unit. Quantity is left alone.
    pub fn update(&self, id: &str, name: &str, price: f64, unit: &str) -> StoreResult<StockItem> {
        let mut item = self.require(id)?;
        item.name = required(name, "Stock item name")?;
        item.price = clamp_non_negative(price);
        item.unit = match unit.trim() {
            "" => DEFAULT_STOCK_UNIT.to_string(),
            unit => unit.to_string(),
        };
        self.db.upsert_stock_item(&item)?;
        info!(id, "stock item updated");
        Ok(item)
    }

    pub fn toggle_active(&self, id: &str) -> StoreResult<StockItem> {
        let mut item = self.require(id)?;
        item.toggle_active();
        self.db.set_stock_active(id, item.active)?;
        Ok(item)
    }

    pub fn set_active(&self, id: &str, active: bool) -> StoreResult<()> {
        if !self.db.set_stock_active(id, active)? {
            return Err(StoreError::NotFound(format!("stock item {}", id)));
        }
        Ok(())
    }

    /// Overwrite quantity on hand (stocktake).
    pub fn set_qty(&self, id: &str, qty: f64) -> StoreResult<()> {
        if !self.db.set_stock_qty(id, clamp_non_negative(qty))? {
            return Err(StoreError::NotFound(format!("stock item {}", id)));
        }
        Ok(())
    }

    /// Move quantity on hand by `delta`, refusing to go below zero.
    pub fn adjust_qty(&self, id: &str, delta: f64) -> StoreResult<f64> {
        match self.db.adjust_stock_qty(id, delta) {
            Ok(qty) => Ok(qty),
            Err(DbError::NotFound(_)) => Err(StoreError::NotFound(format!("stock item {}", id))),
            Err(DbError::Constraint(_)) => {
                let item = self.require(id)?;
                Err(StoreError::InsufficientStock {
                    stock_id: item.id,
                    name: item.name,
                    available: item.qty,
                    requested: -delta,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn delete(&self, id: &str) -> StoreResult<bool> {
        let deleted = self.db.delete_stock_item(id)?;
        if deleted {
            info!(id, "stock item deleted");
        }
        Ok(deleted)
    }

    /// Active stock items ranked by name similarity.
    pub fn search(&self, query: &str, limit: usize) -> StoreResult<Vec<StockItem>> {
        Ok(rank(self.list(true)?, |s| s.name.as_str(), query, limit))
    }

    /// Install the default catalog when empty. Returns the number installed.
    pub fn seed_defaults(&self) -> StoreResult<usize> {
        if self.db.count_stock_items()? > 0 {
            return Ok(0);
        }
        for (id, name, price, unit, qty) in DEFAULT_STOCK.iter().rev() {
            self.db
                .upsert_stock_item(&StockItem::with_id(id, name, *price, unit, *qty))?;
        }
        Ok(DEFAULT_STOCK.len())
    }
}

/// Fail unless the item is active.
pub(crate) fn ensure_active(kind: LineKind, id: &str, active: bool) -> StoreResult<()> {
    if active {
        Ok(())
    } else {
        Err(StoreError::InactiveItem {
            kind,
            id: id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_seed_defaults_once_in_order() {
        let db = setup_db();
        let services = ServiceRegistry::new(&db);

        assert_eq!(services.seed_defaults().unwrap(), 6);
        assert_eq!(services.seed_defaults().unwrap(), 0);

        let list = services.list(false).unwrap();
        assert_eq!(list[0].id, "svc_exam");
        assert_eq!(list[5].id, "svc_dog_castr");

        let stock = StockRegistry::new(&db);
        stock.seed_defaults().unwrap();
        let meloxivet = stock.require("stk_meloxivet").unwrap();
        assert_eq!(meloxivet.unit, "шт");
        assert_eq!(meloxivet.qty, 10.0);
    }

    #[test]
    fn test_add_validates_and_lists_newest_first() {
        let db = setup_db();
        let services = ServiceRegistry::new(&db);

        assert!(matches!(
            services.add("  ", 100.0),
            Err(StoreError::Validation(_))
        ));

        let first = services.add("УЗД", 700.0).unwrap();
        let second = services.add("Рентген", -5.0).unwrap();
        assert_eq!(second.price, 0.0);

        let list = services.list(false).unwrap();
        assert_eq!(list[0].id, second.id);
        assert_eq!(list[1].id, first.id);
    }

    #[test]
    fn test_toggle_twice_restores() {
        let db = setup_db();
        let services = ServiceRegistry::new(&db);
        let item = services.add("Огляд", 500.0).unwrap();

        let off = services.toggle_active(&item.id).unwrap();
        assert!(!off.active);
        assert!(services.list(true).unwrap().is_empty());

        let on = services.toggle_active(&item.id).unwrap();
        assert_eq!(on, item);
    }

    #[test]
    fn test_update_and_missing() {
        let db = setup_db();
        let stock = StockRegistry::new(&db);
        let item = stock.add("Бинт", 30.0, "", 5.0).unwrap();

        let updated = stock.update(&item.id, "Бинт еластичний", 45.0, "уп").unwrap();
        assert_eq!(updated.unit, "уп");
        assert_eq!(updated.qty, 5.0);

        assert!(matches!(
            stock.update("stk_missing", "X", 1.0, ""),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            stock.set_active("stk_missing", true),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_adjust_qty_refuses_negative() {
        let db = setup_db();
        let stock = StockRegistry::new(&db);
        stock.seed_defaults().unwrap();

        assert_eq!(stock.adjust_qty("stk_meloxivet", -4.0).unwrap(), 6.0);
        let err = stock.adjust_qty("stk_meloxivet", -7.0).unwrap_err();
        match err {
            StoreError::InsufficientStock {
                available,
                requested,
                ..
            } => {
                assert_eq!(available, 6.0);
                assert_eq!(requested, 7.0);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        stock.set_qty("stk_meloxivet", 2.0).unwrap();
        assert_eq!(stock.require("stk_meloxivet").unwrap().qty, 2.0);
    }

    #[test]
    fn test_search() {
        let db = setup_db();
        let services = ServiceRegistry::new(&db);
        services.seed_defaults().unwrap();

        let hits = services.search("кастрац", 10).unwrap();
        assert!(hits.len() >= 2);
        assert!(hits[..2].iter().all(|s| s.id.contains("castr")));

        let hits = services.search("Вакцинаця", 3).unwrap();
        assert_eq!(hits[0].id, "svc_vax");

        services.set_active("svc_vax", false).unwrap();
        let hits = services.search("Вакцинація", 3).unwrap();
        assert!(hits.iter().all(|s| s.id != "svc_vax"));

        assert_eq!(services.search("", 2).unwrap().len(), 2);
    }
}
