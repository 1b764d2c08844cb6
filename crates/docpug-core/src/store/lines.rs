//! LineEditor: add and remove snapshotted service and stock lines.
//!
//! Every edit is a read-modify-write round trip: fetch the visit, change
//! one array, push the whole visit back. Stock quantities move only after
//! the server has accepted the new line array.

use tracing::{error, info, warn};

use super::registry::ensure_active;
use super::{StockRegistry, StoreError, StoreResult, VisitStore};
use crate::config::StockPolicy;
use crate::db::Database;
use crate::models::{normalize_qty, LineKind, LineRef, ServiceLine, StockLine, Visit};

/// Edits the line arrays of visits.
pub struct LineEditor<'a> {
    visits: &'a mut VisitStore,
    db: &'a Database,
    policy: StockPolicy,
}

impl<'a> LineEditor<'a> {
    pub fn new(visits: &'a mut VisitStore, db: &'a Database, policy: StockPolicy) -> Self {
        Self { visits, db, policy }
    }

    /// Append a service line, snapshotting the catalog price and name.
    pub fn add_service_line(&mut self, visit_id: &str, service_id: &str, qty: f64) -> StoreResult<Visit> {
        let mut visit = self.visits.fetch(visit_id)?;

        let item = self
            .db
            .get_service_item(service_id)?
            .ok_or_else(|| StoreError::NotFound(format!("service {}", service_id)))?;
        ensure_active(LineKind::Service, &item.id, item.active)?;

        let line = ServiceLine::snapshot(&item, qty);
        info!(visit_id, service_id, qty = line.qty, line_id = %line.line_id, "adding service line");
        visit.services.push(line);

        self.visits.save(&visit)
    }

    /// Append a stock line and take its quantity out of stock.
    ///
    /// Availability is checked before the push and the registry is only
    /// decremented after the push succeeds. If the decrement still fails,
    /// the previous stock array is pushed back.
    pub fn add_stock_line(&mut self, visit_id: &str, stock_id: &str, qty: f64) -> StoreResult<Visit> {
        let mut visit = self.visits.fetch(visit_id)?;

        let item = self
            .db
            .get_stock_item(stock_id)?
            .ok_or_else(|| StoreError::NotFound(format!("stock item {}", stock_id)))?;
        ensure_active(LineKind::Stock, &item.id, item.active)?;

        let qty = normalize_qty(qty);
        if self.policy.decrement_on_add && !item.has_available(qty) {
            return Err(StoreError::InsufficientStock {
                stock_id: item.id,
                name: item.name,
                available: item.qty,
                requested: qty,
            });
        }

        let previous = visit.stock.clone();
        let line = StockLine::snapshot(&item, qty);
        info!(visit_id, stock_id, qty, line_id = %line.line_id, "adding stock line");
        visit.stock.push(line);

        let updated = self.visits.save(&visit)?;

        if self.policy.decrement_on_add {
            if let Err(e) = StockRegistry::new(self.db).adjust_qty(stock_id, -qty) {
                warn!(visit_id, stock_id, error = %e, "stock decrement failed; reverting visit stock");
                let mut reverted = updated;
                reverted.stock = previous;
                if let Err(revert_err) = self.visits.save(&reverted) {
                    error!(visit_id, error = %revert_err, "failed to revert visit stock");
                }
                return Err(e);
            }
        }

        Ok(updated)
    }

    /// Remove a service line.
    pub fn remove_service_line(&mut self, visit_id: &str, line: &LineRef) -> StoreResult<Visit> {
        let mut visit = self.visits.fetch(visit_id)?;

        let index = line
            .position(&visit.services)
            .ok_or_else(|| StoreError::LineNotFound {
                kind: LineKind::Service,
                line: line.to_string(),
            })?;

        let removed = visit.services.remove(index);
        info!(visit_id, line_id = %removed.line_id, service_id = %removed.service_id, "removing service line");

        self.visits.save(&visit)
    }

    /// Remove a stock line and, after a successful push, put its quantity
    /// back if the stock item still exists.
    pub fn remove_stock_line(&mut self, visit_id: &str, line: &LineRef) -> StoreResult<Visit> {
        let mut visit = self.visits.fetch(visit_id)?;

        let index = line
            .position(&visit.stock)
            .ok_or_else(|| StoreError::LineNotFound {
                kind: LineKind::Stock,
                line: line.to_string(),
            })?;

        let removed = visit.stock.remove(index);
        info!(visit_id, line_id = %removed.line_id, stock_id = %removed.stock_id, "removing stock line");

        let updated = self.visits.save(&visit)?;

        if self.policy.restore_on_remove {
            let qty = normalize_qty(removed.qty);
            match self.db.get_stock_item(&removed.stock_id)? {
                Some(_) => {
                    StockRegistry::new(self.db).adjust_qty(&removed.stock_id, qty)?;
                }
                None => warn!(stock_id = %removed.stock_id, "stock item gone; quantity not restored"),
            }
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, MemoryApi};
    use crate::models::VisitDraft;
    use crate::store::ServiceRegistry;
    use std::sync::Arc;

    struct Fixture {
        api: Arc<MemoryApi>,
        visits: VisitStore,
        db: Database,
        visit_id: String,
    }

    fn setup() -> Fixture {
        let api = Arc::new(MemoryApi::new());
        let mut visits = VisitStore::new(api.clone());
        let db = Database::open_in_memory().unwrap();
        ServiceRegistry::new(&db).seed_defaults().unwrap();
        StockRegistry::new(&db).seed_defaults().unwrap();

        let draft = VisitDraft {
            pet_id: "1".into(),
            date: "2024-05-01".into(),
            diagnosis: "Артрит".into(),
            ..Default::default()
        };
        let visit_id = visits.create(&draft).unwrap().id;

        Fixture {
            api,
            visits,
            db,
            visit_id,
        }
    }

    fn qty_on_hand(db: &Database, id: &str) -> f64 {
        db.get_stock_item(id).unwrap().unwrap().qty
    }

    #[test]
    fn test_add_service_line_snapshots() {
        let mut f = setup();
        let mut editor = LineEditor::new(&mut f.visits, &f.db, StockPolicy::default());

        let visit = editor.add_service_line(&f.visit_id, "svc_exam", 2.0).unwrap();
        assert_eq!(visit.services.len(), 1);
        assert_eq!(visit.services[0].price_snap, Some(500.0));
        assert_eq!(visit.services[0].name_snap.as_deref(), Some("Огляд"));
        assert_eq!(visit.diagnosis.as_deref(), Some("Артрит"));
    }

    #[test]
    fn test_inactive_and_missing_items_rejected() {
        let mut f = setup();
        ServiceRegistry::new(&f.db).set_active("svc_trip", false).unwrap();
        let mut editor = LineEditor::new(&mut f.visits, &f.db, StockPolicy::default());

        assert!(matches!(
            editor.add_service_line(&f.visit_id, "svc_trip", 1.0),
            Err(StoreError::InactiveItem { .. })
        ));
        assert!(matches!(
            editor.add_service_line(&f.visit_id, "svc_nope", 1.0),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_stock_decrement_after_push() {
        let mut f = setup();
        let mut editor = LineEditor::new(&mut f.visits, &f.db, StockPolicy::default());

        let visit = editor.add_stock_line(&f.visit_id, "stk_meloxivet", 3.0).unwrap();
        assert_eq!(visit.stock[0].unit_snap.as_deref(), Some("шт"));
        assert_eq!(qty_on_hand(&f.db, "stk_meloxivet"), 7.0);

        let err = editor.add_stock_line(&f.visit_id, "stk_meloxivet", 8.0).unwrap_err();
        assert!(matches!(err, StoreError::InsufficientStock { .. }));
        assert_eq!(qty_on_hand(&f.db, "stk_meloxivet"), 7.0);
    }

    #[test]
    fn test_failed_push_leaves_stock() {
        let mut f = setup();
        f.api
            .fail_next_update(ApiError::Rejected("visit locked".into()))
            .unwrap();
        let mut editor = LineEditor::new(&mut f.visits, &f.db, StockPolicy::default());

        let err = editor
            .add_stock_line(&f.visit_id, "stk_meloxivet", 2.0)
            .unwrap_err();
        assert_eq!(err.user_message(), "visit locked");
        assert_eq!(qty_on_hand(&f.db, "stk_meloxivet"), 10.0);
        assert!(f.visits.cached(&f.visit_id).unwrap().stock.is_empty());
    }

    #[test]
    fn test_failed_push_on_remove_keeps_stock_out() {
        let mut f = setup();
        let mut editor = LineEditor::new(&mut f.visits, &f.db, StockPolicy::default());
        editor.add_stock_line(&f.visit_id, "stk_meloxivet", 4.0).unwrap();

        f.api
            .fail_next_update(ApiError::Transport("down".into()))
            .unwrap();
        assert!(editor
            .remove_stock_line(&f.visit_id, &LineRef::Index(0))
            .is_err());
        assert_eq!(qty_on_hand(&f.db, "stk_meloxivet"), 6.0);
    }

    #[test]
    fn test_remove_by_id_restores_stock() {
        let mut f = setup();
        let mut editor = LineEditor::new(&mut f.visits, &f.db, StockPolicy::default());

        let visit = editor.add_stock_line(&f.visit_id, "stk_meloxivet", 3.0).unwrap();
        let line_id = visit.stock[0].line_id.clone();

        let visit = editor
            .remove_stock_line(&f.visit_id, &LineRef::Id(line_id.clone()))
            .unwrap();
        assert!(visit.stock.is_empty());
        assert_eq!(qty_on_hand(&f.db, "stk_meloxivet"), 10.0);

        assert!(matches!(
            editor.remove_stock_line(&f.visit_id, &LineRef::Id(line_id)),
            Err(StoreError::LineNotFound { .. })
        ));
    }

    #[test]
    fn test_policy_off_leaves_registry() {
        let mut f = setup();
        let policy = StockPolicy {
            decrement_on_add: false,
            restore_on_remove: false,
        };
        let mut editor = LineEditor::new(&mut f.visits, &f.db, policy);

        editor.add_stock_line(&f.visit_id, "stk_meloxivet", 50.0).unwrap();
        assert_eq!(qty_on_hand(&f.db, "stk_meloxivet"), 10.0);

        editor
            .remove_stock_line(&f.visit_id, &LineRef::Index(0))
            .unwrap();
        assert_eq!(qty_on_hand(&f.db, "stk_meloxivet"), 10.0);
    }

    #[test]
    fn test_remove_keeps_relative_order() {
        let mut f = setup();
        let mut editor = LineEditor::new(&mut f.visits, &f.db, StockPolicy::default());

        for id in ["svc_exam", "svc_vax", "svc_trip"] {
            editor.add_service_line(&f.visit_id, id, 1.0).unwrap();
        }
        let visit = editor
            .remove_service_line(&f.visit_id, &LineRef::Index(1))
            .unwrap();

        let ids: Vec<&str> = visit.services.iter().map(|l| l.service_id.as_str()).collect();
        assert_eq!(ids, vec!["svc_exam", "svc_trip"]);

        assert!(matches!(
            editor.remove_service_line(&f.visit_id, &LineRef::Index(5)),
            Err(StoreError::LineNotFound { .. })
        ));
    }
}
