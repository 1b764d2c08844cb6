//! Visit models: the visit record and its snapshotted billing lines.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::catalog::{ServiceItem, StockItem, DEFAULT_STOCK_UNIT};
use super::owner::non_blank;
use crate::export::build_visit_note;

/// Which line array of a visit an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    /// Billable service (exam, vaccination, ...)
    Service,
    /// Dispensed or used stock item
    Stock,
}

impl LineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineKind::Service => "service",
            LineKind::Stock => "stock",
        }
    }
}

impl fmt::Display for LineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common accessors over service and stock lines.
pub trait VisitLine {
    /// Stable per-line identifier.
    fn line_id(&self) -> &str;
    /// Catalog item the line was created from.
    fn catalog_id(&self) -> &str;
    /// Quantity on the line.
    fn qty(&self) -> f64;
}

/// A service line with price and name frozen at the time it was added.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLine {
    /// Stable line identifier
    #[serde(default)]
    pub line_id: String,
    /// Service catalog ID
    pub service_id: String,
    /// Quantity (always >= 1)
    pub qty: f64,
    /// Price at the time of addition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_snap: Option<f64>,
    /// Name at the time of addition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_snap: Option<String>,
}

impl ServiceLine {
    /// Snapshot a catalog service into a new line.
    pub fn snapshot(item: &ServiceItem, qty: f64) -> Self {
        Self {
            line_id: new_line_id(),
            service_id: item.id.clone(),
            qty: normalize_qty(qty),
            price_snap: Some(item.price),
            name_snap: Some(item.name.trim().to_string()),
        }
    }
}

impl VisitLine for ServiceLine {
    fn line_id(&self) -> &str {
        &self.line_id
    }
    fn catalog_id(&self) -> &str {
        &self.service_id
    }
    fn qty(&self) -> f64 {
        self.qty
    }
}

/// A stock line with price, name and unit frozen at the time it was added.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StockLine {
    /// Stable line identifier
    #[serde(default)]
    pub line_id: String,
    /// Stock catalog ID
    pub stock_id: String,
    /// Quantity (always >= 1)
    pub qty: f64,
    /// Unit price at the time of addition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_snap: Option<f64>,
    /// Name at the time of addition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_snap: Option<String>,
    /// Unit at the time of addition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_snap: Option<String>,
}

impl StockLine {
    /// Snapshot a stock item into a new line.
    pub fn snapshot(item: &StockItem, qty: f64) -> Self {
        let unit = item.unit.trim();
        Self {
            line_id: new_line_id(),
            stock_id: item.id.clone(),
            qty: normalize_qty(qty),
            price_snap: Some(item.price),
            name_snap: Some(item.name.trim().to_string()),
            unit_snap: Some(if unit.is_empty() {
                DEFAULT_STOCK_UNIT.to_string()
            } else {
                unit.to_string()
            }),
        }
    }
}

impl VisitLine for StockLine {
    fn line_id(&self) -> &str {
        &self.line_id
    }
    fn catalog_id(&self) -> &str {
        &self.stock_id
    }
    fn qty(&self) -> f64 {
        self.qty
    }
}

/// Generate a fresh line identifier.
pub fn new_line_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Line quantities are at least one; garbage becomes one.
pub fn normalize_qty(qty: f64) -> f64 {
    if qty.is_finite() {
        qty.max(1.0)
    } else {
        1.0
    }
}

/// Reference to a line inside a visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRef {
    /// By stable line ID
    Id(String),
    /// By position in the array (fragile under concurrent edits)
    Index(usize),
}

impl LineRef {
    /// Resolve to a position in `lines`.
    pub fn position<L: VisitLine>(&self, lines: &[L]) -> Option<usize> {
        match self {
            LineRef::Id(id) => lines.iter().position(|line| line.line_id() == id),
            LineRef::Index(index) => (*index < lines.len()).then_some(*index),
        }
    }
}

impl fmt::Display for LineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineRef::Id(id) => write!(f, "line {}", id),
            LineRef::Index(index) => write!(f, "line #{}", index),
        }
    }
}

/// A visit in canonical form (after wire normalization).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Visit {
    /// Server ID
    pub id: String,
    /// Patient server ID
    pub pet_id: String,
    /// Visit date (YYYY-MM-DD)
    #[serde(default)]
    pub date: String,
    /// Free-text note (legacy marker format for diagnosis/complaint)
    #[serde(default)]
    pub note: String,
    /// Prescription text (may embed recommendations/follow-up sections)
    #[serde(default)]
    pub rx: String,
    /// Weight at the visit
    #[serde(default)]
    pub weight_kg: Option<f64>,
    /// Structured diagnosis, when the server stores it
    #[serde(default)]
    pub diagnosis: Option<String>,
    /// Structured complaint/history, when the server stores it
    #[serde(default)]
    pub complaint: Option<String>,
    /// Service lines in insertion order
    #[serde(default)]
    pub services: Vec<ServiceLine>,
    /// Stock lines in insertion order
    #[serde(default)]
    pub stock: Vec<StockLine>,
}

impl Visit {
    /// Number of lines of the given kind.
    pub fn line_count(&self, kind: LineKind) -> usize {
        match kind {
            LineKind::Service => self.services.len(),
            LineKind::Stock => self.stock.len(),
        }
    }

    /// Whether the visit carries any clinical text.
    pub fn has_clinical_content(&self) -> bool {
        [
            Some(self.note.as_str()),
            self.diagnosis.as_deref(),
            Some(self.rx.as_str()),
        ]
        .into_iter()
        .flatten()
        .any(|s| !s.trim().is_empty())
    }
}

/// Input for creating or editing a visit's clinical fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisitDraft {
    pub pet_id: String,
    pub date: String,
    pub complaint: String,
    pub diagnosis: String,
    pub rx: String,
    pub weight_kg: Option<f64>,
}

impl VisitDraft {
    /// New draft dated today.
    pub fn new(pet_id: &str) -> Self {
        Self {
            pet_id: pet_id.trim().to_string(),
            date: today_iso(),
            ..Default::default()
        }
    }

    /// Materialize the draft over an existing visit (or a blank one),
    /// keeping its lines untouched.
    pub fn apply_to(&self, base: Option<&Visit>) -> Visit {
        let mut visit = base.cloned().unwrap_or_default();
        visit.pet_id = self.pet_id.trim().to_string();
        visit.date = if self.date.trim().is_empty() {
            today_iso()
        } else {
            self.date.trim().to_string()
        };
        visit.note = build_visit_note(&self.diagnosis, &self.complaint);
        visit.rx = self.rx.trim().to_string();
        visit.weight_kg = self.weight_kg;
        visit.diagnosis = non_blank(&self.diagnosis);
        visit.complaint = non_blank(&self.complaint);
        visit
    }
}

/// Today's local date as YYYY-MM-DD.
pub fn today_iso() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_line(id: &str) -> ServiceLine {
        ServiceLine {
            line_id: id.into(),
            service_id: "svc_exam".into(),
            qty: 1.0,
            price_snap: Some(500.0),
            name_snap: Some("Огляд".into()),
        }
    }

    #[test]
    fn test_normalize_qty() {
        assert_eq!(normalize_qty(3.0), 3.0);
        assert_eq!(normalize_qty(0.0), 1.0);
        assert_eq!(normalize_qty(-2.0), 1.0);
        assert_eq!(normalize_qty(f64::NAN), 1.0);
    }

    #[test]
    fn test_line_ref_position() {
        let lines = vec![service_line("a"), service_line("b")];
        assert_eq!(LineRef::Id("b".into()).position(&lines), Some(1));
        assert_eq!(LineRef::Id("zzz".into()).position(&lines), None);
        assert_eq!(LineRef::Index(0).position(&lines), Some(0));
        assert_eq!(LineRef::Index(2).position(&lines), None);
    }

    #[test]
    fn test_snapshot_freezes_catalog_values() {
        let mut item = StockItem::new("Мелоксивет", 70.0, "", 10.0);
        let line = StockLine::snapshot(&item, 0.0);

        item.price = 90.0;
        item.name = "Renamed".into();

        assert_eq!(line.price_snap, Some(70.0));
        assert_eq!(line.name_snap.as_deref(), Some("Мелоксивет"));
        assert_eq!(line.unit_snap.as_deref(), Some(DEFAULT_STOCK_UNIT));
        assert_eq!(line.qty, 1.0);
        assert_eq!(line.line_id.len(), 36);
    }

    #[test]
    fn test_line_serializes_camel_case() {
        let json = serde_json::to_value(service_line("a")).unwrap();
        assert_eq!(json["serviceId"], "svc_exam");
        assert_eq!(json["priceSnap"], 500.0);
        assert_eq!(json["nameSnap"], "Огляд");
        assert_eq!(json["lineId"], "a");
    }

    #[test]
    fn test_draft_keeps_lines() {
        let base = Visit {
            id: "10".into(),
            pet_id: "3".into(),
            services: vec![service_line("a")],
            ..Default::default()
        };
        let mut draft = VisitDraft::new("3");
        draft.diagnosis = "Отит".into();
        draft.complaint = "Чеше вухо".into();

        let visit = draft.apply_to(Some(&base));
        assert_eq!(visit.id, "10");
        assert_eq!(visit.services.len(), 1);
        assert_eq!(visit.diagnosis.as_deref(), Some("Отит"));
        assert!(visit.note.contains("Отит"));
        assert!(visit.has_clinical_content());
    }

    #[test]
    fn test_blank_visit_has_no_content() {
        let visit = Visit {
            note: "  ".into(),
            ..Default::default()
        };
        assert!(!visit.has_clinical_content());
    }
}
