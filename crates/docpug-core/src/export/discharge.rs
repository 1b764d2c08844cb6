//! Discharge document: the printable summary of a visit.

use std::collections::HashMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::notes::{parse_rx_combined, parse_visit_note};
use crate::models::{
    normalize_qty, DischargeRecord, LineKind, Owner, Patient, ServiceItem, ServiceLine,
    StockItem, StockLine, Visit, DEFAULT_STOCK_UNIT,
};

/// Name shown for a service line whose catalog item is gone and has no snapshot.
pub const UNKNOWN_SERVICE_NAME: &str = "Невідома послуга";

/// Name shown for a stock line whose catalog item is gone and has no snapshot.
pub const UNKNOWN_STOCK_NAME: &str = "Невідома позиція";

/// Catalog lookup used to fill in lines that predate snapshots.
#[derive(Debug, Clone, Default)]
pub struct LineCatalog {
    services: HashMap<String, ServiceItem>,
    stock: HashMap<String, StockItem>,
}

impl LineCatalog {
    pub fn new(services: Vec<ServiceItem>, stock: Vec<StockItem>) -> Self {
        Self {
            services: services.into_iter().map(|s| (s.id.clone(), s)).collect(),
            stock: stock.into_iter().map(|s| (s.id.clone(), s)).collect(),
        }
    }

    pub fn service(&self, id: &str) -> Option<&ServiceItem> {
        self.services.get(id)
    }

    pub fn stock(&self, id: &str) -> Option<&StockItem> {
        self.stock.get(id)
    }
}

/// A visit line resolved for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpandedLine {
    /// Stable line identifier
    pub line_id: String,
    /// Service or stock
    pub kind: LineKind,
    /// Display name
    pub name: String,
    /// Unit (stock lines only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Unit price
    pub price: f64,
    /// Quantity (always >= 1)
    pub qty: f64,
    /// `price * qty`
    pub line_total: f64,
}

/// Expand service lines: snapshot first, then catalog, then placeholder.
pub fn expand_service_lines(lines: &[ServiceLine], catalog: &LineCatalog) -> Vec<ExpandedLine> {
    lines
        .iter()
        .map(|line| {
            let item = catalog.service(&line.service_id);
            let name = first_non_blank(line.name_snap.as_deref(), item.map(|i| i.name.as_str()))
                .unwrap_or(UNKNOWN_SERVICE_NAME);
            let price = resolve_price(line.price_snap, item.map(|i| i.price));
            let qty = normalize_qty(line.qty);

            ExpandedLine {
                line_id: line.line_id.clone(),
                kind: LineKind::Service,
                name: name.to_string(),
                unit: None,
                price,
                qty,
                line_total: price * qty,
            }
        })
        .collect()
}

/// Expand stock lines: snapshot first, then catalog, then placeholder.
pub fn expand_stock_lines(lines: &[StockLine], catalog: &LineCatalog) -> Vec<ExpandedLine> {
    lines
        .iter()
        .filter(|line| !line.stock_id.is_empty())
        .map(|line| {
            let item = catalog.stock(&line.stock_id);
            let name = first_non_blank(line.name_snap.as_deref(), item.map(|i| i.name.as_str()))
                .unwrap_or(UNKNOWN_STOCK_NAME);
            let unit = first_non_blank(line.unit_snap.as_deref(), item.map(|i| i.unit.as_str()))
                .unwrap_or(DEFAULT_STOCK_UNIT);
            let price = resolve_price(line.price_snap, item.map(|i| i.price));
            let qty = normalize_qty(line.qty);

            ExpandedLine {
                line_id: line.line_id.clone(),
                kind: LineKind::Stock,
                name: name.to_string(),
                unit: Some(unit.to_string()),
                price,
                qty,
                line_total: price * qty,
            }
        })
        .collect()
}

/// Sum of line totals.
pub fn lines_total(lines: &[ExpandedLine]) -> f64 {
    lines.iter().map(|line| line.line_total).sum()
}

fn pick(saved: Option<&String>, structured: Option<&str>, parsed: String) -> String {
    saved
        .map(|s| s.trim().to_string())
        .or_else(|| {
            structured
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .unwrap_or(parsed)
}

fn first_non_blank<'a>(snap: Option<&'a str>, fallback: Option<&'a str>) -> Option<&'a str> {
    [snap, fallback]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn resolve_price(snap: Option<f64>, fallback: Option<f64>) -> f64 {
    snap.filter(|p| p.is_finite())
        .or(fallback)
        .filter(|p| p.is_finite())
        .unwrap_or(0.0)
}

/// Patient header of a discharge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientHeader {
    pub name: String,
    pub signalment: String,
}

/// Owner header of a discharge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OwnerHeader {
    pub name: String,
    pub contact: String,
}

/// A composed discharge, ready to render.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DischargeDocument {
    /// Visit ID
    pub visit_id: String,
    /// Visit date
    pub date: String,
    /// Patient header, when known
    pub patient: Option<PatientHeader>,
    /// Owner header, when known
    pub owner: Option<OwnerHeader>,
    /// Weight at the visit
    pub weight_kg: Option<f64>,
    /// Complaints / history
    pub complaint: String,
    /// Diagnosis
    pub diagnosis: String,
    /// Prescription
    pub rx: String,
    /// Recommendations
    pub recommendations: String,
    /// Follow-up
    pub follow_up: String,
    /// Expanded service lines
    pub services: Vec<ExpandedLine>,
    /// Sum of service lines
    pub services_total: f64,
    /// Expanded stock lines
    pub stock: Vec<ExpandedLine>,
    /// Sum of stock lines
    pub stock_total: f64,
    /// Services plus stock
    pub grand_total: f64,
}

/// Derives discharge documents from visits.
pub struct DischargeComposer<'a> {
    catalog: &'a LineCatalog,
}

impl<'a> DischargeComposer<'a> {
    /// Create a composer resolving lines against `catalog`.
    pub fn new(catalog: &'a LineCatalog) -> Self {
        Self { catalog }
    }

    /// Compose the document for a visit.
    ///
    /// Each text field comes from the saved override when present, then from
    /// the visit's structured fields, then from the marker-parsed note/rx.
    pub fn compose(
        &self,
        visit: &Visit,
        saved: Option<&DischargeRecord>,
        patient: Option<&Patient>,
        owner: Option<&Owner>,
    ) -> DischargeDocument {
        let parsed_note = parse_visit_note(&visit.note);
        let parsed_rx = parse_rx_combined(&visit.rx);

        let services = expand_service_lines(&visit.services, self.catalog);
        let stock = expand_stock_lines(&visit.stock, self.catalog);
        let services_total = lines_total(&services);
        let stock_total = lines_total(&stock);

        DischargeDocument {
            visit_id: visit.id.clone(),
            date: visit.date.clone(),
            patient: patient.map(|p| PatientHeader {
                name: p.name.clone(),
                signalment: p.signalment(),
            }),
            owner: owner.map(|o| OwnerHeader {
                name: o.name.clone(),
                contact: o.contact_line(),
            }),
            weight_kg: visit.weight_kg.or_else(|| patient.and_then(|p| p.weight_kg)),
            complaint: pick(
                saved.and_then(|s| s.complaint.as_ref()),
                visit.complaint.as_deref(),
                parsed_note.complaint,
            ),
            diagnosis: pick(
                saved.and_then(|s| s.diagnosis.as_ref()),
                visit.diagnosis.as_deref(),
                parsed_note.diagnosis,
            ),
            rx: pick(saved.and_then(|s| s.rx.as_ref()), None, parsed_rx.rx),
            recommendations: pick(
                saved.and_then(|s| s.recommendations.as_ref()),
                None,
                parsed_rx.recommendations,
            ),
            follow_up: pick(
                saved.and_then(|s| s.follow_up.as_ref()),
                None,
                parsed_rx.follow_up,
            ),
            services,
            services_total,
            stock,
            stock_total,
            grand_total: services_total + stock_total,
        }
    }
}

impl DischargeDocument {
    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Plain-text printable layout.
    pub fn to_text(&self) -> String {
        let mut out = String::new();

        out.push_str("ВИПИСКА\n");
        let _ = writeln!(out, "Дата: {}", or_dash(&self.date));
        if let Some(patient) = &self.patient {
            let _ = writeln!(out, "Пацієнт: {}", join_header(&patient.name, &patient.signalment));
        }
        if let Some(owner) = &self.owner {
            let _ = writeln!(out, "Власник: {}", join_header(&owner.name, &owner.contact));
        }
        if let Some(weight) = self.weight_kg {
            let _ = writeln!(out, "Вага: {} кг", format_amount(weight));
        }

        for (title, body) in [
            ("Скарги/анамнез", &self.complaint),
            ("Діагноз", &self.diagnosis),
            ("Призначення", &self.rx),
            ("Рекомендації", &self.recommendations),
            ("Контроль / при погіршенні", &self.follow_up),
        ] {
            let _ = write!(out, "\n{}:\n{}\n", title, or_dash(body));
        }

        write_lines(&mut out, "Послуги", &self.services, self.services_total);
        write_lines(&mut out, "Склад", &self.stock, self.stock_total);

        let _ = writeln!(out, "\nЗагалом: {}", format_amount(self.grand_total));
        out
    }
}

fn write_lines(out: &mut String, title: &str, lines: &[ExpandedLine], total: f64) {
    let _ = write!(out, "\n{}:\n", title);
    if lines.is_empty() {
        out.push_str("—\n");
        return;
    }
    for (i, line) in lines.iter().enumerate() {
        let qty = match &line.unit {
            Some(unit) => format!("{} {}", format_amount(line.qty), unit),
            None => format_amount(line.qty),
        };
        let _ = writeln!(
            out,
            "{}. {}: {} × {} = {}",
            i + 1,
            line.name,
            qty,
            format_amount(line.price),
            format_amount(line.line_total)
        );
    }
    let _ = writeln!(out, "Разом: {}", format_amount(total));
}

fn or_dash(text: &str) -> &str {
    if text.trim().is_empty() {
        "—"
    } else {
        text
    }
}

fn join_header(name: &str, detail: &str) -> String {
    if detail.is_empty() {
        name.to_string()
    } else {
        format!("{} • {}", name, detail)
    }
}

/// Whole amounts print without decimals, others with two.
pub fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> LineCatalog {
        LineCatalog::new(
            vec![ServiceItem::with_id("svc_exam", "Огляд", 500.0)],
            vec![StockItem::with_id("stk_meloxivet", "Мелоксивет", 70.0, "шт", 10.0)],
        )
    }

    fn service_line(service_id: &str, qty: f64, price: Option<f64>, name: Option<&str>) -> ServiceLine {
        ServiceLine {
            line_id: format!("ln_{}", service_id),
            service_id: service_id.into(),
            qty,
            price_snap: price,
            name_snap: name.map(Into::into),
        }
    }

    #[test]
    fn test_expand_prefers_snapshot() {
        let lines = vec![service_line("svc_exam", 2.0, Some(450.0), Some("Огляд (старий)"))];
        let expanded = expand_service_lines(&lines, &catalog());

        assert_eq!(expanded[0].name, "Огляд (старий)");
        assert_eq!(expanded[0].price, 450.0);
        assert_eq!(expanded[0].line_total, 900.0);
    }

    #[test]
    fn test_expand_falls_back_to_catalog_then_placeholder() {
        let lines = vec![
            service_line("svc_exam", 0.0, None, None),
            service_line("svc_gone", 1.0, None, Some("  ")),
        ];
        let expanded = expand_service_lines(&lines, &catalog());

        assert_eq!(expanded[0].name, "Огляд");
        assert_eq!(expanded[0].price, 500.0);
        assert_eq!(expanded[0].qty, 1.0);
        assert_eq!(expanded[1].name, UNKNOWN_SERVICE_NAME);
        assert_eq!(expanded[1].price, 0.0);
        assert_eq!(lines_total(&expanded), 500.0);
    }

    #[test]
    fn test_expand_stock_units() {
        let lines = vec![
            StockLine {
                line_id: "a".into(),
                stock_id: "stk_meloxivet".into(),
                qty: 3.0,
                price_snap: None,
                name_snap: None,
                unit_snap: None,
            },
            StockLine {
                line_id: "b".into(),
                stock_id: "stk_other".into(),
                qty: 1.0,
                price_snap: Some(12.5),
                name_snap: None,
                unit_snap: Some("мл".into()),
            },
        ];
        let expanded = expand_stock_lines(&lines, &catalog());

        assert_eq!(expanded[0].unit.as_deref(), Some("шт"));
        assert_eq!(expanded[0].line_total, 210.0);
        assert_eq!(expanded[1].name, UNKNOWN_STOCK_NAME);
        assert_eq!(expanded[1].unit.as_deref(), Some("мл"));
    }

    #[test]
    fn test_compose_precedence() {
        let visit = Visit {
            id: "5".into(),
            pet_id: "1".into(),
            date: "2024-03-01".into(),
            note: "Діагноз: Отит\n\nСкарги/анамнез: Чеше вухо".into(),
            rx: "Краплі\n\nРекомендації:\nНе мочити".into(),
            diagnosis: Some("Отит зовнішній".into()),
            services: vec![service_line("svc_exam", 1.0, Some(500.0), Some("Огляд"))],
            ..Default::default()
        };
        let saved = DischargeRecord {
            visit_id: "5".into(),
            follow_up: Some("Через 7 днів".into()),
            ..Default::default()
        };

        let catalog = catalog();
        let doc = DischargeComposer::new(&catalog).compose(&visit, Some(&saved), None, None);

        assert_eq!(doc.diagnosis, "Отит зовнішній");
        assert_eq!(doc.complaint, "Чеше вухо");
        assert_eq!(doc.rx, "Краплі");
        assert_eq!(doc.recommendations, "Не мочити");
        assert_eq!(doc.follow_up, "Через 7 днів");
        assert_eq!(doc.grand_total, 500.0);
    }

    #[test]
    fn test_saved_empty_field_overrides() {
        let visit = Visit {
            id: "5".into(),
            note: "Діагноз: Отит".into(),
            ..Default::default()
        };
        let saved = DischargeRecord {
            visit_id: "5".into(),
            diagnosis: Some(String::new()),
            ..Default::default()
        };

        let catalog = LineCatalog::default();
        let doc = DischargeComposer::new(&catalog).compose(&visit, Some(&saved), None, None);
        assert_eq!(doc.diagnosis, "");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1000.0), "1000");
        assert_eq!(format_amount(12.5), "12.50");
        assert_eq!(format_amount(0.0), "0");
    }
}
