//! Server visit shape and its conversion to the canonical `Visit`.
//!
//! The backend stores line arrays twice (`services` and `services_json`,
//! `stock` and `stock_json`) and does not always fill both, sometimes
//! returning a JSON string instead of an array. This module is the only
//! place that knows about that.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::models::lenient::{self, value_to_f64, value_to_id, value_to_string};
use crate::models::{normalize_qty, LineKind, ServiceLine, StockLine, Visit};

/// A visit exactly as the server returns it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawVisit {
    #[serde(default, deserialize_with = "lenient::id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::id")]
    pub pet_id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub note: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub rx: String,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub weight_kg: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub diagnosis: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub complaint: Option<String>,
    #[serde(default)]
    pub services: Option<Value>,
    #[serde(default)]
    pub services_json: Option<Value>,
    #[serde(default)]
    pub stock: Option<Value>,
    #[serde(default)]
    pub stock_json: Option<Value>,
}

/// Full-replacement body for `POST`/`PUT /api/visits`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VisitPayload {
    pub pet_id: String,
    pub date: String,
    pub note: String,
    pub rx: String,
    pub weight_kg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complaint: Option<String>,
    pub services: Vec<ServiceLine>,
    pub services_json: Vec<ServiceLine>,
    pub stock: Vec<StockLine>,
    pub stock_json: Vec<StockLine>,
}

impl VisitPayload {
    /// Carry every mutable field of `visit`, mirroring line arrays into
    /// their `*_json` twins.
    pub fn from_visit(visit: &Visit) -> Self {
        Self {
            pet_id: visit.pet_id.clone(),
            date: visit.date.clone(),
            note: visit.note.clone(),
            rx: visit.rx.clone(),
            weight_kg: visit.weight_kg,
            diagnosis: visit.diagnosis.clone(),
            complaint: visit.complaint.clone(),
            services: visit.services.clone(),
            services_json: visit.services.clone(),
            stock: visit.stock.clone(),
            stock_json: visit.stock.clone(),
        }
    }
}

/// Convert a server visit to canonical form.
pub fn normalize(raw: RawVisit) -> Visit {
    let services = pick_lines(&raw.id, LineKind::Service, raw.services, raw.services_json)
        .iter()
        .enumerate()
        .filter_map(|(index, value)| service_line(&raw.id, index, value))
        .collect();

    let stock = pick_lines(&raw.id, LineKind::Stock, raw.stock, raw.stock_json)
        .iter()
        .enumerate()
        .filter_map(|(index, value)| stock_line(&raw.id, index, value))
        .collect();

    Visit {
        id: raw.id,
        pet_id: raw.pet_id,
        date: raw.date,
        note: raw.note,
        rx: raw.rx,
        weight_kg: raw.weight_kg,
        diagnosis: raw.diagnosis,
        complaint: raw.complaint,
        services,
        stock,
    }
}

/// Choose the canonical array: a non-empty primary, else a non-empty twin,
/// else whichever exists.
fn pick_lines(
    visit_id: &str,
    kind: LineKind,
    primary: Option<Value>,
    twin: Option<Value>,
) -> Vec<Value> {
    let primary = primary.and_then(decode_array);
    let twin = twin.and_then(decode_array);

    match (primary, twin) {
        (Some(p), _) if !p.is_empty() => p,
        (_, Some(t)) if !t.is_empty() => {
            debug!(visit_id, %kind, lines = t.len(), "using *_json twin for visit lines");
            t
        }
        (p, t) => p.or(t).unwrap_or_default(),
    }
}

/// An array, or a JSON string holding an array. Anything else is absent.
fn decode_array(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

fn service_line(visit_id: &str, index: usize, value: &Value) -> Option<ServiceLine> {
    let obj = value.as_object()?;
    let service_id = obj.get("serviceId").and_then(value_to_id).unwrap_or_default();

    Some(ServiceLine {
        line_id: line_id_of(obj.get("lineId"), visit_id, LineKind::Service, index, &service_id),
        qty: obj.get("qty").and_then(value_to_f64).map_or(1.0, normalize_qty),
        price_snap: obj.get("priceSnap").and_then(value_to_f64),
        name_snap: obj.get("nameSnap").and_then(snap_text),
        service_id,
    })
}

fn stock_line(visit_id: &str, index: usize, value: &Value) -> Option<StockLine> {
    let obj = value.as_object()?;
    let stock_id = obj.get("stockId").and_then(value_to_id)?;

    Some(StockLine {
        line_id: line_id_of(obj.get("lineId"), visit_id, LineKind::Stock, index, &stock_id),
        qty: obj.get("qty").and_then(value_to_f64).map_or(1.0, normalize_qty),
        price_snap: obj.get("priceSnap").and_then(value_to_f64),
        name_snap: obj.get("nameSnap").and_then(snap_text),
        unit_snap: obj.get("unitSnap").and_then(snap_text),
        stock_id,
    })
}

fn snap_text(value: &Value) -> Option<String> {
    value_to_string(value)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn line_id_of(
    stored: Option<&Value>,
    visit_id: &str,
    kind: LineKind,
    index: usize,
    catalog_id: &str,
) -> String {
    stored
        .and_then(value_to_id)
        .unwrap_or_else(|| legacy_line_id(visit_id, kind, index, catalog_id))
}

/// Deterministic ID for a line stored before lines carried their own.
pub fn legacy_line_id(visit_id: &str, kind: LineKind, index: usize, catalog_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}:{}:{}", visit_id, kind, index, catalog_id).as_bytes());
    format!("ln_{}", &hex::encode(hasher.finalize())[..16])
}
