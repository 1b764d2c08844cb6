//! Service and stock catalog models (locally owned registries).

use serde::{Deserialize, Serialize};

/// Unit used when a stock item has none.
pub const DEFAULT_STOCK_UNIT: &str = "шт";

/// ID prefix for service catalog items.
pub const SERVICE_ID_PREFIX: &str = "svc";

/// ID prefix for stock catalog items.
pub const STOCK_ID_PREFIX: &str = "stk";

/// A billable service in the local catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceItem {
    /// Catalog ID (`svc_...`)
    pub id: String,
    /// Display name
    pub name: String,
    /// Price per unit
    pub price: f64,
    /// Inactive items are hidden from selection but keep old visits valid
    pub active: bool,
}

impl ServiceItem {
    /// Create a new active service with a generated ID.
    pub fn new(name: &str, price: f64) -> Self {
        Self {
            id: generate_catalog_id(SERVICE_ID_PREFIX),
            name: name.trim().to_string(),
            price: clamp_non_negative(price),
            active: true,
        }
    }

    /// Create with an explicit ID (seeds, imports).
    pub fn with_id(id: &str, name: &str, price: f64) -> Self {
        Self {
            id: id.to_string(),
            ..Self::new(name, price)
        }
    }

    /// Flip the active flag.
    pub fn toggle_active(&mut self) {
        self.active = !self.active;
    }
}

/// An inventory item in the local stock catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockItem {
    /// Catalog ID (`stk_...`)
    pub id: String,
    /// Display name
    pub name: String,
    /// Price per unit
    pub price: f64,
    /// Unit of measure (шт, мл, таб, ...)
    pub unit: String,
    /// Quantity on hand
    pub qty: f64,
    /// Inactive items are hidden from selection
    pub active: bool,
}

impl StockItem {
    /// Create a new active stock item with a generated ID.
    pub fn new(name: &str, price: f64, unit: &str, qty: f64) -> Self {
        let unit = unit.trim();
        Self {
            id: generate_catalog_id(STOCK_ID_PREFIX),
            name: name.trim().to_string(),
            price: clamp_non_negative(price),
            unit: if unit.is_empty() {
                DEFAULT_STOCK_UNIT.to_string()
            } else {
                unit.to_string()
            },
            qty: clamp_non_negative(qty),
            active: true,
        }
    }

    /// Create with an explicit ID (seeds, imports).
    pub fn with_id(id: &str, name: &str, price: f64, unit: &str, qty: f64) -> Self {
        Self {
            id: id.to_string(),
            ..Self::new(name, price, unit, qty)
        }
    }

    /// Flip the active flag.
    pub fn toggle_active(&mut self) {
        self.active = !self.active;
    }

    /// Whether `qty` units can be taken from stock.
    pub fn has_available(&self, qty: f64) -> bool {
        self.qty >= qty
    }
}

/// Generate a catalog ID: `<prefix>_<millis base36>_<12 hex>`.
pub fn generate_catalog_id(prefix: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}", prefix, to_base36(millis), &random[..12])
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".into();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

pub(crate) fn clamp_non_negative(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}
