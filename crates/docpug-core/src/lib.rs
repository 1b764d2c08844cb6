//! Doc.PUG Core Library
//!
//! Record-keeping core for a small veterinary clinic: visits with billed
//! service and stock lines, local service/stock catalogs, and discharge
//! documents.
//!
//! # Architecture
//!
//! ```text
//! UI action
//!     │
//!     ▼
//! LineEditor ──── fetch visit ───► VisitStore ◄──── ClinicApi (HTTP)
//!     │                                │                 │
//!     │ snapshot price/name/unit       │ cache by id     │ {ok, data, error}
//!     ▼                                ▼                 ▼
//! push full visit ──────────────► update ─────────► wire::normalize
//!     │                                                  (services vs services_json)
//!     ▼
//! StockRegistry (decrement after push, restore after removal)
//!
//! Visit + override record + catalogs ──► DischargeComposer ──► document
//! ```
//!
//! # Modules
//!
//! - [`models`]: Domain types (Visit, ServiceLine, StockItem, Owner, ...)
//! - [`db`]: SQLite persistence for catalogs, discharges, files and mirrors
//! - [`api`]: Remote API trait, envelope decoding, HTTP client, wire format
//! - [`store`]: VisitStore, LineEditor, registries, directory, files
//! - [`export`]: Note/prescription codecs and discharge composition
//! - [`context`]: `ClinicContext`, the explicit application context
//! - [`config`]: TOML configuration
//! - [`logging`]: tracing subscriber setup

pub mod api;
pub mod config;
pub mod context;
pub mod db;
pub mod export;
pub mod logging;
pub mod models;
pub mod store;

// Re-export commonly used types
pub use api::{ApiError, ClinicApi, HttpApi, MemoryApi, RawVisit, VisitPayload};
pub use config::{CoreConfig, StockPolicy};
pub use context::ClinicContext;
pub use db::Database;
pub use export::{DischargeComposer, DischargeDocument, LineCatalog};
pub use models::{
    DischargeForm, DischargeRecord, FileMeta, LineKind, LineRef, Owner, Patient, ServiceItem,
    ServiceLine, StockItem, StockLine, Visit, VisitDraft,
};
pub use store::{LineEditor, ServiceRegistry, StockRegistry, StoreError, VisitStore};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex, MutexGuard};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum DocPugError {
    #[error("{0}")]
    Api(String),

    #[error("{0}")]
    Storage(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Stock(String),

    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    Serialization(String),
}

impl From<StoreError> for DocPugError {
    fn from(e: StoreError) -> Self {
        let message = e.user_message();
        match e {
            StoreError::Api(_) => DocPugError::Api(message),
            StoreError::Db(_) => DocPugError::Storage(message),
            StoreError::Validation(_) => DocPugError::Validation(message),
            StoreError::InsufficientStock { .. } | StoreError::InactiveItem { .. } => {
                DocPugError::Stock(message)
            }
            StoreError::LineNotFound { .. } | StoreError::NotFound(_) => {
                DocPugError::NotFound(message)
            }
        }
    }
}

impl From<ApiError> for DocPugError {
    fn from(e: ApiError) -> Self {
        DocPugError::Api(e.user_message())
    }
}

impl From<db::DbError> for DocPugError {
    fn from(e: db::DbError) -> Self {
        DocPugError::Storage(e.user_message())
    }
}

impl From<config::ConfigError> for DocPugError {
    fn from(e: config::ConfigError) -> Self {
        DocPugError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for DocPugError {
    fn from(e: serde_json::Error) -> Self {
        DocPugError::Serialization(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for DocPugError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        DocPugError::Storage(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open the core from a TOML config file (or defaults plus environment
/// overrides when no path is given) and install logging.
#[uniffi::export]
pub fn open_core(config_path: Option<String>) -> Result<Arc<DocPugCore>, DocPugError> {
    let config = match config_path {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::from_env(),
    };
    logging::init_logging(&config.logging);
    let ctx = ClinicContext::open(config)?;
    Ok(Arc::new(DocPugCore::wrap(ctx)))
}

/// Open the core against an explicit server and database file.
#[uniffi::export]
pub fn open_core_with(base_url: String, database_path: String) -> Result<Arc<DocPugCore>, DocPugError> {
    let mut config = CoreConfig::default();
    config.api.base_url = base_url;
    config.storage.database_path = database_path.into();
    let ctx = ClinicContext::open(config)?;
    Ok(Arc::new(DocPugCore::wrap(ctx)))
}

/// Offline core: in-memory server and database (demos, UI tests).
#[uniffi::export]
pub fn open_core_offline() -> Result<Arc<DocPugCore>, DocPugError> {
    let ctx = ClinicContext::in_memory(CoreConfig::default(), Arc::new(MemoryApi::new()))?;
    Ok(Arc::new(DocPugCore::wrap(ctx)))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe clinic context for FFI.
#[derive(uniffi::Object)]
pub struct DocPugCore {
    ctx: Mutex<ClinicContext>,
}

impl DocPugCore {
    fn wrap(ctx: ClinicContext) -> Self {
        Self {
            ctx: Mutex::new(ctx),
        }
    }

    fn ctx(&self) -> Result<MutexGuard<'_, ClinicContext>, DocPugError> {
        Ok(self.ctx.lock()?)
    }
}

#[uniffi::export]
impl DocPugCore {
    // =========================================================================
    // Service Catalog
    // =========================================================================

    /// List services, newest first.
    pub fn list_services(&self, active_only: bool) -> Result<Vec<FfiServiceItem>, DocPugError> {
        let ctx = self.ctx()?;
        let items = ctx.services().list(active_only)?;
        Ok(items.into_iter().map(Into::into).collect())
    }

    pub fn add_service(&self, name: String, price: f64) -> Result<FfiServiceItem, DocPugError> {
        let ctx = self.ctx()?;
        Ok(ctx.services().add(&name, price)?.into())
    }

    pub fn update_service(
        &self,
        id: String,
        name: String,
        price: f64,
    ) -> Result<FfiServiceItem, DocPugError> {
        let ctx = self.ctx()?;
        Ok(ctx.services().update(&id, &name, price)?.into())
    }

    /// Flip a service between active and hidden.
    pub fn toggle_service(&self, id: String) -> Result<FfiServiceItem, DocPugError> {
        let ctx = self.ctx()?;
        Ok(ctx.services().toggle_active(&id)?.into())
    }

    pub fn delete_service(&self, id: String) -> Result<bool, DocPugError> {
        let ctx = self.ctx()?;
        Ok(ctx.services().delete(&id)?)
    }

    pub fn search_services(&self, query: String, limit: u32) -> Result<Vec<FfiServiceItem>, DocPugError> {
        let ctx = self.ctx()?;
        let items = ctx.services().search(&query, limit as usize)?;
        Ok(items.into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Stock Catalog
    // =========================================================================

    /// List stock items, newest first.
    pub fn list_stock(&self, active_only: bool) -> Result<Vec<FfiStockItem>, DocPugError> {
        let ctx = self.ctx()?;
        let items = ctx.stock().list(active_only)?;
        Ok(items.into_iter().map(Into::into).collect())
    }

    pub fn add_stock(
        &self,
        name: String,
        price: f64,
        unit: String,
        qty: f64,
    ) -> Result<FfiStockItem, DocPugError> {
        let ctx = self.ctx()?;
        Ok(ctx.stock().add(&name, price, &unit, qty)?.into())
    }

    pub fn update_stock(
        &self,
        id: String,
        name: String,
        price: f64,
        unit: String,
    ) -> Result<FfiStockItem, DocPugError> {
        let ctx = self.ctx()?;
        Ok(ctx.stock().update(&id, &name, price, &unit)?.into())
    }

    /// Flip a stock item between active and hidden.
    pub fn toggle_stock(&self, id: String) -> Result<FfiStockItem, DocPugError> {
        let ctx = self.ctx()?;
        Ok(ctx.stock().toggle_active(&id)?.into())
    }

    /// Overwrite quantity on hand.
    pub fn set_stock_qty(&self, id: String, qty: f64) -> Result<(), DocPugError> {
        let ctx = self.ctx()?;
        Ok(ctx.stock().set_qty(&id, qty)?)
    }

    pub fn delete_stock(&self, id: String) -> Result<bool, DocPugError> {
        let ctx = self.ctx()?;
        Ok(ctx.stock().delete(&id)?)
    }

    pub fn search_stock(&self, query: String, limit: u32) -> Result<Vec<FfiStockItem>, DocPugError> {
        let ctx = self.ctx()?;
        let items = ctx.stock().search(&query, limit as usize)?;
        Ok(items.into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Visits
    // =========================================================================

    /// Fetch a visit from the server (stale-protected).
    pub fn fetch_visit(&self, id: String) -> Result<FfiVisit, DocPugError> {
        let mut ctx = self.ctx()?;
        Ok(ctx.visits_mut().fetch(&id)?.into())
    }

    /// Visits of one patient, or all visits.
    pub fn list_visits(&self, pet_id: Option<String>) -> Result<Vec<FfiVisit>, DocPugError> {
        let mut ctx = self.ctx()?;
        let visits = match pet_id {
            Some(pet_id) => ctx.visits_mut().list_for_patient(&pet_id)?,
            None => ctx.visits_mut().list_all()?,
        };
        Ok(visits.into_iter().map(Into::into).collect())
    }

    pub fn create_visit(&self, draft: FfiVisitDraft) -> Result<FfiVisit, DocPugError> {
        let mut ctx = self.ctx()?;
        Ok(ctx.visits_mut().create(&draft.into())?.into())
    }

    /// Edit the clinical fields of a visit, keeping its lines.
    pub fn edit_visit(&self, id: String, draft: FfiVisitDraft) -> Result<FfiVisit, DocPugError> {
        let mut ctx = self.ctx()?;
        let current = ctx.visits_mut().fetch(&id)?;
        let draft: VisitDraft = draft.into();
        let edited = draft.apply_to(Some(&current));
        Ok(ctx.visits_mut().save(&edited)?.into())
    }

    pub fn delete_visit(&self, id: String) -> Result<(), DocPugError> {
        let mut ctx = self.ctx()?;
        Ok(ctx.delete_visit(&id)?)
    }

    // =========================================================================
    // Line Editing
    // =========================================================================

    pub fn add_service_line(
        &self,
        visit_id: String,
        service_id: String,
        qty: f64,
    ) -> Result<FfiVisit, DocPugError> {
        let mut ctx = self.ctx()?;
        Ok(ctx.lines().add_service_line(&visit_id, &service_id, qty)?.into())
    }

    pub fn add_stock_line(
        &self,
        visit_id: String,
        stock_id: String,
        qty: f64,
    ) -> Result<FfiVisit, DocPugError> {
        let mut ctx = self.ctx()?;
        Ok(ctx.lines().add_stock_line(&visit_id, &stock_id, qty)?.into())
    }

    /// Remove a service line by its stable ID.
    pub fn remove_service_line(&self, visit_id: String, line_id: String) -> Result<FfiVisit, DocPugError> {
        let mut ctx = self.ctx()?;
        Ok(ctx
            .lines()
            .remove_service_line(&visit_id, &LineRef::Id(line_id))?
            .into())
    }

    /// Remove a stock line by its stable ID.
    pub fn remove_stock_line(&self, visit_id: String, line_id: String) -> Result<FfiVisit, DocPugError> {
        let mut ctx = self.ctx()?;
        Ok(ctx
            .lines()
            .remove_stock_line(&visit_id, &LineRef::Id(line_id))?
            .into())
    }

    // =========================================================================
    // Discharge
    // =========================================================================

    /// Discharge document as pretty JSON.
    pub fn discharge_json(&self, visit_id: String) -> Result<String, DocPugError> {
        let mut ctx = self.ctx()?;
        Ok(ctx.compose_discharge(&visit_id)?.to_json()?)
    }

    /// Discharge document as printable plain text.
    pub fn discharge_text(&self, visit_id: String) -> Result<String, DocPugError> {
        let mut ctx = self.ctx()?;
        Ok(ctx.compose_discharge(&visit_id)?.to_text())
    }

    pub fn save_discharge(&self, visit_id: String, form: FfiDischargeForm) -> Result<FfiVisit, DocPugError> {
        let mut ctx = self.ctx()?;
        let (_, visit) = ctx.save_discharge(&visit_id, &form.into())?;
        Ok(visit.into())
    }

    // =========================================================================
    // Owners & Patients
    // =========================================================================

    /// Reload owners from the server.
    pub fn refresh_owners(&self) -> Result<Vec<FfiOwner>, DocPugError> {
        let ctx = self.ctx()?;
        let owners = ctx.directory().refresh_owners()?;
        Ok(owners.into_iter().map(Into::into).collect())
    }

    /// Owners from the local mirror.
    pub fn list_owners(&self) -> Result<Vec<FfiOwner>, DocPugError> {
        let ctx = self.ctx()?;
        let owners = ctx.directory().cached_owners()?;
        Ok(owners.into_iter().map(Into::into).collect())
    }

    pub fn create_owner(&self, name: String, phone: String, note: String) -> Result<FfiOwner, DocPugError> {
        let ctx = self.ctx()?;
        Ok(ctx.directory().create_owner(&name, &phone, &note)?.into())
    }

    pub fn delete_owner(&self, id: String) -> Result<(), DocPugError> {
        let ctx = self.ctx()?;
        Ok(ctx.directory().delete_owner(&id)?)
    }

    /// Reload patients from the server.
    pub fn refresh_patients(&self) -> Result<Vec<FfiPatient>, DocPugError> {
        let ctx = self.ctx()?;
        let patients = ctx.directory().refresh_patients()?;
        Ok(patients.into_iter().map(Into::into).collect())
    }

    /// Patients from the local mirror, optionally of one owner.
    pub fn list_patients(&self, owner_id: Option<String>) -> Result<Vec<FfiPatient>, DocPugError> {
        let ctx = self.ctx()?;
        let directory = ctx.directory();
        let patients = match owner_id {
            Some(owner_id) => directory.patients_of_owner(&owner_id)?,
            None => directory.cached_patients()?,
        };
        Ok(patients.into_iter().map(Into::into).collect())
    }

    pub fn create_patient(&self, patient: FfiNewPatient) -> Result<FfiPatient, DocPugError> {
        let ctx = self.ctx()?;
        Ok(ctx.directory().create_patient(&patient.into())?.into())
    }

    pub fn delete_patient(&self, id: String) -> Result<(), DocPugError> {
        let ctx = self.ctx()?;
        Ok(ctx.directory().delete_patient(&id)?)
    }

    /// Write the visit cache to local storage.
    pub fn persist(&self) -> Result<(), DocPugError> {
        let ctx = self.ctx()?;
        Ok(ctx.persist()?)
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe service catalog item.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiServiceItem {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub active: bool,
}

impl From<ServiceItem> for FfiServiceItem {
    fn from(item: ServiceItem) -> Self {
        Self {
            id: item.id,
            name: item.name,
            price: item.price,
            active: item.active,
        }
    }
}

/// FFI-safe stock item.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStockItem {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub unit: String,
    pub qty: f64,
    pub active: bool,
}

impl From<StockItem> for FfiStockItem {
    fn from(item: StockItem) -> Self {
        Self {
            id: item.id,
            name: item.name,
            price: item.price,
            unit: item.unit,
            qty: item.qty,
            active: item.active,
        }
    }
}

/// FFI-safe visit line (service or stock).
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisitLine {
    pub line_id: String,
    pub catalog_id: String,
    pub qty: f64,
    pub price_snap: Option<f64>,
    pub name_snap: Option<String>,
    pub unit_snap: Option<String>,
}

impl From<ServiceLine> for FfiVisitLine {
    fn from(line: ServiceLine) -> Self {
        Self {
            line_id: line.line_id,
            catalog_id: line.service_id,
            qty: line.qty,
            price_snap: line.price_snap,
            name_snap: line.name_snap,
            unit_snap: None,
        }
    }
}

impl From<StockLine> for FfiVisitLine {
    fn from(line: StockLine) -> Self {
        Self {
            line_id: line.line_id,
            catalog_id: line.stock_id,
            qty: line.qty,
            price_snap: line.price_snap,
            name_snap: line.name_snap,
            unit_snap: line.unit_snap,
        }
    }
}

/// FFI-safe visit.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisit {
    pub id: String,
    pub pet_id: String,
    pub date: String,
    pub note: String,
    pub rx: String,
    pub weight_kg: Option<f64>,
    pub diagnosis: Option<String>,
    pub complaint: Option<String>,
    pub services: Vec<FfiVisitLine>,
    pub stock: Vec<FfiVisitLine>,
}

impl From<Visit> for FfiVisit {
    fn from(visit: Visit) -> Self {
        Self {
            id: visit.id,
            pet_id: visit.pet_id,
            date: visit.date,
            note: visit.note,
            rx: visit.rx,
            weight_kg: visit.weight_kg,
            diagnosis: visit.diagnosis,
            complaint: visit.complaint,
            services: visit.services.into_iter().map(Into::into).collect(),
            stock: visit.stock.into_iter().map(Into::into).collect(),
        }
    }
}

/// FFI-safe visit form.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisitDraft {
    pub pet_id: String,
    pub date: String,
    pub complaint: String,
    pub diagnosis: String,
    pub rx: String,
    pub weight_kg: Option<f64>,
}

impl From<FfiVisitDraft> for VisitDraft {
    fn from(draft: FfiVisitDraft) -> Self {
        VisitDraft {
            pet_id: draft.pet_id,
            date: draft.date,
            complaint: draft.complaint,
            diagnosis: draft.diagnosis,
            rx: draft.rx,
            weight_kg: draft.weight_kg,
        }
    }
}

/// FFI-safe discharge form.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDischargeForm {
    pub complaint: String,
    pub diagnosis: String,
    pub rx: String,
    pub recommendations: String,
    pub follow_up: String,
}

impl From<FfiDischargeForm> for DischargeForm {
    fn from(form: FfiDischargeForm) -> Self {
        DischargeForm {
            complaint: form.complaint,
            diagnosis: form.diagnosis,
            rx: form.rx,
            recommendations: form.recommendations,
            follow_up: form.follow_up,
        }
    }
}

/// FFI-safe owner.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiOwner {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub note: Option<String>,
}

impl From<Owner> for FfiOwner {
    fn from(owner: Owner) -> Self {
        Self {
            id: owner.id,
            name: owner.name,
            phone: owner.phone,
            note: owner.note,
        }
    }
}

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub species: Option<String>,
    pub breed: Option<String>,
    pub age: Option<String>,
    pub weight_kg: Option<f64>,
    pub notes: Option<String>,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            id: patient.id,
            owner_id: patient.owner_id,
            name: patient.name,
            species: patient.species,
            breed: patient.breed,
            age: patient.age,
            weight_kg: patient.weight_kg,
            notes: patient.notes,
        }
    }
}

/// FFI-safe patient form; blank text fields are omitted.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewPatient {
    pub owner_id: String,
    pub name: String,
    pub species: String,
    pub breed: String,
    pub age: String,
    pub weight: String,
    pub notes: String,
}

impl From<FfiNewPatient> for models::NewPatient {
    fn from(p: FfiNewPatient) -> Self {
        models::NewPatient::new(&p.owner_id, &p.name)
            .with_species(&p.species)
            .with_breed(&p.breed)
            .with_age(&p.age)
            .with_weight(&p.weight)
            .with_notes(&p.notes)
    }
}
