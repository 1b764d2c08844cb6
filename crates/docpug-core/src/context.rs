//! Application context: every stateful component, wired once and passed
//! explicitly.

use std::sync::Arc;

use tracing::{debug, info};

use crate::api::{ClinicApi, HttpApi};
use crate::config::{CoreConfig, StockPolicy};
use crate::db::Database;
use crate::export::{DischargeComposer, DischargeDocument, LineCatalog};
use crate::models::{DischargeForm, DischargeRecord, Visit};
use crate::store::{
    save_discharge, Directory, FileLibrary, LineEditor, ServiceRegistry, StockRegistry,
    StoreResult, VisitStore,
};

/// Owns configuration, storage, the API client and the visit cache.
pub struct ClinicContext {
    config: CoreConfig,
    api: Arc<dyn ClinicApi>,
    db: Database,
    visits: VisitStore,
}

impl ClinicContext {
    /// Wire a context over an existing API and database.
    ///
    /// Seeds empty catalogs and warms the visit cache from the local mirror.
    pub fn new(config: CoreConfig, api: Arc<dyn ClinicApi>, db: Database) -> StoreResult<Self> {
        ServiceRegistry::new(&db).seed_defaults()?;
        StockRegistry::new(&db).seed_defaults()?;

        let mut visits = VisitStore::new(api.clone());
        let warmed = visits.warm_from(&db)?;
        debug!(warmed, "visit cache warmed");

        Ok(Self {
            config,
            api,
            db,
            visits,
        })
    }

    /// Open the configured database and HTTP API.
    pub fn open(config: CoreConfig) -> StoreResult<Self> {
        let api = HttpApi::new(&config.api.base_url, config.api.timeout())?;
        let db = Database::open(&config.storage.database_path)?;
        info!(
            base_url = %config.api.base_url,
            database = %config.storage.database_path.display(),
            "clinic context opened"
        );
        Self::new(config, Arc::new(api), db)
    }

    /// Context over an in-memory database (tests, demos).
    pub fn in_memory(config: CoreConfig, api: Arc<dyn ClinicApi>) -> StoreResult<Self> {
        Self::new(config, api, Database::open_in_memory()?)
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn policy(&self) -> StockPolicy {
        self.config.stock
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn api(&self) -> &dyn ClinicApi {
        self.api.as_ref()
    }

    pub fn visits(&self) -> &VisitStore {
        &self.visits
    }

    pub fn visits_mut(&mut self) -> &mut VisitStore {
        &mut self.visits
    }

    pub fn services(&self) -> ServiceRegistry<'_> {
        ServiceRegistry::new(&self.db)
    }

    pub fn stock(&self) -> StockRegistry<'_> {
        StockRegistry::new(&self.db)
    }

    pub fn directory(&self) -> Directory<'_> {
        Directory::new(self.api.as_ref(), &self.db)
    }

    pub fn files(&self) -> FileLibrary<'_> {
        FileLibrary::new(self.api.as_ref(), &self.db)
    }

    pub fn lines(&mut self) -> LineEditor<'_> {
        LineEditor::new(&mut self.visits, &self.db, self.config.stock)
    }

    /// Snapshot of both catalogs for line expansion.
    pub fn line_catalog(&self) -> StoreResult<LineCatalog> {
        Ok(LineCatalog::new(
            self.services().list(false)?,
            self.stock().list(false)?,
        ))
    }

    /// Cached visit, or fetched when not cached yet.
    pub fn visit(&mut self, id: &str) -> StoreResult<Visit> {
        match self.visits.cached(id) {
            Some(visit) => Ok(visit.clone()),
            None => self.visits.fetch(id),
        }
    }

    /// Compose the discharge document of a visit.
    pub fn compose_discharge(&mut self, visit_id: &str) -> StoreResult<DischargeDocument> {
        let visit = self.visit(visit_id)?;
        let saved = self.db.get_discharge(visit_id)?;
        let directory = self.directory();
        let patient = directory.patient(&visit.pet_id)?;
        let owner = match &patient {
            Some(p) => directory.owner(&p.owner_id)?,
            None => None,
        };

        let catalog = self.line_catalog()?;
        Ok(DischargeComposer::new(&catalog).compose(
            &visit,
            saved.as_ref(),
            patient.as_ref(),
            owner.as_ref(),
        ))
    }

    /// Save a discharge form (local record plus visit note/rx).
    pub fn save_discharge(
        &mut self,
        visit_id: &str,
        form: &DischargeForm,
    ) -> StoreResult<(DischargeRecord, Visit)> {
        save_discharge(&mut self.visits, &self.db, visit_id, form)
    }

    /// Delete a visit with its local discharge record and file links.
    pub fn delete_visit(&mut self, visit_id: &str) -> StoreResult<()> {
        self.visits.delete(visit_id, &self.db)
    }

    /// Write the visit cache to local storage.
    pub fn persist(&self) -> StoreResult<()> {
        self.visits.persist_cache(&self.db)
    }
}
