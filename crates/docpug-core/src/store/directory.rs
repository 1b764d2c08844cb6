//! Owners and patients: server-owned records with a local mirror.

use tracing::{error, info};

use super::{required, StoreError, StoreResult};
use crate::api::{ApiError, ClinicApi};
use crate::db::{CacheKey, Database};
use crate::models::{NewOwner, NewPatient, Owner, Patient};

/// Owner and patient directory.
pub struct Directory<'a> {
    api: &'a dyn ClinicApi,
    db: &'a Database,
}

impl<'a> Directory<'a> {
    pub fn new(api: &'a dyn ClinicApi, db: &'a Database) -> Self {
        Self { api, db }
    }

    // =========================================================================
    // Owners
    // =========================================================================

    /// Reload owners from the server. The mirror changes only on success.
    pub fn refresh_owners(&self) -> StoreResult<Vec<Owner>> {
        let owners = self.api.list_owners().map_err(|e| {
            error!(error = %e, "failed to load owners");
            e
        })?;
        self.db.put_cached(CacheKey::Owners, &owners)?;
        Ok(owners)
    }

    /// Create an owner. Blank optional fields are omitted.
    pub fn create_owner(&self, name: &str, phone: &str, note: &str) -> StoreResult<Owner> {
        required(name, "Owner name")?;
        let created = self
            .api
            .create_owner(&NewOwner::new(name, phone, note))
            .map_err(|e| {
                error!(error = %e, "failed to create owner");
                e
            })?
            .ok_or_else(|| missing_record("owner"))?;

        let mut owners = self.cached_owners()?;
        owners.retain(|o| o.id != created.id);
        owners.insert(0, created.clone());
        self.db.put_cached(CacheKey::Owners, &owners)?;

        info!(owner_id = %created.id, "owner created");
        Ok(created)
    }

    /// Delete an owner along with the mirrored patients of that owner.
    pub fn delete_owner(&self, id: &str) -> StoreResult<()> {
        self.api.delete_owner(id).map_err(|e| {
            error!(owner_id = id, error = %e, "failed to delete owner");
            e
        })?;

        let mut owners = self.cached_owners()?;
        owners.retain(|o| o.id != id);
        self.db.put_cached(CacheKey::Owners, &owners)?;

        let mut patients = self.cached_patients()?;
        patients.retain(|p| p.owner_id != id);
        self.db.put_cached(CacheKey::Patients, &patients)?;

        info!(owner_id = id, "owner deleted");
        Ok(())
    }

    pub fn cached_owners(&self) -> StoreResult<Vec<Owner>> {
        Ok(self.db.get_cached(CacheKey::Owners)?.unwrap_or_default())
    }

    pub fn owner(&self, id: &str) -> StoreResult<Option<Owner>> {
        Ok(self.cached_owners()?.into_iter().find(|o| o.id == id))
    }

    // =========================================================================
    // Patients
    // =========================================================================

    /// Reload patients from the server. The mirror changes only on success.
    pub fn refresh_patients(&self) -> StoreResult<Vec<Patient>> {
        let patients = self.api.list_patients().map_err(|e| {
            error!(error = %e, "failed to load patients");
            e
        })?;
        self.db.put_cached(CacheKey::Patients, &patients)?;
        Ok(patients)
    }

    /// Create a patient; it is placed first in the mirror.
    pub fn create_patient(&self, patient: &NewPatient) -> StoreResult<Patient> {
        required(&patient.owner_id, "Owner")?;
        required(&patient.name, "Patient name")?;

        let created = self
            .api
            .create_patient(patient)
            .map_err(|e| {
                error!(error = %e, "failed to create patient");
                e
            })?
            .ok_or_else(|| missing_record("patient"))?;

        let mut patients = self.cached_patients()?;
        patients.retain(|p| p.id != created.id);
        patients.insert(0, created.clone());
        self.db.put_cached(CacheKey::Patients, &patients)?;

        info!(patient_id = %created.id, owner_id = %created.owner_id, "patient created");
        Ok(created)
    }

    pub fn delete_patient(&self, id: &str) -> StoreResult<()> {
        self.api.delete_patient(id).map_err(|e| {
            error!(patient_id = id, error = %e, "failed to delete patient");
            e
        })?;

        let mut patients = self.cached_patients()?;
        patients.retain(|p| p.id != id);
        self.db.put_cached(CacheKey::Patients, &patients)?;
        info!(patient_id = id, "patient deleted");
        Ok(())
    }

    pub fn cached_patients(&self) -> StoreResult<Vec<Patient>> {
        Ok(self.db.get_cached(CacheKey::Patients)?.unwrap_or_default())
    }

    pub fn patients_of_owner(&self, owner_id: &str) -> StoreResult<Vec<Patient>> {
        Ok(self
            .cached_patients()?
            .into_iter()
            .filter(|p| p.owner_id == owner_id)
            .collect())
    }

    pub fn patient(&self, id: &str) -> StoreResult<Option<Patient>> {
        Ok(self.cached_patients()?.into_iter().find(|p| p.id == id))
    }
}

fn missing_record(what: &str) -> StoreError {
    StoreError::Api(ApiError::MalformedBody(format!("created {} missing from response", what)))
}
