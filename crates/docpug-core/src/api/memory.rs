//! In-memory [`ClinicApi`] backend.
//!
//! Behaves like the clinic server (numeric ids, echoing stored records,
//! `*_json` columns) without a network. Used for offline demos and tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde_json::{Map, Value};

use super::{ApiError, ApiResult, ClinicApi, RawVisit, VisitPayload, VisitQuery};
use crate::models::lenient::value_to_id;
use crate::models::{NewOwner, NewPatient, Owner, Patient};

#[derive(Default)]
struct MemoryState {
    next_id: u64,
    visits: Vec<Value>,
    owners: Vec<Owner>,
    patients: Vec<Patient>,
    attached: HashMap<String, Vec<String>>,
    deleted_uploads: Vec<String>,
    offline: bool,
    failures: Vec<ApiError>,
    update_failures: Vec<ApiError>,
    calls: usize,
}

impl MemoryState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn visit_index(&self, id: &str) -> Option<usize> {
        self.visits
            .iter()
            .position(|v| v.get("id").and_then(value_to_id).as_deref() == Some(id))
    }
}

/// Clinic API held in process memory.
#[derive(Default)]
pub struct MemoryApi {
    state: Mutex<MemoryState>,
}

impl MemoryApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> ApiResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| ApiError::Transport("memory backend lock poisoned".to_string()))
    }

    /// Lock state for a request, applying offline mode and queued failures.
    fn begin(&self) -> ApiResult<MutexGuard<'_, MemoryState>> {
        let mut state = self.lock()?;
        state.calls += 1;
        if state.offline {
            return Err(ApiError::Transport("server unreachable".to_string()));
        }
        if !state.failures.is_empty() {
            return Err(state.failures.remove(0));
        }
        Ok(state)
    }

    /// Store a visit record verbatim, as the server would hold it.
    pub fn insert_raw_visit(&self, record: Value) -> ApiResult<()> {
        let mut state = self.lock()?;
        let id = record.get("id").and_then(value_to_id).unwrap_or_default();
        if let Ok(numeric) = id.parse::<u64>() {
            state.next_id = state.next_id.max(numeric);
        }
        match state.visit_index(&id) {
            Some(index) => state.visits[index] = record,
            None => state.visits.push(record),
        }
        Ok(())
    }

    /// The stored record of a visit.
    pub fn raw_visit(&self, id: &str) -> ApiResult<Option<Value>> {
        let state = self.lock()?;
        Ok(state.visit_index(id).map(|index| state.visits[index].clone()))
    }

    /// Refuse every request with a transport error while `offline`.
    pub fn set_offline(&self, offline: bool) -> ApiResult<()> {
        self.lock()?.offline = offline;
        Ok(())
    }

    /// Make the next request fail with `error`.
    pub fn fail_next(&self, error: ApiError) -> ApiResult<()> {
        self.lock()?.failures.push(error);
        Ok(())
    }

    /// Make the next visit update fail with `error`.
    pub fn fail_next_update(&self, error: ApiError) -> ApiResult<()> {
        self.lock()?.update_failures.push(error);
        Ok(())
    }

    /// Stored names attached to a visit on the server.
    pub fn attached_files(&self, visit_id: &str) -> ApiResult<Vec<String>> {
        Ok(self.lock()?.attached.get(visit_id).cloned().unwrap_or_default())
    }

    /// Uploads deleted so far.
    pub fn deleted_uploads(&self) -> ApiResult<Vec<String>> {
        Ok(self.lock()?.deleted_uploads.clone())
    }

    /// Number of requests received.
    pub fn call_count(&self) -> ApiResult<usize> {
        Ok(self.lock()?.calls)
    }
}

fn to_record(id: &str, payload: &VisitPayload) -> ApiResult<Value> {
    let mut record = match serde_json::to_value(payload) {
        Ok(Value::Object(map)) => map,
        Ok(_) => Map::new(),
        Err(e) => return Err(ApiError::MalformedBody(e.to_string())),
    };
    let id = id
        .parse::<u64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(id));
    record.insert("id".to_string(), id);
    Ok(Value::Object(record))
}

fn to_raw(record: &Value) -> ApiResult<RawVisit> {
    serde_json::from_value(record.clone()).map_err(|e| ApiError::MalformedBody(e.to_string()))
}

fn not_found(what: &str) -> ApiError {
    ApiError::Status {
        status: 404,
        body: format!(r#"{{"ok":false,"error":"{} not found"}}"#, what),
    }
}

impl ClinicApi for MemoryApi {
    fn list_visits(&self, query: &VisitQuery) -> ApiResult<Vec<RawVisit>> {
        let state = self.begin()?;
        let field_matches = |record: &Value, field: &str, wanted: &Option<String>| match wanted {
            Some(wanted) => record.get(field).and_then(value_to_id).as_ref() == Some(wanted),
            None => true,
        };

        state
            .visits
            .iter()
            .filter(|record| field_matches(record, "id", &query.id))
            .filter(|record| field_matches(record, "pet_id", &query.pet_id))
            .map(to_raw)
            .collect()
    }

    fn create_visit(&self, payload: &VisitPayload) -> ApiResult<Option<RawVisit>> {
        let mut state = self.begin()?;
        let id = state.next_id().to_string();
        let record = to_record(&id, payload)?;
        let raw = to_raw(&record)?;
        state.visits.push(record);
        Ok(Some(raw))
    }

    fn update_visit(&self, id: &str, payload: &VisitPayload) -> ApiResult<Option<RawVisit>> {
        let mut state = self.begin()?;
        if !state.update_failures.is_empty() {
            return Err(state.update_failures.remove(0));
        }
        let index = state.visit_index(id).ok_or_else(|| not_found("visit"))?;
        let record = to_record(id, payload)?;
        let raw = to_raw(&record)?;
        state.visits[index] = record;
        Ok(Some(raw))
    }

    fn delete_visit(&self, id: &str) -> ApiResult<()> {
        let mut state = self.begin()?;
        let index = state.visit_index(id).ok_or_else(|| not_found("visit"))?;
        state.visits.remove(index);
        state.attached.remove(id);
        Ok(())
    }

    fn list_owners(&self) -> ApiResult<Vec<Owner>> {
        Ok(self.begin()?.owners.clone())
    }

    fn create_owner(&self, owner: &NewOwner) -> ApiResult<Option<Owner>> {
        let mut state = self.begin()?;
        if owner.name.trim().is_empty() {
            return Err(ApiError::Rejected("name required".to_string()));
        }
        let created = Owner {
            id: state.next_id().to_string(),
            name: owner.name.clone(),
            phone: owner.phone.clone(),
            note: owner.note.clone(),
        };
        state.owners.insert(0, created.clone());
        Ok(Some(created))
    }

    fn delete_owner(&self, id: &str) -> ApiResult<()> {
        let mut state = self.begin()?;
        let before = state.owners.len();
        state.owners.retain(|o| o.id != id);
        if state.owners.len() == before {
            return Err(not_found("owner"));
        }
        state.patients.retain(|p| p.owner_id != id);
        Ok(())
    }

    fn list_patients(&self) -> ApiResult<Vec<Patient>> {
        Ok(self.begin()?.patients.clone())
    }

    fn create_patient(&self, patient: &NewPatient) -> ApiResult<Option<Patient>> {
        let mut state = self.begin()?;
        if patient.name.trim().is_empty() || patient.owner_id.trim().is_empty() {
            return Err(ApiError::Rejected("owner_id and name required".to_string()));
        }
        let created = Patient {
            id: state.next_id().to_string(),
            owner_id: patient.owner_id.clone(),
            name: patient.name.clone(),
            species: patient.species.clone(),
            breed: patient.breed.clone(),
            age: patient.age.clone(),
            weight_kg: patient.weight_kg,
            notes: patient.notes.clone(),
        };
        state.patients.insert(0, created.clone());
        Ok(Some(created))
    }

    fn delete_patient(&self, id: &str) -> ApiResult<()> {
        let mut state = self.begin()?;
        let before = state.patients.len();
        state.patients.retain(|p| p.id != id);
        if state.patients.len() == before {
            return Err(not_found("patient"));
        }
        Ok(())
    }

    fn attach_files(&self, visit_id: &str, stored_names: &[String]) -> ApiResult<()> {
        let mut state = self.begin()?;
        if state.visit_index(visit_id).is_none() {
            return Err(not_found("visit"));
        }
        let attached = state.attached.entry(visit_id.to_string()).or_default();
        for name in stored_names {
            if !attached.contains(name) {
                attached.push(name.clone());
            }
        }
        Ok(())
    }

    fn delete_upload(&self, stored_name: &str) -> ApiResult<()> {
        let mut state = self.begin()?;
        if stored_name.trim().is_empty() {
            return Err(ApiError::Rejected("stored_name required".to_string()));
        }
        state.deleted_uploads.push(stored_name.to_string());
        for names in state.attached.values_mut() {
            names.retain(|n| n != stored_name);
        }
        Ok(())
    }
}
