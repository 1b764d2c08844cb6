//! VisitStore: fetch, cache and full-replacement updates of visits.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::{required, StoreError, StoreResult};
use crate::api::{normalize, ClinicApi, VisitPayload, VisitQuery};
use crate::db::{CacheKey, Database};
use crate::models::{Visit, VisitDraft};

/// Visits fetched from the server, indexed by stringified ID.
pub struct VisitStore {
    api: Arc<dyn ClinicApi>,
    cache: HashMap<String, Visit>,
}

impl VisitStore {
    pub fn new(api: Arc<dyn ClinicApi>) -> Self {
        Self {
            api,
            cache: HashMap::new(),
        }
    }

    /// Fetch a visit from the server.
    ///
    /// A response with an empty `services` or `stock` array never replaces a
    /// non-empty array already cached for the same visit.
    pub fn fetch(&mut self, id: &str) -> StoreResult<Visit> {
        let raw = self
            .api
            .list_visits(&VisitQuery::by_id(id))
            .map_err(|e| {
                error!(visit_id = id, error = %e, "failed to fetch visit");
                e
            })?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("visit {}", id)))?;

        let mut visit = normalize(raw);
        if visit.id.is_empty() {
            visit.id = id.to_string();
        }

        if let Some(prev) = self.cache.get(id) {
            if !prev.services.is_empty() && visit.services.is_empty() {
                warn!(visit_id = id, kept = prev.services.len(), "server returned no services; keeping cached lines");
                visit.services = prev.services.clone();
            }
            if !prev.stock.is_empty() && visit.stock.is_empty() {
                warn!(visit_id = id, kept = prev.stock.len(), "server returned no stock; keeping cached lines");
                visit.stock = prev.stock.clone();
            }
        }

        self.cache.insert(id.to_string(), visit.clone());
        Ok(visit)
    }

    /// All visits of a patient, newest date first.
    pub fn list_for_patient(&mut self, pet_id: &str) -> StoreResult<Vec<Visit>> {
        self.list(&VisitQuery::by_patient(pet_id))
    }

    /// All visits, newest date first.
    pub fn list_all(&mut self) -> StoreResult<Vec<Visit>> {
        self.list(&VisitQuery::all())
    }

    fn list(&mut self, query: &VisitQuery) -> StoreResult<Vec<Visit>> {
        let raws = self.api.list_visits(query).map_err(|e| {
            error!(error = %e, "failed to list visits");
            e
        })?;

        let mut visits: Vec<Visit> = raws.into_iter().map(normalize).collect();
        visits.sort_by(|a, b| b.date.cmp(&a.date));
        self.cache(visits.iter().cloned());
        debug!(count = visits.len(), "visits listed");
        Ok(visits)
    }

    /// Create a visit from a draft.
    pub fn create(&mut self, draft: &VisitDraft) -> StoreResult<Visit> {
        let visit = draft.apply_to(None);
        validate(&visit)?;
        if !visit.has_clinical_content() {
            return Err(StoreError::Validation(
                "Fill in at least a complaint, diagnosis or prescription".to_string(),
            ));
        }

        let payload = VisitPayload::from_visit(&visit);
        let created = self.api.create_visit(&payload).map_err(|e| {
            error!(pet_id = %visit.pet_id, error = %e, "failed to create visit");
            e
        })?;

        let created = created
            .map(normalize)
            .filter(|v| !v.id.is_empty())
            .ok_or_else(|| {
                StoreError::Api(crate::api::ApiError::MalformedBody(
                    "created visit has no id".to_string(),
                ))
            })?;

        info!(visit_id = %created.id, pet_id = %created.pet_id, "visit created");
        self.cache.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    /// Replace every mutable field of a visit on the server.
    ///
    /// On success the cache holds the server's answer, with the pushed line
    /// arrays taking precedence. On failure the cache is untouched.
    pub fn update(&mut self, id: &str, payload: &VisitPayload) -> StoreResult<Visit> {
        required(&payload.pet_id, "Patient")?;

        let response = self.api.update_visit(id, payload).map_err(|e| {
            error!(visit_id = id, error = %e, "failed to update visit");
            e
        })?;

        let mut visit = match response {
            Some(raw) => normalize(raw),
            None => Visit {
                pet_id: payload.pet_id.clone(),
                date: payload.date.clone(),
                note: payload.note.clone(),
                rx: payload.rx.clone(),
                weight_kg: payload.weight_kg,
                diagnosis: payload.diagnosis.clone(),
                complaint: payload.complaint.clone(),
                ..Default::default()
            },
        };
        visit.id = id.to_string();
        visit.services = payload.services.clone();
        visit.stock = payload.stock.clone();

        debug!(visit_id = id, services = visit.services.len(), stock = visit.stock.len(), "visit updated");
        self.cache.insert(id.to_string(), visit.clone());
        Ok(visit)
    }

    /// Push a whole visit as the replacement for its server record.
    pub fn save(&mut self, visit: &Visit) -> StoreResult<Visit> {
        self.update(&visit.id, &VisitPayload::from_visit(visit))
    }

    /// Delete a visit, then drop its cache entry and local attachments.
    pub fn delete(&mut self, id: &str, db: &Database) -> StoreResult<()> {
        self.api.delete_visit(id).map_err(|e| {
            error!(visit_id = id, error = %e, "failed to delete visit");
            e
        })?;

        self.cache.remove(id);
        db.delete_discharge(id)?;
        db.unlink_visit_files(id)?;
        info!(visit_id = id, "visit deleted");
        Ok(())
    }

    /// Index visits by ID. Last write wins.
    pub fn cache<I: IntoIterator<Item = Visit>>(&mut self, visits: I) {
        for visit in visits {
            if !visit.id.is_empty() {
                self.cache.insert(visit.id.clone(), visit);
            }
        }
    }

    /// Cached copy of a visit, without a server round trip.
    pub fn cached(&self, id: &str) -> Option<&Visit> {
        self.cache.get(id)
    }

    /// Number of cached visits.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Mirror the cache into local storage.
    pub fn persist_cache(&self, db: &Database) -> StoreResult<()> {
        let mut visits: Vec<&Visit> = self.cache.values().collect();
        visits.sort_by(|a, b| a.id.cmp(&b.id));
        db.put_cached(CacheKey::Visits, &visits)?;
        Ok(())
    }

    /// Load the mirrored cache from local storage. Returns the count loaded.
    pub fn warm_from(&mut self, db: &Database) -> StoreResult<usize> {
        let visits: Vec<Visit> = db.get_cached(CacheKey::Visits)?.unwrap_or_default();
        let count = visits.len();
        self.cache(visits);
        Ok(count)
    }
}

fn validate(visit: &Visit) -> StoreResult<()> {
    required(&visit.pet_id, "Patient")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, MemoryApi};
    use serde_json::json;

    fn setup() -> (Arc<MemoryApi>, VisitStore) {
        let api = Arc::new(MemoryApi::new());
        let store = VisitStore::new(api.clone());
        (api, store)
    }

    fn draft(pet_id: &str) -> VisitDraft {
        VisitDraft {
            pet_id: pet_id.into(),
            date: "2024-05-01".into(),
            complaint: "Кульгає".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_and_fetch() {
        let (_api, mut store) = setup();
        let created = store.create(&draft("7")).unwrap();
        assert_eq!(created.note, "Кульгає");

        let fetched = store.fetch(&created.id).unwrap();
        assert_eq!(fetched.pet_id, "7");
        assert!(store.cached(&created.id).is_some());
    }

    #[test]
    fn test_create_validation() {
        let (api, mut store) = setup();
        assert!(matches!(
            store.create(&VisitDraft::new("7")),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            store.create(&draft(" ")),
            Err(StoreError::Validation(_))
        ));
        assert_eq!(api.call_count().unwrap(), 0);
    }

    #[test]
    fn test_fetch_missing() {
        let (_api, mut store) = setup();
        assert!(matches!(store.fetch("404"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_stale_protection_keeps_cached_lines() {
        let (api, mut store) = setup();
        api.insert_raw_visit(json!({
            "id": 5, "pet_id": 1,
            "services": [{"serviceId": "svc_exam", "qty": 1, "lineId": "l1"}],
            "stock": [{"stockId": "stk_a", "qty": 2, "lineId": "s1"}]
        }))
        .unwrap();
        store.fetch("5").unwrap();

        api.insert_raw_visit(json!({"id": 5, "pet_id": 1, "note": "new", "services": [], "stock": null}))
            .unwrap();
        let visit = store.fetch("5").unwrap();

        assert_eq!(visit.note, "new");
        assert_eq!(visit.services[0].line_id, "l1");
        assert_eq!(visit.stock[0].line_id, "s1");
    }

    #[test]
    fn test_failed_update_leaves_cache() {
        let (api, mut store) = setup();
        let created = store.create(&draft("7")).unwrap();

        let mut edited = created.clone();
        edited.rx = "Антибіотик".into();
        api.fail_next(ApiError::Status {
            status: 500,
            body: "oops".into(),
        })
        .unwrap();

        assert!(matches!(store.save(&edited), Err(StoreError::Api(_))));
        assert_eq!(store.cached(&created.id).unwrap().rx, "");
    }

    #[test]
    fn test_list_sorts_and_caches() {
        let (api, mut store) = setup();
        api.insert_raw_visit(json!({"id": 1, "pet_id": 2, "date": "2024-01-01"})).unwrap();
        api.insert_raw_visit(json!({"id": 2, "pet_id": 2, "date": "2024-03-01"})).unwrap();
        api.insert_raw_visit(json!({"id": 3, "pet_id": 9, "date": "2024-02-01"})).unwrap();

        let visits = store.list_for_patient("2").unwrap();
        assert_eq!(visits.iter().map(|v| v.id.as_str()).collect::<Vec<_>>(), vec!["2", "1"]);
        assert_eq!(store.cached_len(), 2);

        assert_eq!(store.list_all().unwrap().len(), 3);
    }

    #[test]
    fn test_persist_and_warm() {
        let (_api, mut store) = setup();
        let db = Database::open_in_memory().unwrap();
        store.create(&draft("7")).unwrap();
        store.persist_cache(&db).unwrap();

        let (_api2, mut fresh) = setup();
        assert_eq!(fresh.warm_from(&db).unwrap(), 1);
        assert_eq!(fresh.cached("1").unwrap().pet_id, "7");
    }

    #[test]
    fn test_delete_evicts() {
        let (_api, mut store) = setup();
        let db = Database::open_in_memory().unwrap();
        let created = store.create(&draft("7")).unwrap();

        store.delete(&created.id, &db).unwrap();
        assert!(store.cached(&created.id).is_none());
        assert!(matches!(store.fetch(&created.id), Err(StoreError::NotFound(_))));
    }
}
