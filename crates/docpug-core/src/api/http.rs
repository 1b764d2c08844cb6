//! Blocking HTTP implementation of [`ClinicApi`].

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::ACCEPT;
use reqwest::Url;
use serde_json::{json, Value};
use tracing::{debug, error};

use super::{
    data_list, data_one, parse_envelope, ApiError, ApiResult, ClinicApi, RawVisit, VisitPayload,
    VisitQuery,
};
use crate::models::{NewOwner, NewPatient, Owner, Patient};

/// HTTP client for the clinic API.
pub struct HttpApi {
    /// HTTP client.
    client: Client,
    /// Server root, e.g. `http://localhost:8080`.
    base_url: Url,
}

impl HttpApi {
    /// Create a client for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiError::Transport(format!("invalid base URL {}: {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    /// Build an endpoint URL from path segments (each segment is escaped).
    fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Transport(format!("base URL cannot have a path: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and unwrap the response envelope.
    fn send(&self, request: RequestBuilder, what: &str) -> ApiResult<Option<Value>> {
        debug!(what, "sending API request");

        let response = request
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|e| {
                error!(what, error = %e, "API request failed");
                ApiError::Transport(e.to_string())
            })?;

        let status = response.status().as_u16();
        let body = response.text().map_err(|e| {
            error!(what, status, error = %e, "failed to read API response");
            ApiError::Transport(e.to_string())
        })?;

        parse_envelope(status, &body).map_err(|e| {
            error!(what, status, body = %body, error = %e, "API request unsuccessful");
            e
        })
    }
}

impl ClinicApi for HttpApi {
    fn list_visits(&self, query: &VisitQuery) -> ApiResult<Vec<RawVisit>> {
        let mut url = self.endpoint(&["api", "visits"])?;
        let pairs = query.pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        data_list(self.send(self.client.get(url), "list visits")?)
    }

    fn create_visit(&self, payload: &VisitPayload) -> ApiResult<Option<RawVisit>> {
        let url = self.endpoint(&["api", "visits"])?;
        data_one(self.send(self.client.post(url).json(payload), "create visit")?)
    }

    fn update_visit(&self, id: &str, payload: &VisitPayload) -> ApiResult<Option<RawVisit>> {
        let url = self.endpoint(&["api", "visits", id])?;
        data_one(self.send(self.client.put(url).json(payload), "update visit")?)
    }

    fn delete_visit(&self, id: &str) -> ApiResult<()> {
        let url = self.endpoint(&["api", "visits", id])?;
        self.send(self.client.delete(url), "delete visit")?;
        Ok(())
    }

    fn list_owners(&self) -> ApiResult<Vec<Owner>> {
        let url = self.endpoint(&["api", "owners"])?;
        data_list(self.send(self.client.get(url), "list owners")?)
    }

    fn create_owner(&self, owner: &NewOwner) -> ApiResult<Option<Owner>> {
        let url = self.endpoint(&["api", "owners"])?;
        data_one(self.send(self.client.post(url).json(owner), "create owner")?)
    }

    fn delete_owner(&self, id: &str) -> ApiResult<()> {
        let url = self.endpoint(&["api", "owners", id])?;
        self.send(self.client.delete(url), "delete owner")?;
        Ok(())
    }

    fn list_patients(&self) -> ApiResult<Vec<Patient>> {
        let url = self.endpoint(&["api", "patients"])?;
        data_list(self.send(self.client.get(url), "list patients")?)
    }

    fn create_patient(&self, patient: &NewPatient) -> ApiResult<Option<Patient>> {
        let url = self.endpoint(&["api", "patients"])?;
        data_one(self.send(self.client.post(url).json(patient), "create patient")?)
    }

    fn delete_patient(&self, id: &str) -> ApiResult<()> {
        let url = self.endpoint(&["api", "patients", id])?;
        self.send(self.client.delete(url), "delete patient")?;
        Ok(())
    }

    fn attach_files(&self, visit_id: &str, stored_names: &[String]) -> ApiResult<()> {
        let url = self.endpoint(&["api", "visits", visit_id, "files"])?;
        let body = json!({ "stored_names": stored_names });
        self.send(self.client.post(url).json(&body), "attach files")?;
        Ok(())
    }

    fn delete_upload(&self, stored_name: &str) -> ApiResult<()> {
        let url = self.endpoint(&["api", "delete_upload"])?;
        let body = json!({ "stored_name": stored_name });
        self.send(self.client.post(url).json(&body), "delete upload")?;
        Ok(())
    }
}
