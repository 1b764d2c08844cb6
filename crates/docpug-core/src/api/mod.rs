//! Remote clinic API: the `{ok, data?, error?}` JSON service that owns
//! owners, patients and visits.

mod envelope;
mod http;
mod memory;
mod wire;

pub use envelope::*;
pub use http::*;
pub use memory::*;
pub use wire::*;

use thiserror::Error;

use crate::models::{NewOwner, NewPatient, Owner, Patient};

/// Remote API errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Connection refused, timeout, TLS failure, ...
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-2xx HTTP status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Body absent or not the expected JSON shape.
    #[error("Malformed response body: {0}")]
    MalformedBody(String),

    /// `ok: false` with the server's error message.
    #[error("Rejected by server: {0}")]
    Rejected(String),
}

impl ApiError {
    /// Message suitable for a blocking alert.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Transport(_) => "Could not connect to the server".to_string(),
            ApiError::Status { status, .. } => format!("Server error (HTTP {})", status),
            ApiError::MalformedBody(_) => "Unexpected response from the server".to_string(),
            ApiError::Rejected(message) => message.clone(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Filter for listing visits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitQuery {
    /// Single visit by ID
    pub id: Option<String>,
    /// All visits of a patient
    pub pet_id: Option<String>,
}

impl VisitQuery {
    pub fn by_id(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            pet_id: None,
        }
    }

    pub fn by_patient(pet_id: &str) -> Self {
        Self {
            id: None,
            pet_id: Some(pet_id.to_string()),
        }
    }

    pub fn all() -> Self {
        Self::default()
    }

    /// Query-string pairs, skipping unset filters.
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        [("id", self.id.as_deref()), ("pet_id", self.pet_id.as_deref())]
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect()
    }
}

/// Operations the core needs from the remote service.
///
/// Visit writes are full replacements: the server has no partial updates.
pub trait ClinicApi: Send + Sync {
    /// `GET /api/visits?id=&pet_id=`
    fn list_visits(&self, query: &VisitQuery) -> ApiResult<Vec<RawVisit>>;

    /// `POST /api/visits`
    fn create_visit(&self, payload: &VisitPayload) -> ApiResult<Option<RawVisit>>;

    /// `PUT /api/visits/:id`
    fn update_visit(&self, id: &str, payload: &VisitPayload) -> ApiResult<Option<RawVisit>>;

    /// `DELETE /api/visits/:id`
    fn delete_visit(&self, id: &str) -> ApiResult<()>;

    /// `GET /api/owners`
    fn list_owners(&self) -> ApiResult<Vec<Owner>>;

    /// `POST /api/owners`
    fn create_owner(&self, owner: &NewOwner) -> ApiResult<Option<Owner>>;

    /// `DELETE /api/owners/:id`
    fn delete_owner(&self, id: &str) -> ApiResult<()>;

    /// `GET /api/patients`
    fn list_patients(&self) -> ApiResult<Vec<Patient>>;

    /// `POST /api/patients`
    fn create_patient(&self, patient: &NewPatient) -> ApiResult<Option<Patient>>;

    /// `DELETE /api/patients/:id`
    fn delete_patient(&self, id: &str) -> ApiResult<()>;

    /// `POST /api/visits/:id/files` with `{stored_names}`
    fn attach_files(&self, visit_id: &str, stored_names: &[String]) -> ApiResult<()>;

    /// `POST /api/delete_upload` with `{stored_name}`
    fn delete_upload(&self, stored_name: &str) -> ApiResult<()>;
}
