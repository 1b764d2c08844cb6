//! Discharge (printable visit summary) override records.

use serde::{Deserialize, Serialize};

/// Locally stored discharge fields for one visit.
///
/// Any field set here overrides what is derived from the visit itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DischargeRecord {
    /// Visit this record belongs to
    pub visit_id: String,
    /// Complaints / history
    #[serde(default)]
    pub complaint: Option<String>,
    /// Diagnosis
    #[serde(default, rename = "dx")]
    pub diagnosis: Option<String>,
    /// Prescription
    #[serde(default)]
    pub rx: Option<String>,
    /// Recommendations
    #[serde(default, rename = "recs")]
    pub recommendations: Option<String>,
    /// Follow-up / when to come back
    #[serde(default, rename = "follow")]
    pub follow_up: Option<String>,
    /// Last local save
    pub updated_at: String,
}

/// The discharge form as entered by the vet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DischargeForm {
    pub complaint: String,
    #[serde(rename = "dx")]
    pub diagnosis: String,
    pub rx: String,
    #[serde(rename = "recs")]
    pub recommendations: String,
    #[serde(rename = "follow")]
    pub follow_up: String,
}

impl DischargeForm {
    /// Copy with every field trimmed.
    pub fn trimmed(&self) -> Self {
        Self {
            complaint: self.complaint.trim().to_string(),
            diagnosis: self.diagnosis.trim().to_string(),
            rx: self.rx.trim().to_string(),
            recommendations: self.recommendations.trim().to_string(),
            follow_up: self.follow_up.trim().to_string(),
        }
    }
}

impl DischargeRecord {
    /// Record a submitted form, stamping `updated_at`.
    ///
    /// The form carries every field, so a save fully replaces the previous record.
    pub fn from_form(visit_id: &str, form: &DischargeForm) -> Self {
        let form = form.trimmed();
        Self {
            visit_id: visit_id.to_string(),
            complaint: Some(form.complaint),
            diagnosis: Some(form.diagnosis),
            rx: Some(form.rx),
            recommendations: Some(form.recommendations),
            follow_up: Some(form.follow_up),
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
