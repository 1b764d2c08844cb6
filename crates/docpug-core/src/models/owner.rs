//! Owner (client) models.

use serde::{Deserialize, Serialize};

use super::lenient;

/// A pet owner as returned by the clinic API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Owner {
    /// Server ID
    #[serde(deserialize_with = "lenient::id")]
    pub id: String,
    /// Full name
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    /// Contact phone
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub phone: Option<String>,
    /// Free-form note (address, preferences)
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub note: Option<String>,
}

impl Owner {
    /// Contact line for printed documents ("phone • note").
    pub fn contact_line(&self) -> String {
        [self.phone.as_deref(), self.note.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" • ")
    }
}

/// Request body for creating an owner. Blank fields are omitted.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewOwner {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl NewOwner {
    /// Build a request from raw form input.
    pub fn new(name: &str, phone: &str, note: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            phone: non_blank(phone),
            note: non_blank(note),
        }
    }
}

pub(crate) fn non_blank(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_owner_omits_blank_fields() {
        let owner = NewOwner::new("  Іван Петренко ", "", "  ");
        let json = serde_json::to_value(&owner).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "Іван Петренко" }));
    }

    #[test]
    fn test_owner_numeric_id() {
        let owner: Owner =
            serde_json::from_str(r#"{"id": 7, "name": "Ivan", "phone": "+380", "note": null}"#)
                .unwrap();
        assert_eq!(owner.id, "7");
        assert_eq!(owner.phone.as_deref(), Some("+380"));
        assert!(owner.note.is_none());
    }

    #[test]
    fn test_contact_line() {
        let owner = Owner {
            id: "1".into(),
            name: "Ivan".into(),
            phone: Some("+38050".into()),
            note: Some("Боярка".into()),
        };
        assert_eq!(owner.contact_line(), "+38050 • Боярка");
    }
}
