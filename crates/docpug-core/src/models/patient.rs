//! Patient models.

use serde::{Deserialize, Serialize};

use super::lenient;
use super::owner::non_blank;

/// A patient (pet) belonging to one owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Server ID
    #[serde(deserialize_with = "lenient::id")]
    pub id: String,
    /// Owning client's server ID
    #[serde(default, deserialize_with = "lenient::id")]
    pub owner_id: String,
    /// Patient name
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    /// Species (e.g., "пес", "кіт")
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub species: Option<String>,
    /// Breed
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub breed: Option<String>,
    /// Age as entered (years, may be fractional text like "3.8")
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub age: Option<String>,
    /// Weight in kg
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub weight_kg: Option<f64>,
    /// Additional notes
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub notes: Option<String>,
}

impl Patient {
    /// Signalment line for printed documents ("species • breed • age").
    pub fn signalment(&self) -> String {
        [
            self.species.as_deref(),
            self.breed.as_deref(),
            self.age.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" • ")
    }
}

/// Request body for creating a patient. Blank fields are omitted.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct NewPatient {
    pub owner_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NewPatient {
    /// Build a request with the required fields.
    pub fn new(owner_id: &str, name: &str) -> Self {
        Self {
            owner_id: owner_id.trim().to_string(),
            name: name.trim().to_string(),
            ..Default::default()
        }
    }

    /// Set species, ignoring blank input.
    pub fn with_species(mut self, species: &str) -> Self {
        self.species = non_blank(species);
        self
    }

    /// Set breed, ignoring blank input.
    pub fn with_breed(mut self, breed: &str) -> Self {
        self.breed = non_blank(breed);
        self
    }

    /// Set age, ignoring blank input.
    pub fn with_age(mut self, age: &str) -> Self {
        self.age = non_blank(age);
        self
    }

    /// Set weight from form input ("5", "5,2").
    pub fn with_weight(mut self, weight: &str) -> Self {
        self.weight_kg = lenient::parse_number(weight);
        self
    }

    /// Set notes, ignoring blank input.
    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = non_blank(notes);
        self
    }
}
