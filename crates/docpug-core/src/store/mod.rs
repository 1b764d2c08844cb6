//! Stateful components: visits, line editing, registries, directory,
//! files and discharge saving.

mod directory;
mod discharge;
mod files;
mod lines;
mod registry;
mod visits;

pub use directory::*;
pub use discharge::*;
pub use files::*;
pub use lines::*;
pub use registry::*;
pub use visits::*;

use thiserror::Error;

use crate::api::ApiError;
use crate::db::DbError;
use crate::export::format_amount;
use crate::models::LineKind;

/// Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Insufficient stock for {stock_id}: {available} available, {requested} requested")]
    InsufficientStock {
        stock_id: String,
        name: String,
        available: f64,
        requested: f64,
    },

    #[error("{kind} line not found: {line}")]
    LineNotFound { kind: LineKind, line: String },

    #[error("{kind} item is inactive: {id}")]
    InactiveItem { kind: LineKind, id: String },

    #[error("Not found: {0}")]
    NotFound(String),
}

impl StoreError {
    /// Message suitable for a blocking alert.
    pub fn user_message(&self) -> String {
        match self {
            StoreError::Api(e) => e.user_message(),
            StoreError::Db(e) => e.user_message(),
            StoreError::Validation(message) => message.clone(),
            StoreError::InsufficientStock {
                name, available, ..
            } => format!(
                "Not enough \"{}\" in stock ({} available)",
                name,
                format_amount(*available)
            ),
            StoreError::LineNotFound { kind, .. } => {
                format!("The {} line no longer exists on this visit", kind)
            }
            StoreError::InactiveItem { kind, .. } => {
                format!("This {} item is inactive", kind)
            }
            StoreError::NotFound(what) => format!("Not found: {}", what),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Trimmed required text, or a validation error naming the field.
pub(crate) fn required(value: &str, field: &str) -> StoreResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StoreError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}
