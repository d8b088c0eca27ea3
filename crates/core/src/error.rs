//! Inventory error model.

use thiserror::Error;

/// Result type used by every inventory operation.
pub type InventoryResult<T> = Result<T, InventoryError>;

/// Typed failure of an inventory operation.
///
/// Every variant is recoverable by the caller. Business-rule variants are
/// raised before any state change is applied; `Persistence` is raised only
/// after the in-memory catalog has been left at its pre-call state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// A field value failed validation (price, quantity, threshold, number format).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Another live item already uses this name (case-insensitive).
    #[error("item with name '{0}' already exists")]
    DuplicateName(String),

    /// No live item has this identifier.
    #[error("item not found with id: {0}")]
    NotFound(String),

    /// A sale asked for more units than are on hand.
    #[error("insufficient stock (available: {available}, requested: {requested})")]
    InsufficientStock { available: i64, requested: i64 },

    /// The durable store could not be read or written.
    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl InventoryError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn duplicate_name(name: impl Into<String>) -> Self {
        Self::DuplicateName(name.into())
    }

    pub fn not_found(id: impl core::fmt::Display) -> Self {
        Self::NotFound(id.to_string())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Short machine-friendly kind, used as a structured logging field.
    pub fn kind(&self) -> &'static str {
        match self {
            InventoryError::Validation(_) => "validation",
            InventoryError::DuplicateName(_) => "duplicate_name",
            InventoryError::NotFound(_) => "not_found",
            InventoryError::InsufficientStock { .. } => "insufficient_stock",
            InventoryError::Persistence(_) => "persistence",
        }
    }
}
