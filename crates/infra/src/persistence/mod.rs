//! Durable-store boundary for the catalog and the audit log.
//!
//! Both collections use full-replace semantics: every save replaces the whole
//! stored collection, and a load never observes a half-written save.

pub mod in_memory;
pub mod json_file;

use std::sync::Arc;

use thiserror::Error;

use stockpile_core::InventoryError;
use stockpile_inventory::{AuditRecord, Item};

pub use in_memory::InMemoryPersistence;
pub use json_file::JsonFilePersistence;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("stored data in {path} is corrupt: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("failed to serialize {what}: {reason}")]
    Serialize { what: &'static str, reason: String },

    /// Failure injected by a test/dev store.
    #[error("injected failure: {0}")]
    Injected(String),
}

impl From<PersistenceError> for InventoryError {
    fn from(value: PersistenceError) -> Self {
        InventoryError::Persistence(value.to_string())
    }
}

/// Persistence collaborator used by the engine and the transaction recorder.
pub trait InventoryPersistence: Send + Sync {
    /// Load the stored catalog; an absent store loads as empty.
    fn load_catalog(&self) -> Result<Vec<Item>, PersistenceError>;

    /// Replace the stored catalog with `items`.
    fn save_catalog(&self, items: &[Item]) -> Result<(), PersistenceError>;

    /// Load the stored audit log; an absent store loads as empty.
    fn load_audit_log(&self) -> Result<Vec<AuditRecord>, PersistenceError>;

    /// Replace the stored audit log with `records`.
    fn save_audit_log(&self, records: &[AuditRecord]) -> Result<(), PersistenceError>;
}

impl<P> InventoryPersistence for Arc<P>
where
    P: InventoryPersistence + ?Sized,
{
    fn load_catalog(&self) -> Result<Vec<Item>, PersistenceError> {
        (**self).load_catalog()
    }

    fn save_catalog(&self, items: &[Item]) -> Result<(), PersistenceError> {
        (**self).save_catalog(items)
    }

    fn load_audit_log(&self) -> Result<Vec<AuditRecord>, PersistenceError> {
        (**self).load_audit_log()
    }

    fn save_audit_log(&self, records: &[AuditRecord]) -> Result<(), PersistenceError> {
        (**self).save_audit_log(records)
    }
}
