//! `stockpile-core`: shared building blocks for the inventory workspace.
//!
//! This crate contains **pure** primitives (no infrastructure concerns): the
//! error taxonomy every layer reports through, and strongly-typed identifiers.

pub mod error;
pub mod id;

pub use error::{InventoryError, InventoryResult};
pub use id::{AuditRecordId, ItemId};
