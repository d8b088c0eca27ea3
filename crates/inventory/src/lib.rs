//! Inventory domain module.
//!
//! This crate contains business rules for catalog items and their audit trail,
//! implemented purely as deterministic domain logic (no IO, no locking, no
//! storage). Orchestration lives in `stockpile-infra`.

pub mod audit;
pub mod item;

pub use audit::{AuditRecord, TransactionKind};
pub use item::{Item, ItemUpdate, NewItem};
