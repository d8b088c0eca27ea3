use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockpile_core::{AuditRecordId, InventoryError, ItemId};

/// Kind of quantity-affecting event.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Purchase,
    Sale,
    Adjustment,
    Return,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Purchase => "PURCHASE",
            TransactionKind::Sale => "SALE",
            TransactionKind::Adjustment => "ADJUSTMENT",
            TransactionKind::Return => "RETURN",
        }
    }
}

impl core::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = InventoryError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PURCHASE" => Ok(TransactionKind::Purchase),
            "SALE" => Ok(TransactionKind::Sale),
            "ADJUSTMENT" => Ok(TransactionKind::Adjustment),
            "RETURN" => Ok(TransactionKind::Return),
            other => Err(InventoryError::validation(format!(
                "unknown transaction kind '{other}'"
            ))),
        }
    }
}

/// Immutable historical entry describing one quantity-affecting event.
///
/// The referenced item may since have been deleted: the log is historical,
/// not referential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: AuditRecordId,
    pub item_id: ItemId,
    pub kind: TransactionKind,
    pub delta: i64,
    pub recorded_at: DateTime<Utc>,
    pub user_id: String,
}

impl AuditRecord {
    /// Acting user for engine-originated records (initial stock, removals).
    pub const SYSTEM_USER: &'static str = "system";

    /// Construct a record stamped with the current time.
    pub fn new(item_id: ItemId, kind: TransactionKind, delta: i64, user_id: impl Into<String>) -> Self {
        Self {
            id: AuditRecordId::new(),
            item_id,
            kind,
            delta,
            recorded_at: Utc::now(),
            user_id: user_id.into(),
        }
    }
}
