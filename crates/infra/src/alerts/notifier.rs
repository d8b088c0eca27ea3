use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;

use stockpile_inventory::Item;

/// Snapshot of an item that is at or below its minimum stock level.
#[derive(Debug, Clone, PartialEq)]
pub struct LowStockAlert {
    pub item: Item,
    pub raised_at: DateTime<Utc>,
}

impl LowStockAlert {
    pub fn new(item: Item) -> Self {
        Self {
            item,
            raised_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Delivery channel for low-stock alerts (log, mail, pager, ...).
///
/// Called from the single alert worker thread; implementations may be slow.
pub trait AlertNotifier: Send + Sync + 'static {
    fn notify(&self, alert: &LowStockAlert) -> Result<(), NotifyError>;
}

/// Default notifier: one structured `warn!` line per alert.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl AlertNotifier for TracingNotifier {
    fn notify(&self, alert: &LowStockAlert) -> Result<(), NotifyError> {
        warn!(
            item_id = %alert.item.id(),
            name = alert.item.name(),
            quantity = alert.item.quantity(),
            min_stock_level = alert.item.min_stock_level(),
            raised_at = %alert.raised_at,
            "low stock alert"
        );
        Ok(())
    }
}

/// In-memory notifier for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryNotifier {
    inner: Mutex<Vec<LowStockAlert>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<LowStockAlert> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AlertNotifier for InMemoryNotifier {
    fn notify(&self, alert: &LowStockAlert) -> Result<(), NotifyError> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(alert.clone());
        Ok(())
    }
}
