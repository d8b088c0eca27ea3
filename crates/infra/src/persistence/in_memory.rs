use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use stockpile_inventory::{AuditRecord, Item};

use super::{InventoryPersistence, PersistenceError};

/// In-memory store for tests/dev.
///
/// Supports deterministic failure injection so callers can exercise their
/// rollback paths: catalog saves can be made to fail from the Nth call on, and
/// audit saves can be switched off entirely.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    catalog: RwLock<Vec<Item>>,
    audit_log: RwLock<Vec<AuditRecord>>,
    catalog_saves: AtomicU64,
    /// 0 = never fail; otherwise the 1-based save call from which saves fail.
    fail_catalog_from: AtomicU64,
    fail_audit: AtomicBool,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the stored catalog (as if a previous process had saved it).
    pub fn with_catalog(items: Vec<Item>) -> Self {
        Self {
            catalog: RwLock::new(items),
            ..Self::default()
        }
    }

    /// Make the `n`th catalog save (counted from now, 1-based) and every later
    /// one fail. `n == 0` clears the injection.
    pub fn fail_catalog_saves_after(&self, n: u64) {
        let target = if n == 0 {
            0
        } else {
            self.catalog_saves.load(Ordering::SeqCst) + n
        };
        self.fail_catalog_from.store(target, Ordering::SeqCst);
    }

    pub fn fail_audit_saves(&self, fail: bool) {
        self.fail_audit.store(fail, Ordering::SeqCst);
    }

    /// Number of catalog save attempts so far (including failed ones).
    pub fn catalog_save_count(&self) -> u64 {
        self.catalog_saves.load(Ordering::SeqCst)
    }

    /// Currently stored catalog.
    pub fn stored_catalog(&self) -> Vec<Item> {
        self.catalog.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Currently stored audit log.
    pub fn stored_audit_log(&self) -> Vec<AuditRecord> {
        self.audit_log.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl InventoryPersistence for InMemoryPersistence {
    fn load_catalog(&self) -> Result<Vec<Item>, PersistenceError> {
        Ok(self.stored_catalog())
    }

    fn save_catalog(&self, items: &[Item]) -> Result<(), PersistenceError> {
        let call = self.catalog_saves.fetch_add(1, Ordering::SeqCst) + 1;
        let fail_from = self.fail_catalog_from.load(Ordering::SeqCst);
        if fail_from != 0 && call >= fail_from {
            return Err(PersistenceError::Injected(format!("catalog save #{call} rejected")));
        }

        *self.catalog.write().unwrap_or_else(PoisonError::into_inner) = items.to_vec();
        Ok(())
    }

    fn load_audit_log(&self) -> Result<Vec<AuditRecord>, PersistenceError> {
        Ok(self.stored_audit_log())
    }

    fn save_audit_log(&self, records: &[AuditRecord]) -> Result<(), PersistenceError> {
        if self.fail_audit.load(Ordering::SeqCst) {
            return Err(PersistenceError::Injected("audit save rejected".to_string()));
        }

        *self.audit_log.write().unwrap_or_else(PoisonError::into_inner) = records.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockpile_core::ItemId;
    use stockpile_inventory::NewItem;

    fn item(name: &str) -> Item {
        Item::create(ItemId::new(), NewItem::new(name, "c", 1.0, 1, 0)).unwrap()
    }

    #[test]
    fn save_replaces_whole_catalog() {
        let store = InMemoryPersistence::new();
        store.save_catalog(&[item("a"), item("b")]).unwrap();
        store.save_catalog(&[item("c")]).unwrap();

        let loaded = store.load_catalog().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name(), "c");
    }

    #[test]
    fn injected_failure_starts_at_nth_save() {
        let store = InMemoryPersistence::new();
        store.fail_catalog_saves_after(2);

        store.save_catalog(&[item("a")]).unwrap();
        let err = store.save_catalog(&[item("b")]).unwrap_err();
        assert!(matches!(err, PersistenceError::Injected(_)));

        // Prior stored state survives the failed save.
        assert_eq!(store.stored_catalog()[0].name(), "a");

        store.fail_catalog_saves_after(0);
        store.save_catalog(&[item("b")]).unwrap();
        assert_eq!(store.catalog_save_count(), 3);
    }
}
