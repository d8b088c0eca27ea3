//! Mutation engine: the single choke point for catalog changes.
//!
//! Every add/update/stock-change/remove runs inside one process-wide critical
//! section covering validation, the uniqueness check, the durable save and the
//! publication of the new catalog snapshot:
//!
//! ```text
//! lock mutations
//!   ↓
//! 1. Validate fields + business rules against the current snapshot
//!   ↓
//! 2. Stage the next catalog (copy of the snapshot with the change applied)
//!   ↓
//! 3. Save the staged catalog (full replace)
//!   ├─ failure → discard the staged catalog, return `Persistence`
//!   ↓
//! 4. Publish the staged catalog to readers
//!   ↓
//! 5. Schedule the audit record (async)
//! unlock
//!   ↓
//! 6. Raise a low-stock alert if the item is at/below threshold (async)
//! ```
//!
//! Readers never take the mutation lock; they clone the published
//! `Arc<Catalog>`, so they observe either the pre- or the post-state of an
//! in-flight mutation and never a state whose save failed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use tracing::{debug, info, warn};

use stockpile_core::{InventoryError, InventoryResult, ItemId};
use stockpile_inventory::{AuditRecord, Item, ItemUpdate, NewItem, TransactionKind};

use crate::alerts::AlertPipeline;
use crate::catalog::Catalog;
use crate::persistence::InventoryPersistence;
use crate::recorder::{RecorderStats, TransactionRecorder};

pub struct InventoryEngine<P> {
    persistence: Arc<P>,
    catalog: RwLock<Arc<Catalog>>,
    mutations: Mutex<()>,
    recorder: TransactionRecorder<P>,
    alerts: Arc<AlertPipeline>,
}

impl<P> core::fmt::Debug for InventoryEngine<P>
where
    P: InventoryPersistence + 'static,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InventoryEngine")
            .field("items", &self.snapshot().len())
            .field("alerts", &self.alerts)
            .finish()
    }
}

impl<P> InventoryEngine<P>
where
    P: InventoryPersistence + 'static,
{
    /// Load the stored catalog and audit log and wire the side-effect sinks.
    pub fn open(persistence: Arc<P>, alerts: Arc<AlertPipeline>, audit_workers: usize) -> InventoryResult<Self> {
        let catalog = Catalog::from_items(persistence.load_catalog()?)?;
        let recorder = TransactionRecorder::new(persistence.clone(), audit_workers)?;

        info!(items = catalog.len(), audit_records = recorder.records().len(), "inventory loaded");

        Ok(Self {
            persistence,
            catalog: RwLock::new(Arc::new(catalog)),
            mutations: Mutex::new(()),
            recorder,
            alerts,
        })
    }

    fn lock_mutations(&self) -> MutexGuard<'_, ()> {
        self.mutations.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Save `staged` and, only if that succeeds, make it the live catalog.
    ///
    /// Caller must hold the mutation lock.
    fn commit(&self, staged: Catalog, op: &'static str, item_id: ItemId) -> InventoryResult<()> {
        if let Err(e) = self.persistence.save_catalog(&staged.to_vec()) {
            warn!(op, item_id = %item_id, error = %e, "catalog save failed; mutation rolled back");
            return Err(e.into());
        }

        *self.catalog.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(staged);
        Ok(())
    }

    fn check_low_stock(&self, item: &Item) {
        if item.is_low_stock() {
            debug!(item_id = %item.id(), quantity = item.quantity(), min_stock_level = item.min_stock_level(), "item is low on stock");
            self.alerts.on_low_stock(item);
        }
    }

    /// Create an item. Initial stock is recorded as a `PURCHASE` by `system`.
    pub fn add_item(&self, fields: NewItem) -> InventoryResult<Item> {
        let item = {
            let _guard = self.lock_mutations();
            let current = self.snapshot();

            let item = Item::create(ItemId::new(), fields)?;
            if current.name_owner(item.name()).is_some() {
                return Err(InventoryError::duplicate_name(item.name()));
            }

            let mut staged = Catalog::clone(&current);
            staged.insert(item.clone());
            self.commit(staged, "add_item", item.id())?;

            if item.quantity() > 0 {
                self.recorder.record(AuditRecord::new(
                    item.id(),
                    TransactionKind::Purchase,
                    item.quantity(),
                    AuditRecord::SYSTEM_USER,
                ));
            }
            item
        };

        info!(item_id = %item.id(), name = item.name(), quantity = item.quantity(), "item added");
        self.check_low_stock(&item);
        Ok(item)
    }

    /// Replace an item's descriptive fields. Quantity is untouched.
    ///
    /// The low-stock check runs after every successful update, so an item
    /// that was already low raises another alert.
    pub fn update_item(&self, id: ItemId, update: ItemUpdate) -> InventoryResult<Item> {
        let item = {
            let _guard = self.lock_mutations();
            let current = self.snapshot();

            let existing = current.get(id).ok_or_else(|| InventoryError::not_found(id))?;
            let updated = existing.with_update(update)?;
            match current.name_owner(updated.name()) {
                Some(owner) if owner != id => {
                    return Err(InventoryError::duplicate_name(updated.name()));
                }
                _ => {}
            }

            let mut staged = Catalog::clone(&current);
            staged.replace(updated.clone());
            self.commit(staged, "update_item", id)?;
            updated
        };

        info!(item_id = %id, name = item.name(), "item updated");
        self.check_low_stock(&item);
        Ok(item)
    }

    /// Apply a signed quantity movement and return the new quantity.
    pub fn change_stock(
        &self,
        id: ItemId,
        delta: i64,
        kind: TransactionKind,
        user_id: &str,
    ) -> InventoryResult<i64> {
        let item = {
            let _guard = self.lock_mutations();
            let current = self.snapshot();

            let existing = current.get(id).ok_or_else(|| InventoryError::not_found(id))?;
            let quantity = existing.stock_after(delta, kind)?;
            let updated = existing.with_quantity(quantity);

            let mut staged = Catalog::clone(&current);
            staged.replace(updated.clone());
            self.commit(staged, "change_stock", id)?;

            self.recorder.record(AuditRecord::new(id, kind, delta, user_id));
            updated
        };

        info!(item_id = %id, %kind, delta, quantity = item.quantity(), user_id, "stock changed");
        self.check_low_stock(&item);
        Ok(item.quantity())
    }

    /// Delete an item. Its remaining stock is written off as an
    /// `ADJUSTMENT` by `system`.
    pub fn remove_item(&self, id: ItemId) -> InventoryResult<()> {
        let _guard = self.lock_mutations();
        let current = self.snapshot();

        let mut staged = Catalog::clone(&current);
        let removed = staged.remove(id).ok_or_else(|| InventoryError::not_found(id))?;
        self.commit(staged, "remove_item", id)?;

        self.recorder.record(AuditRecord::new(
            id,
            TransactionKind::Adjustment,
            -removed.quantity(),
            AuditRecord::SYSTEM_USER,
        ));

        info!(item_id = %id, name = removed.name(), "item removed");
        Ok(())
    }

    /// Current committed catalog.
    pub fn snapshot(&self) -> Arc<Catalog> {
        self.catalog.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn find_item(&self, id: ItemId) -> Option<Item> {
        self.snapshot().get(id).cloned()
    }

    pub fn find_by_name(&self, fragment: &str) -> Vec<Item> {
        self.snapshot().find_by_name(fragment)
    }

    pub fn find_by_category(&self, category: &str) -> Vec<Item> {
        self.snapshot().find_by_category(category)
    }

    pub fn list_items(&self) -> Vec<Item> {
        self.snapshot().to_vec()
    }

    pub fn low_stock_items(&self) -> Vec<Item> {
        self.snapshot().low_stock()
    }

    /// Durably recorded audit records.
    pub fn transactions(&self) -> Vec<AuditRecord> {
        self.recorder.records()
    }

    pub fn transactions_for(&self, item_id: ItemId) -> Vec<AuditRecord> {
        self.recorder.records_for(item_id)
    }

    pub fn recorder_stats(&self) -> RecorderStats {
        self.recorder.stats()
    }

    pub fn alerts(&self) -> &Arc<AlertPipeline> {
        &self.alerts
    }

    /// Wait for scheduled audit appends to finish.
    pub fn flush(&self, timeout: Duration) -> bool {
        self.recorder.wait_idle(timeout)
    }

    /// Flush and stop the audit workers. Mutations after this still apply,
    /// but their audit records are dropped.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        self.recorder.shutdown(timeout)
    }
}
