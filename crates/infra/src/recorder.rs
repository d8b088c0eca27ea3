//! Asynchronous audit-trail writer.
//!
//! The engine hands every successful quantity-affecting mutation to the
//! recorder and returns immediately. A small worker pool performs the durable
//! append (load, push, save) under the audit-log write lock, so concurrent
//! appends never lose each other's records. Failures are logged and counted,
//! never reported back to the mutation that produced the record.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tracing::{debug, error};

use stockpile_core::{InventoryError, InventoryResult, ItemId};
use stockpile_inventory::AuditRecord;

use crate::persistence::InventoryPersistence;
use crate::pool::WorkerPool;

/// Recorder runtime statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecorderStats {
    pub appended: u64,
    pub failed: u64,
    pub dropped: u64,
}

#[derive(Debug)]
struct RecorderShared<P> {
    persistence: Arc<P>,
    /// Mirror of the durable log; the write lock also serializes appends.
    log: RwLock<Vec<AuditRecord>>,
    appended: AtomicU64,
    failed: AtomicU64,
}

impl<P: InventoryPersistence> RecorderShared<P> {
    fn append(&self, record: AuditRecord) {
        let mut log = self.log.write().unwrap_or_else(PoisonError::into_inner);

        let mut stored = match self.persistence.load_audit_log() {
            Ok(stored) => stored,
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                error!(record_id = %record.id, item_id = %record.item_id, error = %e, "failed to load audit log");
                return;
            }
        };
        stored.push(record);

        match self.persistence.save_audit_log(&stored) {
            Ok(()) => {
                if let Some(last) = stored.last() {
                    debug!(record_id = %last.id, item_id = %last.item_id, kind = %last.kind, delta = last.delta, "audit record appended");
                }
                *log = stored;
                self.appended.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "failed to save audit log");
            }
        }
    }
}

/// Fire-and-forget audit recorder backed by a fixed worker pool.
#[derive(Debug)]
pub struct TransactionRecorder<P> {
    shared: Arc<RecorderShared<P>>,
    pool: RwLock<Option<WorkerPool>>,
    dropped: AtomicU64,
}

impl<P> TransactionRecorder<P>
where
    P: InventoryPersistence + 'static,
{
    /// Load the existing log and spawn `workers` append workers.
    pub fn new(persistence: Arc<P>, workers: usize) -> InventoryResult<Self> {
        let existing = persistence.load_audit_log()?;
        let pool = WorkerPool::new("audit-recorder", workers)
            .map_err(|e| InventoryError::persistence(e.to_string()))?;

        Ok(Self {
            shared: Arc::new(RecorderShared {
                persistence,
                log: RwLock::new(existing),
                appended: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
            pool: RwLock::new(Some(pool)),
            dropped: AtomicU64::new(0),
        })
    }

    /// Schedule `record` for durable append. Never blocks on IO.
    pub fn record(&self, record: AuditRecord) {
        let pool = self.pool.read().unwrap_or_else(PoisonError::into_inner);
        let Some(pool) = pool.as_ref() else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            error!(record_id = %record.id, item_id = %record.item_id, "recorder is shut down; audit record dropped");
            return;
        };

        let shared = self.shared.clone();
        if let Err(e) = pool.submit(move || shared.append(record)) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            error!(error = %e, "failed to schedule audit record");
        }
    }

    /// Every durably appended record, in append order.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.shared.log.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn records_for(&self, item_id: ItemId) -> Vec<AuditRecord> {
        self.shared
            .log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.item_id == item_id)
            .cloned()
            .collect()
    }

    /// Wait until every scheduled append has finished (or `timeout` elapses).
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        match self.pool.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            Some(pool) => pool.wait_idle(timeout),
            None => true,
        }
    }

    /// Drain outstanding appends (bounded by `timeout`) and stop the workers.
    /// Later `record` calls are dropped with an error log.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let Some(pool) = self.pool.write().unwrap_or_else(PoisonError::into_inner).take() else {
            return true;
        };

        if pool.wait_idle(timeout) {
            pool.shutdown();
            true
        } else {
            error!(outstanding = pool.outstanding(), "audit recorder shutdown timed out");
            pool.abandon();
            false
        }
    }

    pub fn stats(&self) -> RecorderStats {
        RecorderStats {
            appended: self.shared.appended.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryPersistence;
    use stockpile_inventory::TransactionKind;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn concurrent_appends_are_not_lost() {
        let store = Arc::new(InMemoryPersistence::new());
        let recorder = TransactionRecorder::new(store.clone(), 4).unwrap();

        let item_id = ItemId::new();
        for delta in 1..=40 {
            recorder.record(AuditRecord::new(item_id, TransactionKind::Purchase, delta, "tester"));
        }

        assert!(recorder.wait_idle(WAIT));
        assert_eq!(store.stored_audit_log().len(), 40);
        assert_eq!(recorder.records_for(item_id).len(), 40);
        assert_eq!(recorder.stats().appended, 40);
    }

    #[test]
    fn save_failure_is_counted_not_raised() {
        let store = Arc::new(InMemoryPersistence::new());
        store.fail_audit_saves(true);
        let recorder = TransactionRecorder::new(store.clone(), 1).unwrap();

        recorder.record(AuditRecord::new(ItemId::new(), TransactionKind::Sale, -1, "tester"));

        assert!(recorder.wait_idle(WAIT));
        assert!(recorder.records().is_empty());
        assert_eq!(recorder.stats().failed, 1);
    }

    #[test]
    fn records_after_shutdown_are_dropped() {
        let store = Arc::new(InMemoryPersistence::new());
        let recorder = TransactionRecorder::new(store.clone(), 1).unwrap();
        assert!(recorder.shutdown(WAIT));

        recorder.record(AuditRecord::new(ItemId::new(), TransactionKind::Sale, -1, "tester"));

        assert_eq!(recorder.stats().dropped, 1);
        assert!(store.stored_audit_log().is_empty());
    }
}
