//! Integration tests for the full mutation pipeline.
//!
//! Tests: Engine → JSON persistence → TransactionRecorder → AlertPipeline
//!
//! Verifies:
//! - Committed state survives a restart (catalog and audit log)
//! - Batch ingestion and interactive calls share one consistent catalog
//! - Low-stock alerts reach the notifier without blocking mutations

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use stockpile_core::{InventoryError, ItemId};
    use stockpile_inventory::{Item, ItemUpdate, NewItem, TransactionKind};

    use crate::alerts::{AlertConfig, AlertPipeline, InMemoryNotifier};
    use crate::batch::{BatchCoordinator, BatchRow};
    use crate::engine::InventoryEngine;
    use crate::persistence::{InventoryPersistence, JsonFilePersistence};

    const WAIT: Duration = Duration::from_secs(5);

    fn started_pipeline(notifier: Arc<InMemoryNotifier>) -> Arc<AlertPipeline> {
        let config = AlertConfig::default().with_interval(Duration::from_millis(5));
        let pipeline = Arc::new(AlertPipeline::new(config, notifier));
        pipeline.start().unwrap();
        pipeline
    }

    fn wait_for(mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        done()
    }

    #[test]
    fn state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = Arc::new(InMemoryNotifier::new());
        let alerts = started_pipeline(notifier.clone());

        let (widget_id, gadget_id) = {
            let store = Arc::new(JsonFilePersistence::open(dir.path()).unwrap());
            let engine = InventoryEngine::open(store, alerts.clone(), 2).unwrap();

            let widget = engine.add_item(NewItem::new("Widget", "Parts", 2.5, 40, 10)).unwrap();
            let gadget = engine.add_item(NewItem::new("Gadget", "Tools", 12.0, 5, 1)).unwrap();
            engine.change_stock(widget.id(), -15, TransactionKind::Sale, "clerk").unwrap();
            engine.update_item(gadget.id(), ItemUpdate::new("Gadget Pro", "Tools", 15.0, 2)).unwrap();
            assert!(engine.shutdown(WAIT));
            (widget.id(), gadget.id())
        };

        let store = Arc::new(JsonFilePersistence::open(dir.path()).unwrap());
        let engine = InventoryEngine::open(store.clone(), alerts.clone(), 2).unwrap();

        assert_eq!(engine.find_item(widget_id).unwrap().quantity(), 25);
        assert_eq!(engine.find_item(gadget_id).unwrap().name(), "Gadget Pro");
        assert_eq!(engine.transactions().len(), 3);
        assert_eq!(store.load_audit_log().unwrap(), engine.transactions());

        // The name index is rebuilt from disk.
        let err = engine.add_item(NewItem::new("gadget pro", "Tools", 1.0, 1, 0)).unwrap_err();
        assert!(matches!(err, InventoryError::DuplicateName(_)));

        alerts.stop();
    }

    #[test]
    fn low_stock_alert_is_delivered_when_threshold_is_reached() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = Arc::new(InMemoryNotifier::new());
        let alerts = started_pipeline(notifier.clone());
        let store = Arc::new(JsonFilePersistence::open(dir.path()).unwrap());
        let engine = InventoryEngine::open(store, alerts.clone(), 2).unwrap();

        let item = engine.add_item(NewItem::new("Fuse", "Electrical", 0.4, 12, 5)).unwrap();
        engine.change_stock(item.id(), -4, TransactionKind::Sale, "clerk").unwrap();
        engine.change_stock(item.id(), -3, TransactionKind::Sale, "clerk").unwrap();

        assert!(wait_for(|| alerts.stats().delivered == 1));
        let delivered = notifier.all();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].item.id(), item.id());
        assert_eq!(delivered[0].item.quantity(), 5);

        alerts.stop();
        assert!(engine.shutdown(WAIT));
    }

    #[test]
    fn open_rejects_stored_item_with_negative_quantity() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFilePersistence::open(dir.path()).unwrap());
        let item = Item::create(ItemId::new(), NewItem::new("Ghost", "Parts", 3.0, 5, 1)).unwrap();
        store.save_catalog(&[item]).unwrap();

        let mut stored: serde_json::Value =
            serde_json::from_slice(&std::fs::read(store.catalog_path()).unwrap()).unwrap();
        stored[0]["quantity"] = serde_json::json!(-5);
        stored[0]["price"] = serde_json::json!(-3.0);
        stored[0]["min_stock_level"] = serde_json::json!(-1);
        std::fs::write(store.catalog_path(), serde_json::to_vec(&stored).unwrap()).unwrap();

        let alerts = Arc::new(AlertPipeline::new(AlertConfig::default(), Arc::new(InMemoryNotifier::new())));
        let err = InventoryEngine::open(store, alerts, 1).unwrap_err();
        assert!(matches!(err, InventoryError::Persistence(_)));
    }

    #[test]
    fn batch_and_interactive_callers_share_one_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let alerts = started_pipeline(Arc::new(InMemoryNotifier::new()));
        let store = Arc::new(JsonFilePersistence::open(dir.path()).unwrap());
        let engine = Arc::new(InventoryEngine::open(store, alerts.clone(), 3).unwrap());
        let coordinator = BatchCoordinator::new(engine.clone(), 4, WAIT);

        let mut rows = vec![BatchRow::from_line("name,category,price,quantity,minStockLevel")];
        rows.extend((0..25).map(|i| BatchRow::from_fields([format!("Part {i}"), "Bulk".into(), "1.25".into(), "100".into(), "10".into()])));

        let interactive = {
            let engine = engine.clone();
            thread::spawn(move || engine.add_item(NewItem::new("Part 7", "Manual", 3.0, 1, 0)))
        };

        let result = coordinator.add_items(rows).unwrap();
        let manual = interactive.join().unwrap();

        // Exactly one "Part 7" wins, whichever caller got there first.
        assert_eq!(result.total(), 25);
        assert_eq!(result.success_count + usize::from(manual.is_ok()), 25);
        assert_eq!(engine.find_by_category("bulk").len(), result.success_count);
        assert_eq!(engine.find_by_name("part 7").len(), 1);

        let ids: Vec<_> = engine.find_by_category("Bulk").iter().map(|i| i.id().to_string()).collect();
        let stock_rows: Vec<BatchRow> = ids.iter().map(|id| BatchRow::from_fields([id.as_str(), "-95", "sale"])).collect();
        let result = coordinator.update_stock(stock_rows, "night-shift").unwrap();
        assert_eq!(result.failure_count, 0);

        assert_eq!(engine.low_stock_items().len(), ids.len());
        assert!(engine.flush(WAIT));
        let night_shift = engine.transactions().iter().filter(|r| r.user_id == "night-shift").count();
        assert_eq!(night_shift, ids.len());

        alerts.stop();
        assert!(engine.shutdown(WAIT));
    }
}
