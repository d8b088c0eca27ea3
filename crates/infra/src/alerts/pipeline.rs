use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use stockpile_inventory::Item;

use super::notifier::{AlertNotifier, LowStockAlert};
use super::queue::{AlertQueue, OverflowPolicy, PushOutcome};

/// Alert pipeline configuration.
#[derive(Debug, Clone)]
pub struct AlertConfig {
    /// Maximum number of queued, undelivered alerts.
    pub capacity: usize,
    pub overflow: OverflowPolicy,
    /// Pause between two consecutive notifications.
    pub interval: Duration,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            overflow: OverflowPolicy::DropOldest,
            interval: Duration::from_millis(500),
        }
    }
}

impl AlertConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Alert pipeline runtime statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertStats {
    /// Alerts accepted into the queue.
    pub enqueued: u64,
    /// Queued alerts evicted by the drop-oldest policy.
    pub dropped: u64,
    /// Alerts discarded because the pipeline was stopped.
    pub rejected: u64,
    pub delivered: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    rejected: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

/// Single-consumer background notifier for low-stock alerts.
///
/// `on_low_stock` never waits on delivery; under `OverflowPolicy::Block` it
/// waits only while the queue is full.
pub struct AlertPipeline {
    queue: Arc<AlertQueue<LowStockAlert>>,
    notifier: Arc<dyn AlertNotifier>,
    interval: Duration,
    counters: Arc<Counters>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl core::fmt::Debug for AlertPipeline {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AlertPipeline")
            .field("pending", &self.queue.len())
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}

impl AlertPipeline {
    /// Create a stopped pipeline.
    ///
    /// Under `DropOldest`, alerts raised before `start` are queued. Under
    /// `Block` the queue stays closed until `start`, so early alerts are
    /// rejected instead of parking producers with no consumer to free a slot.
    pub fn new(config: AlertConfig, notifier: Arc<dyn AlertNotifier>) -> Self {
        let queue = AlertQueue::new(config.capacity, config.overflow);
        if config.overflow == OverflowPolicy::Block {
            queue.close();
        }

        Self {
            queue: Arc::new(queue),
            notifier,
            interval: config.interval,
            counters: Arc::new(Counters::default()),
            worker: Mutex::new(None),
        }
    }

    /// Spawn the worker thread. A no-op while a worker is already running.
    pub fn start(&self) -> std::io::Result<()> {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.as_ref().is_some_and(|h| !h.is_finished()) {
            return Ok(());
        }

        self.queue.reopen();
        let queue = self.queue.clone();
        let notifier = self.notifier.clone();
        let counters = self.counters.clone();
        let interval = self.interval;

        let handle = thread::Builder::new()
            .name("low-stock-alerts".to_string())
            .spawn(move || alert_loop(&queue, notifier.as_ref(), &counters, interval))?;
        *worker = Some(handle);
        Ok(())
    }

    /// Signal the worker to stop and wait for it.
    ///
    /// An alert already being delivered completes; queued alerts are left
    /// undelivered. Alerts raised while stopped are rejected.
    pub fn stop(&self) {
        self.queue.close();
        let handle = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("low-stock alert worker panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Ingress used by the mutation engine after a mutation leaves `item` at
    /// or below its threshold.
    pub fn on_low_stock(&self, item: &Item) {
        match self.queue.push(LowStockAlert::new(item.clone())) {
            PushOutcome::Queued => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
            }
            PushOutcome::DroppedOldest => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(item_id = %item.id(), "alert queue full; oldest alert dropped");
            }
            PushOutcome::Closed => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                debug!(item_id = %item.id(), "alert pipeline stopped; alert rejected");
            }
        }
    }

    /// Alerts waiting for delivery.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> AlertStats {
        AlertStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

impl Drop for AlertPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

fn alert_loop(
    queue: &AlertQueue<LowStockAlert>,
    notifier: &dyn AlertNotifier,
    counters: &Counters,
    interval: Duration,
) {
    info!("low-stock alert worker started");

    while let Some(alert) = queue.pop() {
        match notifier.notify(&alert) {
            Ok(()) => {
                counters.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(item_id = %alert.item.id(), error = %e, "low-stock notification failed");
            }
        }

        if !queue.pause(interval) {
            break;
        }
    }

    info!("low-stock alert worker stopped");
}
