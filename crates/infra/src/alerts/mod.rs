//! Low-stock alert pipeline.
//!
//! Mutations push item snapshots onto a bounded queue; one dedicated worker
//! thread drains it, hands each alert to an `AlertNotifier` and then waits a
//! fixed interval before taking the next one (throttling, not batching).

pub mod notifier;
pub mod pipeline;
pub mod queue;

pub use notifier::{AlertNotifier, InMemoryNotifier, LowStockAlert, NotifyError, TracingNotifier};
pub use pipeline::{AlertConfig, AlertPipeline, AlertStats};
pub use queue::{AlertQueue, OverflowPolicy, PushOutcome};
