//! Infrastructure layer: persistence, the mutation engine and its background
//! side-effect pipelines, batch ingestion, configuration.

pub mod alerts;
pub mod batch;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod persistence;
pub mod pool;
pub mod recorder;

#[cfg(test)]
mod integration_tests;

pub use alerts::{AlertConfig, AlertPipeline, InMemoryNotifier, OverflowPolicy, TracingNotifier};
pub use batch::{BatchCoordinator, BatchError, BatchResult, BatchRow};
pub use catalog::Catalog;
pub use config::{ConfigError, InventoryConfig};
pub use engine::InventoryEngine;
pub use persistence::{InMemoryPersistence, InventoryPersistence, JsonFilePersistence, PersistenceError};
