//! `stockpile`: batch-ingestion front end for the inventory engine.
//!
//! ```text
//! stockpile import-items <file.csv>
//! stockpile update-stock <file.csv> [user]
//! stockpile list
//! stockpile low-stock
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};

use stockpile_infra::batch::{self, BatchCoordinator, BatchError};
use stockpile_infra::{AlertPipeline, InventoryConfig, InventoryEngine, JsonFilePersistence, TracingNotifier};
use stockpile_inventory::Item;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Stockpile - batch ingestion for the inventory engine
#[derive(Parser, Debug)]
#[command(name = "stockpile")]
#[command(about = "Import items and stock movements into the inventory", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add one item per row: name, category, price, quantity, minStockLevel
    ImportItems {
        file: PathBuf,
    },
    /// Apply one stock movement per row: itemId, quantityDelta, kind
    UpdateStock {
        file: PathBuf,
        /// User the movements are attributed to
        #[arg(default_value = "batch")]
        user: String,
    },
    /// List every item
    List,
    /// List items at or below their minimum stock level
    LowStock,
}

fn print_items(items: &[Item]) {
    if items.is_empty() {
        println!("No items.");
        return;
    }
    for item in items {
        println!(
            "{}  {:<24} {:<16} {:>10.2} qty={:<8} min={}",
            item.id(),
            item.name(),
            item.category(),
            item.price(),
            item.quantity(),
            item.min_stock_level()
        );
    }
}

fn main() -> anyhow::Result<()> {
    stockpile_observability::init();

    let cli = Cli::parse();
    let config = InventoryConfig::from_env()?;

    let store = Arc::new(
        JsonFilePersistence::open(&config.data_dir)
            .with_context(|| format!("opening data directory {}", config.data_dir.display()))?,
    );
    let alerts = Arc::new(AlertPipeline::new(config.alerts.clone(), Arc::new(TracingNotifier)));
    alerts.start().context("starting low-stock alert worker")?;

    let engine = Arc::new(InventoryEngine::open(store, alerts.clone(), config.audit_workers)?);
    let coordinator = BatchCoordinator::from_config(engine.clone(), &config);

    let outcome = match cli.command {
        Command::ImportItems { file } => batch::read_rows(&file).and_then(|rows| coordinator.add_items(rows)),
        Command::UpdateStock { file, user } => {
            batch::read_rows(&file).and_then(|rows| coordinator.update_stock(rows, &user))
        }
        Command::List => {
            print_items(&engine.list_items());
            Ok(Default::default())
        }
        Command::LowStock => {
            print_items(&engine.low_stock_items());
            Ok(Default::default())
        }
    };

    let report = match outcome {
        Ok(result) if result.total() > 0 => {
            println!("{result}");
            Ok(())
        }
        Ok(_) => Ok(()),
        Err(BatchError::Timeout { timeout, partial }) => {
            println!("{partial}");
            Err(anyhow::anyhow!("batch timed out after {timeout:?}"))
        }
        Err(e) => Err(e.into()),
    };

    if !engine.shutdown(SHUTDOWN_TIMEOUT) {
        tracing::warn!("audit recorder did not drain before shutdown");
    }
    alerts.stop();
    report
}
