//! Batch ingestion: fan bulk operation rows out over a worker pool.
//!
//! Each row is applied independently through the [`InventoryEngine`]; a bad
//! row becomes an entry in the [`BatchResult`] failure list and never aborts
//! its siblings. The batch as a whole fails only when its input cannot be
//! read, its workers cannot be spawned, or it runs past its timeout.

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use stockpile_core::{InventoryError, InventoryResult, ItemId};
use stockpile_inventory::{NewItem, TransactionKind};

use crate::config::InventoryConfig;
use crate::engine::InventoryEngine;
use crate::persistence::InventoryPersistence;
use crate::pool::WorkerPool;

const ITEM_FIELDS: usize = 5;
const STOCK_FIELDS: usize = 3;

/// One input row: the tokenized fields plus the original text for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRow {
    raw: String,
    fields: Vec<String>,
}

impl BatchRow {
    /// Tokenize a comma-delimited line. Fields are trimmed.
    pub fn from_line(line: &str) -> Self {
        Self {
            raw: line.to_string(),
            fields: line.split(',').map(|f| f.trim().to_string()).collect(),
        }
    }

    /// Wrap already-tokenized fields; the raw text is the fields joined by `,`.
    pub fn from_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        Self {
            raw: fields.join(","),
            fields,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    fn expect_fields(&self, count: usize) -> InventoryResult<&[String]> {
        if self.fields.len() != count {
            return Err(InventoryError::validation(format!(
                "expected {count} fields, found {}",
                self.fields.len()
            )));
        }
        Ok(&self.fields)
    }

    fn contains_all(&self, needles: &[&str]) -> bool {
        let lowered = self.raw.to_lowercase();
        needles.iter().all(|n| lowered.contains(n))
    }
}

/// A row that ended in error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub row: String,
    pub error: String,
}

impl std::fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - Error: {}", self.row, self.error)
    }
}

/// Aggregate outcome of a batch run.
///
/// Failures are listed in completion order, not input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub success_count: usize,
    pub failure_count: usize,
    pub failures: Vec<BatchFailure>,
}

impl BatchResult {
    /// Human-readable failure descriptions (`"<row> - Error: <message>"`).
    pub fn descriptions(&self) -> Vec<String> {
        self.failures.iter().map(ToString::to_string).collect()
    }

    pub fn total(&self) -> usize {
        self.success_count + self.failure_count
    }
}

impl std::fmt::Display for BatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Batch complete: {} succeeded, {} failed",
            self.success_count, self.failure_count
        )?;
        for failure in &self.failures {
            write!(f, "\n  {failure}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error(
        "batch did not finish within {timeout:?} ({} succeeded, {} failed before the deadline)",
        .partial.success_count,
        .partial.failure_count
    )]
    Timeout { timeout: Duration, partial: BatchResult },

    #[error("cannot read batch input: {0}")]
    Io(String),

    #[error("cannot start batch workers: {0}")]
    Pool(String),
}

/// Read a comma-delimited file into rows, skipping blank lines.
pub fn read_rows(path: impl AsRef<Path>) -> Result<Vec<BatchRow>, BatchError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| BatchError::Io(format!("{}: {e}", path.display())))?;

    Ok(text
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(BatchRow::from_line)
        .collect())
}

#[derive(Debug, Default)]
struct Tally {
    succeeded: AtomicUsize,
    failures: Mutex<Vec<BatchFailure>>,
}

impl Tally {
    fn success(&self) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
    }

    fn failure(&self, row: &BatchRow, error: String) {
        let current = thread::current();
        debug!(
            worker = current.name().unwrap_or("unnamed"),
            row = row.raw(),
            error = %error,
            "batch row failed"
        );
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(BatchFailure {
                row: row.raw().to_string(),
                error,
            });
    }

    fn snapshot(&self) -> BatchResult {
        // Hold the list lock while reading the counter so a row is never
        // counted without its description (or vice versa).
        let failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        BatchResult {
            success_count: self.succeeded.load(Ordering::SeqCst),
            failure_count: failures.len(),
            failures: failures.clone(),
        }
    }
}

/// Drives bulk operations through the engine on a fixed-size worker pool.
#[derive(Debug)]
pub struct BatchCoordinator<P>
where
    P: InventoryPersistence + 'static,
{
    engine: Arc<InventoryEngine<P>>,
    workers: usize,
    timeout: Duration,
}

impl<P> BatchCoordinator<P>
where
    P: InventoryPersistence + 'static,
{
    pub fn new(engine: Arc<InventoryEngine<P>>, workers: usize, timeout: Duration) -> Self {
        Self {
            engine,
            workers: workers.max(1),
            timeout,
        }
    }

    pub fn from_config(engine: Arc<InventoryEngine<P>>, config: &InventoryConfig) -> Self {
        Self::new(engine, config.batch_workers, config.batch_timeout)
    }

    /// Add one item per row: `name, category, price, quantity, minStockLevel`.
    ///
    /// A first row that looks like a column header is skipped.
    pub fn add_items(&self, rows: Vec<BatchRow>) -> Result<BatchResult, BatchError> {
        let rows = skip_header(rows, |row| row.contains_all(&["name", "category"]));
        self.run("add_items", rows, |engine, row| {
            let fields = row.expect_fields(ITEM_FIELDS)?;
            let item = NewItem::new(
                fields[0].as_str(),
                fields[1].as_str(),
                parse_field::<f64>("price", &fields[2])?,
                parse_field::<i64>("quantity", &fields[3])?,
                parse_field::<i64>("minimum stock level", &fields[4])?,
            );
            engine.add_item(item).map(|_| ())
        })
    }

    /// Apply one stock movement per row: `itemId, quantityDelta, kind`,
    /// attributed to `user_id`.
    pub fn update_stock(&self, rows: Vec<BatchRow>, user_id: &str) -> Result<BatchResult, BatchError> {
        let rows = skip_header(rows, |row| {
            (row.contains_all(&["productid"]) || row.contains_all(&["itemid"])) && row.contains_all(&["quantity"])
        });
        let user_id = user_id.to_string();
        self.run("update_stock", rows, move |engine, row| {
            let fields = row.expect_fields(STOCK_FIELDS)?;
            let id = ItemId::from_str(&fields[0])?;
            let delta = parse_field::<i64>("quantity", &fields[1])?;
            let kind = TransactionKind::from_str(&fields[2])?;
            engine.change_stock(id, delta, kind, &user_id).map(|_| ())
        })
    }

    fn run<F>(&self, op: &'static str, rows: Vec<BatchRow>, apply: F) -> Result<BatchResult, BatchError>
    where
        F: Fn(&InventoryEngine<P>, &BatchRow) -> InventoryResult<()> + Send + Sync + 'static,
    {
        let started = Instant::now();
        info!(op, rows = rows.len(), workers = self.workers, "batch started");

        let pool = WorkerPool::new(format!("batch-{op}"), self.workers).map_err(|e| BatchError::Pool(e.to_string()))?;
        let tally = Arc::new(Tally::default());
        let apply = Arc::new(apply);

        for row in rows {
            let engine = self.engine.clone();
            let tally = tally.clone();
            let apply = apply.clone();

            pool.submit(move || {
                match panic::catch_unwind(AssertUnwindSafe(|| apply(&engine, &row))) {
                    Ok(Ok(())) => tally.success(),
                    Ok(Err(e)) => tally.failure(&row, e.to_string()),
                    Err(_) => tally.failure(&row, "worker panicked while applying row".to_string()),
                }
            })
            .map_err(|e| BatchError::Pool(e.to_string()))?;
        }

        if pool.wait_idle(self.timeout) {
            pool.shutdown();
            let result = tally.snapshot();
            info!(
                op,
                succeeded = result.success_count,
                failed = result.failure_count,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "batch finished"
            );
            Ok(result)
        } else {
            let partial = tally.snapshot();
            warn!(
                op,
                timeout_ms = self.timeout.as_millis() as u64,
                outstanding = pool.outstanding(),
                succeeded = partial.success_count,
                failed = partial.failure_count,
                "batch timed out; abandoning outstanding rows"
            );
            pool.abandon();
            Err(BatchError::Timeout {
                timeout: self.timeout,
                partial,
            })
        }
    }
}

fn skip_header(mut rows: Vec<BatchRow>, is_header: impl Fn(&BatchRow) -> bool) -> Vec<BatchRow> {
    if rows.first().is_some_and(&is_header) {
        debug!(header = rows[0].raw(), "skipping header row");
        rows.remove(0);
    }
    rows
}

fn parse_field<T: FromStr>(what: &str, value: &str) -> InventoryResult<T> {
    value
        .parse()
        .map_err(|_| InventoryError::validation(format!("invalid {what} '{value}'")))
}
