//! JSON-file store.
//!
//! Each collection lives in its own file under a data directory. Saves write
//! a sibling temp file, fsync it, then rename it over the target, so a reader
//! sees either the previous or the new collection and never a partial one.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use stockpile_inventory::{AuditRecord, Item};

use super::{InventoryPersistence, PersistenceError};

pub const CATALOG_FILE: &str = "catalog.json";
pub const AUDIT_LOG_FILE: &str = "audit.json";

#[derive(Debug)]
pub struct JsonFilePersistence {
    dir: PathBuf,
    catalog_lock: RwLock<()>,
    audit_lock: RwLock<()>,
}

impl JsonFilePersistence {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| PersistenceError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        Ok(Self {
            dir,
            catalog_lock: RwLock::new(()),
            audit_lock: RwLock::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.dir.join(CATALOG_FILE)
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.dir.join(AUDIT_LOG_FILE)
    }
}

fn read_collection<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, PersistenceError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(PersistenceError::Io {
                path: path.display().to_string(),
                source,
            });
        }
    };

    serde_json::from_slice(&bytes).map_err(|e| PersistenceError::Corrupt {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn write_collection<T: Serialize>(
    path: &Path,
    what: &'static str,
    values: &[T],
) -> Result<(), PersistenceError> {
    let bytes = serde_json::to_vec_pretty(values).map_err(|e| PersistenceError::Serialize {
        what,
        reason: e.to_string(),
    })?;

    let io_err = |source: std::io::Error| PersistenceError::Io {
        path: path.display().to_string(),
        source,
    };

    let tmp = path.with_extension("json.tmp");
    {
        let mut file = File::create(&tmp).map_err(io_err)?;
        file.write_all(&bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
    }
    fs::rename(&tmp, path).map_err(io_err)?;

    debug!(path = %path.display(), what, count = values.len(), "collection saved");
    Ok(())
}

impl InventoryPersistence for JsonFilePersistence {
    fn load_catalog(&self) -> Result<Vec<Item>, PersistenceError> {
        let _guard = self.catalog_lock.read().unwrap_or_else(PoisonError::into_inner);
        read_collection(&self.catalog_path())
    }

    fn save_catalog(&self, items: &[Item]) -> Result<(), PersistenceError> {
        let _guard = self.catalog_lock.write().unwrap_or_else(PoisonError::into_inner);
        write_collection(&self.catalog_path(), "catalog", items)
    }

    fn load_audit_log(&self) -> Result<Vec<AuditRecord>, PersistenceError> {
        let _guard = self.audit_lock.read().unwrap_or_else(PoisonError::into_inner);
        read_collection(&self.audit_log_path())
    }

    fn save_audit_log(&self, records: &[AuditRecord]) -> Result<(), PersistenceError> {
        let _guard = self.audit_lock.write().unwrap_or_else(PoisonError::into_inner);
        write_collection(&self.audit_log_path(), "audit log", records)
    }
}
