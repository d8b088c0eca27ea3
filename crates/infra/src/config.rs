//! Configuration loading and representation.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::alerts::{AlertConfig, OverflowPolicy};

pub const ENV_DATA_DIR: &str = "STOCKPILE_DATA_DIR";
pub const ENV_AUDIT_WORKERS: &str = "STOCKPILE_AUDIT_WORKERS";
pub const ENV_BATCH_WORKERS: &str = "STOCKPILE_BATCH_WORKERS";
pub const ENV_BATCH_TIMEOUT_SECS: &str = "STOCKPILE_BATCH_TIMEOUT_SECS";
pub const ENV_ALERT_CAPACITY: &str = "STOCKPILE_ALERT_CAPACITY";
pub const ENV_ALERT_OVERFLOW: &str = "STOCKPILE_ALERT_OVERFLOW";
pub const ENV_ALERT_INTERVAL_MS: &str = "STOCKPILE_ALERT_INTERVAL_MS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}: invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Process-wide inventory configuration.
#[derive(Debug, Clone)]
pub struct InventoryConfig {
    /// Directory holding the persisted catalog and audit log.
    pub data_dir: PathBuf,
    /// Workers appending audit records.
    pub audit_workers: usize,
    /// Workers applying batch rows.
    pub batch_workers: usize,
    /// Upper bound on a whole batch run.
    pub batch_timeout: Duration,
    pub alerts: AlertConfig,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            audit_workers: 3,
            batch_workers: 4,
            batch_timeout: Duration::from_secs(5 * 60),
            alerts: AlertConfig::default(),
        }
    }
}

impl InventoryConfig {
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_audit_workers(mut self, workers: usize) -> Self {
        self.audit_workers = workers;
        self
    }

    pub fn with_batch_workers(mut self, workers: usize) -> Self {
        self.batch_workers = workers;
        self
    }

    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = timeout;
        self
    }

    pub fn with_alerts(mut self, alerts: AlertConfig) -> Self {
        self.alerts = alerts;
        self
    }

    /// Defaults overridden by `STOCKPILE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(dir) = lookup(ENV_DATA_DIR) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(v) = lookup(ENV_AUDIT_WORKERS) {
            config.audit_workers = positive(ENV_AUDIT_WORKERS, &v)?;
        }
        if let Some(v) = lookup(ENV_BATCH_WORKERS) {
            config.batch_workers = positive(ENV_BATCH_WORKERS, &v)?;
        }
        if let Some(v) = lookup(ENV_BATCH_TIMEOUT_SECS) {
            config.batch_timeout = Duration::from_secs(positive(ENV_BATCH_TIMEOUT_SECS, &v)? as u64);
        }
        if let Some(v) = lookup(ENV_ALERT_CAPACITY) {
            config.alerts.capacity = positive(ENV_ALERT_CAPACITY, &v)?;
        }
        if let Some(v) = lookup(ENV_ALERT_OVERFLOW) {
            config.alerts.overflow = v.parse::<OverflowPolicy>().map_err(|reason| ConfigError::Invalid {
                key: ENV_ALERT_OVERFLOW,
                value: v.clone(),
                reason,
            })?;
        }
        if let Some(v) = lookup(ENV_ALERT_INTERVAL_MS) {
            let ms = v.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                key: ENV_ALERT_INTERVAL_MS,
                value: v.clone(),
                reason: e.to_string(),
            })?;
            config.alerts.interval = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

fn positive(key: &'static str, value: &str) -> Result<usize, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason,
    };
    let n = value.trim().parse::<usize>().map_err(|e| invalid(e.to_string()))?;
    if n == 0 {
        return Err(invalid("must be greater than zero".to_string()));
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_overrides() {
        let config = InventoryConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.audit_workers, 3);
        assert_eq!(config.batch_workers, 4);
        assert_eq!(config.batch_timeout, Duration::from_secs(300));
        assert_eq!(config.alerts.capacity, 1024);
        assert_eq!(config.alerts.overflow, OverflowPolicy::DropOldest);
        assert_eq!(config.alerts.interval, Duration::from_millis(500));
    }

    #[test]
    fn overrides_apply() {
        let config = InventoryConfig::from_lookup(lookup(&[
            (ENV_DATA_DIR, "/var/lib/stockpile"),
            (ENV_BATCH_WORKERS, "8"),
            (ENV_BATCH_TIMEOUT_SECS, "30"),
            (ENV_ALERT_OVERFLOW, "block"),
            (ENV_ALERT_INTERVAL_MS, "0"),
        ]))
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/stockpile"));
        assert_eq!(config.batch_workers, 8);
        assert_eq!(config.batch_timeout, Duration::from_secs(30));
        assert_eq!(config.alerts.overflow, OverflowPolicy::Block);
        assert_eq!(config.alerts.interval, Duration::ZERO);
    }

    #[test]
    fn zero_workers_rejected() {
        let err = InventoryConfig::from_lookup(lookup(&[(ENV_AUDIT_WORKERS, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: ENV_AUDIT_WORKERS, .. }));
    }

    #[test]
    fn garbage_rejected() {
        assert!(InventoryConfig::from_lookup(lookup(&[(ENV_ALERT_CAPACITY, "lots")])).is_err());
        assert!(InventoryConfig::from_lookup(lookup(&[(ENV_ALERT_OVERFLOW, "lifo")])).is_err());
    }
}
