//! Configuration loading from refpredict.toml.
//!
//! One TOML file controls the whole batch run: store connection, cache
//! location, file-type filter, sampling and balancing knobs, scaling and
//! feature reduction. Every field has a sane default, so a missing file or
//! a partial file works.
//!
//! ## Example
//!
//! ```toml
//! cache-dir = "/data/refpredict"
//! file-type = "only-production"
//! balance-strategy = "random"
//! datasets = ["github"]
//!
//! [db]
//! host = "127.0.0.1"
//! database = "refactorings"
//! read-timeout-secs = 600
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::dataset::balancing::BalanceStrategy;
use crate::db::schema::PROCESS_METRICS_FIELDS;
use crate::types::FileType;

/// Connection parameters for the metric store.
///
/// SSH-tunnel indirection, when needed, is set up outside the process
/// (point `host`/`port` at the local end of the tunnel).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Abort queries that stall longer than this. `None` blocks forever,
    /// which is tolerable for an offline batch tool but rarely wanted.
    pub read_timeout_secs: Option<u64>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3306,
            user: "root".into(),
            password: String::new(),
            database: "refactorings".into(),
            read_timeout_secs: None,
        }
    }
}

/// Batch-run configuration, consumed read-only after loading.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub db: DbConfig,
    /// Is the store reachable at all? With a warm cache a run can work
    /// entirely offline.
    pub db_available: bool,
    pub use_cache: bool,
    pub cache_dir: PathBuf,
    /// Log every generated query at debug level.
    pub show_sql: bool,

    /// Production files, test files, or both.
    pub file_type: FileType,
    pub datasets: Vec<String>,
    pub validation_datasets: Vec<String>,

    pub balance: bool,
    pub balance_strategy: BalanceStrategy,
    pub scale: bool,

    /// Reduce training rows toward this positive-class ratio before
    /// merging. Disabled when `sample-reduction` is off.
    pub sample_reduction: bool,
    pub training_positive_ratio: f64,
    pub min_training_positive: usize,
    pub min_training_negative: usize,
    /// Flat row fraction for validation/evaluation sets.
    pub evaluation_fraction: f64,
    pub min_evaluation: usize,

    pub drop_process_metrics: bool,
    /// Drop rows with a `-1` process metric. Only meaningful when process
    /// metrics are retained.
    pub drop_faulty_process_metrics: bool,
    /// Additional columns to drop from the merged dataset.
    pub drop_metrics: Vec<String>,

    pub feature_reduction: bool,
    pub feature_reduction_folds: usize,

    /// Seed for every sampling decision; fixed for reproducible runs.
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db: DbConfig::default(),
            db_available: true,
            use_cache: true,
            cache_dir: PathBuf::from("."),
            show_sql: false,
            file_type: FileType::TestAndProduction,
            datasets: vec!["github".into()],
            validation_datasets: Vec::new(),
            balance: true,
            balance_strategy: BalanceStrategy::Random,
            scale: true,
            sample_reduction: true,
            training_positive_ratio: 0.5,
            min_training_positive: 100,
            min_training_negative: 100,
            evaluation_fraction: 1.0,
            min_evaluation: 100,
            drop_process_metrics: true,
            drop_faulty_process_metrics: false,
            drop_metrics: Vec::new(),
            feature_reduction: false,
            feature_reduction_folds: 2,
            seed: 42,
        }
    }
}

impl Config {
    /// Load from the given file, or fall back to defaults when it does not
    /// exist. A file that exists but fails to parse is an error, not a
    /// silent default.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    /// Columns removed from the merged dataset: the configured extras plus
    /// the process/authorship metrics when those are dropped wholesale.
    pub fn effective_drop_metrics(&self) -> Vec<String> {
        let mut drop = self.drop_metrics.clone();
        if self.drop_process_metrics {
            drop.extend(PROCESS_METRICS_FIELDS.iter().map(|m| m.to_string()));
        }
        drop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.use_cache);
        assert!(config.balance);
        assert_eq!(config.balance_strategy, BalanceStrategy::Random);
        assert_eq!(config.file_type, FileType::TestAndProduction);
        assert_eq!(config.db.port, 3306);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            balance-strategy = "near-miss"
            file-type = "only-production"

            [db]
            database = "refactorings_test"
            "#,
        )
        .unwrap();
        assert_eq!(config.balance_strategy, BalanceStrategy::NearMiss);
        assert_eq!(config.file_type, FileType::OnlyProduction);
        assert_eq!(config.db.database, "refactorings_test");
        // Untouched fields fall back to defaults.
        assert_eq!(config.db.port, 3306);
        assert!(config.scale);
    }

    #[test]
    fn test_unknown_balance_strategy_is_fatal() {
        let result: Result<Config, _> = toml::from_str(r#"balance-strategy = "smote""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_effective_drop_metrics_includes_process_metrics() {
        let mut config = Config::default();
        config.drop_metrics = vec!["startLine".into()];
        config.drop_process_metrics = true;
        let drop = config.effective_drop_metrics();
        assert!(drop.contains(&"startLine".to_string()));
        assert!(drop.contains(&"authorOwnership".to_string()));

        config.drop_process_metrics = false;
        assert_eq!(config.effective_drop_metrics(), vec!["startLine".to_string()]);
    }
}
