//! Configuration management for the benchmark engine
//!
//! Configuration is read from a TOML file, then overridden by `MODELBENCH_*`
//! environment variables, then validated. Backend selection is purely a
//! configuration decision; nothing else in the engine looks at the
//! environment.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

const ENV_BACKEND: &str = "MODELBENCH_BACKEND";
const ENV_PATH: &str = "MODELBENCH_PATH";
const ENV_DATABASE: &str = "MODELBENCH_DATABASE";
const ENV_REPETITIONS: &str = "MODELBENCH_REPETITIONS";
const ENV_LOG_LEVEL: &str = "MODELBENCH_LOG_LEVEL";

/// LMDB map sizes must be a whole number of pages
const LMDB_PAGE_SIZE: usize = 4096;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Storage backend configuration
    pub storage: StorageConfig,

    /// Runner defaults
    pub runner: RunnerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Which storage variant backs the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// SQLite database file
    RowStore,
    /// Parquet segment directory
    Columnar,
    /// LMDB environment
    TimeSeries,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [BackendKind::RowStore, BackendKind::Columnar, BackendKind::TimeSeries];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::RowStore => "row_store",
            BackendKind::Columnar => "columnar",
            BackendKind::TimeSeries => "time_series",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "row_store" | "row" | "sqlite" => Ok(BackendKind::RowStore),
            "columnar" | "parquet" => Ok(BackendKind::Columnar),
            "time_series" | "timeseries" | "lmdb" => Ok(BackendKind::TimeSeries),
            _ => Err(ConfigError::InvalidValue {
                field: "storage.backend".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Storage related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend variant
    pub backend: BackendKind,

    /// Directory holding the backend files
    pub path: PathBuf,

    /// Database name; each variant derives its file or directory name from it
    pub database: String,

    /// Maximum size of the LMDB memory map in bytes
    pub lmdb_map_size: usize,

    /// Compression codec for Parquet segments (uncompressed, snappy, zstd)
    pub parquet_compression: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::RowStore,
            path: dirs::data_dir()
                .map(|dir| dir.join("modelbench"))
                .unwrap_or_else(|| PathBuf::from("./modelbench-data")),
            database: "modelbench".to_string(),
            lmdb_map_size: 256 * 1024 * 1024,
            parquet_compression: "snappy".to_string(),
        }
    }
}

/// Runner defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Repetitions per model in `compare_models`
    pub repetitions: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self { repetitions: 1 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,

    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl BenchConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.to_string_lossy().to_string(),
        })?;

        let config: BenchConfig = toml::from_str(&content).map_err(|e| ConfigError::ParseError { reason: e.to_string() })?;

        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = BenchConfig::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with precedence env > file > defaults
    pub fn load_with_fallback<P: AsRef<Path>>(config_path: Option<P>) -> ConfigResult<Self> {
        let mut config = BenchConfig::default();

        if let Some(path) = config_path {
            if path.as_ref().exists() {
                config = BenchConfig::from_file(path)?;
            } else {
                tracing::debug!("Config file {} not found, using defaults", path.as_ref().display());
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `MODELBENCH_*` keys returned by `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup(ENV_BACKEND) {
            self.storage.backend = backend.parse()?;
        }

        if let Some(path) = lookup(ENV_PATH) {
            self.storage.path = PathBuf::from(path);
        }

        if let Some(database) = lookup(ENV_DATABASE) {
            self.storage.database = database;
        }

        if let Some(repetitions) = lookup(ENV_REPETITIONS) {
            self.runner.repetitions = repetitions.parse().map_err(|_| ConfigError::InvalidValue {
                field: ENV_REPETITIONS.to_string(),
                value: repetitions,
            })?;
        }

        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.storage.database.is_empty()
            || self
                .storage
                .database
                .chars()
                .any(|c| std::path::is_separator(c) || c == '\0')
        {
            return Err(ConfigError::InvalidValue {
                field: "storage.database".to_string(),
                value: self.storage.database.clone(),
            });
        }

        if self.storage.path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "storage.path must not be empty".to_string(),
            });
        }

        if self.storage.lmdb_map_size < 1024 * 1024 || self.storage.lmdb_map_size % LMDB_PAGE_SIZE != 0 {
            return Err(ConfigError::InvalidValue {
                field: "storage.lmdb_map_size".to_string(),
                value: self.storage.lmdb_map_size.to_string(),
            });
        }

        if !matches!(self.storage.parquet_compression.as_str(), "uncompressed" | "snappy" | "zstd") {
            return Err(ConfigError::InvalidValue {
                field: "storage.parquet_compression".to_string(),
                value: self.storage.parquet_compression.clone(),
            });
        }

        if self.runner.repetitions == 0 {
            return Err(ConfigError::InvalidValue {
                field: "runner.repetitions".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("modelbench").join("config.toml"))
            .ok_or_else(|| ConfigError::ValidationFailed {
                reason: "Unable to determine config directory".to_string(),
            })
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|_| ConfigError::ValidationFailed {
                reason: format!("Unable to create config directory: {}", parent.display()),
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationFailed { reason: e.to_string() })?;

        fs::write(path, content).map_err(|_| ConfigError::PermissionDenied {
            path: path.to_string_lossy().to_string(),
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = BenchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage.backend, BackendKind::RowStore);
        assert_eq!(config.runner.repetitions, 1);
    }

    #[test]
    fn test_config_validation() {
        let mut config = BenchConfig::default();

        config.runner.repetitions = 0;
        assert!(config.validate().is_err());

        config.runner.repetitions = 3;
        config.storage.database = "nested/name".to_string();
        assert!(config.validate().is_err());

        config.storage.database = "bench".to_string();
        config.storage.parquet_compression = "lz77".to_string();
        assert!(config.validate().is_err());

        config.storage.parquet_compression = "zstd".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_lmdb_map_size_must_be_page_aligned() {
        let mut config = BenchConfig::default();

        config.storage.lmdb_map_size = 16 * 1024 * 1024 + 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "storage.lmdb_map_size"
        ));

        config.storage.lmdb_map_size = 16 * 1024 * 1024 + 4096;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_operations() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = BenchConfig::default();
        config.storage.backend = BackendKind::TimeSeries;
        config.storage.path = temp_dir.path().to_path_buf();
        config.runner.repetitions = 5;

        config.save_to_file(&path).unwrap();
        let loaded = BenchConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[storage]\nbackend = \"columnar\"\ndatabase = \"runs\"\n").unwrap();

        let config = BenchConfig::from_file(&path).unwrap();
        assert_eq!(config.storage.backend, BackendKind::Columnar);
        assert_eq!(config.storage.database, "runs");
        assert_eq!(config.runner, RunnerConfig::default());
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = BenchConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("MODELBENCH_BACKEND", "lmdb"),
            ("MODELBENCH_DATABASE", "nightly"),
            ("MODELBENCH_REPETITIONS", "4"),
        ]
        .into_iter()
        .collect();

        let mut config = BenchConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.storage.backend, BackendKind::TimeSeries);
        assert_eq!(config.storage.database, "nightly");
        assert_eq!(config.runner.repetitions, 4);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_override() {
        let mut config = BenchConfig::default();
        let err = config
            .apply_overrides(|key| (key == "MODELBENCH_REPETITIONS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_backend_aliases() {
        assert_eq!("sqlite".parse::<BackendKind>().unwrap(), BackendKind::RowStore);
        assert_eq!("Parquet".parse::<BackendKind>().unwrap(), BackendKind::Columnar);
        assert_eq!("time-series".parse::<BackendKind>().unwrap(), BackendKind::TimeSeries);
        assert!("clickhouse".parse::<BackendKind>().is_err());

        for kind in BackendKind::ALL {
            assert_eq!(kind.as_str().parse::<BackendKind>().unwrap(), kind);
        }
    }
}
