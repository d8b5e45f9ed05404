//! Error handling for the benchmark engine
//!
//! Validation failures (metric name, input shape, empty input) are raised
//! before any measurement starts. Storage failures are reported as-is and are
//! never retried inside the engine. Model-function failures keep the original
//! error as their source.

use std::io;

use thiserror::Error;

/// The main error type for the benchmark engine
#[derive(Error, Debug)]
pub enum BenchError {
    /// Metric computation and input validation errors
    #[error("Metric error: {0}")]
    Metric(#[from] MetricError),

    /// Storage backend errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Repetition count outside the accepted range
    #[error("Invalid repetition count: {repetitions} (must be at least 1)")]
    InvalidRepetitions { repetitions: usize },

    /// The model function under benchmark returned an error
    #[error("Model function failed: {0}")]
    Model(#[source] anyhow::Error),

    /// A model inside a comparison failed; the whole comparison is aborted
    #[error("Benchmark of model '{model}' failed: {source}")]
    ModelFailed {
        model: String,
        #[source]
        source: Box<BenchError>,
    },

    /// The runner produced a result that violates the record invariants
    #[error("Invalid benchmark result: {reason}")]
    InvalidResult { reason: String },
}

/// Metric computation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricError {
    #[error("Unsupported metric: {name}")]
    UnsupportedMetric { name: String },

    #[error("Shape mismatch: {predictions} predictions, {expected} expected values")]
    ShapeMismatch { predictions: usize, expected: usize },

    #[error("Cannot compute a metric over empty input")]
    EmptyInput,
}

/// Storage backend errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Schema error: {reason}")]
    Schema { reason: String },

    #[error("Invalid record: {reason}")]
    InvalidRecord { reason: String },

    #[error("Corrupted data in {location}: {reason}")]
    Corrupted { location: String, reason: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] heed::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid configuration value: {field} = {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Configuration file permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("Configuration parsing error: {reason}")]
    ParseError { reason: String },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, BenchError>;

/// A specialized result type for metric computation
pub type MetricResult<T> = std::result::Result<T, MetricError>;

/// A specialized result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// A specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

impl BenchError {
    /// Whether this error was raised by input validation, before any measurement
    pub fn is_validation(&self) -> bool {
        match self {
            BenchError::Metric(_) | BenchError::InvalidRepetitions { .. } => true,
            BenchError::ModelFailed { source, .. } => source.is_validation(),
            _ => false,
        }
    }

    /// Name of the model a comparison failure is attributed to
    pub fn failed_model(&self) -> Option<&str> {
        match self {
            BenchError::ModelFailed { model, .. } => Some(model),
            _ => None,
        }
    }

    /// The innermost error, unwrapping comparison attribution
    pub fn root(&self) -> &BenchError {
        match self {
            BenchError::ModelFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            BenchError::Metric(_) => "metric",
            BenchError::Storage(_) => "storage",
            BenchError::Config(_) => "config",
            BenchError::InvalidRepetitions { .. } => "validation",
            BenchError::Model(_) => "model",
            BenchError::ModelFailed { .. } => "comparison",
            BenchError::InvalidResult { .. } => "result",
        }
    }
}

impl StorageError {
    pub(crate) fn unavailable(reason: impl Into<String>) -> Self {
        StorageError::Unavailable { reason: reason.into() }
    }

    pub(crate) fn corrupted(location: impl Into<String>, reason: impl Into<String>) -> Self {
        StorageError::Corrupted {
            location: location.into(),
            reason: reason.into(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, StorageError::Unavailable { .. })
    }

    pub fn is_schema_error(&self) -> bool {
        matches!(self, StorageError::Schema { .. })
    }
}
