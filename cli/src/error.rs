use modelbench::{BenchError, ConfigError, StorageError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Benchmark error: {0}")]
    Benchmark(#[from] BenchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 1,
            CliError::Io(_) => 2,
            CliError::InvalidTimeRange(_) => 7,
            CliError::Benchmark(_) => 8,
            CliError::Storage(e) if e.is_unavailable() => 10,
            CliError::Storage(e) if e.is_schema_error() => 11,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Format error for user-friendly display
pub fn format_error(error: &CliError) -> String {
    match error {
        CliError::Config(e) => {
            format!(
                "Configuration Error: {}\n\nCheck the config file (see --config) and any MODELBENCH_* environment variables.",
                e
            )
        }
        CliError::Storage(e) if e.is_schema_error() => {
            format!("Storage Error: {}\n\nRun 'benchctl setup' to create the schema first.", e)
        }
        CliError::Storage(e) if e.is_unavailable() => {
            format!(
                "Storage Unavailable: {}\n\nPlease check that the storage path exists and is writable.",
                e
            )
        }
        CliError::Benchmark(e) => match e.failed_model() {
            Some(model) => format!("Benchmark Failed: model '{}' did not complete\n\n{}", model, e.root()),
            None => format!("Benchmark Failed: {}", e),
        },
        CliError::InvalidTimeRange(msg) => {
            format!(
                "Invalid Time Range: {}\n\nSupported formats: '2024-01-01', '2024-01-01T10:00:00Z'.",
                msg
            )
        }
        _ => error.to_string(),
    }
}
