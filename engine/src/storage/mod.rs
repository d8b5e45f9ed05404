//! Persistence of benchmark results and metadata
//!
//! Three interchangeable backends implement [`StorageBackend`]: a SQLite row
//! store, a Parquet columnar store and an LMDB time-series store. They differ
//! in physical layout and query strategy only; identical logical operations
//! give identical observable results on all of them, including the order of
//! `query_results`.
//!
//! Every backend owns one connection, acquired when it is opened and released
//! by `close()`. Concurrent writers use separate instances.

pub mod columnar;
pub mod layout;
pub mod query;
pub mod row_store;
pub mod timeseries;

pub use columnar::ColumnarStore;
pub use query::{result_order, QueryFilters, TimeRange};
pub use row_store::RowStore;
pub use timeseries::TimeSeriesStore;

use crate::config::{BackendKind, StorageConfig};
use crate::error::{StorageError, StorageResult};
use crate::model::{BenchmarkResult, DatasetMetadata, ModelMetadata};

/// Capability set shared by every storage variant
pub trait StorageBackend {
    /// Which variant this is
    fn kind(&self) -> BackendKind;

    /// Create the benchmark, model and dataset tables if absent.
    ///
    /// Idempotent; existing data is left untouched.
    fn initialize_schema(&mut self) -> StorageResult<()>;

    /// Append one result; existing rows are never updated or deleted
    fn save_result(&mut self, result: &BenchmarkResult) -> StorageResult<()>;

    /// Insert or replace the descriptive fields for (name, version)
    fn save_model_metadata(&mut self, metadata: &ModelMetadata) -> StorageResult<()>;

    /// Insert or replace the descriptive fields for a dataset name
    fn save_dataset_metadata(&mut self, metadata: &DatasetMetadata) -> StorageResult<()>;

    fn model_metadata(&self, name: &str, version: &str) -> StorageResult<Option<ModelMetadata>>;

    fn dataset_metadata(&self, name: &str) -> StorageResult<Option<DatasetMetadata>>;

    /// Results matching `filters`, newest first
    fn query_results(&self, filters: &QueryFilters) -> StorageResult<Vec<BenchmarkResult>>;

    /// Release the connection. Safe to call more than once; every later
    /// operation fails with [`StorageError::Unavailable`].
    fn close(&mut self) -> StorageResult<()>;
}

/// Open the backend selected by `config`
pub fn open_backend(config: &StorageConfig) -> StorageResult<Box<dyn StorageBackend>> {
    tracing::info!(
        backend = %config.backend,
        path = %config.path.display(),
        database = %config.database,
        "Opening storage backend"
    );

    let backend: Box<dyn StorageBackend> = match config.backend {
        BackendKind::RowStore => Box::new(RowStore::open(&config.path, &config.database)?),
        BackendKind::Columnar => Box::new(ColumnarStore::open(
            &config.path,
            &config.database,
            &config.parquet_compression,
        )?),
        BackendKind::TimeSeries => Box::new(TimeSeriesStore::open(
            &config.path,
            &config.database,
            config.lmdb_map_size,
        )?),
    };

    Ok(backend)
}

pub(crate) fn schema_missing(kind: BackendKind) -> StorageError {
    StorageError::Schema {
        reason: format!("{} schema has not been initialized", kind),
    }
}

pub(crate) fn closed(kind: BackendKind) -> StorageError {
    StorageError::unavailable(format!("{} connection is closed", kind))
}

/// Key used by backends that store models in a flat keyspace
pub(crate) fn model_key(name: &str, version: &str) -> String {
    format!("{}\0{}", name, version)
}
