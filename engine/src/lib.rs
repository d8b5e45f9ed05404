//! ModelBench engine library
//!
//! This library measures model-inference functions (latency, memory and an
//! accuracy-style metric), and persists the results through one of three
//! interchangeable storage backends for later querying and comparison.

pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod report;
pub mod runner;
pub mod sampler;
pub mod storage;

// Re-export commonly used types
pub use config::{BackendKind, BenchConfig, RunnerConfig, StorageConfig};
pub use error::{BenchError, ConfigError, MetricError, Result, StorageError};
pub use metrics::{MetricKind, Outcome};
pub use model::{BenchmarkResult, DatasetMetadata, HardwareProfile, ModelMetadata};
pub use runner::{BenchmarkCase, BenchmarkRun, BenchmarkRunner, CandidateModel, Comparison};
pub use sampler::{MemoryProbe, ResourceSampler};
pub use storage::{open_backend, QueryFilters, StorageBackend, TimeRange};
