//! Fixtures and backend factories

use std::path::Path;

use modelbench::{open_backend, BackendKind, StorageBackend, StorageConfig};
use tempfile::TempDir;

/// A backend living in its own temporary directory
pub struct TestStore {
    pub dir: TempDir,
    pub backend: Box<dyn StorageBackend>,
}

impl TestStore {
    /// Reopen the same directory with a fresh backend instance
    pub fn reopen(&self) -> Box<dyn StorageBackend> {
        open_store_at(self.backend.kind(), self.dir.path())
    }
}

/// Fresh, uninitialized backend of the given kind
pub fn open_store(kind: BackendKind) -> TestStore {
    let dir = TempDir::new().expect("failed to create temp dir");
    let backend = open_store_at(kind, dir.path());
    TestStore { dir, backend }
}

/// Backend of the given kind over an existing directory
pub fn open_store_at(kind: BackendKind, path: &Path) -> Box<dyn StorageBackend> {
    let config = StorageConfig {
        backend: kind,
        path: path.to_path_buf(),
        database: "contract".to_string(),
        lmdb_map_size: 32 * 1024 * 1024,
        ..StorageConfig::default()
    };
    open_backend(&config).unwrap_or_else(|e| panic!("failed to open {} backend: {}", kind, e))
}

pub mod fixtures {
    use chrono::{DateTime, TimeZone, Utc};
    use modelbench::{BenchmarkResult, DatasetMetadata, HardwareProfile, ModelMetadata};

    /// 2023-11-14T22:13:20Z
    pub const BASE_MICROS: i64 = 1_700_000_000_000_000;

    pub fn hardware() -> HardwareProfile {
        HardwareProfile {
            cpu: "Integration CPU @ 2.40GHz".to_string(),
            cores: 12,
            ram_bytes: 32 * 1024 * 1024 * 1024,
            os: "Linux 6.6 (integration)".to_string(),
        }
    }

    /// `BASE_MICROS` shifted by whole seconds
    pub fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_micros(BASE_MICROS + seconds * 1_000_000).unwrap()
    }

    /// Builder for results with sensible defaults
    #[derive(Debug, Clone)]
    pub struct ResultBuilder {
        result: BenchmarkResult,
    }

    impl ResultBuilder {
        pub fn new(model: &str) -> Self {
            Self {
                result: BenchmarkResult {
                    model_name: model.to_string(),
                    model_version: "1.0.0".to_string(),
                    task_type: "classification".to_string(),
                    dataset: "digits".to_string(),
                    metric: "accuracy".to_string(),
                    value: 0.9,
                    runtime_ms: 10.0,
                    memory_bytes: 2048,
                    hardware: hardware(),
                    timestamp: at(0),
                },
            }
        }

        pub fn version(mut self, version: &str) -> Self {
            self.result.model_version = version.to_string();
            self
        }

        pub fn task(mut self, task_type: &str) -> Self {
            self.result.task_type = task_type.to_string();
            self
        }

        pub fn dataset(mut self, dataset: &str) -> Self {
            self.result.dataset = dataset.to_string();
            self
        }

        pub fn metric(mut self, metric: &str) -> Self {
            self.result.metric = metric.to_string();
            self
        }

        pub fn value(mut self, value: f64) -> Self {
            self.result.value = value;
            self
        }

        pub fn runtime_ms(mut self, runtime_ms: f64) -> Self {
            self.result.runtime_ms = runtime_ms;
            self
        }

        pub fn at_second(mut self, seconds: i64) -> Self {
            self.result.timestamp = at(seconds);
            self
        }

        pub fn build(self) -> BenchmarkResult {
            self.result
        }
    }

    pub fn result(model: &str) -> ResultBuilder {
        ResultBuilder::new(model)
    }

    pub fn model(name: &str, version: &str) -> ModelMetadata {
        ModelMetadata::new(name, version, "transformer")
            .with_param_count(110_000_000)
            .with_source_url(format!("https://example.com/{}", name))
            .with_license("apache-2.0")
    }

    pub fn dataset(name: &str) -> DatasetMetadata {
        DatasetMetadata::new(name, "classification")
            .with_citation("LeCun et al., 1998")
            .with_metrics(["accuracy", "f1"])
    }
}
