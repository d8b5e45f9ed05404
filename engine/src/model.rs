//! Records exchanged between the runner, the storage backends and the reporter

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Identity of a model under test, keyed by (name, version)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub name: String,
    pub version: String,
    /// Architecture family, e.g. "transformer"
    pub architecture: String,
    pub param_count: Option<u64>,
    pub source_url: Option<String>,
    pub license: Option<String>,
}

impl ModelMetadata {
    pub fn new(name: impl Into<String>, version: impl Into<String>, architecture: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            architecture: architecture.into(),
            param_count: None,
            source_url: None,
            license: None,
        }
    }

    pub fn with_param_count(mut self, param_count: u64) -> Self {
        self.param_count = Some(param_count);
        self
    }

    pub fn with_source_url(mut self, source_url: impl Into<String>) -> Self {
        self.source_url = Some(source_url.into());
        self
    }

    pub fn with_license(mut self, license: impl Into<String>) -> Self {
        self.license = Some(license.into());
        self
    }

    pub(crate) fn validate(&self) -> StorageResult<()> {
        if self.name.is_empty() || self.version.is_empty() {
            return Err(StorageError::InvalidRecord {
                reason: "model metadata requires a name and a version".to_string(),
            });
        }
        Ok(())
    }
}

/// Identity of an evaluation dataset, keyed by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub name: String,
    pub task_type: String,
    pub citation: Option<String>,
    pub supported_metrics: Vec<String>,
}

impl DatasetMetadata {
    pub fn new(name: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            task_type: task_type.into(),
            citation: None,
            supported_metrics: Vec::new(),
        }
    }

    pub fn with_citation(mut self, citation: impl Into<String>) -> Self {
        self.citation = Some(citation.into());
        self
    }

    pub fn with_metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_metrics = metrics.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn validate(&self) -> StorageResult<()> {
        if self.name.is_empty() {
            return Err(StorageError::InvalidRecord {
                reason: "dataset metadata requires a name".to_string(),
            });
        }
        Ok(())
    }
}

/// Static description of the executing machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareProfile {
    /// CPU model string
    pub cpu: String,
    /// Logical core count
    pub cores: u32,
    /// Total physical memory in bytes
    pub ram_bytes: u64,
    /// Operating system description
    pub os: String,
}

/// One completed measurement of a model against a dataset and metric.
///
/// Built once by the runner at the end of a successful run. Later runs add
/// new rows; existing rows are never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub model_name: String,
    pub model_version: String,
    pub task_type: String,
    pub dataset: String,
    pub metric: String,
    /// Metric value, always finite
    pub value: f64,
    /// Mean wall-clock duration of one invocation in milliseconds
    pub runtime_ms: f64,
    /// Worst observed resident memory growth in bytes
    pub memory_bytes: u64,
    pub hardware: HardwareProfile,
    /// Creation instant with microsecond precision
    pub timestamp: DateTime<Utc>,
}

impl BenchmarkResult {
    /// Check the record invariants
    pub fn validate(&self) -> StorageResult<()> {
        if !self.value.is_finite() {
            return Err(StorageError::InvalidRecord {
                reason: format!("metric value must be finite, got {}", self.value),
            });
        }

        if !self.runtime_ms.is_finite() || self.runtime_ms < 0.0 {
            return Err(StorageError::InvalidRecord {
                reason: format!("runtime must be a non-negative number, got {}", self.runtime_ms),
            });
        }

        for (field, value) in [
            ("model_name", &self.model_name),
            ("model_version", &self.model_version),
            ("metric", &self.metric),
        ] {
            if value.is_empty() {
                return Err(StorageError::InvalidRecord {
                    reason: format!("{} must not be empty", field),
                });
            }
        }

        Ok(())
    }

    /// Natural key of the model this result refers to
    pub fn model_key(&self) -> (&str, &str) {
        (&self.model_name, &self.model_version)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    pub fn hardware() -> HardwareProfile {
        HardwareProfile {
            cpu: "Test CPU @ 3.00GHz".to_string(),
            cores: 8,
            ram_bytes: 16 * 1024 * 1024 * 1024,
            os: "Linux 6.1 (test)".to_string(),
        }
    }

    pub fn result(model: &str, micros: i64) -> BenchmarkResult {
        BenchmarkResult {
            model_name: model.to_string(),
            model_version: "1.0.0".to_string(),
            task_type: "classification".to_string(),
            dataset: "digits".to_string(),
            metric: "accuracy".to_string(),
            value: 0.875,
            runtime_ms: 12.5,
            memory_bytes: 4096,
            hardware: hardware(),
            timestamp: Utc.timestamp_micros(micros).unwrap(),
        }
    }
}
