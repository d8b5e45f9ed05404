//! Columnar analytical store backed by Parquet files
//!
//! Layout under `<path>/<database>/`:
//!
//! ```text
//! _schema.json                      schema marker
//! benchmarks/YYYY/MM/DD/part-*.parquet   immutable result segments
//! models.parquet                    model metadata table
//! datasets.parquet                  dataset metadata table
//! ```
//!
//! Every benchmark save appends a new segment, so existing rows are never
//! rewritten. The metadata tables are small and are rewritten whole through a
//! temporary file and a rename.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, Float64Array, ListArray, ListBuilder, StringArray, StringBuilder, TimestampMicrosecondArray,
    UInt32Array, UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{TimeZone, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use uuid::Uuid;

use super::layout::PartitionLayout;
use super::query::{self, QueryFilters};
use super::{closed, schema_missing, StorageBackend};
use crate::config::BackendKind;
use crate::error::{StorageError, StorageResult};
use crate::model::{BenchmarkResult, DatasetMetadata, HardwareProfile, ModelMetadata};

const SCHEMA_MARKER: &str = "_schema.json";
const BENCHMARKS_DIR: &str = "benchmarks";
const MODELS_FILE: &str = "models.parquet";
const DATASETS_FILE: &str = "datasets.parquet";
const FORMAT_VERSION: u32 = 1;

/// Parquet implementation of [`StorageBackend`]
pub struct ColumnarStore {
    root: PathBuf,
    layout: PartitionLayout,
    /// Present while the store is open
    writer_properties: Option<WriterProperties>,
    schema_ready: bool,
}

impl ColumnarStore {
    /// Open (or create) the store directory `<dir>/<database>/`
    pub fn open(dir: &Path, database: &str, compression: &str) -> StorageResult<Self> {
        let root = dir.join(database);
        fs::create_dir_all(&root)
            .map_err(|e| StorageError::unavailable(format!("cannot create {}: {}", root.display(), e)))?;

        let schema_ready = root.join(SCHEMA_MARKER).is_file();
        tracing::debug!("Opened columnar store at {} (schema ready: {})", root.display(), schema_ready);

        Ok(Self {
            layout: PartitionLayout::new(root.join(BENCHMARKS_DIR)),
            root,
            writer_properties: Some(create_writer_properties(compression)),
            schema_ready,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ready(&self) -> StorageResult<&WriterProperties> {
        let properties = self.writer_properties.as_ref().ok_or_else(|| closed(BackendKind::Columnar))?;
        if !self.schema_ready {
            return Err(schema_missing(BackendKind::Columnar));
        }
        Ok(properties)
    }

    fn models(&self) -> StorageResult<Vec<ModelMetadata>> {
        let path = self.root.join(MODELS_FILE);
        let mut models = Vec::new();
        for batch in read_batches(&path)? {
            models.extend(models_from_batch(&batch, &path)?);
        }
        Ok(models)
    }

    fn datasets(&self) -> StorageResult<Vec<DatasetMetadata>> {
        let path = self.root.join(DATASETS_FILE);
        let mut datasets = Vec::new();
        for batch in read_batches(&path)? {
            datasets.extend(datasets_from_batch(&batch, &path)?);
        }
        Ok(datasets)
    }
}

impl StorageBackend for ColumnarStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Columnar
    }

    fn initialize_schema(&mut self) -> StorageResult<()> {
        let properties = self.writer_properties.as_ref().ok_or_else(|| closed(BackendKind::Columnar))?;

        fs::create_dir_all(&self.layout.base_path)?;

        let models_path = self.root.join(MODELS_FILE);
        if !models_path.exists() {
            write_atomically(&models_path, &models_to_batch(&[])?, properties)?;
        }

        let datasets_path = self.root.join(DATASETS_FILE);
        if !datasets_path.exists() {
            write_atomically(&datasets_path, &datasets_to_batch(&[])?, properties)?;
        }

        let marker = self.root.join(SCHEMA_MARKER);
        if !marker.exists() {
            let content = serde_json::to_string_pretty(&serde_json::json!({
                "format_version": FORMAT_VERSION,
                "tables": [BENCHMARKS_DIR, "models", "datasets"],
            }))?;
            fs::write(&marker, content)?;
        }

        self.schema_ready = true;
        tracing::info!("Columnar store schema ready at {}", self.root.display());
        Ok(())
    }

    fn save_result(&mut self, result: &BenchmarkResult) -> StorageResult<()> {
        let properties = self.ready()?;
        result.validate()?;

        let partition = self.layout.partition_dir(result.timestamp);
        fs::create_dir_all(&partition)?;

        let file_name = format!(
            "part-{}-{}.parquet",
            result.timestamp.timestamp_micros(),
            Uuid::new_v4().simple()
        );
        let path = partition.join(file_name);
        write_atomically(&path, &results_to_batch(std::slice::from_ref(result))?, properties)?;

        tracing::debug!("Wrote result segment {}", path.display());
        Ok(())
    }

    fn save_model_metadata(&mut self, metadata: &ModelMetadata) -> StorageResult<()> {
        let properties = self.ready()?;
        metadata.validate()?;

        let mut models = self.models()?;
        models.retain(|m| (m.name.as_str(), m.version.as_str()) != (metadata.name.as_str(), metadata.version.as_str()));
        models.push(metadata.clone());
        models.sort_by(|a, b| (&a.name, &a.version).cmp(&(&b.name, &b.version)));

        write_atomically(&self.root.join(MODELS_FILE), &models_to_batch(&models)?, properties)
    }

    fn save_dataset_metadata(&mut self, metadata: &DatasetMetadata) -> StorageResult<()> {
        let properties = self.ready()?;
        metadata.validate()?;

        let mut datasets = self.datasets()?;
        datasets.retain(|d| d.name != metadata.name);
        datasets.push(metadata.clone());
        datasets.sort_by(|a, b| a.name.cmp(&b.name));

        write_atomically(&self.root.join(DATASETS_FILE), &datasets_to_batch(&datasets)?, properties)
    }

    fn model_metadata(&self, name: &str, version: &str) -> StorageResult<Option<ModelMetadata>> {
        self.ready()?;
        Ok(self
            .models()?
            .into_iter()
            .find(|m| m.name == name && m.version == version))
    }

    fn dataset_metadata(&self, name: &str) -> StorageResult<Option<DatasetMetadata>> {
        self.ready()?;
        Ok(self.datasets()?.into_iter().find(|d| d.name == name))
    }

    fn query_results(&self, filters: &QueryFilters) -> StorageResult<Vec<BenchmarkResult>> {
        self.ready()?;
        if filters.is_unsatisfiable() {
            return Ok(Vec::new());
        }

        let (start, end) = filters
            .time_range
            .map(|range| (range.start, range.end))
            .unwrap_or((None, None));

        let mut results = Vec::new();
        let mut segments = 0usize;
        for (_, partition) in self.layout.partitions_between(start, end)? {
            for segment in PartitionLayout::segment_files(&partition, "parquet")? {
                segments += 1;
                for batch in read_batches(&segment)? {
                    results.extend(
                        results_from_batch(&batch, &segment)?
                            .into_iter()
                            .filter(|r| filters.matches(r)),
                    );
                }
            }
        }

        tracing::debug!(segments, rows = results.len(), "Scanned columnar segments");
        Ok(query::finish(results, filters))
    }

    fn close(&mut self) -> StorageResult<()> {
        if self.writer_properties.take().is_some() {
            tracing::debug!("Closed columnar store at {}", self.root.display());
        }
        Ok(())
    }
}

fn create_writer_properties(compression: &str) -> WriterProperties {
    let compression = match compression {
        "uncompressed" => Compression::UNCOMPRESSED,
        "zstd" => Compression::ZSTD(ZstdLevel::default()),
        _ => Compression::SNAPPY,
    };

    WriterProperties::builder()
        .set_compression(compression)
        .set_dictionary_enabled(true)
        .build()
}

/// Write `batch` to a sibling temporary file, then rename over `path`
fn write_atomically(path: &Path, batch: &RecordBatch, properties: &WriterProperties) -> StorageResult<()> {
    let temp_path = path.with_extension("parquet.tmp");

    let written = write_parquet(&temp_path, batch, properties).and_then(|()| Ok(fs::rename(&temp_path, path)?));
    if written.is_err() {
        if let Err(e) = fs::remove_file(&temp_path) {
            tracing::warn!("Failed to remove {}: {}", temp_path.display(), e);
        }
    }
    written
}

fn write_parquet(path: &Path, batch: &RecordBatch, properties: &WriterProperties) -> StorageResult<()> {
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(properties.clone()))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

fn read_batches(path: &Path) -> StorageResult<Vec<RecordBatch>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?.build()?;
    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    Ok(batches)
}

fn results_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("model_name", DataType::Utf8, false),
        Field::new("model_version", DataType::Utf8, false),
        Field::new("task_type", DataType::Utf8, false),
        Field::new("dataset", DataType::Utf8, false),
        Field::new("metric", DataType::Utf8, false),
        Field::new("value", DataType::Float64, false),
        Field::new("runtime_ms", DataType::Float64, false),
        Field::new("memory_bytes", DataType::UInt64, false),
        Field::new("hw_cpu", DataType::Utf8, false),
        Field::new("hw_cores", DataType::UInt32, false),
        Field::new("hw_ram_bytes", DataType::UInt64, false),
        Field::new("hw_os", DataType::Utf8, false),
        Field::new("ts", DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())), false),
    ]))
}

fn models_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("name", DataType::Utf8, false),
        Field::new("version", DataType::Utf8, false),
        Field::new("architecture", DataType::Utf8, false),
        Field::new("param_count", DataType::UInt64, true),
        Field::new("source_url", DataType::Utf8, true),
        Field::new("license", DataType::Utf8, true),
    ]))
}

fn datasets_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("name", DataType::Utf8, false),
        Field::new("task_type", DataType::Utf8, false),
        Field::new("citation", DataType::Utf8, true),
        Field::new(
            "supported_metrics",
            DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))),
            false,
        ),
    ]))
}

fn string_column(results: &[BenchmarkResult], field: fn(&BenchmarkResult) -> &str) -> ArrayRef {
    Arc::new(StringArray::from_iter_values(results.iter().map(field)))
}

fn results_to_batch(results: &[BenchmarkResult]) -> StorageResult<RecordBatch> {
    let arrays: Vec<ArrayRef> = vec![
        string_column(results, |r| &r.model_name),
        string_column(results, |r| &r.model_version),
        string_column(results, |r| &r.task_type),
        string_column(results, |r| &r.dataset),
        string_column(results, |r| &r.metric),
        Arc::new(Float64Array::from_iter_values(results.iter().map(|r| r.value))),
        Arc::new(Float64Array::from_iter_values(results.iter().map(|r| r.runtime_ms))),
        Arc::new(UInt64Array::from_iter_values(results.iter().map(|r| r.memory_bytes))),
        string_column(results, |r| &r.hardware.cpu),
        Arc::new(UInt32Array::from_iter_values(results.iter().map(|r| r.hardware.cores))),
        Arc::new(UInt64Array::from_iter_values(results.iter().map(|r| r.hardware.ram_bytes))),
        string_column(results, |r| &r.hardware.os),
        Arc::new(
            TimestampMicrosecondArray::from_iter_values(results.iter().map(|r| r.timestamp.timestamp_micros()))
                .with_timezone("UTC"),
        ),
    ];

    Ok(RecordBatch::try_new(results_schema(), arrays)?)
}

fn models_to_batch(models: &[ModelMetadata]) -> StorageResult<RecordBatch> {
    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(models.iter().map(|m| &m.name))),
        Arc::new(StringArray::from_iter_values(models.iter().map(|m| &m.version))),
        Arc::new(StringArray::from_iter_values(models.iter().map(|m| &m.architecture))),
        Arc::new(models.iter().map(|m| m.param_count).collect::<UInt64Array>()),
        Arc::new(models.iter().map(|m| m.source_url.as_deref()).collect::<StringArray>()),
        Arc::new(models.iter().map(|m| m.license.as_deref()).collect::<StringArray>()),
    ];

    Ok(RecordBatch::try_new(models_schema(), arrays)?)
}

fn datasets_to_batch(datasets: &[DatasetMetadata]) -> StorageResult<RecordBatch> {
    let mut metrics = ListBuilder::new(StringBuilder::new());
    for dataset in datasets {
        for metric in &dataset.supported_metrics {
            metrics.values().append_value(metric);
        }
        metrics.append(true);
    }

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(datasets.iter().map(|d| &d.name))),
        Arc::new(StringArray::from_iter_values(datasets.iter().map(|d| &d.task_type))),
        Arc::new(datasets.iter().map(|d| d.citation.as_deref()).collect::<StringArray>()),
        Arc::new(metrics.finish()),
    ];

    Ok(RecordBatch::try_new(datasets_schema(), arrays)?)
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str, location: &Path) -> StorageResult<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|array| array.as_any().downcast_ref::<T>())
        .ok_or_else(|| StorageError::corrupted(location.display().to_string(), format!("missing or mistyped column {}", name)))
}

fn optional_string(array: &StringArray, row: usize) -> Option<String> {
    (!array.is_null(row)).then(|| array.value(row).to_string())
}

fn results_from_batch(batch: &RecordBatch, location: &Path) -> StorageResult<Vec<BenchmarkResult>> {
    let model_name = column::<StringArray>(batch, "model_name", location)?;
    let model_version = column::<StringArray>(batch, "model_version", location)?;
    let task_type = column::<StringArray>(batch, "task_type", location)?;
    let dataset = column::<StringArray>(batch, "dataset", location)?;
    let metric = column::<StringArray>(batch, "metric", location)?;
    let value = column::<Float64Array>(batch, "value", location)?;
    let runtime_ms = column::<Float64Array>(batch, "runtime_ms", location)?;
    let memory_bytes = column::<UInt64Array>(batch, "memory_bytes", location)?;
    let hw_cpu = column::<StringArray>(batch, "hw_cpu", location)?;
    let hw_cores = column::<UInt32Array>(batch, "hw_cores", location)?;
    let hw_ram_bytes = column::<UInt64Array>(batch, "hw_ram_bytes", location)?;
    let hw_os = column::<StringArray>(batch, "hw_os", location)?;
    let ts = column::<TimestampMicrosecondArray>(batch, "ts", location)?;

    (0..batch.num_rows())
        .map(|row| {
            let micros = ts.value(row);
            let timestamp = Utc.timestamp_micros(micros).single().ok_or_else(|| {
                StorageError::corrupted(location.display().to_string(), format!("timestamp out of range: {}", micros))
            })?;

            Ok(BenchmarkResult {
                model_name: model_name.value(row).to_string(),
                model_version: model_version.value(row).to_string(),
                task_type: task_type.value(row).to_string(),
                dataset: dataset.value(row).to_string(),
                metric: metric.value(row).to_string(),
                value: value.value(row),
                runtime_ms: runtime_ms.value(row),
                memory_bytes: memory_bytes.value(row),
                hardware: HardwareProfile {
                    cpu: hw_cpu.value(row).to_string(),
                    cores: hw_cores.value(row),
                    ram_bytes: hw_ram_bytes.value(row),
                    os: hw_os.value(row).to_string(),
                },
                timestamp,
            })
        })
        .collect()
}

fn models_from_batch(batch: &RecordBatch, location: &Path) -> StorageResult<Vec<ModelMetadata>> {
    let name = column::<StringArray>(batch, "name", location)?;
    let version = column::<StringArray>(batch, "version", location)?;
    let architecture = column::<StringArray>(batch, "architecture", location)?;
    let param_count = column::<UInt64Array>(batch, "param_count", location)?;
    let source_url = column::<StringArray>(batch, "source_url", location)?;
    let license = column::<StringArray>(batch, "license", location)?;

    Ok((0..batch.num_rows())
        .map(|row| ModelMetadata {
            name: name.value(row).to_string(),
            version: version.value(row).to_string(),
            architecture: architecture.value(row).to_string(),
            param_count: (!param_count.is_null(row)).then(|| param_count.value(row)),
            source_url: optional_string(source_url, row),
            license: optional_string(license, row),
        })
        .collect())
}

fn datasets_from_batch(batch: &RecordBatch, location: &Path) -> StorageResult<Vec<DatasetMetadata>> {
    let name = column::<StringArray>(batch, "name", location)?;
    let task_type = column::<StringArray>(batch, "task_type", location)?;
    let citation = column::<StringArray>(batch, "citation", location)?;
    let metrics = column::<ListArray>(batch, "supported_metrics", location)?;

    (0..batch.num_rows())
        .map(|row| {
            let values = metrics.value(row);
            let values = values.as_any().downcast_ref::<StringArray>().ok_or_else(|| {
                StorageError::corrupted(location.display().to_string(), "supported_metrics is not a string list")
            })?;

            Ok(DatasetMetadata {
                name: name.value(row).to_string(),
                task_type: task_type.value(row).to_string(),
                citation: optional_string(citation, row),
                supported_metrics: values.iter().flatten().map(str::to_string).collect(),
            })
        })
        .collect()
}
