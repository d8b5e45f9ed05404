//! Row store backed by a single SQLite database file

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::query::{self, QueryFilters};
use super::{closed, schema_missing, StorageBackend};
use crate::config::BackendKind;
use crate::error::{StorageError, StorageResult};
use crate::model::{BenchmarkResult, DatasetMetadata, HardwareProfile, ModelMetadata};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS benchmarks (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    model_name    TEXT    NOT NULL,
    model_version TEXT    NOT NULL,
    task_type     TEXT    NOT NULL,
    dataset       TEXT    NOT NULL,
    metric        TEXT    NOT NULL,
    value         REAL    NOT NULL,
    runtime_ms    REAL    NOT NULL,
    memory_bytes  INTEGER NOT NULL,
    hw_cpu        TEXT    NOT NULL,
    hw_cores      INTEGER NOT NULL,
    hw_ram_bytes  INTEGER NOT NULL,
    hw_os         TEXT    NOT NULL,
    ts            INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_benchmarks_model_ts ON benchmarks (model_name, ts);
CREATE INDEX IF NOT EXISTS idx_benchmarks_task_metric ON benchmarks (task_type, metric);

CREATE TABLE IF NOT EXISTS models (
    name         TEXT NOT NULL,
    version      TEXT NOT NULL,
    architecture TEXT NOT NULL,
    param_count  INTEGER,
    source_url   TEXT,
    license      TEXT,
    PRIMARY KEY (name, version)
);

CREATE TABLE IF NOT EXISTS datasets (
    name              TEXT PRIMARY KEY,
    task_type         TEXT NOT NULL,
    citation          TEXT,
    supported_metrics TEXT NOT NULL
);
";

const RESULT_COLUMNS: &str = "model_name, model_version, task_type, dataset, metric, value, runtime_ms, \
     memory_bytes, hw_cpu, hw_cores, hw_ram_bytes, hw_os, ts";

/// SQLite implementation of [`StorageBackend`]
pub struct RowStore {
    path: PathBuf,
    conn: Option<Connection>,
    schema_ready: bool,
}

impl RowStore {
    /// Open (or create) `<dir>/<database>.sqlite3`
    pub fn open(dir: &Path, database: &str) -> StorageResult<Self> {
        fs::create_dir_all(dir)
            .map_err(|e| StorageError::unavailable(format!("cannot create {}: {}", dir.display(), e)))?;

        let path = dir.join(format!("{}.sqlite3", database));
        let conn = Connection::open(&path)
            .map_err(|e| StorageError::unavailable(format!("cannot open {}: {}", path.display(), e)))?;
        conn.busy_timeout(Duration::from_secs(5))?;

        let schema_ready = Self::tables_exist(&conn)?;
        tracing::debug!("Opened row store at {} (schema ready: {})", path.display(), schema_ready);

        Ok(Self {
            path,
            conn: Some(conn),
            schema_ready,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tables_exist(conn: &Connection) -> StorageResult<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('benchmarks', 'models', 'datasets')",
            [],
            |row| row.get(0),
        )?;
        Ok(count == 3)
    }

    fn connection(&self) -> StorageResult<&Connection> {
        self.conn.as_ref().ok_or_else(|| closed(BackendKind::RowStore))
    }

    /// Connection with an initialized schema
    fn ready(&self) -> StorageResult<&Connection> {
        let conn = self.connection()?;
        if !self.schema_ready {
            return Err(schema_missing(BackendKind::RowStore));
        }
        Ok(conn)
    }

    fn result_from_row(row: &Row<'_>) -> rusqlite::Result<BenchmarkResult> {
        let ts: i64 = row.get(12)?;
        let timestamp = Utc
            .timestamp_micros(ts)
            .single()
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(12, ts))?;

        Ok(BenchmarkResult {
            model_name: row.get(0)?,
            model_version: row.get(1)?,
            task_type: row.get(2)?,
            dataset: row.get(3)?,
            metric: row.get(4)?,
            value: row.get(5)?,
            runtime_ms: row.get(6)?,
            memory_bytes: narrow(row, 7)?,
            hardware: HardwareProfile {
                cpu: row.get(8)?,
                cores: narrow(row, 9)?,
                ram_bytes: narrow(row, 10)?,
                os: row.get(11)?,
            },
            timestamp,
        })
    }
}

/// Integer column that must fit the narrower unsigned field type
fn narrow<T: TryFrom<i64>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let value: i64 = row.get(idx)?;
    T::try_from(value).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, value))
}

fn signed(field: &str, value: u64) -> StorageResult<i64> {
    i64::try_from(value).map_err(|_| StorageError::InvalidRecord {
        reason: format!("{} out of range: {}", field, value),
    })
}

impl StorageBackend for RowStore {
    fn kind(&self) -> BackendKind {
        BackendKind::RowStore
    }

    fn initialize_schema(&mut self) -> StorageResult<()> {
        let conn = self.connection()?;
        conn.execute_batch(SCHEMA)?;
        self.schema_ready = true;
        tracing::info!("Row store schema ready at {}", self.path.display());
        Ok(())
    }

    fn save_result(&mut self, result: &BenchmarkResult) -> StorageResult<()> {
        let conn = self.ready()?;
        result.validate()?;

        conn.execute(
            &format!(
                "INSERT INTO benchmarks ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                RESULT_COLUMNS
            ),
            params![
                result.model_name,
                result.model_version,
                result.task_type,
                result.dataset,
                result.metric,
                result.value,
                result.runtime_ms,
                signed("memory_bytes", result.memory_bytes)?,
                result.hardware.cpu,
                result.hardware.cores,
                signed("hw_ram_bytes", result.hardware.ram_bytes)?,
                result.hardware.os,
                result.timestamp.timestamp_micros(),
            ],
        )?;

        tracing::debug!(model = %result.model_name, metric = %result.metric, "Saved result to row store");
        Ok(())
    }

    fn save_model_metadata(&mut self, metadata: &ModelMetadata) -> StorageResult<()> {
        let conn = self.ready()?;
        metadata.validate()?;

        let param_count = metadata.param_count.map(|c| signed("param_count", c)).transpose()?;
        conn.execute(
            "INSERT INTO models (name, version, architecture, param_count, source_url, license)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (name, version) DO UPDATE SET
                architecture = excluded.architecture,
                param_count = excluded.param_count,
                source_url = excluded.source_url,
                license = excluded.license",
            params![
                metadata.name,
                metadata.version,
                metadata.architecture,
                param_count,
                metadata.source_url,
                metadata.license,
            ],
        )?;
        Ok(())
    }

    fn save_dataset_metadata(&mut self, metadata: &DatasetMetadata) -> StorageResult<()> {
        let conn = self.ready()?;
        metadata.validate()?;

        let metrics = serde_json::to_string(&metadata.supported_metrics)?;
        conn.execute(
            "INSERT INTO datasets (name, task_type, citation, supported_metrics)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (name) DO UPDATE SET
                task_type = excluded.task_type,
                citation = excluded.citation,
                supported_metrics = excluded.supported_metrics",
            params![metadata.name, metadata.task_type, metadata.citation, metrics],
        )?;
        Ok(())
    }

    fn model_metadata(&self, name: &str, version: &str) -> StorageResult<Option<ModelMetadata>> {
        let conn = self.ready()?;
        let metadata = conn
            .query_row(
                "SELECT architecture, param_count, source_url, license FROM models WHERE name = ?1 AND version = ?2",
                params![name, version],
                |row| {
                    let param_count: Option<i64> = row.get(1)?;
                    Ok(ModelMetadata {
                        name: name.to_string(),
                        version: version.to_string(),
                        architecture: row.get(0)?,
                        param_count: match param_count {
                            Some(_) => Some(narrow(row, 1)?),
                            None => None,
                        },
                        source_url: row.get(2)?,
                        license: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(metadata)
    }

    fn dataset_metadata(&self, name: &str) -> StorageResult<Option<DatasetMetadata>> {
        let conn = self.ready()?;
        let metadata = conn
            .query_row(
                "SELECT task_type, citation, supported_metrics FROM datasets WHERE name = ?1",
                params![name],
                |row| {
                    let metrics: String = row.get(2)?;
                    let supported_metrics = serde_json::from_str(&metrics)
                        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
                    Ok(DatasetMetadata {
                        name: name.to_string(),
                        task_type: row.get(0)?,
                        citation: row.get(1)?,
                        supported_metrics,
                    })
                },
            )
            .optional()?;
        Ok(metadata)
    }

    fn query_results(&self, filters: &QueryFilters) -> StorageResult<Vec<BenchmarkResult>> {
        let conn = self.ready()?;
        if filters.is_unsatisfiable() {
            return Ok(Vec::new());
        }

        let mut clauses = Vec::new();
        let mut values = Vec::new();

        for (column, filter) in [
            ("model_name", &filters.model_name),
            ("model_version", &filters.model_version),
            ("task_type", &filters.task_type),
            ("dataset", &filters.dataset),
            ("metric", &filters.metric),
        ] {
            if let Some(wanted) = filter {
                clauses.push(format!("{} = ?", column));
                values.push(Value::Text(wanted.clone()));
            }
        }

        if let Some(range) = filters.time_range {
            let (start, end) = range.as_micros();
            if let Some(start) = start {
                clauses.push("ts >= ?".to_string());
                values.push(Value::Integer(start));
            }
            if let Some(end) = end {
                clauses.push("ts < ?".to_string());
                values.push(Value::Integer(end));
            }
        }

        let mut sql = format!("SELECT {} FROM benchmarks", RESULT_COLUMNS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY ts DESC, model_name, model_version, task_type, dataset, metric");
        if let Some(limit) = filters.limit {
            sql.push_str(" LIMIT ?");
            values.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), Self::result_from_row)?;
        let results = rows.collect::<Result<Vec<_>, _>>()?;

        Ok(query::finish(results, filters))
    }

    fn close(&mut self) -> StorageResult<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| StorageError::Sqlite(e))?;
            tracing::debug!("Closed row store at {}", self.path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> RowStore {
        let mut store = RowStore::open(dir.path(), "bench").unwrap();
        store.initialize_schema().unwrap();
        store
    }

    #[test]
    fn test_schema_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        store.save_result(&fixtures::result("bert", 10)).unwrap();
        store.close().unwrap();

        let reopened = RowStore::open(dir.path(), "bench").unwrap();
        assert_eq!(reopened.query_results(&QueryFilters::new()).unwrap().len(), 1);
        assert!(reopened.path().ends_with("bench.sqlite3"));
    }

    #[test]
    fn test_save_before_schema_fails() {
        let dir = TempDir::new().unwrap();
        let mut store = RowStore::open(dir.path(), "bench").unwrap();
        let err = store.save_result(&fixtures::result("bert", 10)).unwrap_err();
        assert!(err.is_schema_error());
    }

    #[test]
    fn test_indexes_created() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let conn = store.connection().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_benchmarks_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_oversized_memory_rejected() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        let mut result = fixtures::result("bert", 10);
        result.memory_bytes = u64::MAX;
        assert!(matches!(store.save_result(&result), Err(StorageError::InvalidRecord { .. })));
    }

    #[test]
    fn test_dataset_upsert() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        store
            .save_dataset_metadata(&DatasetMetadata::new("squad", "qa").with_metrics(["f1"]))
            .unwrap();
        store
            .save_dataset_metadata(
                &DatasetMetadata::new("squad", "question-answering")
                    .with_citation("Rajpurkar et al. 2016")
                    .with_metrics(["f1", "accuracy"]),
            )
            .unwrap();

        let dataset = store.dataset_metadata("squad").unwrap().unwrap();
        assert_eq!(dataset.task_type, "question-answering");
        assert_eq!(dataset.supported_metrics, vec!["f1", "accuracy"]);
        assert!(store.dataset_metadata("mnist").unwrap().is_none());
    }
}
