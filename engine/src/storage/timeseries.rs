//! Time-series store backed by an LMDB environment
//!
//! Results are keyed by a 128-bit big-endian integer: the upper half is the
//! timestamp in microseconds with the sign bit flipped (so byte order equals
//! time order), the lower half a per-timestamp sequence number. A reverse
//! range scan over the key space returns rows newest first, and time-range
//! filters become key bounds.

use std::fs;
use std::ops::Bound;
use std::path::{Path, PathBuf};

use heed::byteorder::BigEndian;
use heed::types::{DecodeIgnore, SerdeJson, Str, U128};
use heed::{Database, Env, EnvOpenOptions};

use super::query::{self, QueryFilters};
use super::{closed, model_key, schema_missing, StorageBackend};
use crate::config::BackendKind;
use crate::error::{StorageError, StorageResult};
use crate::model::{BenchmarkResult, DatasetMetadata, ModelMetadata};

const RESULTS_DB: &str = "benchmarks";
const MODELS_DB: &str = "models";
const DATASETS_DB: &str = "datasets";

type ResultsDb = Database<U128<BigEndian>, SerdeJson<BenchmarkResult>>;
type ModelsDb = Database<Str, SerdeJson<ModelMetadata>>;
type DatasetsDb = Database<Str, SerdeJson<DatasetMetadata>>;

#[derive(Clone, Copy)]
struct Tables {
    results: ResultsDb,
    models: ModelsDb,
    datasets: DatasetsDb,
}

/// LMDB implementation of [`StorageBackend`]
pub struct TimeSeriesStore {
    path: PathBuf,
    env: Option<Env>,
    tables: Option<Tables>,
}

/// Key of the `seq`-th result recorded at `micros`
fn result_key(micros: i64, seq: u64) -> u128 {
    let ordered = (micros as u64) ^ (1 << 63);
    (u128::from(ordered) << 64) | u128::from(seq)
}

impl TimeSeriesStore {
    /// Open (or create) the environment directory `<dir>/<database>.lmdb/`
    pub fn open(dir: &Path, database: &str, map_size: usize) -> StorageResult<Self> {
        let path = dir.join(format!("{}.lmdb", database));
        fs::create_dir_all(&path)
            .map_err(|e| StorageError::unavailable(format!("cannot create {}: {}", path.display(), e)))?;

        // SAFETY: heed hands every store on the same path one shared
        // environment, and nothing in this crate truncates the file under it.
        let env = unsafe { EnvOpenOptions::new().map_size(map_size).max_dbs(3).open(&path) }
            .map_err(|e| StorageError::unavailable(format!("cannot open {}: {}", path.display(), e)))?;

        let tables = Self::existing_tables(&env)?;
        tracing::debug!("Opened time-series store at {} (schema ready: {})", path.display(), tables.is_some());

        Ok(Self {
            path,
            env: Some(env),
            tables,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn existing_tables(env: &Env) -> StorageResult<Option<Tables>> {
        let rtxn = env.read_txn()?;
        let results: Option<ResultsDb> = env.open_database(&rtxn, Some(RESULTS_DB))?;
        let models: Option<ModelsDb> = env.open_database(&rtxn, Some(MODELS_DB))?;
        let datasets: Option<DatasetsDb> = env.open_database(&rtxn, Some(DATASETS_DB))?;
        rtxn.commit()?;

        Ok(match (results, models, datasets) {
            (Some(results), Some(models), Some(datasets)) => Some(Tables {
                results,
                models,
                datasets,
            }),
            _ => None,
        })
    }

    fn env(&self) -> StorageResult<&Env> {
        self.env.as_ref().ok_or_else(|| closed(BackendKind::TimeSeries))
    }

    fn ready(&self) -> StorageResult<(&Env, Tables)> {
        let env = self.env()?;
        let tables = self.tables.ok_or_else(|| schema_missing(BackendKind::TimeSeries))?;
        Ok((env, tables))
    }
}

impl StorageBackend for TimeSeriesStore {
    fn kind(&self) -> BackendKind {
        BackendKind::TimeSeries
    }

    fn initialize_schema(&mut self) -> StorageResult<()> {
        let env = self.env()?;

        let mut wtxn = env.write_txn()?;
        let tables = Tables {
            results: env.create_database(&mut wtxn, Some(RESULTS_DB))?,
            models: env.create_database(&mut wtxn, Some(MODELS_DB))?,
            datasets: env.create_database(&mut wtxn, Some(DATASETS_DB))?,
        };
        wtxn.commit()?;

        self.tables = Some(tables);
        tracing::info!("Time-series store schema ready at {}", self.path.display());
        Ok(())
    }

    fn save_result(&mut self, result: &BenchmarkResult) -> StorageResult<()> {
        let (env, tables) = self.ready()?;
        result.validate()?;

        let micros = result.timestamp.timestamp_micros();
        let mut wtxn = env.write_txn()?;

        let last = tables
            .results
            .remap_data_type::<DecodeIgnore>()
            .rev_range(&wtxn, &(result_key(micros, 0)..=result_key(micros, u64::MAX)))?
            .next()
            .transpose()?
            .map(|(key, ())| key as u64);
        let seq = last.map_or(0, |seq| seq + 1);

        tables.results.put(&mut wtxn, &result_key(micros, seq), result)?;
        wtxn.commit()?;

        tracing::debug!(model = %result.model_name, micros, seq, "Saved result to time-series store");
        Ok(())
    }

    fn save_model_metadata(&mut self, metadata: &ModelMetadata) -> StorageResult<()> {
        let (env, tables) = self.ready()?;
        metadata.validate()?;

        let mut wtxn = env.write_txn()?;
        tables
            .models
            .put(&mut wtxn, &model_key(&metadata.name, &metadata.version), metadata)?;
        wtxn.commit()?;
        Ok(())
    }

    fn save_dataset_metadata(&mut self, metadata: &DatasetMetadata) -> StorageResult<()> {
        let (env, tables) = self.ready()?;
        metadata.validate()?;

        let mut wtxn = env.write_txn()?;
        tables.datasets.put(&mut wtxn, &metadata.name, metadata)?;
        wtxn.commit()?;
        Ok(())
    }

    fn model_metadata(&self, name: &str, version: &str) -> StorageResult<Option<ModelMetadata>> {
        let (env, tables) = self.ready()?;
        let rtxn = env.read_txn()?;
        Ok(tables.models.get(&rtxn, &model_key(name, version))?)
    }

    fn dataset_metadata(&self, name: &str) -> StorageResult<Option<DatasetMetadata>> {
        let (env, tables) = self.ready()?;
        let rtxn = env.read_txn()?;
        Ok(tables.datasets.get(&rtxn, name)?)
    }

    fn query_results(&self, filters: &QueryFilters) -> StorageResult<Vec<BenchmarkResult>> {
        let (env, tables) = self.ready()?;
        if filters.is_unsatisfiable() {
            return Ok(Vec::new());
        }

        let (start, end) = filters.time_range.map(|r| r.as_micros()).unwrap_or((None, None));
        let bounds = (
            start.map_or(Bound::Unbounded, |s| Bound::Included(result_key(s, 0))),
            end.map_or(Bound::Unbounded, |e| Bound::Excluded(result_key(e, 0))),
        );

        let rtxn = env.read_txn()?;
        let mut results: Vec<BenchmarkResult> = Vec::new();
        for entry in tables.results.rev_range(&rtxn, &bounds)? {
            let (_, result) = entry?;

            // Rows sharing the boundary timestamp are still needed for the
            // tie-break; anything older cannot make the cut.
            if let (Some(limit), Some(last)) = (filters.limit, results.last()) {
                if results.len() >= limit && result.timestamp < last.timestamp {
                    break;
                }
            }

            if filters.matches(&result) {
                results.push(result);
            }
        }

        Ok(query::finish(results, filters))
    }

    fn close(&mut self) -> StorageResult<()> {
        self.tables = None;
        // Other stores may share this environment; LMDB closes it once the
        // last handle is dropped.
        if self.env.take().is_some() {
            tracing::debug!("Closed time-series store at {}", self.path.display());
        }
        Ok(())
    }
}
