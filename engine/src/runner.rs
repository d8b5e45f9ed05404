//! Benchmark execution
//!
//! A run validates its inputs, invokes the model function once per
//! repetition inside the resource sampler, scores the predictions of the
//! final repetition and folds the per-repetition measurements into a single
//! [`BenchmarkResult`]. Everything runs sequentially on the calling thread so
//! that timing and memory readings are not disturbed by interleaved work.
//! There is no timeout around the model function: a model that never returns
//! blocks the runner.

use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::config::RunnerConfig;
use crate::error::{BenchError, Result};
use crate::metrics::{MetricKind, Outcome};
use crate::model::{BenchmarkResult, HardwareProfile};
use crate::sampler::{ResourceSampler, Sample};

/// Task, dataset and metric a model is evaluated on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkCase {
    pub task_type: String,
    pub dataset: String,
    pub metric: String,
}

impl BenchmarkCase {
    pub fn new(task_type: impl Into<String>, dataset: impl Into<String>, metric: impl Into<String>) -> Self {
        Self {
            task_type: task_type.into(),
            dataset: dataset.into(),
            metric: metric.into(),
        }
    }
}

/// Measurements of a single repetition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepetitionSample {
    pub elapsed: Duration,
    pub memory_delta: i64,
}

impl<T> From<&Sample<T>> for RepetitionSample {
    fn from(sample: &Sample<T>) -> Self {
        Self {
            elapsed: sample.elapsed,
            memory_delta: sample.memory_delta,
        }
    }
}

/// Outcome of a successful `benchmark_model` call
#[derive(Debug, Clone)]
pub struct BenchmarkRun<P> {
    /// The aggregated record, ready to be handed to a storage backend
    pub result: BenchmarkResult,
    /// Predictions returned by the final repetition
    pub predictions: Vec<P>,
    /// Raw per-repetition measurements, in execution order
    pub samples: Vec<RepetitionSample>,
}

/// Boxed model function used by [`BenchmarkRunner::compare_models`]
pub type ModelFn<'a, I, P> = Box<dyn FnMut(&[I]) -> anyhow::Result<Vec<P>> + 'a>;

/// One competitor in a comparison
pub struct CandidateModel<'a, I, P> {
    pub name: String,
    pub version: String,
    pub function: ModelFn<'a, I, P>,
}

impl<'a, I, P> CandidateModel<'a, I, P> {
    pub fn new<F>(name: impl Into<String>, version: impl Into<String>, function: F) -> Self
    where
        F: FnMut(&[I]) -> anyhow::Result<Vec<P>> + 'a,
    {
        Self {
            name: name.into(),
            version: version.into(),
            function: Box::new(function),
        }
    }
}

/// Ranked views over the results of a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Metric value descending, ties broken by runtime ascending
    pub by_score: Vec<BenchmarkResult>,
    /// Runtime ascending, ties broken by metric value descending
    pub by_runtime: Vec<BenchmarkResult>,
}

impl Comparison {
    /// Build both ranked views from unordered results
    pub fn rank(results: Vec<BenchmarkResult>) -> Self {
        let mut by_score = results.clone();
        by_score.sort_by(|a, b| {
            b.value
                .total_cmp(&a.value)
                .then_with(|| a.runtime_ms.total_cmp(&b.runtime_ms))
        });

        let mut by_runtime = results;
        by_runtime.sort_by(|a, b| {
            a.runtime_ms
                .total_cmp(&b.runtime_ms)
                .then_with(|| b.value.total_cmp(&a.value))
        });

        Self { by_score, by_runtime }
    }
}

/// Drives model functions and produces benchmark results
pub struct BenchmarkRunner {
    config: RunnerConfig,
    hardware: HardwareProfile,
    sampler: ResourceSampler,
    last_timestamp: Option<DateTime<Utc>>,
}

impl BenchmarkRunner {
    /// Runner measuring the current process, with the hardware profile
    /// captured once here
    pub fn new(config: RunnerConfig) -> Self {
        Self::with_parts(config, HardwareProfile::capture(), ResourceSampler::new())
    }

    /// Runner with an explicit hardware profile and sampler
    pub fn with_parts(config: RunnerConfig, hardware: HardwareProfile, sampler: ResourceSampler) -> Self {
        Self {
            config,
            hardware,
            sampler,
            last_timestamp: None,
        }
    }

    pub fn hardware(&self) -> &HardwareProfile {
        &self.hardware
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Benchmark one model function.
    ///
    /// Inputs are validated before anything is measured. The metric is
    /// computed from the predictions of the last repetition only; runtime is
    /// the mean over repetitions and memory the largest delta, reported as
    /// zero when every delta was negative. If the model function fails, the
    /// error is returned and all completed repetitions are discarded.
    #[allow(clippy::too_many_arguments)]
    pub fn benchmark_model<I, P, F>(
        &mut self,
        model_name: &str,
        model_version: &str,
        case: &BenchmarkCase,
        mut model_fn: F,
        inputs: &[I],
        expected_outputs: &[P],
        repetitions: usize,
    ) -> Result<BenchmarkRun<P>>
    where
        P: Outcome,
        F: FnMut(&[I]) -> anyhow::Result<Vec<P>>,
    {
        let metric: MetricKind = case.metric.parse()?;
        if repetitions == 0 {
            return Err(BenchError::InvalidRepetitions { repetitions });
        }
        MetricKind::check_shape(inputs.len(), expected_outputs.len())?;

        let span = tracing::info_span!("benchmark_model", model = model_name, version = model_version);
        let _enter = span.enter();

        let mut samples = Vec::with_capacity(repetitions);
        let mut predictions = Vec::new();

        for repetition in 0..repetitions {
            let sample = self
                .sampler
                .sample(|| model_fn(inputs))
                .map_err(BenchError::Model)?;

            tracing::debug!(
                repetition,
                elapsed_ms = sample.elapsed.as_secs_f64() * 1000.0,
                memory_delta = sample.memory_delta,
                "Repetition completed"
            );

            samples.push(RepetitionSample::from(&sample));
            predictions = sample.output;
        }

        let value = metric.compute(&predictions, expected_outputs)?;
        let runtime_ms = mean_runtime_ms(&samples);
        let memory_bytes = peak_memory_bytes(&samples);

        let result = BenchmarkResult {
            model_name: model_name.to_string(),
            model_version: model_version.to_string(),
            task_type: case.task_type.clone(),
            dataset: case.dataset.clone(),
            metric: metric.as_str().to_string(),
            value,
            runtime_ms,
            memory_bytes,
            hardware: self.hardware.clone(),
            timestamp: self.next_timestamp(),
        };

        result
            .validate()
            .map_err(|e| BenchError::InvalidResult { reason: e.to_string() })?;

        tracing::info!(
            metric = %metric,
            value,
            runtime_ms,
            memory_bytes,
            repetitions,
            "Benchmark completed"
        );

        Ok(BenchmarkRun {
            result,
            predictions,
            samples,
        })
    }

    /// Benchmark several models on the same case and rank them.
    ///
    /// Models run one after another with the configured repetition count.
    /// The first failure aborts the comparison and names the failing model.
    pub fn compare_models<I, P>(
        &mut self,
        models: Vec<CandidateModel<'_, I, P>>,
        case: &BenchmarkCase,
        inputs: &[I],
        expected_outputs: &[P],
    ) -> Result<Comparison>
    where
        P: Outcome,
    {
        let repetitions = self.config.repetitions;
        let mut results = Vec::with_capacity(models.len());

        for mut candidate in models {
            let run = self
                .benchmark_model(
                    &candidate.name,
                    &candidate.version,
                    case,
                    &mut candidate.function,
                    inputs,
                    expected_outputs,
                    repetitions,
                )
                .map_err(|e| {
                    tracing::error!(model = %candidate.name, category = e.category(), "Comparison aborted: {}", e);
                    BenchError::ModelFailed {
                        model: candidate.name.clone(),
                        source: Box::new(e),
                    }
                })?;
            results.push(run.result);
        }

        Ok(Comparison::rank(results))
    }

    /// Fresh creation instant, strictly later than any previous one from
    /// this runner, truncated to microseconds so every backend stores it
    /// without loss
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now().trunc_subsecs(6);
        let timestamp = match self.last_timestamp {
            Some(last) if now <= last => last + chrono::Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(timestamp);
        timestamp
    }
}

fn mean_runtime_ms(samples: &[RepetitionSample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let total: f64 = samples.iter().map(|s| s.elapsed.as_secs_f64() * 1000.0).sum();
    total / samples.len() as f64
}

fn peak_memory_bytes(samples: &[RepetitionSample]) -> u64 {
    let peak = samples.iter().map(|s| s.memory_delta).max().unwrap_or(0);
    if peak < 0 {
        tracing::warn!(peak, "Resident memory shrank during every repetition, reporting zero");
    }
    u64::try_from(peak).unwrap_or(0)
}
