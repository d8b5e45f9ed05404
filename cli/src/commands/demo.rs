//! Toy models on a doubling task, saved and compared end to end

use crate::error::Result;
use crate::output::OutputManager;
use clap::Args;
use modelbench::report::leaderboard;
use modelbench::{
    open_backend, BenchConfig, BenchmarkCase, BenchmarkRunner, CandidateModel, DatasetMetadata, ModelMetadata,
    QueryFilters, RunnerConfig,
};
use std::thread;
use std::time::Duration;

const TASK: &str = "basic-math";
const DATASET: &str = "test-numbers";
const VERSION: &str = "0.1.0";

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Repetitions per model (defaults to the configured value)
    #[arg(long, short)]
    pub repetitions: Option<usize>,

    /// Number of inputs used in the comparison
    #[arg(long, default_value = "20")]
    pub items: i64,
}

fn doubler(inputs: &[i64]) -> anyhow::Result<Vec<i64>> {
    thread::sleep(Duration::from_millis(10));
    Ok(inputs.iter().map(|x| x * 2).collect())
}

fn add_five(inputs: &[i64]) -> anyhow::Result<Vec<i64>> {
    thread::sleep(Duration::from_millis(20));
    Ok(inputs.iter().map(|x| x + 5).collect())
}

// Off by one on every fifth input.
fn noisy_doubler(inputs: &[i64]) -> anyhow::Result<Vec<i64>> {
    thread::sleep(Duration::from_millis(15));
    Ok(inputs
        .iter()
        .map(|x| if x % 5 == 0 { x * 2 + 1 } else { x * 2 })
        .collect())
}

fn doubling_task(items: i64) -> (Vec<i64>, Vec<i64>) {
    let inputs: Vec<i64> = (1..=items).collect();
    let expected = inputs.iter().map(|x| x * 2).collect();
    (inputs, expected)
}

pub fn run(args: DemoArgs, config: &BenchConfig, output: &OutputManager) -> Result<()> {
    let runner_config = RunnerConfig {
        repetitions: args.repetitions.unwrap_or(config.runner.repetitions),
    };
    let mut runner = BenchmarkRunner::new(runner_config);
    let case = BenchmarkCase::new(TASK, DATASET, "accuracy");

    let mut backend = open_backend(&config.storage)?;
    backend.initialize_schema()?;

    backend.save_dataset_metadata(
        &DatasetMetadata::new(DATASET, TASK)
            .with_citation("Integers 1..n paired with their doubles")
            .with_metrics(["accuracy"]),
    )?;

    // Single model first
    let (inputs, expected) = doubling_task(10);
    let repetitions = runner.config().repetitions;
    let single = runner.benchmark_model("dummy-model", VERSION, &case, doubler, &inputs, &expected, repetitions)?;
    backend.save_model_metadata(
        &ModelMetadata::new("dummy-model", VERSION, "lookup")
            .with_param_count(10)
            .with_source_url("https://example.com/dummy-model"),
    )?;
    backend.save_result(&single.result)?;

    if !output.is_json() {
        output.print_success(&format!(
            "Benchmarked {} v{}: {}={:.2}, runtime {:.2} ms",
            single.result.model_name,
            single.result.model_version,
            single.result.metric,
            single.result.value,
            single.result.runtime_ms
        ))?;
    }

    // Then the comparison
    let (inputs, expected) = doubling_task(args.items);
    let candidates = vec![
        CandidateModel::new("dummy-model-1", VERSION, doubler),
        CandidateModel::new("dummy-model-2", VERSION, add_five),
        CandidateModel::new("dummy-model-3", VERSION, noisy_doubler),
    ];
    let comparison = runner.compare_models(candidates, &case, &inputs, &expected)?;

    for (name, params) in [("dummy-model-1", 10), ("dummy-model-2", 15), ("dummy-model-3", 12)] {
        backend.save_model_metadata(
            &ModelMetadata::new(name, VERSION, "lookup")
                .with_param_count(params)
                .with_source_url(format!("https://example.com/{}", name)),
        )?;
    }
    for result in &comparison.by_score {
        backend.save_result(result)?;
    }

    let stored = backend.query_results(&QueryFilters::new().task_type(TASK).metric("accuracy"))?;
    let board = leaderboard(&stored, 5);
    backend.close()?;

    if output.is_json() {
        return output.print_json(&serde_json::json!({
            "single": single.result,
            "comparison": comparison,
            "leaderboard": board,
        }));
    }

    output.print_comparison(&comparison)?;
    output.print_leaderboard(&format!("Top models for '{}'", TASK), &board)?;
    output.print_info(&format!(
        "Saved {} result(s) to the {} backend",
        comparison.by_score.len() + 1,
        config.storage.backend
    ))?;
    Ok(())
}
