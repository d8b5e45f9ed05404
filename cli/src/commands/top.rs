use crate::error::Result;
use crate::output::OutputManager;
use clap::Args;
use modelbench::report::leaderboard;
use modelbench::{open_backend, BenchConfig, MetricKind, QueryFilters};

#[derive(Args, Debug)]
pub struct TopArgs {
    /// Task type to rank models on
    #[arg(long, short)]
    pub task: String,

    /// Metric to rank by
    #[arg(long, short, default_value = "accuracy")]
    pub metric: MetricKind,

    /// Restrict to a single dataset
    #[arg(long, short)]
    pub dataset: Option<String>,

    /// Number of models to show
    #[arg(long, short, default_value = "10")]
    pub limit: usize,
}

pub fn run(args: TopArgs, config: &BenchConfig, output: &OutputManager) -> Result<()> {
    let mut filters = QueryFilters::new().task_type(&args.task).metric(args.metric.as_str());
    if let Some(dataset) = &args.dataset {
        filters = filters.dataset(dataset);
    }

    let mut backend = open_backend(&config.storage)?;
    let results = backend.query_results(&filters)?;
    backend.close()?;

    let board = leaderboard(&results, args.limit);
    tracing::debug!(results = results.len(), models = board.len(), "Built leaderboard");

    output.print_leaderboard(
        &format!("Top models for '{}' by {}", args.task, args.metric),
        &board,
    )
}
