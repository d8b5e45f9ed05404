use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod error;
mod output;

use commands::*;
use error::Result;
use modelbench::config::LoggingConfig;
use modelbench::{BackendKind, BenchConfig};
use output::{OutputFormat, OutputManager};

#[derive(Parser)]
#[command(name = "benchctl")]
#[command(about = "ModelBench CLI - Run model benchmarks and query stored results")]
#[command(version)]
#[command(long_about = "
ModelBench CLI (benchctl) benchmarks model-inference functions and stores the
results in a row store (SQLite), a columnar store (Parquet) or a time-series
store (LMDB).

Examples:
  benchctl setup                                  # Create the schema
  benchctl demo                                   # Run the toy comparison
  benchctl query --model dummy-model-1 --limit 5  # Latest results of one model
  benchctl top --task basic-math                  # Leaderboard for a task
  benchctl --backend columnar setup               # Use the Parquet backend
")]
struct Cli {
    /// Storage backend (overrides config file)
    #[arg(long, global = true)]
    backend: Option<BackendKind>,

    /// Storage directory (overrides config file)
    #[arg(long, global = true, value_name = "DIR")]
    path: Option<PathBuf>,

    /// Database name (overrides config file)
    #[arg(long, global = true)]
    database: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    format: OutputFormatArg,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Configuration file path
    #[arg(long, global = true, env = "MODELBENCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OutputFormatArg {
    Table,
    Json,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Table => OutputFormat::Table,
            OutputFormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create the storage schema for the configured backend
    Setup(SetupArgs),

    /// Benchmark and compare three toy models on a doubling task
    Demo(DemoArgs),

    /// List stored benchmark results
    Query(QueryArgs),

    /// Show the best models for a task and metric
    Top(TopArgs),
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run_command(cli) {
        let error_msg = error::format_error(&e);
        eprintln!("{}", error_msg);
        process::exit(e.exit_code());
    }
}

fn run_command(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    init_logging(&cli, &config.logging);

    tracing::info!(
        backend = %config.storage.backend,
        path = %config.storage.path.display(),
        "ModelBench CLI started"
    );

    let colored = !cli.no_color && !cli.quiet && console::Term::stdout().features().colors_supported();
    let output = OutputManager::new(OutputFormat::from(cli.format), colored);

    match cli.command {
        Commands::Setup(args) => commands::setup::run(args, &config, &output),
        Commands::Demo(args) => commands::demo::run(args, &config, &output),
        Commands::Query(args) => commands::query::run(args, &config, &output),
        Commands::Top(args) => commands::top::run(args, &config, &output),
    }
}

/// Config file, then `MODELBENCH_*` variables, then command-line flags
fn load_config(cli: &Cli) -> Result<BenchConfig> {
    let path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => BenchConfig::default_config_path().ok(),
    };

    let mut config = BenchConfig::load_with_fallback(path)?;

    if let Some(backend) = cli.backend {
        config.storage.backend = backend;
    }
    if let Some(path) = &cli.path {
        config.storage.path = path.clone();
    }
    if let Some(database) = &cli.database {
        config.storage.database = database.clone();
    }

    config.validate()?;
    Ok(config)
}

fn init_logging(cli: &Cli, logging: &LoggingConfig) {
    // Flags win over the configured level
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        logging.level.as_str()
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("benchctl={level},modelbench={level}", level = log_level).into());

    let json = cli.json_logs || logging.json;
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();
}
