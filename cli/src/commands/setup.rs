use crate::error::Result;
use crate::output::OutputManager;
use clap::Args;
use modelbench::{open_backend, BenchConfig};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Also write the effective configuration to this file
    #[arg(long, value_name = "FILE")]
    pub write_config: Option<PathBuf>,
}

pub fn run(args: SetupArgs, config: &BenchConfig, output: &OutputManager) -> Result<()> {
    let storage = &config.storage;

    let mut backend = open_backend(storage)?;
    backend.initialize_schema()?;
    backend.close()?;

    if let Some(path) = &args.write_config {
        config.save_to_file(path)?;
        tracing::info!("Wrote configuration to {}", path.display());
    }

    if output.is_json() {
        return output.print_key_values(&[
            ("backend", storage.backend.to_string()),
            ("path", storage.path.display().to_string()),
            ("database", storage.database.clone()),
            ("status", "ready".to_string()),
        ]);
    }

    output.print_success(&format!("{} schema is ready", storage.backend))?;
    output.print_key_values(&[
        ("Backend", storage.backend.to_string()),
        ("Path", storage.path.display().to_string()),
        ("Database", storage.database.clone()),
    ])?;
    if let Some(path) = &args.write_config {
        output.print_info(&format!("Configuration saved to {}", path.display()))?;
    }
    Ok(())
}
