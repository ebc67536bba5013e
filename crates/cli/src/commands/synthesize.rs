//! Synthesize CLI command.
//!
//! Writes the seeded synthetic observation table so it can be inspected or
//! fed back through `run` with a CSV input.

use anyhow::{Context, Result};
use clap::Args;
use orderflow_validator_core::ConfigLoader;
use orderflow_validator_data::synthetic::{DEFAULT_ROWS, DEFAULT_SEED};
use orderflow_validator_data::{generate_dataset, CsvStorage};
use std::path::PathBuf;

/// Arguments for the synthesize command.
#[derive(Args, Debug, Clone)]
pub struct SynthesizeArgs {
    /// Output CSV path
    #[arg(short, long)]
    pub output: PathBuf,

    /// Number of rows (default: 1200)
    #[arg(long, default_value_t = DEFAULT_ROWS)]
    pub rows: usize,

    /// Random seed (default: 7)
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Scene whitelist used to draw scene labels
    #[arg(long, default_value = "config/scenes_whitelist.toml")]
    pub scenes: PathBuf,
}

/// Runs the synthesize command.
///
/// # Errors
/// Returns an error if the scene list cannot be read or the CSV cannot be
/// written.
pub fn run_synthesize(args: SynthesizeArgs) -> Result<()> {
    let universe = ConfigLoader::load_scene_universe(&args.scenes)
        .with_context(|| format!("Failed to load scenes from {}", args.scenes.display()))?;
    let table = generate_dataset(args.rows, args.seed, &universe)
        .context("Failed to generate synthetic observations")?;

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    CsvStorage::write_observations(&args.output, &table)?;

    tracing::info!(
        rows = table.len(),
        seed = args.seed,
        "Wrote synthetic observations to {}",
        args.output.display()
    );
    println!("{}", args.output.display());
    Ok(())
}
