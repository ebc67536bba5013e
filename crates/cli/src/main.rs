use clap::{Parser, Subcommand};

mod commands;

use commands::{RunArgs, SynthesizeArgs};

#[derive(Parser)]
#[command(name = "of-validator")]
#[command(about = "Statistical validation of order-flow indicator scenes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the validator and write the artifact set
    Run(RunArgs),
    /// Write a seeded synthetic observation table as CSV
    Synthesize(SynthesizeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Run(args) => {
            commands::run_validator(args).await?;
        }
        Commands::Synthesize(args) => {
            commands::run_synthesize(args)?;
        }
    }

    Ok(())
}
