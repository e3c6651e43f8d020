//! Exoplanet classifier entry point
//!
//! Runs a subcommand, or the interactive launcher when none is given.

use clap::Parser;
use exoplanet_classifier::cli::{
    cmd_diagnose, cmd_generate, cmd_interactive, cmd_predict, cmd_serve, cmd_train, cmd_validate, Cli, Commands,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "exoplanet=info,exoplanet_classifier=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Train { data, samples, seed, models_dir, fast }) => {
            cmd_train(data.as_deref(), samples, seed, &models_dir, fast)?;
        }
        Some(Commands::Predict { models_dir, data, observation, output }) => {
            cmd_predict(&models_dir, data.as_deref(), observation.as_deref(), output.as_deref())?;
        }
        Some(Commands::Diagnose { models_dir, observation, json }) => {
            cmd_diagnose(&models_dir, &observation, json)?;
        }
        Some(Commands::Validate { data, samples, seed, folds, fast, output }) => {
            cmd_validate(data.as_deref(), samples, seed, folds, fast, output.as_deref())?;
        }
        Some(Commands::Generate { output, samples, seed, no_reference }) => {
            cmd_generate(&output, samples, seed, no_reference)?;
        }
        Some(Commands::Serve { port, host, models_dir, no_train, fast }) => {
            cmd_serve(host, port, models_dir, no_train, fast).await?;
        }
        None => {
            cmd_interactive().await?;
        }
    }

    Ok(())
}
