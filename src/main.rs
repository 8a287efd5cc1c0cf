//! Kolosal Tuner - Main Entry Point

use clap::Parser;
use kolosal_tuner::cli::{cmd_families, cmd_tune, Cli, Commands, TuneArgs};
use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kolosal_tuner=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Tune { data, target, model, task, trials, jobs, seed, random, params, output } => {
            let tuned = cmd_tune(TuneArgs {
                data: &data,
                target: &target,
                model: &model,
                task: &task,
                trials,
                jobs,
                seed,
                random,
                params: params.as_deref(),
                output: output.as_deref(),
            })?;
            if !tuned {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Families { task } => {
            cmd_families(task.as_deref())?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
