//! Kolosal Tuner CLI Module
//!
//! Command-line driver: load a cleaned dataset, tune one model family and
//! print (optionally save) the resulting report.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::data::load_data;
use crate::optimizer::{ParameterSpec, SamplerType};
use crate::training::{ModelCatalog, TaskType};
use crate::tuner::{TunerConfig, TuningOrchestrator};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "kolosal-tune")]
#[command(author = "KolosalAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cross-validated hyperparameter tuning for tabular models")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Tune one model family on a cleaned dataset
    Tune {
        /// Input data file (CSV, JSON, or Parquet)
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,

        /// Model family key (see `families`)
        #[arg(short, long)]
        model: String,

        /// Task type (classification, regression)
        #[arg(long, default_value = "classification")]
        task: String,

        /// Number of trials
        #[arg(long, default_value = "5")]
        trials: usize,

        /// Trials evaluated concurrently
        #[arg(short, long, default_value = "1")]
        jobs: usize,

        /// Sampler seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Use uniform random sampling instead of TPE
        #[arg(long)]
        random: bool,

        /// JSON file overriding the family's parameter space
        #[arg(long)]
        params: Option<PathBuf>,

        /// Write the JSON report here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the built-in model families and their parameter spaces
    Families {
        /// Only families for this task
        #[arg(long)]
        task: Option<String>,
    },
}

/// Arguments of the `tune` command
pub struct TuneArgs<'a> {
    pub data: &'a Path,
    pub target: &'a str,
    pub model: &'a str,
    pub task: &'a str,
    pub trials: usize,
    pub jobs: usize,
    pub seed: u64,
    pub random: bool,
    pub params: Option<&'a Path>,
    pub output: Option<&'a Path>,
}

// ─── Commands ──────────────────────────────────────────────────────────────────

/// Run the `tune` command. Returns `false` when tuning produced no result.
pub fn cmd_tune(args: TuneArgs<'_>) -> anyhow::Result<bool> {
    section("Tune");

    let task: TaskType = args.task.parse()?;

    step_run("Loading data");
    let start = Instant::now();
    let df = load_data(args.data)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    let mut catalog = ModelCatalog::builtin();
    if let Some(path) = args.params {
        let spec = ParameterSpec::from_json_str(&std::fs::read_to_string(path)?)?;
        catalog = catalog.with_spec(args.model, spec)?;
    }

    let mut config = TunerConfig::new()
        .with_n_trials(args.trials)
        .with_n_jobs(args.jobs)
        .with_random_state(Some(args.seed));
    if args.random {
        config.optimization.sampler = SamplerType::Random;
    }

    step_run(&format!("Tuning {} ({} trials)", args.model.cyan(), args.trials));
    let start = Instant::now();
    let Some(outcome) = TuningOrchestrator::new(config).tune(&df, args.target, args.model, &catalog, task) else {
        println!("{}", "failed".red());
        println!();
        println!("  {}", "No result: see the log for the cause".yellow());
        println!();
        return Ok(false);
    };
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    println!("  {:<16} {}", muted("CV score"), format!("{:.4}", outcome.best_score).white().bold());
    println!("  {:<16} {}", muted("Folds"), outcome.n_folds.to_string().white());
    for (name, value) in &outcome.best_params {
        println!("  {:<16} {}", muted(name), value.to_string().white());
    }
    println!();
    for (name, value) in &outcome.metrics {
        println!("  {:<16} {}", muted(name), format!("{:.4}", value).white());
    }
    println!();

    if let Some(path) = args.output {
        step_run(&format!("Saving → {}", path.display()));
        outcome.report().save_json(path)?;
        step_done("");
    }

    Ok(true)
}

/// Run the `families` command
pub fn cmd_families(task: Option<&str>) -> anyhow::Result<()> {
    section("Model families");

    let task: Option<TaskType> = task.map(str::parse).transpose()?;
    let catalog = ModelCatalog::builtin();

    for (key, family) in catalog.iter() {
        if task.map_or(false, |t| t != family.task_type()) {
            continue;
        }
        println!("  {} {}", key.white().bold(), dim(&format!("({})", family.task_type())));
        for (name, decl) in family.spec.iter() {
            for (kind, args) in decl {
                println!("    {:<20} {} {}", muted(name), accent(kind), args);
            }
        }
    }
    println!();
    Ok(())
}
