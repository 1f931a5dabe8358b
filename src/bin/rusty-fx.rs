//! rusty-fx CLI - daily exchange-rate pipeline
//!
//! Every stage can run on its own and reads the latest artifact of the
//! previous layer, or `run` drives all of them in order.
//!
//! ## Example Usage
//!
//! ```bash
//! # Capture today's raw rates
//! rusty-fx collect
//!
//! # Normalize and aggregate the latest capture
//! rusty-fx silver && rusty-fx gold
//!
//! # Compare with yesterday, write the chart and print a narrative
//! rusty-fx report
//!
//! # Everything at once
//! rusty-fx run --verbose
//! ```
//!
//! Exit status: `0` on success (a degraded report included), `2` when a stage
//! had nothing to do, `1` on any fatal error.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rusty_fx::config::PipelineConfig;
use rusty_fx::data::{ExchangeRateApiSource, FsArtifactStore};
use rusty_fx::engine::{PipelineEngine, PipelineRun, RunState};
use rusty_fx::pipeline::{markdown_table, ComparisonReport, GeminiClient, StageOutcome};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

const EXIT_OK: i32 = 0;
const EXIT_FAILURE: i32 = 1;
const EXIT_NOTHING_TO_DO: i32 = 2;

/// rusty-fx: daily exchange-rate capture, refinement and reporting
#[derive(Parser)]
#[command(name = "rusty-fx")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Robert Fall")]
#[command(about = "Daily exchange-rate pipeline: bronze, silver, gold and report", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Run date (YYYY-MM-DD, default: today)
    #[arg(short, long, global = true)]
    date: Option<NaiveDate>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture the latest rates into the bronze layer
    Collect,

    /// Normalize the latest bronze capture into a silver table
    Silver,

    /// Aggregate the latest silver table into a gold snapshot
    Gold,

    /// Compare today's gold snapshot with yesterday's and write the chart
    Report,

    /// Ask for business insights on the latest gold snapshot
    Enrich,

    /// Show the first rows and schema of the latest gold snapshot
    Inspect,

    /// Run every stage in order
    Run,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match execute(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            EXIT_FAILURE
        }
    };
    process::exit(code);
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn execute(cli: Cli) -> Result<i32> {
    let config = PipelineConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config
        .ensure_dirs()
        .context("Failed to create data directories")?;

    let date = cli.date.unwrap_or_else(|| Local::now().date_naive());
    if cli.verbose {
        println!(
            "{} v{}",
            "rusty-fx".cyan().bold(),
            env!("CARGO_PKG_VERSION")
        );
        println!("Data dir: {}", config.data_dir.display().to_string().dimmed());
        println!("Run date: {}", date.to_string().dimmed());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let store = FsArtifactStore::from_config(&config);
    let engine = PipelineEngine::new(config, store);

    match cli.command {
        Commands::Collect => runtime.block_on(collect(&engine, date)),
        Commands::Silver => silver(&engine),
        Commands::Gold => gold(&engine),
        Commands::Report => runtime.block_on(report(&engine, date)),
        Commands::Enrich => runtime.block_on(enrich(&engine)),
        Commands::Inspect => inspect(&engine),
        Commands::Run => runtime.block_on(run_all(&engine, date)),
    }
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Exit status of a standalone stage: a skip means there was nothing to do
fn outcome_exit_code<T>(outcome: &StageOutcome<T>) -> i32 {
    match outcome {
        StageOutcome::Completed(_) => EXIT_OK,
        StageOutcome::Skipped(_) => EXIT_NOTHING_TO_DO,
    }
}

/// Exit status of an orchestrated run; only `Done` counts as success
fn run_exit_code(run: &PipelineRun) -> i32 {
    match run.state {
        RunState::Done => EXIT_OK,
        _ => EXIT_FAILURE,
    }
}

fn nothing_to_do<T>(outcome: &StageOutcome<T>) -> i32 {
    if let StageOutcome::Skipped(reason) = outcome {
        eprintln!("{} {}", "Nothing to do:".yellow().bold(), reason);
    }
    outcome_exit_code(outcome)
}

fn generator(engine: &PipelineEngine<FsArtifactStore>) -> Result<Option<GeminiClient>> {
    GeminiClient::from_config(&engine.config().llm).context("Failed to set up text-generation client")
}

async fn collect(engine: &PipelineEngine<FsArtifactStore>, date: NaiveDate) -> Result<i32> {
    let source = ExchangeRateApiSource::from_config(engine.config())?;
    let pb = spinner("Fetching latest rates...");
    let result = engine.collect(&source, date).await;
    pb.finish_and_clear();

    let output = result?;
    println!("{} Raw data saved to {}", "✓".green().bold(), output.location);
    Ok(EXIT_OK)
}

fn silver(engine: &PipelineEngine<FsArtifactStore>) -> Result<i32> {
    let outcome = engine.silver()?;
    if let StageOutcome::Completed(output) = &outcome {
        println!(
            "{} Normalized {} ({} rows kept, {} dropped) -> {}",
            "✓".green().bold(),
            output.key,
            output.stats.rows_kept(),
            output.stats.rows_dropped,
            output.location
        );
    }
    Ok(nothing_to_do(&outcome))
}

fn gold(engine: &PipelineEngine<FsArtifactStore>) -> Result<i32> {
    let outcome = engine.gold()?;
    if let StageOutcome::Completed(output) = &outcome {
        println!(
            "{} Aggregated {} -> {}",
            "✓".green().bold(),
            output.key,
            output.location
        );
        println!("  Columns: {}", output.snapshot.output_columns().join(", ").dimmed());
    }
    Ok(nothing_to_do(&outcome))
}

fn print_report(report: &ComparisonReport) {
    println!();
    println!("{}", format!("Exchange report {}", report.date).cyan().bold());
    println!("{}", "=========================".cyan());
    print!("{}", markdown_table(&report.body));
    println!();
    for warning in &report.warnings {
        println!("{} {}", "Warning:".yellow(), warning);
    }
    println!("Chart: {}", report.chart_path.display().to_string().bright_green());
}

fn print_narrative(title: &str, narrative: Option<&str>) {
    match narrative {
        Some(text) => {
            println!();
            println!("{}", title.green().bold());
            println!("{}", text.trim());
        }
        None => println!("{}", "Narrative unavailable".dimmed()),
    }
}

async fn report(engine: &PipelineEngine<FsArtifactStore>, date: NaiveDate) -> Result<i32> {
    let report = match engine.report(date)? {
        StageOutcome::Completed(report) => report,
        skipped => return Ok(nothing_to_do(&skipped)),
    };
    print_report(&report);

    let generator = generator(engine)?;
    let pb = spinner("Requesting narrative...");
    let narrative = engine.narrate(generator.as_ref(), &report).await;
    pb.finish_and_clear();
    print_narrative("Executive explanation", narrative.as_deref());
    Ok(EXIT_OK)
}

async fn enrich(engine: &PipelineEngine<FsArtifactStore>) -> Result<i32> {
    let generator = generator(engine)?;
    let pb = spinner("Requesting insights...");
    let outcome = engine.enrich(generator.as_ref()).await;
    pb.finish_and_clear();

    let outcome = outcome?;
    if let StageOutcome::Completed(insights) = &outcome {
        print_narrative("Insights", insights.as_deref());
    }
    Ok(nothing_to_do(&outcome))
}

fn inspect(engine: &PipelineEngine<FsArtifactStore>) -> Result<i32> {
    let (key, frame) = match engine.latest_gold_frame()? {
        StageOutcome::Completed(found) => found,
        skipped => return Ok(nothing_to_do(&skipped)),
    };

    println!("{}", format!("Gold snapshot {}", key).cyan().bold());
    println!("{}", frame.head(Some(5)));
    println!();
    println!("{}", "Schema".bold());
    for column in frame.get_columns() {
        println!("  {:<24} {}", column.name(), column.dtype().to_string().dimmed());
    }
    Ok(EXIT_OK)
}

fn print_run_summary(run: &PipelineRun) {
    let trail: Vec<String> = run.history.iter().map(|s| s.to_string()).collect();
    println!("Run {} ({}): {}", run.id, run.date, trail.join(" -> ").dimmed());
}

async fn run_all(engine: &PipelineEngine<FsArtifactStore>, date: NaiveDate) -> Result<i32> {
    let source = ExchangeRateApiSource::from_config(engine.config())?;
    let generator = generator(engine)?;

    let pb = spinner("Running pipeline...");
    let run = engine.run(&source, generator.as_ref(), date).await;
    pb.finish_and_clear();
    print_run_summary(&run);

    if let Some(report) = &run.report {
        print_report(report);
        print_narrative("Executive explanation", run.narrative.as_deref());
    }

    let code = run_exit_code(&run);
    if code == EXIT_OK {
        let status = if run.warnings.is_empty() {
            "completed".green().bold()
        } else {
            "completed with warnings".yellow().bold()
        };
        println!("{} Pipeline {}", "✓".green().bold(), status);
        return Ok(code);
    }

    match run.failure {
        Some(error) => Err(error).context(format!("Pipeline failed for {}", date)),
        None => anyhow::bail!("Pipeline stopped in state {}", run.state),
    }
}
