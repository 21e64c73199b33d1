//! sysrev CLI — run a systematic-review pipeline from the command line.
//!
//! Takes one positional research question, loads configuration and
//! credentials, runs the pipeline, and renders the final report. Exits
//! non-zero only for configuration errors and stage-level failures;
//! item-scoped failures are listed in the report and do not affect the
//! exit code.

mod report;

use clap::Parser;
use std::path::PathBuf;
use sysrev_core::{
    Credentials, Criterion, CrossrefClient, GeminiClient, PipelineOrchestrator, ResearchQuestion,
};
use tracing_subscriber::EnvFilter;

/// Systematic literature review: search, screen, link, and synthesize.
#[derive(Parser, Debug)]
#[command(name = "sysrev", version, about, long_about = None)]
struct Cli {
    /// The research question to review
    question: String,

    /// Configuration file path (defaults to ./sysrev.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cap on total retrieved candidates
    #[arg(long)]
    max_results: Option<usize>,

    /// Whole-run deadline in seconds
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Require a publication year of at least this (prepended to the
    /// configured criteria)
    #[arg(long)]
    min_year: Option<i32>,

    /// Print the report as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let mut config = sysrev_core::load_config(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Configuration error: {e}"))?;

    if let Some(max_results) = cli.max_results {
        config.pipeline.max_results = max_results;
    }
    if let Some(deadline_secs) = cli.deadline_secs {
        config.pipeline.deadline_secs = Some(deadline_secs);
    }
    if let Some(year) = cli.min_year {
        config
            .prescreen
            .criteria
            .insert(0, Criterion::MinYear { year });
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration error: {e}"))?;

    // Credentials are resolved once, before any network call.
    let credentials =
        Credentials::from_env().map_err(|e| anyhow::anyhow!("Configuration error: {e}"))?;

    let search = CrossrefClient::new(&config.search, config.retry.clone(), &credentials)
        .map_err(|e| anyhow::anyhow!("Failed to build search client: {e}"))?;
    let model = GeminiClient::new(&config.llm, config.retry.clone(), &credentials)
        .map_err(|e| anyhow::anyhow!("Failed to build model client: {e}"))?;

    let question = ResearchQuestion::new(cli.question);
    tracing::debug!(keywords = ?question.keywords(), "Derived keyword phrases");
    if !cli.quiet {
        eprintln!("Question: {}", question.raw());
        eprintln!("Search query: {}", question.boolean_query());
    }

    let orchestrator = PipelineOrchestrator::new(&config, &search, &model);
    let pipeline_report = orchestrator
        .run(&question)
        .await
        .map_err(|e| anyhow::anyhow!("Run failed: {e}"))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&pipeline_report)?);
    } else {
        print!("{}", report::render(&pipeline_report));
    }

    Ok(())
}
