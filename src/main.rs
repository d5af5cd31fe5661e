//! # Thread Harvest CLI (`harvest`)
//!
//! ## Usage
//!
//! ```bash
//! harvest --config ./config/harvest.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `harvest run` | Acquire, index, and search (each stage skipped when cached) |
//! | `harvest answer` | Compose an answer from an existing run's search results |
//! | `harvest runs` | List runs and which artifacts they hold |
//! | `harvest results <run-id>` | Show the search results stored in a run |
//! | `harvest serve` | Start the HTTP entry point |
//!
//! ## Examples
//!
//! ```bash
//! harvest run --scope Atlanta --topic Restaurants \
//!     --query "What are the top restaurants people are recommending and why?" --answer
//!
//! harvest results atlanta_restaurants-3f2a9c1b7d4e
//! ```
//!
//! Logs go to stderr (`RUST_LOG` overrides the default `thread_harvest=info`);
//! results go to stdout.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use thread_harvest::answer::{create_model, AnswerComposer};
use thread_harvest::config::{self, Config};
use thread_harvest::pipeline::{Pipeline, RunOutcome, RunRequest};
use thread_harvest::retrieve::load_search_artifact;
use thread_harvest::run_store::{search_artifacts, RunStore};
use thread_harvest::server;

/// Thread Harvest: collect community discussions on a topic, index them,
/// and answer questions from them.
#[derive(Parser)]
#[command(name = "harvest", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/harvest.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline for a scope, topic and query.
    ///
    /// Stages whose artifacts already exist in the run directory are
    /// skipped, so repeating a command is cheap.
    Run {
        /// Community-matching search term (e.g. a city).
        #[arg(long)]
        scope: String,

        /// Within-community search term.
        #[arg(long)]
        topic: String,

        /// Natural-language question to search for.
        #[arg(long)]
        query: String,

        /// Maximum communities, and maximum posts per community.
        #[arg(long)]
        limit: Option<usize>,

        /// Number of results to retrieve.
        #[arg(long)]
        top_k: Option<usize>,

        /// Vector index name (defaults to `[index].name`).
        #[arg(long)]
        index_name: Option<String>,

        /// Use this run id instead of deriving one.
        #[arg(long)]
        run_id: Option<String>,

        /// Also compose an answer with the configured model.
        #[arg(long)]
        answer: bool,
    },

    /// Compose an answer from a run's stored search results.
    Answer {
        #[arg(long)]
        run_id: String,

        /// The query the results were retrieved for.
        #[arg(long)]
        query: String,
    },

    /// List runs and their artifacts.
    Runs,

    /// Show the search results stored in a run.
    Results {
        run_id: String,

        /// Hits to show per search.
        #[arg(long, default_value_t = 5)]
        top: usize,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("thread_harvest=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Run {
            scope,
            topic,
            query,
            limit,
            top_k,
            index_name,
            run_id,
            answer,
        } => {
            let pipeline = Pipeline::from_config(&cfg)?;
            let request = RunRequest {
                scope,
                topic,
                query,
                limit,
                top_k,
                index_name,
                run_id,
                answer,
            };
            let outcome = pipeline.run(request).await?;
            print_outcome(&outcome);
        }
        Commands::Answer { run_id, query } => {
            run_answer(&cfg, &run_id, &query).await?;
        }
        Commands::Runs => {
            list_runs(&cfg)?;
        }
        Commands::Results { run_id, top } => {
            show_results(&cfg, &run_id, top)?;
        }
        Commands::Serve => {
            let pipeline = Pipeline::from_config(&cfg)?;
            server::run_server(pipeline).await?;
        }
    }

    Ok(())
}

fn print_outcome(outcome: &RunOutcome) {
    let stages = &outcome.stages;
    println!("run {}", outcome.run_id);
    println!("  status: {}", outcome.status_message);
    println!("  results: {}", outcome.result_artifact_path.display());
    match stages.records_acquired {
        Some(n) => println!("  acquired: {} records", n),
        None => println!("  acquired: reused"),
    }
    println!("  indexed: {}", if stages.indexed { "yes" } else { "reused" });
    println!("  searched: {}", if stages.searched { "yes" } else { "reused" });
    if let Some(answer) = &outcome.answer {
        println!();
        println!("{}", answer);
    }
}

async fn run_answer(cfg: &Config, run_id: &str, query: &str) -> anyhow::Result<()> {
    let model = create_model(&cfg.answer)?
        .context("answers are disabled; set [answer] provider in config")?;
    let handle = RunStore::new(&cfg.runs.root).open(run_id)?;
    let composer = AnswerComposer::new(model, cfg.runs.search_cache, cfg.answer.max_context_chars);
    let answer = composer.compose(query, &handle, &cfg.answer.model).await?;
    println!("{}", answer);
    Ok(())
}

fn list_runs(cfg: &Config) -> anyhow::Result<()> {
    let runs = RunStore::new(&cfg.runs.root).list_runs()?;
    if runs.is_empty() {
        println!("No runs.");
        return Ok(());
    }

    println!("{:<40} {:<5} {:<7} SEARCHES", "RUN", "RAW", "INDEXED");
    for run in runs {
        println!(
            "{:<40} {:<5} {:<7} {}",
            run.id, run.raw_artifact, run.index_built, run.search_artifacts
        );
    }
    Ok(())
}

fn show_results(cfg: &Config, run_id: &str, top: usize) -> anyhow::Result<()> {
    let handle = RunStore::new(&cfg.runs.root).open(run_id)?;
    let paths = search_artifacts(&handle)?;
    if paths.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for path in paths {
        let artifact = load_search_artifact(&path)?;
        println!("query: {}", artifact.query);
        println!("  index: {}  hits: {}  at: {}", artifact.index_name, artifact.hits.len(), artifact.created_at);
        for (i, hit) in artifact.hits.iter().take(top).enumerate() {
            let subreddit = hit
                .metadata
                .get("subreddit")
                .and_then(|v| v.as_str())
                .unwrap_or("-");
            let snippet: String = hit.text.chars().take(100).collect();
            println!("  {}. [{:.3}] {} r/{}  {}", i + 1, hit.score, hit.id, subreddit, snippet);
        }
    }
    Ok(())
}
