//! # TravelRAG CLI (`travelrag`)
//!
//! Collects travel articles, builds the retrieval index, and answers
//! questions from the command line or through the web interface.
//!
//! ## Usage
//!
//! ```bash
//! travelrag --config ./config/travelrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `travelrag collect` | Download the configured Wikipedia and Wikivoyage articles |
//! | `travelrag status` | Check data, embedding, API key, and index cache |
//! | `travelrag chunks` | Show per-article chunk counts and chunk size statistics |
//! | `travelrag index` | Build the index and write the cache |
//! | `travelrag search "<q>"` | Show the chunks retrieved for a query |
//! | `travelrag ask "<q>"` | Answer a question with cited sources |
//! | `travelrag serve` | Start the web interface |
//!
//! Diagnostics are logged to stderr; set `RUST_LOG=travelrag=debug` for more.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use travelrag::config::{self, Config};
use travelrag::progress::ProgressMode;
use travelrag::rag::RagEngine;
use travelrag::{collector, search, server, stats, status};

/// TravelRAG: ask travel questions answered from Wikipedia and Wikivoyage.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/travelrag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "travelrag",
    about = "TravelRAG: retrieval-augmented travel question answering",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/travelrag.toml")]
    config: PathBuf,

    /// Progress output on stderr. Defaults to human on a TTY, off otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download travel articles into the data directory.
    ///
    /// Fetches every title listed under `[collector]` from the MediaWiki
    /// API, one request at a time with a polite delay between requests.
    Collect,

    /// Check that everything needed to answer questions is in place.
    Status,

    /// Chunk the corpus and print statistics without embedding anything.
    Chunks,

    /// Build the vector index and save it to the cache.
    Index {
        /// Ignore an up-to-date cache and re-embed every chunk.
        #[arg(long)]
        rebuild: bool,
    },

    /// Show the chunks retrieved for a query, without calling the model.
    Search {
        /// The search query string.
        query: String,

        /// Number of chunks to retrieve.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Answer a travel question with cited sources.
    Ask {
        /// The question to answer.
        question: String,

        /// Number of chunks to retrieve as context.
        #[arg(long)]
        top_k: Option<usize>,

        /// Print the answer and sources as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start the web interface.
    Serve {
        /// Override `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },
}

/// Load the config file, or fall back to defaults when it does not exist.
fn load_or_default(path: &Path) -> anyhow::Result<(Config, bool)> {
    if path.exists() {
        Ok((config::load_config(path)?, true))
    } else {
        tracing::debug!("{} not found, using defaults", path.display());
        Ok((Config::minimal(), false))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "travelrag=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let progress = cli
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    // Commands that can run on defaults
    match &cli.command {
        Commands::Status => {
            let (cfg, found) = load_or_default(&cli.config)?;
            return status::run_status(&cfg, &cli.config, found);
        }
        Commands::Collect => {
            let (cfg, _) = load_or_default(&cli.config)?;
            return collector::run_collect(&cfg, progress.as_ref()).await;
        }
        Commands::Chunks => {
            let (cfg, _) = load_or_default(&cli.config)?;
            return stats::run_chunks(&cfg);
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Index { rebuild } => {
            search::run_index(&cfg, rebuild, progress.as_ref()).await?;
        }
        Commands::Search { query, top_k } => {
            search::run_search(&cfg, &query, top_k, progress.as_ref()).await?;
        }
        Commands::Ask {
            question,
            top_k,
            json,
        } => {
            search::run_ask(&cfg, &cli.config, &question, top_k, json, progress.as_ref()).await?;
        }
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| cfg.server.bind.clone());
            let engine = RagEngine::from_config(&cfg, &cli.config, progress.as_ref()).await?;
            server::run_server(&bind, Arc::new(engine)).await?;
        }
        Commands::Status | Commands::Collect | Commands::Chunks => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
