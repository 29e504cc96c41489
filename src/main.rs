//! # Query Harness CLI (`qh`)
//!
//! ```bash
//! qh --config ./config/qh.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `qh init` | Create the index database and run migrations |
//! | `qh catalog import <file>` | Load schema records from a JSON array and embed them |
//! | `qh catalog stats` | Record and vector counts |
//! | `qh retrieve "<question>"` | Ranked table or document contexts for a question |
//! | `qh correct --sql "<raw>" --tables <ids>` | Run the correction pipeline over known tables |
//! | `qh check "<sql>"` | Read-only safety gate |
//! | `qh ask "<question>"` | Retrieval, generation and correction end to end |
//!
//! Logs go to stderr, filtered by `RUST_LOG` (default `warn`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use query_harness::{ask, catalog, config, correct, migrate, retrieve};

/// Query Harness: ground and repair generated SQL against a schema catalog.
#[derive(Parser)]
#[command(
    name = "qh",
    about = "Query Harness — ground and repair LLM-generated SQL against a retrieved schema catalog",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/qh.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the index database. Safe to run repeatedly.
    Init,

    /// Manage the schema catalog.
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Show the contexts retrieval picks for a question.
    Retrieve {
        question: String,

        /// Candidates requested from the classifier and the index.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Correct a raw model reply against tables from the index.
    Correct {
        /// Raw model output (may contain prose and code fences).
        #[arg(long)]
        sql: String,

        /// Comma-separated table ids, most relevant first.
        #[arg(long, value_delimiter = ',')]
        tables: Vec<String>,

        /// Fail on identifiers that resolve to no known column.
        #[arg(long)]
        validate: bool,
    },

    /// Check that a statement is read-only.
    Check { sql: String },

    /// Answer a question: SQL for tables, prose for documents.
    Ask {
        question: String,

        /// Also ask the model to explain the corrected SQL.
        #[arg(long)]
        explain: bool,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// Import records from a JSON array file.
    Import { file: PathBuf },
    /// Print record and vector counts.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Commands that don't require config
    let cfg = match &cli.command {
        Commands::Check { sql } => return correct::run_check(sql),
        _ => config::load_config(&cli.config)?,
    };

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Index initialized successfully.");
        }
        Commands::Catalog { action } => match action {
            CatalogAction::Import { file } => {
                catalog::run_import(&cfg, &file).await?;
            }
            CatalogAction::Stats => {
                catalog::run_stats(&cfg).await?;
            }
        },
        Commands::Retrieve { question, top_k } => {
            retrieve::run_retrieve(&cfg, &question, top_k).await?;
        }
        Commands::Correct {
            sql,
            tables,
            validate,
        } => {
            correct::run_correct(&cfg, &sql, &tables, validate).await?;
        }
        Commands::Check { sql } => {
            correct::run_check(&sql)?;
        }
        Commands::Ask { question, explain } => {
            ask::run_ask(&cfg, &question, explain).await?;
        }
    }

    Ok(())
}
