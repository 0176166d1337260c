//! llmtap CLI
//!
//! Read-only inspection of captured model calls

mod config;
mod render;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::{CliConfig, expand};
use llmtap_capture::{CallFilter, SqliteWriter};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "llmtap")]
#[command(about = "llmtap - Inspect captured LLM calls", long_about = None)]
struct Cli {
    /// Configuration file (YAML, or TOML by extension)
    #[arg(long, global = true, env = "LLMTAP_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database to read (overrides the configured path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List captured calls, newest first
    List {
        /// Only calls to this model (repeatable)
        #[arg(long = "model")]
        models: Vec<String>,

        /// Only calls with this finish reason (repeatable)
        #[arg(long = "finish-reason")]
        finish_reasons: Vec<String>,

        /// Only failed calls
        #[arg(long)]
        errors: bool,

        /// Only calls carrying this tag
        #[arg(long)]
        tag: Option<String>,

        /// Page number, starting at 0
        #[arg(long, default_value = "0")]
        page: usize,

        #[arg(long, default_value = "50")]
        page_size: usize,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one captured call
    Show {
        id: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show totals across all captured calls
    Stats {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = CliConfig::load(cli.config.as_deref())?;
    config.merge_env();
    config.expand_paths();

    if let Err(e) = llmtap_observability::init_logging(&config.logging) {
        eprintln!("Warning: {}", e);
    }

    let db_path = cli
        .db
        .map(|path| expand(&path))
        .unwrap_or_else(|| config.db_path());
    tracing::debug!(path = %db_path.display(), "Opening call store");

    let store = SqliteWriter::open_existing(&db_path)
        .await
        .with_context(|| format!("No call store at {}", db_path.display()))?;

    match cli.command {
        Commands::List {
            models,
            finish_reasons,
            errors,
            tag,
            page,
            page_size,
            json,
        } => {
            let filter = CallFilter {
                model_ids: models,
                finish_reasons,
                errors_only: errors,
                tag,
                page,
                page_size,
            };
            let results = store.list_calls(&filter).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                println!("{}", render::call_list(&results));
            }
        }
        Commands::Show { id, json } => {
            let call = store
                .get_call(&id)
                .await?
                .with_context(|| format!("No call with id {}", id))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&call)?);
            } else {
                print!("{}", render::call_detail(&call));
            }
        }
        Commands::Stats { json } => {
            let stats = store.aggregate_stats().await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print!("{}", render::aggregates(&stats));
            }
        }
    }

    Ok(())
}
