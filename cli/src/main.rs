//! Pathway CLI - binary entry point.
//!
//! Bridges [`pathway_engine`] (progression rules) and [`pathway_store`]
//! (SQLite persistence) to the command line:
//!
//! ```text
//! main() -> PathwayConfig::load() -> Database::open() -> ProgressionEngine
//!                                                           |
//!                                                           v
//!                                         commands::{import, show, list, ...}
//! ```
//!
//! Logs go to stderr, filtered by `RUST_LOG` (default `warn`). Results go to
//! stdout so they can be piped.

mod commands;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use pathway_config::PathwayConfig;
use pathway_engine::{ProgressionEngine, Repositories};
use pathway_store::{Database, DatabaseOptions};
use pathway_types::{NodeId, PathId};

#[derive(Parser)]
#[command(name = "pathway", version)]
#[command(about = "Work through learning paths one exercise at a time")]
struct Cli {
    /// Database file (overrides PATHWAY_DB and the config file)
    #[arg(long, global = true, value_name = "FILE")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a path from a generated draft (JSON); `-` reads stdin
    Import {
        #[arg(value_name = "FILE")]
        source: String,
        /// Owner of the new path
        #[arg(long)]
        user: Option<String>,
    },
    /// Show a path and its nodes
    Show {
        path_id: PathId,
        #[arg(long)]
        json: bool,
    },
    /// List a user's paths, newest first
    List {
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Complete an unlocked node and unlock the next one
    Complete { path_id: PathId, node_id: NodeId },
    /// Finish an interrupted completion for the node at POSITION
    Resume {
        path_id: PathId,
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        position: u32,
    },
    /// Summarize completion and XP for a path
    Progress { path_id: PathId },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
}

fn open_engine(cli_db: Option<PathBuf>, config: &PathwayConfig) -> Result<ProgressionEngine> {
    let path = cli_db.unwrap_or_else(|| config.database_path());
    let options = DatabaseOptions {
        busy_timeout: config.busy_timeout(),
        operation_timeout: config.operation_timeout(),
    };
    let db = Database::open(&path, options)
        .with_context(|| format!("Failed to open database at {}", path.display()))?;
    tracing::debug!(path = %path.display(), "Database ready");
    Ok(ProgressionEngine::new(Repositories::sqlite(&db)))
}

async fn run(cli: Cli, out: &mut impl Write) -> Result<()> {
    let config = PathwayConfig::load()
        .context("Failed to load configuration")?
        .unwrap_or_default();
    let engine = open_engine(cli.db, &config)?;
    let user_or_default = |user: Option<String>| user.unwrap_or_else(|| config.default_user());

    match cli.command {
        Command::Import { source, user } => {
            let draft = commands::read_draft(&source)?;
            commands::import(&engine, draft, &user_or_default(user), out).await
        }
        Command::Show { path_id, json } => commands::show(&engine, path_id, json, out).await,
        Command::List { user, json } => {
            commands::list(&engine, &user_or_default(user), json, out).await
        }
        Command::Complete { path_id, node_id } => {
            commands::complete(&engine, path_id, node_id, out).await
        }
        Command::Resume { path_id, position } => {
            commands::resume(&engine, path_id, position, out).await
        }
        Command::Progress { path_id } => commands::progress(&engine, path_id, out).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let mut stdout = io::stdout().lock();
    match run(cli, &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}
