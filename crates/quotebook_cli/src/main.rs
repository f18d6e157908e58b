//! Quotebook command-line entry point.
//!
//! # Responsibility
//! - Drive the resolver adapter from the shell for quick local checks.
//! - Print results as pretty JSON so output can be piped to other tools.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use quotebook_api::{parse_id, resolve_db_path, QuoteFilterRequest, Resolver};
use serde::Serialize;

/// Quotebook catalog CLI
#[derive(Parser)]
#[command(name = "quotebook_cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search and list quotes in a Quotebook catalog")]
struct Cli {
    /// Catalog database file (defaults to <temp>/quotebook.sqlite3)
    #[arg(long, global = true, env = "QUOTEBOOK_DB_PATH")]
    db: Option<PathBuf>,

    /// Absolute directory for rolling log files; logging is off when unset
    #[arg(long, global = true, env = "QUOTEBOOK_LOG_DIR")]
    log_dir: Option<String>,

    /// Log level: trace|debug|info|warn|error
    #[arg(long, global = true, env = "QUOTEBOOK_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Substring search across quotes, sources, tags and source types
    Search {
        /// Text to look for (case-insensitive)
        text: String,
    },

    /// List quotes, optionally only those of one source
    Quotes {
        /// Source id
        #[arg(long)]
        source: Option<String>,
    },

    /// Print the core library version
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli
            .log_level
            .as_deref()
            .unwrap_or(quotebook_core::default_log_level());
        quotebook_api::init_logging(level, log_dir).context("failed to initialize logging")?;
    }

    match cli.command {
        Commands::Version => {
            println!("quotebook_core version={}", quotebook_api::core_version());
            Ok(())
        }
        Commands::Search { text } => {
            let resolver = open_resolver(cli.db)?;
            print_json(&resolver.quote_full_search(&text)?)
        }
        Commands::Quotes { source } => {
            let filter = QuoteFilterRequest {
                source: source.as_deref().map(|raw| parse_id("source", raw)).transpose()?,
            };
            let mut resolver = open_resolver(cli.db)?;
            print_json(&resolver.quotes(filter)?)
        }
    }
}

fn open_resolver(db: Option<PathBuf>) -> anyhow::Result<Resolver> {
    match db {
        Some(path) => Resolver::open(&path)
            .with_context(|| format!("failed to open catalog `{}`", path.display())),
        None => Resolver::open_default().with_context(|| {
            format!("failed to open catalog `{}`", resolve_db_path().display())
        }),
    }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
