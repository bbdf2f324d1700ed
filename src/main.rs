//! # Cat Harvest CLI (`cat-harvest`)
//!
//! ## Usage
//!
//! ```bash
//! cat-harvest --config ./config/cat-harvest.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cat-harvest init` | Create the SQLite database and run schema migrations |
//! | `cat-harvest fetch` | Ingest one batch from the upstream image API |
//! | `cat-harvest get <id>` | Print one cat with its tags |
//! | `cat-harvest list` | Print a page of cats, optionally filtered by tag |
//! | `cat-harvest serve` | Start the HTTP API server |
//!
//! Logging goes to stderr and honours `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use cat_harvest::{config, ingest, migrate, query, server};

/// Cat Harvest: ingest, tag and serve cat images.
#[derive(Parser)]
#[command(
    name = "cat-harvest",
    about = "Cat Harvest: ingest, tag and serve cat images from TheCatAPI",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cat-harvest.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Fetch one batch of cats from the upstream API and store new ones.
    Fetch,

    /// Print a stored cat by its numeric id.
    Get {
        /// Surrogate id assigned at ingestion.
        id: i64,
    },

    /// Print a page of stored cats.
    List {
        /// Only cats carrying this exact tag name.
        #[arg(long)]
        tag: Option<String>,

        #[arg(long, default_value_t = query::DEFAULT_PAGE)]
        page: u32,

        #[arg(long, default_value_t = query::DEFAULT_PAGE_SIZE)]
        page_size: u32,
    },

    /// Start the HTTP API server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Fetch => {
            ingest::run_fetch(&cfg).await?;
        }
        Commands::Get { id } => {
            query::run_get(&cfg, id).await?;
        }
        Commands::List {
            tag,
            page,
            page_size,
        } => {
            query::run_list(&cfg, tag, page, page_size).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
