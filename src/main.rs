//! # MedSplit CLI (`medsplit`)
//!
//! Command-line front end for the MedSplit backend: document search and
//! management, micro grants, free-text entries, the assistant relay, and
//! the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! medsplit --config ./config/medsplit.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `medsplit init` | Create the data file if it does not exist |
//! | `medsplit search "<query>"` | Rank documents against a query |
//! | `medsplit documents list\|add\|rm\|stats` | Manage the document library |
//! | `medsplit grants list\|request\|donate` | Micro grants |
//! | `medsplit entries list\|add\|rm\|clear` | Free-text entries |
//! | `medsplit chat "<message>"` | Ask the assistant |
//! | `medsplit serve` | Start the HTTP server |
//!
//! Logs go to stderr and honour `RUST_LOG` (default `medsplit=info`).

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use medsplit::config::{self, Config};
use medsplit::data::DataFile;
use medsplit::documents::DocumentInput;
use medsplit::{chat, documents, entries, grants, search, server};
use medsplit_core::grants::GrantRequest;
use medsplit_core::models::{DocumentKind, FileType};

/// MedSplit: community medicine-access backend.
///
/// Without a config file the defaults apply (data in `./data/data.json`,
/// server on `127.0.0.1:5050`, chat disabled).
#[derive(Parser)]
#[command(
    name = "medsplit",
    about = "MedSplit — document search, micro grants, and an assistant relay",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/medsplit.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data file. Safe to run repeatedly.
    Init,

    /// Search documents by name, type, and status.
    ///
    /// Matches substrings and in-order subsequences of the name, the type
    /// label, and status words ("verified", "pending", "review").
    Search {
        query: String,

        /// Restrict to one document type (`all`, `prescription`,
        /// `lab-result`, `insurance`, `medical-record`, `other`).
        #[arg(long = "type", default_value = "all")]
        doc_type: String,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<usize>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Manage the document library.
    Documents {
        #[command(subcommand)]
        action: DocumentsAction,
    },

    /// Micro grants.
    Grants {
        #[command(subcommand)]
        action: GrantsAction,
    },

    /// Free-text entries.
    Entries {
        #[command(subcommand)]
        action: EntriesAction,
    },

    /// Ask the assistant a question.
    ///
    /// Requires `[chat] base_url`.
    Chat {
        message: String,

        /// Name of a file to mention as attached.
        #[arg(long)]
        file: Option<String>,
    },

    /// Start the HTTP server.
    Serve,
}

#[derive(Subcommand)]
enum DocumentsAction {
    List {
        #[arg(long = "type", default_value = "all")]
        doc_type: String,
    },
    /// Add a document, or replace one with `--id`.
    Add {
        #[arg(long)]
        name: String,
        #[arg(long = "type")]
        kind: DocumentKind,
        #[arg(long)]
        file_type: FileType,
        #[arg(long, default_value = "")]
        size: String,
        /// Upload date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<chrono::NaiveDate>,
        #[arg(long)]
        verified: bool,
        #[arg(long)]
        url: Option<String>,
        /// Who the document is shared with. Repeatable.
        #[arg(long = "share")]
        shared_with: Vec<String>,
        #[arg(long, default_value_t = 0)]
        id: u64,
    },
    Rm {
        id: u64,
    },
    Stats,
}

#[derive(Subcommand)]
enum GrantsAction {
    List,
    Request {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        amount: f64,
        #[arg(long)]
        user_id: Option<u64>,
        #[arg(long)]
        email: Option<String>,
    },
    Donate {
        id: u64,
        amount: f64,
    },
}

#[derive(Subcommand)]
enum EntriesAction {
    List,
    Add { text: String },
    Rm { id: u64 },
    Clear,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("medsplit=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        debug!(path = %path.display(), "no config file; using defaults");
        Ok(Config::minimal())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = resolve_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let data = DataFile::from_config(&cfg);
            if data.init().await? {
                println!("Created {}", data.path().display());
            } else {
                println!("{} already exists.", data.path().display());
            }
        }
        Commands::Search {
            query,
            doc_type,
            limit,
            json,
        } => {
            search::run_search(&cfg, &query, &doc_type, limit, json).await?;
        }
        Commands::Documents { action } => match action {
            DocumentsAction::List { doc_type } => documents::run_list(&cfg, &doc_type).await?,
            DocumentsAction::Add {
                name,
                kind,
                file_type,
                size,
                date,
                verified,
                url,
                shared_with,
                id,
            } => {
                let input = DocumentInput {
                    id,
                    name,
                    kind,
                    file_type,
                    size,
                    upload_date: date,
                    verified,
                    file_url: url,
                    shared_with,
                };
                documents::run_add(&cfg, input).await?;
            }
            DocumentsAction::Rm { id } => documents::run_remove(&cfg, id).await?,
            DocumentsAction::Stats => documents::run_stats(&cfg).await?,
        },
        Commands::Grants { action } => match action {
            GrantsAction::List => grants::run_list(&cfg).await?,
            GrantsAction::Request {
                title,
                description,
                amount,
                user_id,
                email,
            } => {
                let req = GrantRequest {
                    title,
                    description,
                    amount,
                    user_id,
                    email,
                };
                grants::run_request(&cfg, req).await?;
            }
            GrantsAction::Donate { id, amount } => grants::run_donate(&cfg, id, amount).await?,
        },
        Commands::Entries { action } => match action {
            EntriesAction::List => entries::run_list(&cfg).await?,
            EntriesAction::Add { text } => entries::run_add(&cfg, &text).await?,
            EntriesAction::Rm { id } => entries::run_remove(&cfg, id).await?,
            EntriesAction::Clear => entries::run_clear(&cfg).await?,
        },
        Commands::Chat { message, file } => {
            chat::run_chat(&cfg, &message, file).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
