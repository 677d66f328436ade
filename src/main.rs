//! # Ingestion CLI (`ingest`)
//!
//! The `ingest` binary reads local corpora and forwards them to a
//! vector-database API in batches.
//!
//! ## Usage
//!
//! ```bash
//! ingest --config ./config/ingest.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ingest documents --directory <path>` | Ingest text documents from a directory |
//! | `ingest practitioners --file <path>` | Ingest the practitioners table |
//! | `ingest products --file <path>` | Ingest the products table |
//! | `ingest all` | Ingest every configured source in order |
//! | `ingest sources` | List configured sources and their status |
//!
//! ## Examples
//!
//! ```bash
//! # Ingest a directory of books
//! ingest documents --directory ./data/books --api-url http://localhost:8001
//!
//! # Ingest the products table, skipping records the index already holds
//! ingest products --file ./data/products/catalogue.csv --skip-existing
//!
//! # See what a run would send without touching the network
//! ingest documents --dry-run
//! ```
//!
//! ## Exit codes
//!
//! `0` full success, `1` one or more records failed, `2` fatal configuration
//! error (including CLI usage errors).

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::warn;

use vector_ingest::config::{self, Config};
use vector_ingest::driver::{self, RunOptions};
use vector_ingest::models::{IngestResult, IngestionSource, SourceKind};
use vector_ingest::progress::ProgressMode;

/// Batch-ingest local corpora into a vector-database API.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; every setting can also be overridden per invocation. See
/// `config/ingest.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "ingest",
    about = "Batch-ingest local corpora (documents, practitioners, products) into a vector-database API",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ingest.toml")]
    config: PathBuf,

    /// Base URL of the vector-database API. Overrides the config file.
    #[arg(long, global = true, env = "INGEST_API_URL")]
    api_url: Option<String>,

    /// Log per-record failure detail to stderr.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Progress output on stderr: auto (TTY only), json, or off.
    #[arg(long, global = true, value_enum, default_value_t = ProgressArg::Auto)]
    progress: ProgressArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProgressArg {
    Auto,
    Json,
    Off,
}

/// Flags shared by the per-source commands.
#[derive(clap::Args)]
struct RunFlags {
    /// Payloads per request. Overrides the config file.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Maximum number of records to process.
    #[arg(long)]
    limit: Option<usize>,

    /// Read and normalize only; report counts without any network call.
    #[arg(long)]
    dry_run: bool,

    /// Skip records whose ids the target collection already holds.
    #[arg(long)]
    skip_existing: bool,
}

impl From<RunFlags> for RunOptions {
    fn from(flags: RunFlags) -> Self {
        RunOptions {
            dry_run: flags.dry_run,
            skip_existing: flags.skip_existing,
            limit: flags.limit,
            batch_size: flags.batch_size,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest text documents from a directory.
    ///
    /// Walks the directory recursively, honoring the configured include and
    /// exclude globs, and sends each decodable text file as one payload.
    Documents {
        /// Directory containing the documents. Overrides the config file.
        #[arg(long, short = 'd')]
        directory: Option<PathBuf>,

        #[command(flatten)]
        flags: RunFlags,
    },

    /// Ingest the practitioners table.
    ///
    /// Reads one delimited file; each row becomes one payload. Missing file
    /// is a no-op unless the source is marked required in the config.
    Practitioners {
        /// Path to the practitioners file. Overrides the config file.
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,

        #[command(flatten)]
        flags: RunFlags,
    },

    /// Ingest the products table.
    Products {
        /// Path to the products file. Overrides the config file.
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,

        #[command(flatten)]
        flags: RunFlags,
    },

    /// Ingest every configured source, in order, each committed independently.
    All {
        /// Read and normalize only; report counts without any network call.
        #[arg(long)]
        dry_run: bool,

        /// Skip records whose ids the target collections already hold.
        #[arg(long)]
        skip_existing: bool,
    },

    /// List configured sources and whether their locations exist.
    Sources,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(result) if result.failed() > 0 => ExitCode::from(1),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<IngestResult> {
    let mut config = config::load_config(&cli.config)?;
    if let Some(url) = cli.api_url {
        config.api.base_url = url;
    }

    let progress = match cli.progress {
        ProgressArg::Auto => ProgressMode::default_for_tty(),
        ProgressArg::Json => ProgressMode::Json,
        ProgressArg::Off => ProgressMode::Off,
    }
    .reporter();

    let (sources, opts) = match cli.command {
        Commands::Documents { directory, flags } => (
            resolve_one(&config, SourceKind::Documents, directory.as_deref())?,
            flags.into(),
        ),
        Commands::Practitioners { file, flags } => (
            resolve_one(&config, SourceKind::Practitioners, file.as_deref())?,
            flags.into(),
        ),
        Commands::Products { file, flags } => (
            resolve_one(&config, SourceKind::Products, file.as_deref())?,
            flags.into(),
        ),
        Commands::All {
            dry_run,
            skip_existing,
        } => (
            resolve_all(&config),
            RunOptions {
                dry_run,
                skip_existing,
                ..Default::default()
            },
        ),
        Commands::Sources => {
            list_sources(&config);
            return Ok(IngestResult::default());
        }
    };

    if sources.is_empty() {
        println!("nothing to ingest (no source location configured)");
        return Ok(IngestResult::default());
    }

    Ok(driver::run(&config, &sources, &opts, progress.as_ref()).await?)
}

fn resolve_one(
    config: &Config,
    kind: SourceKind,
    location: Option<&Path>,
) -> anyhow::Result<Vec<IngestionSource>> {
    Ok(config.resolve_source(kind, location)?.into_iter().collect())
}

/// For `ingest all`, only sources with a configured location participate;
/// the rest are skipped with a warning rather than aborting the run.
fn resolve_all(config: &Config) -> Vec<IngestionSource> {
    let mut sources = Vec::new();
    for kind in SourceKind::all() {
        match config.resolve_source(kind, None) {
            Ok(Some(source)) => sources.push(source),
            Ok(None) => {}
            Err(e) => warn!("skipping {}: {}", kind, e),
        }
    }
    sources
}

fn list_sources(config: &Config) {
    println!("Configured sources:");
    for kind in SourceKind::all() {
        match config.resolve_source(kind, None) {
            Ok(Some(source)) => {
                let status = if source.location.exists() {
                    "present"
                } else {
                    "missing"
                };
                println!(
                    "  {:<14} {}  [{}]{}",
                    kind.slug(),
                    source.location.display(),
                    status,
                    if source.required { "" } else { " (optional)" }
                );
            }
            Ok(None) | Err(_) => {
                println!("  {:<14} not configured", kind.slug());
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "warn,vector_ingest=debug,ingest=debug"
    } else {
        "warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
