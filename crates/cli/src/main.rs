//! IssuesPilot CLI: the main entry point.
//!
//! Commands:
//! - `chat`      : Multi-turn troubleshooting session with history
//! - `query`     : Single-question mode, interactive or one `--message`
//! - `collection`: Create, delete or count the configured collection
//! - `ingest`    : Split, embed and store a dataset directory
//! - `doctor`    : Check configuration, vector store and LLM reachability
//! - `db-server` : Launch a local Chroma server on `DB_PORT` / `DB_PATH`

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

mod commands;

use commands::ConfigSource;

#[derive(Parser)]
#[command(
    name = "issuespilot",
    about = "IssuesPilot — network troubleshooting answers from your own device data",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Environment file to load before reading variables
    #[arg(long, global = true, env = "ISSUESPILOT_ENV_FILE")]
    env_file: Option<PathBuf>,

    /// TOML file with tuning defaults
    #[arg(long, global = true, env = "ISSUESPILOT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a conversation that remembers recent turns
    Chat,

    /// Answer questions one at a time, without history
    Query {
        /// Answer a single question and exit
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Manage the configured vector store collection
    Collection {
        #[command(subcommand)]
        action: commands::collection::Action,
    },

    /// Ingest a directory of `<device>_<issue>_<cli-command>` files
    Ingest {
        /// Dataset directory
        dir: PathBuf,
    },

    /// Diagnose configuration and connectivity
    Doctor,

    /// Run a local Chroma server for the configured port and path
    DbServer,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_format);

    let source = ConfigSource {
        env_file: cli.env_file,
        config_file: cli.config,
    };

    match cli.command {
        Commands::Chat => commands::chat::run(&source).await?,
        Commands::Query { message } => commands::query::run(&source, message).await?,
        Commands::Collection { action } => commands::collection::run(&source, action).await?,
        Commands::Ingest { dir } => commands::ingest::run(&source, &dir).await?,
        Commands::Doctor => commands::doctor::run(&source).await?,
        Commands::DbServer => commands::db_server::run(&source).await?,
    }

    Ok(())
}

/// Logs go to stderr; stdout carries only the conversation.
fn init_tracing(verbose: bool, format: LogFormat) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
