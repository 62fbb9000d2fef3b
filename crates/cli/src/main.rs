//! aichat CLI, the main entry point.
//!
//! Commands:
//! - `chat`: Interactive chat or single-message mode
//! - `config`: Print the effective configuration
//! - `doctor`: Diagnose configuration and connectivity
//! - `ingest`: Load documents and report knowledge base stats
//! - `search`: Keyword search over loaded documents

use std::path::PathBuf;

use aichat_config::{AppConfig, ConfigError, ConfigLoader};
use clap::{Parser, Subcommand};

mod commands;
mod repl;

use commands::chat::ChatArgs;
use commands::ingest::SourceArgs;

#[derive(Parser)]
#[command(
    name = "aichat",
    about = "aichat: a terminal AI assistant with bounded conversation memory",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant
    Chat(ChatArgs),

    /// Print the effective configuration (API key redacted)
    Config {
        /// Env file to read
        #[arg(long, default_value = ".env")]
        env_file: PathBuf,
    },

    /// Diagnose configuration and connectivity
    Doctor {
        /// Env file to read
        #[arg(long, default_value = ".env")]
        env_file: PathBuf,
    },

    /// Load documents and print knowledge base stats
    Ingest(SourceArgs),

    /// Rank document chunks by keyword overlap with a query
    Search {
        /// Words to look for
        query: String,

        #[command(flatten)]
        source: SourceArgs,

        /// Number of results to show
        #[arg(short = 'k', long, default_value_t = aichat_loader::DEFAULT_TOP_K)]
        top_k: usize,
    },
}

impl Commands {
    fn config_loader(&self) -> ConfigLoader {
        match self {
            Commands::Chat(args) => ConfigLoader::new()
                .with_env_file(&args.env_file)
                .with_overrides(args.overrides()),
            Commands::Config { env_file } | Commands::Doctor { env_file } => {
                ConfigLoader::new().with_env_file(env_file)
            }
            Commands::Ingest(_) | Commands::Search { .. } => ConfigLoader::new(),
        }
    }
}

/// `RUST_LOG` wins, then `--verbose`, then the configured level.
fn init_tracing(verbose: bool, config: Result<&AppConfig, &ConfigError>) {
    let filter = if verbose {
        "debug"
    } else {
        config.map(|c| c.log_level.as_str()).unwrap_or("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_loader = cli.command.config_loader();
    let config = config_loader.load();
    init_tracing(cli.verbose, config.as_ref());

    match cli.command {
        Commands::Chat(args) => commands::chat::run(args.message, config).await?,
        Commands::Config { .. } => commands::config_cmd::run(config_loader.env_file(), config)?,
        Commands::Doctor { .. } => commands::doctor::run(config_loader.env_file(), config).await?,
        Commands::Ingest(source) => commands::ingest::run(&source)?,
        Commands::Search {
            query,
            source,
            top_k,
        } => commands::search::run(&query, &source, top_k)?,
    }

    Ok(())
}
