//! RouteFetch CLI - Command-line interface
//!
//! Lists the content catalog, shows details for one entry, and installs
//! content into a local directory.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use routefetch::config::{config_file_path, ConfigFile, DEFAULT_LOG_FILE};
use routefetch::logging::{init_logging, LoggingGuard};

use crate::error::CliError;

#[derive(Parser)]
#[command(name = "routefetch")]
#[command(about = "Download and install route content packages", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (default: ~/.routefetch/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List catalog entries and whether they are installed
    List,

    /// Show details for one catalog entry
    Info {
        /// Catalog entry name
        name: String,
    },

    /// Install a catalog entry
    Install {
        /// Catalog entry name
        name: String,

        /// Directory to install under (default: [install] path from config)
        #[arg(long)]
        install_path: Option<PathBuf>,

        /// Do not ask for confirmation; continue past low disk space warnings
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.unwrap_or_else(config_file_path);
    let config = ConfigFile::load_from(&config_path)?;
    let _logging = start_logging(&config)?;

    tracing::debug!(config = %config_path.display(), "Configuration loaded");

    match cli.command {
        Commands::List => commands::list::run(&config),
        Commands::Info { name } => commands::info::run(&config, &name),
        Commands::Install {
            name,
            install_path,
            yes,
        } => commands::install::run(&config, &name, install_path, yes),
    }
}

fn start_logging(config: &ConfigFile) -> Result<LoggingGuard, CliError> {
    init_logging(&config.log_directory, DEFAULT_LOG_FILE)
        .map_err(|e| CliError::LoggingInit(e.to_string()))
}
