//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use routefetch::config::ConfigFileError;
use routefetch::content::{CatalogError, InstallationRecord};
use routefetch::installer::{InstallError, ValidationError};
use routefetch::registry::RegistryError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to load the content catalog
    Catalog(CatalogError),
    /// Failed to open or update the registry
    Registry(RegistryError),
    /// No catalog entry with this name
    UnknownContent(String),
    /// The catalog entry already has an installation record
    AlreadyInstalled {
        name: String,
        record: Box<InstallationRecord>,
    },
    /// Installation job failed
    Install(InstallError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::UnknownContent(_) => {
                eprintln!();
                eprintln!("Use 'routefetch list' to see available content.");
            }
            CliError::AlreadyInstalled { record, .. } => {
                eprintln!();
                eprintln!("  Registered as: {}", record.registry_name);
                eprintln!("  In: {}", record.package_root.display());
                eprintln!("  At: {}", record.installed_at.to_rfc3339());
            }
            CliError::Install(InstallError::Validation(ValidationError::TargetNotEmpty {
                ..
            })) => {
                eprintln!();
                eprintln!("Choose an empty directory with --install-path, or remove the");
                eprintln!("existing files first.");
            }
            CliError::Install(InstallError::Fetch { .. } | InstallError::Install { .. }) => {
                eprintln!();
                eprintln!("Partially downloaded files were left in place.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Catalog(e) => write!(f, "Failed to load catalog: {}", e),
            CliError::Registry(e) => write!(f, "Registry error: {}", e),
            CliError::UnknownContent(name) => write!(f, "No content named '{}' in the catalog", name),
            CliError::AlreadyInstalled { name, record } => write!(
                f,
                "'{}' is already installed in \"{}\"",
                name,
                record.directory.display()
            ),
            CliError::Install(e) => write!(f, "Installation failed: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Catalog(e) => Some(e),
            CliError::Registry(e) => Some(e),
            CliError::Install(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<CatalogError> for CliError {
    fn from(e: CatalogError) -> Self {
        CliError::Catalog(e)
    }
}

impl From<RegistryError> for CliError {
    fn from(e: RegistryError) -> Self {
        CliError::Registry(e)
    }
}

impl From<InstallError> for CliError {
    fn from(e: InstallError) -> Self {
        CliError::Install(e)
    }
}
