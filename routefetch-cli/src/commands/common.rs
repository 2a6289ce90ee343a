//! Common types and utilities shared across CLI commands.

use std::sync::Arc;

use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;
use indicatif::ProgressBar;
use routefetch::config::ConfigFile;
use routefetch::content::{Catalog, ContentSource};
use routefetch::installer::{SpaceConfirmation, SpaceWarning};
use routefetch::registry::{JsonRegistry, Registry};

use crate::error::CliError;

/// Load the catalog named in the config.
pub fn load_catalog(config: &ConfigFile) -> Result<Catalog, CliError> {
    Ok(Catalog::load_from(&config.catalog_file)?)
}

/// Look up one catalog entry by name.
pub fn find_source(catalog: &Catalog, name: &str) -> Result<Arc<ContentSource>, CliError> {
    catalog
        .get(name)
        .ok_or_else(|| CliError::UnknownContent(name.to_string()))
}

/// Open the registry named in the config.
pub fn open_registry(config: &ConfigFile) -> Result<JsonRegistry, CliError> {
    Ok(JsonRegistry::open(config.registry_file.clone())?)
}

/// Refuse content that already has an installation record.
pub fn ensure_not_installed<R: Registry + ?Sized>(
    registry: &R,
    source: &ContentSource,
) -> Result<(), CliError> {
    match registry.installation(source.name()) {
        Some(record) => Err(CliError::AlreadyInstalled {
            name: source.name().to_string(),
            record: Box::new(record),
        }),
        None => Ok(()),
    }
}

/// Ask a yes/no question, defaulting to no.
///
/// A terminal that cannot prompt counts as no.
pub fn confirm(prompt: &str) -> bool {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()
        .unwrap_or(false)
}

/// Prompts on the terminal when space looks short, pausing the spinner.
pub struct ConsoleConfirmation {
    spinner: ProgressBar,
}

impl ConsoleConfirmation {
    pub fn new(spinner: ProgressBar) -> Self {
        Self { spinner }
    }
}

impl SpaceConfirmation for ConsoleConfirmation {
    fn confirm(&self, warning: &SpaceWarning) -> bool {
        self.spinner.suspend(|| {
            println!("Warning: {}", warning);
            confirm("Continue anyway?")
        })
    }
}
