//! `routefetch list`

use routefetch::config::ConfigFile;
use routefetch::registry::Registry;

use super::common::{load_catalog, open_registry};
use crate::error::CliError;

/// Print every catalog entry with its format and installed state.
pub fn run(config: &ConfigFile) -> Result<(), CliError> {
    let catalog = load_catalog(config)?;
    let registry = open_registry(config)?;

    if catalog.is_empty() {
        println!("The catalog at {} is empty.", config.catalog_file.display());
        return Ok(());
    }

    println!("Available content");
    println!("=================");
    println!();

    for source in catalog.iter() {
        let format = source
            .strategy()
            .map(|s| s.label())
            .unwrap_or("unsupported");
        let status = match registry.installation(source.name()) {
            Some(record) => format!("installed as '{}'", record.registry_name),
            None => "-".to_string(),
        };
        println!("  {:<32} {:<14} {}", source.name(), format, status);
    }

    println!();
    println!("{} entries", catalog.len());
    Ok(())
}
