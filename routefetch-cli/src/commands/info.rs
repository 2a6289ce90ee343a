//! `routefetch info <name>`

use chrono::Local;
use routefetch::config::ConfigFile;
use routefetch::content::info::summary;
use routefetch::registry::Registry;

use super::common::{find_source, load_catalog, open_registry};
use crate::error::CliError;

/// Print the summary for one catalog entry.
pub fn run(config: &ConfigFile, name: &str) -> Result<(), CliError> {
    let catalog = load_catalog(config)?;
    let source = find_source(&catalog, name)?;
    let registry = open_registry(config)?;
    let record = registry.installation(source.name());

    print!("{}", summary(&source, record.as_ref()));

    if let Some(record) = record {
        println!(
            "  Local time: {}",
            record
                .installed_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}
