//! `routefetch install <name>`
//!
//! Runs one installation job with a spinner showing the latest progress.
//! Content that already has an installation record is refused.
//! Ctrl-C cancels the job; the command waits for the running stage to stop
//! before returning.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use routefetch::config::ConfigFile;
use routefetch::installer::{AcceptWarnings, InstallCoordinator, SpaceConfirmation};

use super::common::{
    confirm, ensure_not_installed, find_source, load_catalog, open_registry, ConsoleConfirmation,
};
use crate::error::CliError;

/// Install the catalog entry `name`.
pub fn run(
    config: &ConfigFile,
    name: &str,
    install_path: Option<PathBuf>,
    yes: bool,
) -> Result<(), CliError> {
    let catalog = load_catalog(config)?;
    let source = find_source(&catalog, name)?;
    let mut registry = open_registry(config)?;
    ensure_not_installed(&registry, &source)?;

    let parent = install_path
        .or_else(|| config.install_path.clone())
        .ok_or_else(|| {
            CliError::Config(
                "No install path specified. Use --install-path or set path in config.ini [install] section."
                    .to_string(),
            )
        })?;
    let destination = parent.join(source.name());

    if !yes
        && !confirm(&format!(
            "Install '{}' into \"{}\"?",
            source.name(),
            destination.display()
        ))
    {
        println!("Installation cancelled.");
        return Ok(());
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::with_template("{spinner:.cyan.bold} {prefix} {msg}") {
        spinner.set_style(template);
    }
    spinner.set_prefix(source.name().to_string());

    let confirmation: Arc<dyn SpaceConfirmation> = if yes {
        Arc::new(AcceptWarnings)
    } else {
        Arc::new(ConsoleConfirmation::new(spinner.clone()))
    };

    let coordinator = InstallCoordinator::new();
    let mut job = coordinator
        .begin(Arc::clone(&source), &destination, config.installer_config())?
        .with_confirmation(confirmation);

    let cancel = job.cancel_token();
    ctrlc::set_handler(move || cancel.cancel())
        .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Config(format!("Failed to start runtime: {}", e)))?;

    let result = runtime.block_on(async {
        let mut progress = job.subscribe();
        let display = spinner.clone();
        display.enable_steady_tick(Duration::from_millis(80));
        let updates = tokio::spawn(async move {
            while progress.changed().await.is_ok() {
                let latest = *progress.borrow_and_update();
                display.set_message(latest.display());
            }
        });

        let result = job.run(&mut registry).await;
        updates.abort();
        result
    });

    spinner.finish_and_clear();

    match result {
        Ok(record) => {
            println!(
                "{} Installed '{}' as '{}'",
                style("✓").green().bold(),
                source.name(),
                record.registry_name
            );
            println!("  In: {}", record.package_root.display());
            println!(
                "  At: {}",
                record
                    .installed_at
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M:%S")
            );
            Ok(())
        }
        Err(e) if e.is_cancelled() => {
            println!("{} {}", style("Installation cancelled:").yellow(), e);
            println!(
                "Files written so far were left in \"{}\".",
                job.destination().display()
            );
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
