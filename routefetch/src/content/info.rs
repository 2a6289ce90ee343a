//! Plain-text summary of a content source.

use std::fmt::Write;

use super::record::InstallationRecord;
use super::source::ContentSource;
use crate::units::format_gb;

/// Render a summary of `source` and, if installed, its record.
///
/// Timestamps are printed in RFC 3339; callers that want local time should
/// format `record.installed_at` themselves.
pub fn summary(source: &ContentSource, record: Option<&InstallationRecord>) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", source.name());
    let _ = writeln!(out, "{}", "=".repeat(source.name().chars().count()));

    if !source.description().trim().is_empty() {
        let _ = writeln!(out, "{}", source.description().trim_end());
        out.push('\n');
    }

    match (source.author_name(), source.author_url()) {
        (Some(name), Some(url)) => {
            let _ = writeln!(out, "Created by: {} <{}>", name, url);
        }
        (Some(name), None) => {
            let _ = writeln!(out, "Created by: {}", name);
        }
        (None, Some(url)) => {
            let _ = writeln!(out, "Created by: <{}>", url);
        }
        (None, None) => {}
    }

    if let Some(screenshot) = source.screenshot_url() {
        let _ = writeln!(out, "Screenshots: {}", screenshot);
    }

    match source.strategy() {
        Some(strategy) => {
            let _ = writeln!(out, "Downloadable: {}", strategy.label());
        }
        None => {
            let _ = writeln!(out, "Downloadable: unsupported format");
        }
    }
    let _ = writeln!(out, "  From: {}", source.url());
    if let Some(size) = source.install_size() {
        let _ = writeln!(out, "  Install size: {}", format_gb(size));
    }
    if source.strategy().is_some_and(|s| s.needs_extraction()) {
        if let Some(size) = source.download_size() {
            let _ = writeln!(out, "  Download size: {}", format_gb(size));
        }
    }

    if let Some(record) = record {
        out.push('\n');
        let _ = writeln!(out, "Installed:");
        let _ = writeln!(out, "  At: {}", record.installed_at.to_rfc3339());
        let _ = writeln!(out, "  In: \"{}\"", record.directory.display());
        let _ = writeln!(out, "  As: {}", record.registry_name);
    }

    out
}
