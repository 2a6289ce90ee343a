//! Configuration file handling for ~/.routefetch/config.ini.
//!
//! ```ini
//! [install]
//! path = ~/Games/OpenRails/Content
//!
//! [catalog]
//! file = ~/.routefetch/catalog.json
//!
//! [registry]
//! file = ~/.routefetch/registry.json
//!
//! [download]
//! timeout = 300
//! poll_interval = 2
//!
//! [logging]
//! directory = ~/.routefetch/logs
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::installer::{InstallerConfig, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL};

/// Catalog file name inside the config directory.
pub const DEFAULT_CATALOG_FILE: &str = "catalog.json";

/// Registry file name inside the config directory.
pub const DEFAULT_REGISTRY_FILE: &str = "registry.json";

/// Log directory name inside the config directory.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Log file name.
pub const DEFAULT_LOG_FILE: &str = "routefetch.log";

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

/// Settings loaded from `config.ini`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    /// Directory new content is installed under. Asked for when unset.
    pub install_path: Option<PathBuf>,
    /// Catalog of available content.
    pub catalog_file: PathBuf,
    /// Registry of installed content.
    pub registry_file: PathBuf,
    /// HTTP timeout in seconds.
    pub download_timeout: u64,
    /// Progress sampling interval in seconds (1 to 3).
    pub poll_interval: u64,
    /// Directory for the log file.
    pub log_directory: PathBuf,
}

impl Default for ConfigFile {
    fn default() -> Self {
        let dir = config_directory();
        Self {
            install_path: None,
            catalog_file: dir.join(DEFAULT_CATALOG_FILE),
            registry_file: dir.join(DEFAULT_REGISTRY_FILE),
            download_timeout: DEFAULT_HTTP_TIMEOUT_SECS,
            poll_interval: DEFAULT_POLL_INTERVAL.as_secs(),
            log_directory: dir.join(DEFAULT_LOG_DIR),
        }
    }
}

impl ConfigFile {
    /// Load configuration from the default path (~/.routefetch/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        parse_ini(&ini)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let mut ini = Ini::new();
        if let Some(install_path) = &self.install_path {
            ini.with_section(Some("install"))
                .set("path", install_path.to_string_lossy());
        }
        ini.with_section(Some("catalog"))
            .set("file", self.catalog_file.to_string_lossy());
        ini.with_section(Some("registry"))
            .set("file", self.registry_file.to_string_lossy());
        ini.with_section(Some("download"))
            .set("timeout", self.download_timeout.to_string())
            .set("poll_interval", self.poll_interval.to_string());
        ini.with_section(Some("logging"))
            .set("directory", self.log_directory.to_string_lossy());

        ini.write_to_file(path)
            .map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Installer settings derived from this file.
    pub fn installer_config(&self) -> InstallerConfig {
        InstallerConfig::new()
            .with_http_timeout(Duration::from_secs(self.download_timeout))
            .with_poll_interval(Duration::from_secs(self.poll_interval))
    }
}

/// Get the path to the config directory (~/.routefetch).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".routefetch")
}

/// Get the path to the config file (~/.routefetch/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

/// Overlay INI values onto the defaults.
fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [install] section
    if let Some(section) = ini.section(Some("install")) {
        if let Some(v) = section.get("path") {
            let v = v.trim();
            if !v.is_empty() {
                config.install_path = Some(expand_tilde(v));
            }
        }
    }

    // [catalog] section
    if let Some(v) = non_empty(ini, "catalog", "file") {
        config.catalog_file = expand_tilde(v);
    }

    // [registry] section
    if let Some(v) = non_empty(ini, "registry", "file") {
        config.registry_file = expand_tilde(v);
    }

    // [download] section
    if let Some(v) = non_empty(ini, "download", "timeout") {
        config.download_timeout = match v.parse::<u64>() {
            Ok(secs) if secs > 0 => secs,
            _ => return Err(invalid("download", "timeout", v, "expected a positive number of seconds")),
        };
    }
    if let Some(v) = non_empty(ini, "download", "poll_interval") {
        config.poll_interval = match v.parse::<u64>() {
            Ok(secs @ 1..=3) => secs,
            _ => return Err(invalid("download", "poll_interval", v, "expected 1, 2 or 3 seconds")),
        };
    }

    // [logging] section
    if let Some(v) = non_empty(ini, "logging", "directory") {
        config.log_directory = expand_tilde(v);
    }

    Ok(config)
}

fn non_empty<'a>(ini: &'a Ini, section: &str, key: &str) -> Option<&'a str> {
    ini.section(Some(section))
        .and_then(|s| s.get(key))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Expand a leading `~` to the home directory.
fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix("~") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}
