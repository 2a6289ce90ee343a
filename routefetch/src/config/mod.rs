//! User configuration.
//!
//! Settings are read from `~/.routefetch/config.ini`. Every key is optional;
//! a missing file or key falls back to the defaults below.

mod file;

pub use file::{
    config_directory, config_file_path, ConfigFile, ConfigFileError, DEFAULT_CATALOG_FILE,
    DEFAULT_LOG_DIR, DEFAULT_LOG_FILE, DEFAULT_REGISTRY_FILE,
};
