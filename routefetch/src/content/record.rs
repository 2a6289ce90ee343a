//! Installation records.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted result of a successful installation.
///
/// The timestamp is stored in UTC and serialized as RFC 3339, so records sort
/// and compare the same way on every machine. Convert to local time only when
/// displaying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationRecord {
    /// Key under which the package root was registered.
    pub registry_name: String,

    /// When registration completed.
    pub installed_at: DateTime<Utc>,

    /// Directory the package was installed into (the job destination).
    pub directory: PathBuf,

    /// Resolved package root, which may sit one level below `directory`.
    pub package_root: PathBuf,
}

impl InstallationRecord {
    /// Create a record stamped with the current time.
    pub fn new(
        registry_name: impl Into<String>,
        directory: impl Into<PathBuf>,
        package_root: impl Into<PathBuf>,
    ) -> Self {
        Self::at(registry_name, directory, package_root, Utc::now())
    }

    /// Create a record with an explicit timestamp.
    pub fn at(
        registry_name: impl Into<String>,
        directory: impl Into<PathBuf>,
        package_root: impl Into<PathBuf>,
        installed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            registry_name: registry_name.into(),
            installed_at,
            directory: directory.into(),
            package_root: package_root.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn package_root(&self) -> &Path {
        &self.package_root
    }
}
