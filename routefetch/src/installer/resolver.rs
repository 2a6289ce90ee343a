//! Package root detection and registry name assignment.
//!
//! Content is not always laid out with the marker directory at the top of
//! the destination; archives in particular tend to wrap everything in one
//! extra folder. The resolver looks at the destination and one level below
//! it, then finds a registry key for the root:
//!
//! ```text
//! "Foo"       -> /a      taken by another root, try next
//! "Foo (1)"   -> /b      taken by another root, try next
//! "Foo (2)"   (absent)   insert "Foo (2)" -> /c
//! ```
//!
//! A key that already points at the same root ends the scan without an
//! insert, which makes registration idempotent.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::config::InstallerConfig;
use super::error::RegistrationError;
use crate::registry::Registry;

/// Result of scanning the registry for a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameAssignment {
    /// The key is free and should be inserted.
    New(String),
    /// The key already maps to the same root; nothing to insert.
    AlreadyRegistered(String),
}

impl NameAssignment {
    pub fn name(&self) -> &str {
        match self {
            Self::New(name) | Self::AlreadyRegistered(name) => name,
        }
    }
}

/// Outcome of a completed registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub registry_name: String,
    pub package_root: PathBuf,
    /// False when the root was already registered under this name.
    pub inserted: bool,
}

/// Finds the package root and registers it under a unique name.
#[derive(Debug, Clone)]
pub struct RegistrationResolver {
    marker: String,
    max_name_index: usize,
}

impl RegistrationResolver {
    pub fn new(marker: impl Into<String>, max_name_index: usize) -> Self {
        Self {
            marker: marker.into(),
            max_name_index: max_name_index.max(1),
        }
    }

    pub fn from_config(config: &InstallerConfig) -> Self {
        Self::new(config.marker_dir.clone(), config.max_name_index)
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Locate the directory holding the marker.
    ///
    /// The destination itself wins; otherwise the first immediate
    /// subdirectory, in enumeration order, that contains the marker.
    pub fn find_package_root(&self, destination: &Path) -> Result<PathBuf, RegistrationError> {
        if destination.join(&self.marker).is_dir() {
            return Ok(destination.to_path_buf());
        }

        let not_found = || RegistrationError::RootNotFound {
            path: destination.to_path_buf(),
            marker: self.marker.clone(),
        };

        let entries = fs::read_dir(destination).map_err(|_| not_found())?;
        entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .find(|path| path.is_dir() && path.join(&self.marker).is_dir())
            .ok_or_else(not_found)
    }

    /// Whether the filesystem holding `path` looks case-insensitive.
    ///
    /// True when both the upper- and lower-cased spellings of `path` are
    /// existing directories. A tree that genuinely contains both spellings as
    /// separate siblings is misreported as case-insensitive.
    pub fn is_case_insensitive(path: &Path) -> bool {
        let text = path.to_string_lossy();
        let upper = PathBuf::from(text.to_uppercase());
        let lower = PathBuf::from(text.to_lowercase());
        upper.is_dir() && lower.is_dir()
    }

    /// Candidate key for a disambiguation index.
    pub fn candidate_name(name: &str, index: usize) -> String {
        if index == 0 {
            name.to_string()
        } else {
            format!("{} ({})", name, index)
        }
    }

    /// Scan `registry` for the key to use for `root`.
    pub fn assign_name<R: Registry + ?Sized>(
        &self,
        registry: &R,
        name: &str,
        root: &Path,
        case_insensitive: bool,
    ) -> Result<NameAssignment, RegistrationError> {
        for index in 0..self.max_name_index {
            let candidate = Self::candidate_name(name, index);
            match registry.lookup(&candidate) {
                None => return Ok(NameAssignment::New(candidate)),
                Some(existing) if same_directory(&existing, root, case_insensitive) => {
                    return Ok(NameAssignment::AlreadyRegistered(candidate));
                }
                Some(existing) => {
                    debug!(
                        candidate,
                        existing = %existing.display(),
                        "Registry name taken"
                    );
                }
            }
        }

        Err(RegistrationError::NamesExhausted {
            name: name.to_string(),
            limit: self.max_name_index,
        })
    }

    /// Package root under `destination` and the key it should use.
    ///
    /// Read-only: the registry is not changed.
    pub fn resolve<R: Registry + ?Sized>(
        &self,
        registry: &R,
        name: &str,
        destination: &Path,
    ) -> Result<(PathBuf, NameAssignment), RegistrationError> {
        let package_root = self.find_package_root(destination)?;
        let case_insensitive = Self::is_case_insensitive(destination);

        let assignment = self.assign_name(registry, name, &package_root, case_insensitive)?;
        Ok((package_root, assignment))
    }

    /// Resolve the package root under `destination` and register it.
    pub fn register<R: Registry + ?Sized>(
        &self,
        registry: &mut R,
        name: &str,
        destination: &Path,
    ) -> Result<Registration, RegistrationError> {
        let (package_root, assignment) = self.resolve(&*registry, name, destination)?;
        let inserted = match &assignment {
            NameAssignment::New(key) => {
                registry.insert(key, &package_root)?;
                info!(name = key, root = %package_root.display(), "Registered content");
                true
            }
            NameAssignment::AlreadyRegistered(key) => {
                info!(name = key, root = %package_root.display(), "Content already registered");
                false
            }
        };

        Ok(Registration {
            registry_name: assignment.name().to_string(),
            package_root,
            inserted,
        })
    }
}

fn same_directory(a: &Path, b: &Path, case_insensitive: bool) -> bool {
    if case_insensitive {
        a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
    } else {
        a == b
    }
}
