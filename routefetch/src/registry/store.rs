//! JSON file backed registry.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{insert_folder, Registry, RegistryError};
use crate::content::InstallationRecord;

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    folders: BTreeMap<String, PathBuf>,
    #[serde(default)]
    installed: BTreeMap<String, InstallationRecord>,
}

/// Registry persisted as a JSON document.
///
/// Changes stay in memory until [`Registry::flush`] writes the whole document
/// to a sibling temporary file and renames it over the original.
#[derive(Debug)]
pub struct JsonRegistry {
    path: PathBuf,
    document: RegistryDocument,
    dirty: bool,
}

impl JsonRegistry {
    /// Open the registry at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();

        let document = if path.exists() {
            let text = fs::read_to_string(&path).map_err(|source| RegistryError::Io {
                path: path.clone(),
                source,
            })?;
            if text.trim().is_empty() {
                RegistryDocument::default()
            } else {
                serde_json::from_str(&text)?
            }
        } else {
            RegistryDocument::default()
        };

        Ok(Self {
            path,
            document,
            dirty: false,
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Registered folders in name order.
    pub fn folders(&self) -> &BTreeMap<String, PathBuf> {
        &self.document.folders
    }

    /// Whether there are changes not yet flushed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl Registry for JsonRegistry {
    fn lookup(&self, name: &str) -> Option<PathBuf> {
        self.document.folders.get(name).cloned()
    }

    fn insert(&mut self, name: &str, directory: &Path) -> Result<(), RegistryError> {
        let before = self.document.folders.len();
        insert_folder(&mut self.document.folders, name, directory)?;
        if self.document.folders.len() != before {
            self.dirty = true;
        }
        Ok(())
    }

    fn record_installation(
        &mut self,
        source_name: &str,
        record: &InstallationRecord,
    ) -> Result<(), RegistryError> {
        self.document
            .installed
            .insert(source_name.to_string(), record.clone());
        self.dirty = true;
        Ok(())
    }

    fn installation(&self, source_name: &str) -> Option<InstallationRecord> {
        self.document.installed.get(source_name).cloned()
    }

    fn remove(&mut self, name: &str) -> Option<PathBuf> {
        let removed = self.document.folders.remove(name);
        self.dirty |= removed.is_some();
        removed
    }

    fn remove_installation(&mut self, source_name: &str) -> Option<InstallationRecord> {
        let removed = self.document.installed.remove(source_name);
        self.dirty |= removed.is_some();
        removed
    }

    fn flush(&mut self) -> Result<(), RegistryError> {
        if !self.dirty && self.path.exists() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| RegistryError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(&self.document)?;
        let temp_path = self.path.with_extension("json.tmp");

        fs::write(&temp_path, json).map_err(|source| RegistryError::Io {
            path: temp_path.clone(),
            source,
        })?;
        fs::rename(&temp_path, &self.path).map_err(|source| RegistryError::Io {
            path: self.path.clone(),
            source,
        })?;

        debug!(path = %self.path.display(), entries = self.document.folders.len(), "Registry flushed");
        self.dirty = false;
        Ok(())
    }
}
