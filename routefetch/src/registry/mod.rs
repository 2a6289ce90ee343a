//! Registry of installed content.
//!
//! The registry maps a unique registry name to the directory holding an
//! installed package root. The installer only ever adds entries; removing or
//! editing them belongs to whoever owns the settings.
//!
//! Two implementations are provided:
//!
//! - [`MemoryRegistry`]: in-process only, used by tests and dry runs
//! - [`JsonRegistry`]: persisted to a JSON file, flushed on demand

mod store;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::content::InstallationRecord;

pub use store::JsonRegistry;

/// Errors raised by registry implementations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The key already maps to a different directory.
    #[error("registry entry '{name}' already points at {}", existing.display())]
    Conflict { name: String, existing: PathBuf },

    /// Reading or writing the backing file failed.
    #[error("registry I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing file is not valid registry JSON.
    #[error("registry format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Name → directory store owned by the settings layer.
pub trait Registry {
    /// Directory registered under `name`, if any.
    fn lookup(&self, name: &str) -> Option<PathBuf>;

    /// Add `name` → `directory`.
    ///
    /// Implementations must refuse to replace an entry that points at a
    /// different directory.
    fn insert(&mut self, name: &str, directory: &Path) -> Result<(), RegistryError>;

    /// Remember that `source_name` was installed.
    fn record_installation(
        &mut self,
        source_name: &str,
        record: &InstallationRecord,
    ) -> Result<(), RegistryError>;

    /// Installation record for `source_name`, if it was installed.
    fn installation(&self, source_name: &str) -> Option<InstallationRecord>;

    /// Drop the entry for `name`, returning the directory it pointed at.
    ///
    /// Used to undo an insert whose job could not be committed.
    fn remove(&mut self, name: &str) -> Option<PathBuf>;

    /// Drop the installation record for `source_name`.
    fn remove_installation(&mut self, source_name: &str) -> Option<InstallationRecord>;

    /// Durably write pending changes.
    fn flush(&mut self) -> Result<(), RegistryError>;
}

/// Registry kept in memory; `flush` is a no-op.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    folders: BTreeMap<String, PathBuf>,
    installed: BTreeMap<String, InstallationRecord>,
    flushes: usize,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the registry with existing entries.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<PathBuf>,
    {
        Self {
            folders: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            ..Self::default()
        }
    }

    /// All registered folders in name order.
    pub fn folders(&self) -> &BTreeMap<String, PathBuf> {
        &self.folders
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    /// Number of times `flush` was called.
    pub fn flush_count(&self) -> usize {
        self.flushes
    }
}

impl Registry for MemoryRegistry {
    fn lookup(&self, name: &str) -> Option<PathBuf> {
        self.folders.get(name).cloned()
    }

    fn insert(&mut self, name: &str, directory: &Path) -> Result<(), RegistryError> {
        insert_folder(&mut self.folders, name, directory)
    }

    fn record_installation(
        &mut self,
        source_name: &str,
        record: &InstallationRecord,
    ) -> Result<(), RegistryError> {
        self.installed
            .insert(source_name.to_string(), record.clone());
        Ok(())
    }

    fn installation(&self, source_name: &str) -> Option<InstallationRecord> {
        self.installed.get(source_name).cloned()
    }

    fn remove(&mut self, name: &str) -> Option<PathBuf> {
        self.folders.remove(name)
    }

    fn remove_installation(&mut self, source_name: &str) -> Option<InstallationRecord> {
        self.installed.remove(source_name)
    }

    fn flush(&mut self) -> Result<(), RegistryError> {
        self.flushes += 1;
        Ok(())
    }
}

/// Shared insert rule: new keys are added, identical entries are accepted,
/// anything else is a conflict.
fn insert_folder(
    folders: &mut BTreeMap<String, PathBuf>,
    name: &str,
    directory: &Path,
) -> Result<(), RegistryError> {
    match folders.get(name) {
        Some(existing) if existing != directory => Err(RegistryError::Conflict {
            name: name.to_string(),
            existing: existing.clone(),
        }),
        Some(_) => Ok(()),
        None => {
            folders.insert(name.to_string(), directory.to_path_buf());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_registry_insert_and_lookup() {
        let mut registry = MemoryRegistry::new();
        registry.insert("Foo", Path::new("/a")).unwrap();

        assert_eq!(registry.lookup("Foo"), Some(PathBuf::from("/a")));
        assert_eq!(registry.lookup("Bar"), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_memory_registry_refuses_overwrite() {
        let mut registry = MemoryRegistry::with_entries([("Foo", "/a")]);

        let result = registry.insert("Foo", Path::new("/b"));
        assert!(matches!(result, Err(RegistryError::Conflict { .. })));
        assert_eq!(registry.lookup("Foo"), Some(PathBuf::from("/a")));

        // Same mapping is accepted without change
        registry.insert("Foo", Path::new("/a")).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_memory_registry_records_installation() {
        let mut registry = MemoryRegistry::new();
        let record = InstallationRecord::new("Foo", "/a", "/a");

        registry.record_installation("Foo", &record).unwrap();
        registry.flush().unwrap();

        assert_eq!(registry.installation("Foo"), Some(record));
        assert_eq!(registry.flush_count(), 1);
    }

    #[test]
    fn test_memory_registry_remove() {
        let mut registry = MemoryRegistry::with_entries([("Foo", "/a")]);
        let record = InstallationRecord::new("Foo", "/a", "/a");
        registry.record_installation("Foo", &record).unwrap();

        assert_eq!(registry.remove("Foo"), Some(PathBuf::from("/a")));
        assert_eq!(registry.remove("Foo"), None);
        assert_eq!(registry.remove_installation("Foo"), Some(record));
        assert!(registry.is_empty());
        assert_eq!(registry.installation("Foo"), None);
    }
}
