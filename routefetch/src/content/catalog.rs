//! Catalog of installable content.
//!
//! The catalog is a JSON document listing every package a user can install:
//!
//! ```json
//! {
//!   "routes": [
//!     {
//!       "name": "Demo Model 1",
//!       "url": "https://github.com/openrails/demo-model-1.git",
//!       "installSize": 1073741824,
//!       "description": "A small demonstration route.",
//!       "authorName": "Open Rails",
//!       "authorUrl": "https://openrails.org"
//!     }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use super::source::ContentSource;

/// Errors that can occur while loading a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("failed to read catalog {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The catalog is not valid JSON or has the wrong shape.
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    /// Two entries share a name.
    #[error("duplicate catalog entry: {0}")]
    DuplicateName(String),

    /// An entry has an empty name or URL.
    #[error("catalog entry {index} is missing a {field}")]
    MissingField { index: usize, field: &'static str },
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    routes: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogEntry {
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
    install_size: Option<u64>,
    download_size: Option<u64>,
    #[serde(default)]
    description: String,
    author_name: Option<String>,
    author_url: Option<String>,
    image: Option<String>,
    screenshot: Option<String>,
}

/// Loaded catalog, keyed and ordered by source name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    sources: BTreeMap<String, Arc<ContentSource>>,
}

impl Catalog {
    /// Load a catalog from a JSON file.
    pub fn load_from(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse a catalog from JSON text.
    pub fn parse(text: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_str(text)?;
        let mut sources = BTreeMap::new();

        for (index, entry) in document.routes.into_iter().enumerate() {
            let name = entry.name.trim().to_string();
            if name.is_empty() {
                return Err(CatalogError::MissingField {
                    index,
                    field: "name",
                });
            }
            if entry.url.trim().is_empty() {
                return Err(CatalogError::MissingField { index, field: "url" });
            }

            let source = ContentSource::new(name.clone(), entry.url.trim())
                .with_sizes(entry.install_size, entry.download_size)
                .with_description(entry.description)
                .with_author(entry.author_name, entry.author_url)
                .with_images(entry.image, entry.screenshot);

            if sources.insert(name.clone(), Arc::new(source)).is_some() {
                return Err(CatalogError::DuplicateName(name));
            }
        }

        Ok(Self { sources })
    }

    /// Build a catalog from already constructed sources.
    pub fn from_sources(sources: impl IntoIterator<Item = ContentSource>) -> Self {
        Self {
            sources: sources
                .into_iter()
                .map(|s| (s.name().to_string(), Arc::new(s)))
                .collect(),
        }
    }

    /// Look up a source by exact name.
    pub fn get(&self, name: &str) -> Option<Arc<ContentSource>> {
        self.sources.get(name).cloned()
    }

    /// Iterate over sources in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ContentSource>> {
        self.sources.values()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
