//! Content acquisition.
//!
//! The [`Acquirer`] picks a [`Fetcher`] from the source's [`FetchStrategy`]
//! and runs it against the destination directory:
//!
//! - **Repository**: cloned straight into the destination by [`GitCloner`]
//! - **Archive**: downloaded to `<destination>/<name>.zip` by [`HttpDownloader`]
//!
//! Fetchers are blocking and are run off the async runtime by the job.

mod git;
mod http;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

pub use git::GitCloner;
pub use http::HttpDownloader;

use super::error::{InstallError, InstallResult, ValidationError};
use crate::content::{ContentSource, FetchStrategy};

#[cfg(test)]
pub(crate) use git::tests::init_repo_with_files;

/// A blocking transfer of one URL into `target`.
///
/// Implementations check `cancel` at their natural loop boundaries and return
/// [`InstallError::Cancelled`] once it fires. Transport failures are reported
/// as [`InstallError::Fetch`].
pub trait Fetcher: Send + Sync {
    /// Fetch `url` into `target`, returning the number of bytes transferred.
    fn fetch(&self, url: &str, target: &Path, cancel: &CancellationToken) -> InstallResult<u64>;
}

/// Result of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub strategy: FetchStrategy,
    /// Downloaded archive, present only for the archive strategy.
    pub archive: Option<PathBuf>,
    pub bytes: u64,
}

/// Runs the fetch strategy for a source.
#[derive(Clone)]
pub struct Acquirer {
    archive: Arc<dyn Fetcher>,
    repository: Arc<dyn Fetcher>,
}

impl Default for Acquirer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Acquirer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acquirer").finish_non_exhaustive()
    }
}

impl Acquirer {
    /// Acquirer with the HTTP downloader and git cloner.
    pub fn new() -> Self {
        Self {
            archive: Arc::new(HttpDownloader::new()),
            repository: Arc::new(GitCloner::new()),
        }
    }

    /// Replace the fetcher used for archive URLs.
    pub fn with_archive_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.archive = fetcher;
        self
    }

    /// Replace the fetcher used for repository URLs.
    pub fn with_repository_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.repository = fetcher;
        self
    }

    /// Path the archive for `source` is downloaded to, if it is an archive.
    pub fn archive_path(source: &ContentSource, destination: &Path) -> Option<PathBuf> {
        source
            .archive_file_name()
            .map(|file_name| destination.join(file_name))
    }

    /// Fetch `source` into `destination`.
    pub fn acquire(
        &self,
        source: &ContentSource,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> InstallResult<FetchOutcome> {
        let strategy = source.strategy().ok_or_else(|| {
            InstallError::from(ValidationError::UnsupportedSource {
                url: source.url().to_string(),
            })
        })?;

        match strategy {
            FetchStrategy::Repository => {
                let bytes = self.repository.fetch(source.url(), destination, cancel)?;
                Ok(FetchOutcome {
                    strategy,
                    archive: None,
                    bytes,
                })
            }
            FetchStrategy::Archive => {
                let archive = Self::archive_path(source, destination).ok_or_else(|| {
                    InstallError::from(ValidationError::UnsupportedSource {
                        url: source.url().to_string(),
                    })
                })?;
                let bytes = self.archive.fetch(source.url(), &archive, cancel)?;
                Ok(FetchOutcome {
                    strategy,
                    archive: Some(archive),
                    bytes,
                })
            }
        }
    }
}
