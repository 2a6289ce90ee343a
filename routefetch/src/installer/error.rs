//! Error types for the installation pipeline.
//!
//! Every error is terminal for the job that raised it; nothing is retried.
//! Partially written content is left on disk for the user to inspect.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::job::JobState;
use super::preflight::SpaceWarning;
use crate::registry::RegistryError;

/// Result type for installer operations.
pub type InstallResult<T> = Result<T, InstallError>;

/// Errors that end an installation job.
#[derive(Debug, Error)]
pub enum InstallError {
    /// The target or source failed validation before any network activity.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Clone or download failed.
    #[error("failed to fetch {url}: {detail}")]
    Fetch { url: String, detail: String },

    /// The downloaded archive could not be extracted or removed.
    #[error("failed to install {}: {detail}", path.display())]
    Install { path: PathBuf, detail: String },

    /// The installed content could not be registered.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// The job was cancelled and its background stage acknowledged.
    #[error("installation cancelled")]
    Cancelled,

    /// Another job is already running in this process.
    #[error("another installation is already in progress")]
    JobAlreadyActive,

    /// `run` was called on a job that already left the idle state.
    #[error("job cannot be started from state {state}")]
    JobNotIdle { state: JobState },
}

impl InstallError {
    /// Whether this error represents a cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Validation(ValidationError::InsufficientSpaceDeclined(_))
        )
    }
}

/// Preflight validation failures.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The directory that should contain the install target does not exist.
    #[error("directory \"{}\" does not exist", path.display())]
    ParentMissing { path: PathBuf },

    /// The install target already has files or subdirectories in it.
    #[error("directory \"{}\" exists and is not empty", path.display())]
    TargetNotEmpty { path: PathBuf },

    /// The install target could not be created.
    #[error("directory \"{}\" cannot be created: {source}", path.display())]
    CreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The install target exists but could not be listed.
    #[error("directory \"{}\" cannot be read: {source}", path.display())]
    InspectFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The user declined to continue after a low disk space warning.
    #[error("installation declined: {0}")]
    InsufficientSpaceDeclined(SpaceWarning),

    /// The source URL has no recognised fetch strategy.
    #[error("unsupported content URL: {url} (expected a .git or .zip URL)")]
    UnsupportedSource { url: String },
}

/// Registration failures.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// No directory containing the marker was found at or one level below the
    /// destination.
    #[error("incorrect content layout, directory \"{marker}\" not found under {}", path.display())]
    RootNotFound { path: PathBuf, marker: String },

    /// Every disambiguated name up to the cap is taken by other directories.
    #[error("no free registry name for '{name}' after {limit} attempts")]
    NamesExhausted { name: String, limit: usize },

    /// The registry refused the insert or could not be flushed.
    #[error("registry update failed: {0}")]
    Store(#[from] RegistryError),
}
