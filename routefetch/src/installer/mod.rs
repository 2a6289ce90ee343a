//! Content installation pipeline.
//!
//! An [`InstallationJob`] takes one [`ContentSource`](crate::content::ContentSource)
//! from preflight checks through fetch, extraction and registration:
//!
//! - [`preflight`]: target directory and free space checks
//! - [`acquire`]: repository clone or archive download
//! - [`progress`]: bytes-on-disk progress sampling
//! - [`extractor`]: archive expansion
//! - [`resolver`]: package root detection and registry naming
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use routefetch::installer::{InstallCoordinator, InstallerConfig};
//! use routefetch::registry::JsonRegistry;
//!
//! let coordinator = InstallCoordinator::new();
//! let mut registry = JsonRegistry::open("registry.json")?;
//! let mut job = coordinator.begin(source, "/content/Demo", InstallerConfig::default())?;
//! let record = job.run(&mut registry).await?;
//! ```

pub mod acquire;
mod config;
mod coordinator;
mod error;
pub mod extractor;
mod job;
pub mod preflight;
pub mod progress;
pub mod resolver;

pub use acquire::{Acquirer, FetchOutcome, Fetcher, GitCloner, HttpDownloader};
pub use config::{
    InstallerConfig, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_MARKER_DIR, DEFAULT_MAX_NAME_INDEX,
    DEFAULT_POLL_INTERVAL, MAX_POLL_INTERVAL, MIN_POLL_INTERVAL,
};
pub use coordinator::InstallCoordinator;
pub use error::{InstallError, InstallResult, RegistrationError, ValidationError};
pub use extractor::{ArchiveExtractor, ZipExtractor};
pub use job::{
    AcceptWarnings, DeclineWarnings, InstallationJob, JobProgress, JobState, SpaceConfirmation,
};
pub use preflight::{
    FixedVolume, PreflightOutcome, PreflightValidator, SpaceWarning, SystemVolumeProbe,
    VolumeProbe, VolumeSpace,
};
pub use progress::{directory_size, ProgressMonitor, StageAccounting};
pub use resolver::{NameAssignment, Registration, RegistrationResolver};
