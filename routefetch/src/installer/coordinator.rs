//! Single active job enforcement.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use super::config::InstallerConfig;
use super::error::{InstallError, InstallResult};
use super::job::InstallationJob;
use crate::content::ContentSource;

/// Hands out installation jobs, at most one active at a time.
///
/// A job stays active until it reaches a terminal state or is dropped.
/// Requests made while a job is active are rejected, not queued.
#[derive(Debug, Clone, Default)]
pub struct InstallCoordinator {
    active: Arc<AtomicBool>,
}

impl InstallCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a job is currently active.
    pub fn is_busy(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Create a job for `source`, or fail if another job is active.
    pub fn begin(
        &self,
        source: Arc<ContentSource>,
        destination: impl Into<PathBuf>,
        config: InstallerConfig,
    ) -> InstallResult<InstallationJob> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(source = source.name(), "Installation already in progress");
            return Err(InstallError::JobAlreadyActive);
        }

        let guard = ActiveJobGuard {
            flag: Arc::clone(&self.active),
        };
        Ok(InstallationJob::new(source, destination, config).with_guard(guard))
    }
}

/// Clears the active flag when dropped.
#[derive(Debug)]
pub(crate) struct ActiveJobGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for ActiveJobGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
