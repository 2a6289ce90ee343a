//! The installation job state machine.
//!
//! One job installs one [`ContentSource`] into one destination directory:
//!
//! ```text
//! Idle → Preflight → Fetching → Extracting → Registering → Completed
//!            │           │           │            │
//!            └───────────┴───────────┴────────────┴──→ Failed
//!            └───────────┴───────────┴──────────────→ Cancelled
//! ```
//!
//! Extracting is skipped for repository sources. The controlling task owns
//! every transition; fetch and extraction run on the blocking pool while a
//! [`ProgressMonitor`] samples the destination. Progress is published on a
//! watch channel, so subscribers always see the most recent value only.

use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::acquire::{Acquirer, FetchOutcome, HttpDownloader};
use super::config::InstallerConfig;
use super::coordinator::ActiveJobGuard;
use super::error::{InstallError, InstallResult, RegistrationError, ValidationError};
use super::extractor::{ArchiveExtractor, ZipExtractor};
use super::preflight::{
    PreflightOutcome, PreflightValidator, SpaceWarning, SystemVolumeProbe, VolumeProbe,
};
use super::progress::{ProgressMonitor, StageAccounting};
use super::resolver::{NameAssignment, RegistrationResolver};
use crate::content::{ContentSource, InstallationRecord};
use crate::registry::{Registry, RegistryError};
use crate::units::format_kb;

/// Where a job is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Idle,
    Preflight,
    Fetching,
    Extracting,
    Registering,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Preflight => "Preflight",
            Self::Fetching => "Fetching",
            Self::Extracting => "Extracting",
            Self::Registering => "Registering",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Completed, Failed and Cancelled end the job.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether a job may move from `self` to `next`.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Preflight | Fetching | Extracting, Cancelled) => true,
            (Idle, Preflight)
            | (Preflight, Fetching)
            | (Fetching, Extracting)
            | (Fetching, Registering)
            | (Extracting, Registering)
            | (Registering, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Latest progress of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobProgress {
    pub state: JobState,
    pub bytes_observed: u64,
}

impl JobProgress {
    pub fn new(state: JobState, bytes_observed: u64) -> Self {
        Self {
            state,
            bytes_observed,
        }
    }

    /// Status line for display, e.g. `"downloaded: 1,024 kB"`.
    pub fn display(&self) -> String {
        match self.state {
            JobState::Fetching => format!("downloaded: {}", format_kb(self.bytes_observed)),
            JobState::Extracting => format!("installed: {}", format_kb(self.bytes_observed)),
            other => other.name().to_lowercase(),
        }
    }
}

/// Asks whether to continue after a low disk space warning.
///
/// Called from the blocking pool, so implementations may prompt
/// synchronously.
pub trait SpaceConfirmation: Send + Sync {
    fn confirm(&self, warning: &SpaceWarning) -> bool;
}

/// Always continues.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptWarnings;

impl SpaceConfirmation for AcceptWarnings {
    fn confirm(&self, _warning: &SpaceWarning) -> bool {
        true
    }
}

/// Never continues. The default for unattended jobs.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeclineWarnings;

impl SpaceConfirmation for DeclineWarnings {
    fn confirm(&self, _warning: &SpaceWarning) -> bool {
        false
    }
}

/// One run of the fetch → extract → register pipeline.
pub struct InstallationJob {
    source: Arc<ContentSource>,
    destination: PathBuf,
    config: InstallerConfig,
    acquirer: Acquirer,
    extractor: Arc<dyn ArchiveExtractor>,
    confirmation: Arc<dyn SpaceConfirmation>,
    volume_probe: Arc<dyn VolumeProbe>,
    state: JobState,
    history: Vec<JobState>,
    bytes_observed: u64,
    last_error: Option<String>,
    cancel: CancellationToken,
    progress: Arc<watch::Sender<JobProgress>>,
    guard: Option<ActiveJobGuard>,
}

impl fmt::Debug for InstallationJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallationJob")
            .field("source", &self.source.name())
            .field("destination", &self.destination)
            .field("state", &self.state)
            .field("bytes_observed", &self.bytes_observed)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

impl InstallationJob {
    /// Create an idle job installing `source` into `destination`.
    ///
    /// A relative destination is taken against the current working directory.
    pub fn new(
        source: Arc<ContentSource>,
        destination: impl Into<PathBuf>,
        config: InstallerConfig,
    ) -> Self {
        let (progress, _) = watch::channel(JobProgress::new(JobState::Idle, 0));
        let acquirer = Acquirer::new()
            .with_archive_fetcher(Arc::new(HttpDownloader::with_timeout(config.http_timeout)));

        Self {
            source,
            destination: absolute_destination(destination.into()),
            config,
            acquirer,
            extractor: Arc::new(ZipExtractor::new()),
            confirmation: Arc::new(DeclineWarnings),
            volume_probe: Arc::new(SystemVolumeProbe),
            state: JobState::Idle,
            history: vec![JobState::Idle],
            bytes_observed: 0,
            last_error: None,
            cancel: CancellationToken::new(),
            progress: Arc::new(progress),
            guard: None,
        }
    }

    pub fn with_acquirer(mut self, acquirer: Acquirer) -> Self {
        self.acquirer = acquirer;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn ArchiveExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_confirmation(mut self, confirmation: Arc<dyn SpaceConfirmation>) -> Self {
        self.confirmation = confirmation;
        self
    }

    pub fn with_volume_probe(mut self, probe: Arc<dyn VolumeProbe>) -> Self {
        self.volume_probe = probe;
        self
    }

    pub(crate) fn with_guard(mut self, guard: ActiveJobGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn source(&self) -> &ContentSource {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Every state visited so far, starting with `Idle`.
    pub fn history(&self) -> &[JobState] {
        &self.history
    }

    pub fn bytes_observed(&self) -> u64 {
        self.bytes_observed
    }

    /// Message of the error that ended the job, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Receiver for progress updates.
    pub fn subscribe(&self) -> watch::Receiver<JobProgress> {
        self.progress.subscribe()
    }

    /// Token that cancels this job when triggered.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run the job to a terminal state.
    ///
    /// On success the record has been inserted into `registry` and the
    /// registry flushed. On failure nothing is written to the registry and
    /// partial content is left in the destination.
    pub async fn run<R: Registry + ?Sized>(
        &mut self,
        registry: &mut R,
    ) -> InstallResult<InstallationRecord> {
        if self.state != JobState::Idle {
            return Err(InstallError::JobNotIdle { state: self.state });
        }

        let result = self.execute(registry).await;

        if let Err(e) = &result {
            self.last_error = Some(e.to_string());
            if e.is_cancelled() && self.state.can_transition_to(JobState::Cancelled) {
                self.transition(JobState::Cancelled);
            } else {
                warn!(source = self.source.name(), error = %e, "Installation failed");
                self.transition(JobState::Failed);
            }
        }

        self.guard.take();
        result
    }

    async fn execute<R: Registry + ?Sized>(
        &mut self,
        registry: &mut R,
    ) -> InstallResult<InstallationRecord> {
        self.transition(JobState::Preflight);
        self.preflight().await?;

        self.check_cancelled()?;
        self.transition(JobState::Fetching);
        let outcome = self.fetch().await?;

        if let Some(archive) = outcome.archive {
            self.check_cancelled()?;
            self.transition(JobState::Extracting);
            self.extract(archive, outcome.bytes).await?;
        }

        self.check_cancelled()?;
        self.transition(JobState::Registering);
        let record = self.register(registry)?;

        self.transition(JobState::Completed);
        Ok(record)
    }

    async fn preflight(&mut self) -> InstallResult<()> {
        let space = self.volume_probe.probe(&self.destination);
        let outcome =
            PreflightValidator::new().validate(&self.source, &self.destination, space.as_ref());

        match outcome {
            PreflightOutcome::Proceed => Ok(()),
            PreflightOutcome::Reject(reason) => Err(reason.into()),
            PreflightOutcome::ProceedWithWarning(warning) => {
                info!(source = self.source.name(), %warning, "Asking to continue");

                let confirmation = Arc::clone(&self.confirmation);
                let prompt = warning.clone();
                let accepted = tokio::task::spawn_blocking(move || confirmation.confirm(&prompt))
                    .await
                    .unwrap_or(false);

                self.check_cancelled()?;
                if accepted {
                    Ok(())
                } else {
                    Err(ValidationError::InsufficientSpaceDeclined(warning).into())
                }
            }
        }
    }

    async fn fetch(&mut self) -> InstallResult<FetchOutcome> {
        let acquirer = self.acquirer.clone();
        let source = Arc::clone(&self.source);
        let destination = self.destination.clone();

        let outcome = self
            .run_stage(JobState::Fetching, StageAccounting::raw(), move |cancel| {
                acquirer.acquire(&source, &destination, &cancel)
            })
            .await?;

        self.bytes_observed = self.bytes_observed.max(outcome.bytes);
        Ok(outcome)
    }

    async fn extract(&mut self, archive: PathBuf, downloaded: u64) -> InstallResult<()> {
        let baseline = fs::metadata(&archive)
            .map(|m| m.len())
            .unwrap_or(downloaded);
        let extractor = Arc::clone(&self.extractor);
        let destination = self.destination.clone();

        let files = self
            .run_stage(
                JobState::Extracting,
                StageAccounting::offset(baseline),
                move |cancel| extractor.extract(&archive, &destination, &cancel),
            )
            .await?;

        debug!(files, "Archive expanded");
        Ok(())
    }

    fn register<R: Registry + ?Sized>(
        &mut self,
        registry: &mut R,
    ) -> InstallResult<InstallationRecord> {
        let resolver = RegistrationResolver::from_config(&self.config);
        let name = self.source.name();
        let (package_root, assignment) = resolver.resolve(&*registry, name, &self.destination)?;

        let record = InstallationRecord::new(
            assignment.name(),
            self.destination.clone(),
            package_root.clone(),
        );
        let previous = registry.installation(name);

        if let Err(e) = commit_registration(registry, name, &assignment, &package_root, &record) {
            if let NameAssignment::New(key) = &assignment {
                registry.remove(key);
            }
            match &previous {
                Some(earlier) => {
                    // Best effort; the commit error is the one reported
                    let _ = registry.record_installation(name, earlier);
                }
                None => {
                    registry.remove_installation(name);
                }
            }
            warn!(source = name, error = %e, "Registry update rolled back");
            return Err(RegistrationError::from(e).into());
        }

        match &assignment {
            NameAssignment::New(key) => {
                info!(name = key.as_str(), root = %package_root.display(), "Registered content")
            }
            NameAssignment::AlreadyRegistered(key) => {
                info!(name = key.as_str(), root = %package_root.display(), "Content already registered")
            }
        }
        Ok(record)
    }

    /// Run `work` on the blocking pool while sampling progress.
    ///
    /// Waits for `work` to return even after cancellation, so the stage has
    /// acknowledged before the job moves on.
    async fn run_stage<T, F>(
        &mut self,
        state: JobState,
        accounting: StageAccounting,
        work: F,
    ) -> InstallResult<T>
    where
        T: Send + 'static,
        F: FnOnce(CancellationToken) -> InstallResult<T> + Send + 'static,
    {
        let monitor = ProgressMonitor::spawn(
            self.destination.clone(),
            state,
            accounting,
            self.config.poll_interval,
            Arc::clone(&self.progress),
        );

        let cancel = self.cancel.clone();
        let mut handle = tokio::task::spawn_blocking(move || work(cancel));

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let joined = loop {
            tokio::select! {
                joined = &mut handle => break joined,
                _ = ticker.tick() => {
                    self.bytes_observed = monitor.latest();
                }
            }
        };

        self.bytes_observed = monitor.finish().await;

        joined.map_err(|e| InstallError::Install {
            path: self.destination.clone(),
            detail: format!("{} stage aborted: {}", state, e),
        })?
    }

    fn check_cancelled(&self) -> InstallResult<()> {
        if self.cancel.is_cancelled() {
            Err(InstallError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn transition(&mut self, next: JobState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {} -> {}",
            self.state,
            next
        );
        info!(
            source = self.source.name(),
            from = %self.state,
            to = %next,
            "Job state changed"
        );

        if matches!(next, JobState::Fetching | JobState::Extracting) {
            self.bytes_observed = 0;
        }
        self.state = next;
        self.history.push(next);
        self.progress
            .send_replace(JobProgress::new(next, self.bytes_observed));
    }
}

/// Apply a resolved registration: insert, record, flush.
fn commit_registration<R: Registry + ?Sized>(
    registry: &mut R,
    source_name: &str,
    assignment: &NameAssignment,
    package_root: &Path,
    record: &InstallationRecord,
) -> Result<(), RegistryError> {
    if let NameAssignment::New(key) = assignment {
        registry.insert(key, package_root)?;
    }
    registry.record_installation(source_name, record)?;
    registry.flush()
}

/// `path` joined onto the working directory when relative, with `.` and `..`
/// resolved lexically.
fn absolute_destination(path: PathBuf) -> PathBuf {
    let joined = if path.is_absolute() {
        path
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Working directory unavailable");
                return path;
            }
        }
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}
