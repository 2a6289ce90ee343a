//! Progress estimation by sampling bytes on disk.
//!
//! Neither a git clone nor a plain HTTP download reports byte-level progress
//! through a portable API, so the monitor periodically sums the size of every
//! file under the destination instead. The figure only ever grows within a
//! stage:
//!
//! - **Fetching**: raw recursive size, dominated by the growing archive
//! - **Extracting**: recursive size minus the downloaded archive's size,
//!   clamped to zero, so only expanded content is counted
//!
//! The monitor is a read-only observer. Files vanishing mid-walk count as
//! zero, and it stops as soon as the stage it watches finishes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use walkdir::WalkDir;

use super::job::{JobProgress, JobState};

/// Total size in bytes of all files under `root`.
///
/// Entries that disappear or cannot be read while walking are skipped, and a
/// missing root yields zero.
pub fn directory_size(root: &Path) -> u64 {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.metadata().map(|m| m.len()).unwrap_or(0))
        .sum()
}

/// Converts raw directory sizes into the figure reported for one stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageAccounting {
    baseline: u64,
    high_water: u64,
}

impl StageAccounting {
    /// Accounting for a stage that counts raw bytes.
    pub fn raw() -> Self {
        Self::default()
    }

    /// Accounting that subtracts `baseline` bytes (the archive size) from
    /// every sample.
    pub fn offset(baseline: u64) -> Self {
        Self {
            baseline,
            high_water: 0,
        }
    }

    pub fn baseline(&self) -> u64 {
        self.baseline
    }

    /// Record a raw sample and return the value to report.
    ///
    /// The result is `raw - baseline` clamped at zero, and never lower than a
    /// previous result.
    pub fn observe(&mut self, raw: u64) -> u64 {
        let adjusted = raw.saturating_sub(self.baseline);
        self.high_water = self.high_water.max(adjusted);
        self.high_water
    }

    /// Last value returned by [`observe`](Self::observe).
    pub fn current(&self) -> u64 {
        self.high_water
    }
}

/// Background sampler for one stage.
///
/// Publishes a [`JobProgress`] on every tick through a watch channel, where
/// only the latest value matters.
pub struct ProgressMonitor {
    stop: CancellationToken,
    handle: JoinHandle<u64>,
    latest: Arc<AtomicU64>,
}

impl ProgressMonitor {
    /// Start sampling `root` every `interval`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        root: PathBuf,
        state: JobState,
        accounting: StageAccounting,
        interval: Duration,
        progress: Arc<watch::Sender<JobProgress>>,
    ) -> Self {
        let stop = CancellationToken::new();
        let latest = Arc::new(AtomicU64::new(accounting.current()));

        let handle = tokio::spawn(sample_loop(
            root,
            state,
            accounting,
            interval,
            progress,
            stop.clone(),
            Arc::clone(&latest),
        ));

        Self {
            stop,
            handle,
            latest,
        }
    }

    /// Most recent reported value.
    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    /// Stop sampling and return the last reported value.
    pub async fn finish(self) -> u64 {
        self.stop.cancel();
        match self.handle.await {
            Ok(value) => value,
            Err(_) => self.latest.load(Ordering::SeqCst),
        }
    }
}

async fn sample_loop(
    root: PathBuf,
    state: JobState,
    mut accounting: StageAccounting,
    interval: Duration,
    progress: Arc<watch::Sender<JobProgress>>,
    stop: CancellationToken,
    latest: Arc<AtomicU64>,
) -> u64 {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let walk_root = root.clone();
        let raw = tokio::task::spawn_blocking(move || directory_size(&walk_root))
            .await
            .unwrap_or(0);

        if stop.is_cancelled() {
            // The stage finished while we were walking; the sample may have
            // raced with the final moves or deletes.
            break;
        }

        let reported = accounting.observe(raw);
        latest.store(reported, Ordering::SeqCst);
        progress.send_replace(JobProgress::new(state, reported));
        debug!(stage = %state, raw, reported, "Progress sample");
    }

    accounting.current()
}
