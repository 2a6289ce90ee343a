//! Integration tests for the installation pipeline.
//!
//! These tests run whole jobs against temporary directories:
//! - zip and git installs from start to finish
//! - preflight rejection and declined space warnings
//! - cancellation while fetching or extracting
//! - registry rollback when the registry cannot be written
//! - single active job enforcement
//!
//! No network access: archives are served by a local fetcher and
//! repositories are cloned from a local path.
//!
//! Run with: `cargo test --test install_pipeline`

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use git2::{Repository, Signature};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use routefetch::content::{ContentSource, InstallationRecord};
use routefetch::installer::{
    AcceptWarnings, Acquirer, ArchiveExtractor, Fetcher, FixedVolume, InstallCoordinator,
    InstallError, InstallResult, InstallationJob, InstallerConfig, JobProgress, JobState,
    RegistrationError, ValidationError, VolumeSpace,
};
use routefetch::registry::{JsonRegistry, MemoryRegistry, Registry, RegistryError};

// ============================================================================
// Helper Functions
// ============================================================================

/// Serves a prepared archive by copying it to the target.
struct LocalArchive {
    fixture: PathBuf,
    calls: AtomicUsize,
}

impl LocalArchive {
    fn new(fixture: PathBuf) -> Arc<Self> {
        Arc::new(Self {
            fixture,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Fetcher for LocalArchive {
    fn fetch(&self, _url: &str, target: &Path, _cancel: &CancellationToken) -> InstallResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        fs::copy(&self.fixture, target).map_err(|e| InstallError::Fetch {
            url: self.fixture.display().to_string(),
            detail: e.to_string(),
        })
    }
}

/// Writes data until cancelled.
#[derive(Default)]
struct EndlessDownload {
    acknowledged: AtomicBool,
}

impl Fetcher for EndlessDownload {
    fn fetch(&self, _url: &str, target: &Path, cancel: &CancellationToken) -> InstallResult<u64> {
        let mut file = File::create(target).unwrap();
        let mut written = 0u64;
        loop {
            if cancel.is_cancelled() {
                self.acknowledged.store(true, Ordering::SeqCst);
                return Err(InstallError::Cancelled);
            }
            file.write_all(&[0u8; 1024]).unwrap();
            written += 1024;
            std::thread::sleep(Duration::from_millis(5));
            if written > 64 * 1024 * 1024 {
                panic!("download was never cancelled");
            }
        }
    }
}

fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    let options = SimpleFileOptions::default();
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap();
}

/// A route archive wrapping its content in one extra folder.
fn route_archive(dir: &Path) -> PathBuf {
    let path = dir.join("fixture.zip");
    write_zip(
        &path,
        &[
            ("Demo Route/routes/demo/demo.trk", b"track data"),
            ("Demo Route/trains/trainset/loco.eng", b"engine"),
            ("Demo Route/readme.txt", b"readme"),
        ],
    );
    path
}

fn init_repo(path: &Path, files: &[(&str, &str)]) {
    let repo = Repository::init(path).unwrap();
    for (name, content) in files {
        let file = path.join(name);
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, content).unwrap();
    }
    let mut index = repo.index().unwrap();
    for (name, _) in files {
        index.add_path(Path::new(name)).unwrap();
    }
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let signature = Signature::now("Route Builder", "builder@example.com").unwrap();
    repo.commit(Some("HEAD"), &signature, &signature, "Initial", &tree, &[])
        .unwrap();
}

fn fast_config() -> InstallerConfig {
    InstallerConfig::new().with_poll_interval_unchecked(Duration::from_millis(10))
}

fn plenty_of_space() -> Arc<FixedVolume> {
    Arc::new(FixedVolume(VolumeSpace::new(1 << 40, "/data")))
}

fn zip_source() -> Arc<ContentSource> {
    Arc::new(
        ContentSource::new("Demo", "https://example.com/routes/demo.zip")
            .with_sizes(Some(1_000_000), Some(400_000)),
    )
}

/// Content parent directory and the job destination inside it.
fn destination(temp: &TempDir) -> PathBuf {
    let parent = temp.path().join("content");
    fs::create_dir(&parent).unwrap();
    parent.join("Demo")
}

fn zip_job(source: Arc<ContentSource>, dest: &Path, fetcher: Arc<LocalArchive>) -> InstallationJob {
    InstallationJob::new(source, dest, fast_config())
        .with_acquirer(Acquirer::new().with_archive_fetcher(fetcher))
        .with_volume_probe(plenty_of_space())
}

/// Writes part of the content, then waits to be cancelled.
#[derive(Default)]
struct StalledExtraction {
    acknowledged: AtomicBool,
}

const STALLED_BYTES: usize = 4096;

impl ArchiveExtractor for StalledExtraction {
    fn extract(
        &self,
        _archive: &Path,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> InstallResult<usize> {
        fs::create_dir_all(dest.join("routes")).unwrap();
        fs::write(dest.join("routes/partial.trk"), vec![7u8; STALLED_BYTES]).unwrap();

        for _ in 0..2000 {
            if cancel.is_cancelled() {
                self.acknowledged.store(true, Ordering::SeqCst);
                return Err(InstallError::Cancelled);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("extraction was never cancelled");
    }
}

/// In-memory registry whose flush always fails.
#[derive(Default)]
struct FullDisk {
    inner: MemoryRegistry,
}

impl Registry for FullDisk {
    fn lookup(&self, name: &str) -> Option<PathBuf> {
        self.inner.lookup(name)
    }

    fn insert(&mut self, name: &str, directory: &Path) -> Result<(), RegistryError> {
        self.inner.insert(name, directory)
    }

    fn record_installation(
        &mut self,
        source_name: &str,
        record: &InstallationRecord,
    ) -> Result<(), RegistryError> {
        self.inner.record_installation(source_name, record)
    }

    fn installation(&self, source_name: &str) -> Option<InstallationRecord> {
        self.inner.installation(source_name)
    }

    fn remove(&mut self, name: &str) -> Option<PathBuf> {
        self.inner.remove(name)
    }

    fn remove_installation(&mut self, source_name: &str) -> Option<InstallationRecord> {
        self.inner.remove_installation(source_name)
    }

    fn flush(&mut self) -> Result<(), RegistryError> {
        Err(RegistryError::Io {
            path: PathBuf::from("registry.json"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        })
    }
}

// ============================================================================
// Integration Tests
// ============================================================================

/// A zip source with enough space and an empty target runs every stage.
#[tokio::test]
async fn test_zip_install_end_to_end() {
    let temp = TempDir::new().unwrap();
    let fetcher = LocalArchive::new(route_archive(temp.path()));
    let dest = destination(&temp);
    let mut registry = MemoryRegistry::new();

    let mut job = zip_job(zip_source(), &dest, fetcher.clone());
    let progress = job.subscribe();

    let record = job.run(&mut registry).await.unwrap();

    assert_eq!(
        job.history(),
        &[
            JobState::Idle,
            JobState::Preflight,
            JobState::Fetching,
            JobState::Extracting,
            JobState::Registering,
            JobState::Completed,
        ]
    );
    assert_eq!(job.state(), JobState::Completed);
    assert!(job.last_error().is_none());
    assert_eq!(fetcher.calls(), 1);

    // Archive removed, content nested one level down
    assert!(!dest.join("Demo.zip").exists());
    assert!(dest.join("Demo Route/routes/demo/demo.trk").is_file());

    assert_eq!(record.registry_name, "Demo");
    assert_eq!(record.directory, dest);
    assert_eq!(record.package_root, dest.join("Demo Route"));

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.lookup("Demo"), Some(dest.join("Demo Route")));
    assert_eq!(registry.installation("Demo"), Some(record));
    assert_eq!(registry.flush_count(), 1);

    assert_eq!(progress.borrow().state, JobState::Completed);
}

/// A non-empty target fails preflight and nothing is fetched.
#[tokio::test]
async fn test_non_empty_target_fails_before_fetching() {
    let temp = TempDir::new().unwrap();
    let fetcher = LocalArchive::new(route_archive(temp.path()));
    let dest = destination(&temp);
    fs::create_dir(&dest).unwrap();
    fs::write(dest.join("existing.txt"), "keep me").unwrap();
    let mut registry = MemoryRegistry::new();

    let mut job = zip_job(zip_source(), &dest, fetcher.clone());
    let result = job.run(&mut registry).await;

    assert!(matches!(
        result,
        Err(InstallError::Validation(ValidationError::TargetNotEmpty { .. }))
    ));
    assert_eq!(
        job.history(),
        &[JobState::Idle, JobState::Preflight, JobState::Failed]
    );
    assert_eq!(fetcher.calls(), 0);
    assert!(registry.is_empty());
    assert_eq!(registry.flush_count(), 0);
    assert!(job.last_error().unwrap().contains("not empty"));
    assert_eq!(fs::read_to_string(dest.join("existing.txt")).unwrap(), "keep me");
}

/// A missing parent directory is rejected.
#[tokio::test]
async fn test_missing_parent_fails() {
    let temp = TempDir::new().unwrap();
    let fetcher = LocalArchive::new(route_archive(temp.path()));
    let dest = temp.path().join("missing").join("Demo");
    let mut registry = MemoryRegistry::new();

    let mut job = zip_job(zip_source(), &dest, fetcher.clone());
    let result = job.run(&mut registry).await;

    assert!(matches!(
        result,
        Err(InstallError::Validation(ValidationError::ParentMissing { .. }))
    ));
    assert_eq!(job.state(), JobState::Failed);
    assert_eq!(fetcher.calls(), 0);
}

/// Declining a low space warning cancels the job.
#[tokio::test]
async fn test_declined_space_warning_cancels() {
    let temp = TempDir::new().unwrap();
    let fetcher = LocalArchive::new(route_archive(temp.path()));
    let dest = destination(&temp);
    let mut registry = MemoryRegistry::new();

    // 1,400,000 bytes needed, 1,100,000 * 1.1 = 1,210,000 available with margin
    let mut job = zip_job(zip_source(), &dest, fetcher.clone()).with_volume_probe(Arc::new(
        FixedVolume(VolumeSpace::new(1_100_000, "/data").with_label("Games")),
    ));
    let result = job.run(&mut registry).await;

    let err = result.unwrap_err();
    assert!(err.is_cancelled());
    match &err {
        InstallError::Validation(ValidationError::InsufficientSpaceDeclined(warning)) => {
            assert_eq!(warning.required_bytes, 1_400_000);
            assert_eq!(warning.available_bytes, 1_100_000);
            assert_eq!(warning.volume_label.as_deref(), Some("Games"));
        }
        other => panic!("expected declined warning, got {:?}", other),
    }
    assert_eq!(
        job.history(),
        &[JobState::Idle, JobState::Preflight, JobState::Cancelled]
    );
    assert_eq!(fetcher.calls(), 0);
    assert!(registry.is_empty());

    // The target was created before the warning and is left empty
    assert!(dest.is_dir());
    assert_eq!(fs::read_dir(&dest).unwrap().count(), 0);
}

/// Accepting a low space warning continues the install.
#[tokio::test]
async fn test_accepted_space_warning_proceeds() {
    let temp = TempDir::new().unwrap();
    let fetcher = LocalArchive::new(route_archive(temp.path()));
    let dest = destination(&temp);
    let mut registry = MemoryRegistry::new();

    let mut job = zip_job(zip_source(), &dest, fetcher)
        .with_volume_probe(Arc::new(FixedVolume(VolumeSpace::new(1_000, "/data"))))
        .with_confirmation(Arc::new(AcceptWarnings));

    job.run(&mut registry).await.unwrap();

    assert_eq!(job.state(), JobState::Completed);
    assert_eq!(registry.len(), 1);
}

/// A repository source is cloned and registered without an extraction stage.
#[tokio::test]
async fn test_git_install_end_to_end() {
    let temp = TempDir::new().unwrap();
    let origin = temp.path().join("origin");
    init_repo(
        &origin,
        &[
            ("routes/demo/demo.trk", "track data"),
            ("README.md", "Demo route"),
        ],
    );
    let dest = destination(&temp);
    let source = Arc::new(ContentSource::new(
        "Demo",
        format!("{}/.git", origin.display()),
    ));
    let mut registry = MemoryRegistry::new();

    let mut job =
        InstallationJob::new(source, &dest, fast_config()).with_volume_probe(plenty_of_space());
    let record = job.run(&mut registry).await.unwrap();

    assert_eq!(
        job.history(),
        &[
            JobState::Idle,
            JobState::Preflight,
            JobState::Fetching,
            JobState::Registering,
            JobState::Completed,
        ]
    );
    assert!(dest.join("routes/demo/demo.trk").is_file());
    assert_eq!(record.package_root, dest);
    assert_eq!(registry.lookup("Demo"), Some(dest.clone()));
}

/// Cancelling while fetching waits for the fetcher and ends in Cancelled.
#[tokio::test]
async fn test_cancel_during_fetch() {
    let temp = TempDir::new().unwrap();
    let dest = destination(&temp);
    let fetcher = Arc::new(EndlessDownload::default());
    let mut registry = MemoryRegistry::new();

    let mut job = InstallationJob::new(zip_source(), &dest, fast_config())
        .with_acquirer(Acquirer::new().with_archive_fetcher(fetcher.clone()))
        .with_volume_probe(plenty_of_space());

    let token = job.cancel_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let result = job.run(&mut registry).await;

    assert!(matches!(result, Err(InstallError::Cancelled)));
    assert!(fetcher.acknowledged.load(Ordering::SeqCst));
    assert_eq!(
        job.history(),
        &[
            JobState::Idle,
            JobState::Preflight,
            JobState::Fetching,
            JobState::Cancelled,
        ]
    );
    assert!(registry.is_empty());
    // Partial download is left in place
    assert!(dest.join("Demo.zip").exists());
}

/// A corrupt archive fails the job during extraction.
#[tokio::test]
async fn test_corrupt_archive_fails_extraction() {
    let temp = TempDir::new().unwrap();
    let fixture = temp.path().join("broken.zip");
    fs::write(&fixture, b"definitely not a zip").unwrap();
    let dest = destination(&temp);
    let mut registry = MemoryRegistry::new();

    let mut job = zip_job(zip_source(), &dest, LocalArchive::new(fixture));
    let result = job.run(&mut registry).await;

    assert!(matches!(result, Err(InstallError::Install { .. })));
    assert_eq!(
        job.history(),
        &[
            JobState::Idle,
            JobState::Preflight,
            JobState::Fetching,
            JobState::Extracting,
            JobState::Failed,
        ]
    );
    assert!(dest.join("Demo.zip").exists());
    assert!(registry.is_empty());
}

/// Content without the marker directory cannot be registered.
#[tokio::test]
async fn test_missing_marker_fails_registration() {
    let temp = TempDir::new().unwrap();
    let fixture = temp.path().join("flat.zip");
    write_zip(&fixture, &[("Demo/readme.txt", b"no routes here")]);
    let dest = destination(&temp);
    let mut registry = MemoryRegistry::new();

    let mut job = zip_job(zip_source(), &dest, LocalArchive::new(fixture));
    let result = job.run(&mut registry).await;

    assert!(matches!(
        result,
        Err(InstallError::Registration(RegistrationError::RootNotFound { .. }))
    ));
    assert_eq!(job.state(), JobState::Failed);
    assert!(registry.is_empty());
    assert_eq!(registry.flush_count(), 0);
}

/// An existing entry for another directory pushes the new install to "Demo (1)".
#[tokio::test]
async fn test_registry_name_is_disambiguated() {
    let temp = TempDir::new().unwrap();
    let fetcher = LocalArchive::new(route_archive(temp.path()));
    let dest = destination(&temp);
    let mut registry = MemoryRegistry::with_entries([("Demo", "/elsewhere/Demo")]);

    let mut job = zip_job(zip_source(), &dest, fetcher);
    let record = job.run(&mut registry).await.unwrap();

    assert_eq!(record.registry_name, "Demo (1)");
    assert_eq!(registry.lookup("Demo"), Some(PathBuf::from("/elsewhere/Demo")));
    assert_eq!(registry.lookup("Demo (1)"), Some(dest.join("Demo Route")));
}

/// A completed install is durable in the JSON registry.
#[tokio::test]
async fn test_json_registry_persists_install() {
    let temp = TempDir::new().unwrap();
    let fetcher = LocalArchive::new(route_archive(temp.path()));
    let dest = destination(&temp);
    let registry_path = temp.path().join("registry.json");
    let mut registry = JsonRegistry::open(&registry_path).unwrap();

    let mut job = zip_job(zip_source(), &dest, fetcher);
    let record = job.run(&mut registry).await.unwrap();

    let reopened = JsonRegistry::open(&registry_path).unwrap();
    assert_eq!(reopened.lookup("Demo"), Some(dest.join("Demo Route")));
    let stored: InstallationRecord = reopened.installation("Demo").unwrap();
    assert_eq!(stored, record);
}

/// Only one job may be active at a time.
#[tokio::test]
async fn test_coordinator_allows_one_active_job() {
    let temp = TempDir::new().unwrap();
    let fetcher = LocalArchive::new(route_archive(temp.path()));
    let dest = destination(&temp);
    let coordinator = InstallCoordinator::new();
    let mut registry = MemoryRegistry::new();

    let job = coordinator
        .begin(zip_source(), &dest, fast_config())
        .unwrap();
    let mut job = job
        .with_acquirer(Acquirer::new().with_archive_fetcher(fetcher))
        .with_volume_probe(plenty_of_space());

    let rejected = coordinator.begin(zip_source(), temp.path().join("Other"), fast_config());
    assert!(matches!(rejected, Err(InstallError::JobAlreadyActive)));

    job.run(&mut registry).await.unwrap();

    // Released at the terminal state, before the job is dropped
    assert!(!coordinator.is_busy());
    assert!(coordinator
        .begin(zip_source(), temp.path().join("Other"), fast_config())
        .is_ok());
}

/// Cancelling while extracting waits for the extractor and ends in Cancelled.
#[tokio::test]
async fn test_cancel_during_extraction() {
    let temp = TempDir::new().unwrap();
    let fetcher = LocalArchive::new(route_archive(temp.path()));
    let archive_size = fs::metadata(temp.path().join("fixture.zip")).unwrap().len();
    let dest = destination(&temp);
    let extractor = Arc::new(StalledExtraction::default());
    let mut registry = MemoryRegistry::new();

    let mut job = zip_job(zip_source(), &dest, fetcher).with_extractor(extractor.clone());

    let token = job.cancel_token();
    let mut progress = job.subscribe();
    let watcher = tokio::spawn(async move {
        let mut extracting: Vec<JobProgress> = Vec::new();
        while progress.changed().await.is_ok() {
            let latest = *progress.borrow_and_update();
            if latest.state == JobState::Extracting {
                extracting.push(latest);
                if latest.bytes_observed >= STALLED_BYTES as u64 {
                    token.cancel();
                }
            }
            if latest.state.is_terminal() {
                break;
            }
        }
        extracting
    });

    let result = job.run(&mut registry).await;
    let extracting = watcher.await.unwrap();

    assert!(matches!(result, Err(InstallError::Cancelled)));
    assert!(extractor.acknowledged.load(Ordering::SeqCst));
    assert_eq!(
        job.history(),
        &[
            JobState::Idle,
            JobState::Preflight,
            JobState::Fetching,
            JobState::Extracting,
            JobState::Cancelled,
        ]
    );
    assert!(registry.is_empty());

    // The archive still on disk is not counted as installed content
    assert!(dest.join("Demo.zip").exists());
    assert!(!extracting.is_empty());
    for report in &extracting {
        assert!(
            report.bytes_observed <= STALLED_BYTES as u64,
            "{} includes the {} byte archive",
            report.bytes_observed,
            archive_size
        );
    }
    assert_eq!(
        extracting.last().map(|p| p.bytes_observed),
        Some(STALLED_BYTES as u64)
    );
}

/// A registry that cannot be flushed fails the job and keeps no new entries.
#[tokio::test]
async fn test_failed_registry_flush_rolls_back() {
    let temp = TempDir::new().unwrap();
    let fetcher = LocalArchive::new(route_archive(temp.path()));
    let dest = destination(&temp);
    let mut registry = FullDisk::default();

    let mut job = zip_job(zip_source(), &dest, fetcher);
    let result = job.run(&mut registry).await;

    match result {
        Err(InstallError::Registration(RegistrationError::Store(RegistryError::Io { .. }))) => {}
        other => panic!("expected registry store error, got {:?}", other),
    }
    assert_eq!(job.state(), JobState::Failed);
    assert!(job.last_error().unwrap().contains("disk full"));
    assert_eq!(registry.lookup("Demo"), None);
    assert_eq!(registry.installation("Demo"), None);
    assert!(registry.inner.is_empty());
}

/// A failed re-registration restores the earlier installation record.
#[tokio::test]
async fn test_failed_registry_flush_keeps_previous_record() {
    let temp = TempDir::new().unwrap();
    let fetcher = LocalArchive::new(route_archive(temp.path()));
    let dest = destination(&temp);
    let earlier = InstallationRecord::new("Demo", "/old/Demo", "/old/Demo");
    let mut registry = FullDisk {
        inner: MemoryRegistry::with_entries([("Demo", "/old/Demo")]),
    };
    registry.record_installation("Demo", &earlier).unwrap();

    let mut job = zip_job(zip_source(), &dest, fetcher);
    assert!(job.run(&mut registry).await.is_err());

    assert_eq!(registry.lookup("Demo"), Some(PathBuf::from("/old/Demo")));
    assert_eq!(registry.lookup("Demo (1)"), None);
    assert_eq!(registry.installation("Demo"), Some(earlier));
}

/// A relative destination is recorded as an absolute path.
#[cfg(unix)]
#[tokio::test]
async fn test_relative_destination_is_recorded_absolute() {
    use std::path::Component;

    let temp = TempDir::new().unwrap();
    let fetcher = LocalArchive::new(route_archive(temp.path()));
    let dest = destination(&temp);

    // Walk up from the working directory to the root, then down to `dest`
    let cwd = std::env::current_dir().unwrap();
    let relative: PathBuf = cwd
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .map(|_| Component::ParentDir)
        .collect::<PathBuf>()
        .join(dest.strip_prefix("/").unwrap());
    assert!(relative.is_relative());

    let mut registry = MemoryRegistry::new();
    let mut job = zip_job(zip_source(), &relative, fetcher);
    let record = job.run(&mut registry).await.unwrap();

    assert!(record.directory.is_absolute());
    assert_eq!(record.directory, dest);
    assert_eq!(record.package_root, dest.join("Demo Route"));
    assert_eq!(registry.lookup("Demo"), Some(dest.join("Demo Route")));
}
