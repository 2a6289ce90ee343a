//! Preflight checks run before any network activity.
//!
//! The validator looks at the install target and the free space on its volume
//! and decides whether the job may proceed. It is synchronous and never spawns
//! background work.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::error::ValidationError;
use crate::content::ContentSource;
use crate::units::{group_thousands, to_kb};

/// Free space on the volume holding the install target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSpace {
    /// Bytes available to the current user.
    pub available_bytes: u64,
    /// Volume name (mount point or drive).
    pub name: String,
    /// Volume label, where the platform has one.
    pub label: Option<String>,
}

impl VolumeSpace {
    pub fn new(available_bytes: u64, name: impl Into<String>) -> Self {
        Self {
            available_bytes,
            name: name.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Low disk space figures shown to the user before they decide to continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceWarning {
    /// Install size plus download size, in bytes.
    pub required_bytes: u64,
    /// Free bytes on the target volume.
    pub available_bytes: u64,
    /// Volume name.
    pub volume_name: String,
    /// Volume label, if known.
    pub volume_label: Option<String>,
}

impl SpaceWarning {
    pub fn required_kb(&self) -> u64 {
        to_kb(self.required_bytes)
    }

    pub fn available_kb(&self) -> u64 {
        to_kb(self.available_bytes)
    }
}

impl fmt::Display for SpaceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not enough disk space on {}", self.volume_name)?;
        if let Some(label) = &self.volume_label {
            write!(f, " ({})", label)?;
        }
        write!(
            f,
            ", available {} kB, needed {} kB",
            group_thousands(self.available_kb()),
            group_thousands(self.required_kb())
        )
    }
}

/// Outcome of the preflight check.
#[derive(Debug)]
pub enum PreflightOutcome {
    /// Everything is in order.
    Proceed,
    /// The target is ready but space looks short; the caller must confirm.
    ProceedWithWarning(SpaceWarning),
    /// The job must not start.
    Reject(ValidationError),
}

impl PreflightOutcome {
    pub fn is_proceed(&self) -> bool {
        matches!(self, Self::Proceed)
    }
}

/// Whether `required` exceeds `available` plus a 10% safety margin.
///
/// Integer arithmetic, so the boundary `required == available * 1.1` is exact
/// and counts as enough space.
pub fn exceeds_free_space(required: u64, available: u64) -> bool {
    (required as u128) * 10 > (available as u128) * 11
}

/// Validates the install target and free space.
#[derive(Debug, Default, Clone, Copy)]
pub struct PreflightValidator;

impl PreflightValidator {
    pub fn new() -> Self {
        Self
    }

    /// Check `install_root` for `source`.
    ///
    /// Rejections are checked first: unsupported URL, missing parent, and a
    /// non-empty target. A missing target is created here. The space check
    /// runs last and only when both the source size and `space` are known.
    pub fn validate(
        &self,
        source: &ContentSource,
        install_root: &Path,
        space: Option<&VolumeSpace>,
    ) -> PreflightOutcome {
        if source.strategy().is_none() {
            return PreflightOutcome::Reject(ValidationError::UnsupportedSource {
                url: source.url().to_string(),
            });
        }

        if let Err(e) = prepare_target(install_root) {
            return PreflightOutcome::Reject(e);
        }

        let Some(required) = source.required_space() else {
            debug!(source = source.name(), "Size unknown, skipping space check");
            return PreflightOutcome::Proceed;
        };

        let Some(space) = space else {
            warn!(
                path = %install_root.display(),
                "Free space unknown, skipping space check"
            );
            return PreflightOutcome::Proceed;
        };

        if exceeds_free_space(required, space.available_bytes) {
            PreflightOutcome::ProceedWithWarning(SpaceWarning {
                required_bytes: required,
                available_bytes: space.available_bytes,
                volume_name: space.name.clone(),
                volume_label: space.label.clone(),
            })
        } else {
            PreflightOutcome::Proceed
        }
    }
}

/// Ensure the parent exists and the target is absent or empty, creating it
/// when absent.
fn prepare_target(install_root: &Path) -> Result<(), ValidationError> {
    let parent = install_root
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    if !parent.is_dir() {
        return Err(ValidationError::ParentMissing {
            path: parent.to_path_buf(),
        });
    }

    if install_root.exists() {
        let mut entries =
            fs::read_dir(install_root).map_err(|source| ValidationError::InspectFailed {
                path: install_root.to_path_buf(),
                source,
            })?;
        if entries.next().is_some() {
            return Err(ValidationError::TargetNotEmpty {
                path: install_root.to_path_buf(),
            });
        }
        return Ok(());
    }

    fs::create_dir(install_root).map_err(|source| ValidationError::CreateFailed {
        path: install_root.to_path_buf(),
        source,
    })
}

/// Source of free-space figures for a path.
pub trait VolumeProbe: Send + Sync {
    /// Free space on the volume that holds `path` (or would hold it).
    ///
    /// Returns `None` when the figure cannot be determined.
    fn probe(&self, path: &Path) -> Option<VolumeSpace>;
}

/// Probe that reports the same figures for every path.
#[derive(Debug, Clone)]
pub struct FixedVolume(pub VolumeSpace);

impl VolumeProbe for FixedVolume {
    fn probe(&self, _path: &Path) -> Option<VolumeSpace> {
        Some(self.0.clone())
    }
}

/// Probe backed by the operating system.
///
/// Uses `statvfs` on Unix. Elsewhere free space is reported as unknown and the
/// space check is skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemVolumeProbe;

impl VolumeProbe for SystemVolumeProbe {
    fn probe(&self, path: &Path) -> Option<VolumeSpace> {
        let existing = nearest_existing_ancestor(path)?;
        match system_space(&existing) {
            Ok(space) => Some(space),
            Err(e) => {
                warn!(path = %existing.display(), error = %e, "Failed to query free space");
                None
            }
        }
    }
}

fn nearest_existing_ancestor(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .filter(|p| !p.as_os_str().is_empty())
        .find(|p| p.exists())
        .map(Path::to_path_buf)
}

#[cfg(unix)]
fn system_space(path: &Path) -> io::Result<VolumeSpace> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    // SAFETY: statvfs only writes into the zeroed struct we own, and c_path is
    // a valid NUL-terminated string for the duration of the call.
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }

    #[allow(clippy::unnecessary_cast)]
    let available = (stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64);

    Ok(VolumeSpace::new(
        available,
        mount_point(path).display().to_string(),
    ))
}

#[cfg(not(unix))]
fn system_space(_path: &Path) -> io::Result<VolumeSpace> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "free space query not supported on this platform",
    ))
}

/// Walk up from `path` until the device changes.
#[cfg(unix)]
fn mount_point(path: &Path) -> PathBuf {
    use std::os::unix::fs::MetadataExt;

    let Ok(canonical) = path.canonicalize() else {
        return path.to_path_buf();
    };
    let Ok(meta) = fs::metadata(&canonical) else {
        return canonical;
    };
    let device = meta.dev();

    let mut mount = canonical.clone();
    for ancestor in canonical.ancestors().skip(1) {
        match fs::metadata(ancestor) {
            Ok(m) if m.dev() == device => mount = ancestor.to_path_buf(),
            _ => break,
        }
    }
    mount
}
