//! Configuration for installation jobs.

use std::time::Duration;

/// Default interval between progress samples.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Shortest accepted progress interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Longest accepted progress interval.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default timeout for HTTP requests in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 300; // 5 minutes

/// Directory whose presence identifies a package root.
pub const DEFAULT_MARKER_DIR: &str = "routes";

/// Highest disambiguation index tried before registration gives up.
pub const DEFAULT_MAX_NAME_INDEX: usize = 1000;

/// Configuration for an installation job.
#[derive(Debug, Clone)]
pub struct InstallerConfig {
    /// How often the progress monitor samples the destination.
    pub poll_interval: Duration,

    /// HTTP request timeout for archive downloads.
    pub http_timeout: Duration,

    /// Name of the directory that marks a package root.
    pub marker_dir: String,

    /// Highest `"<name> (<index>)"` index tried during registration.
    pub max_name_index: usize,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            marker_dir: DEFAULT_MARKER_DIR.to_string(),
            max_name_index: DEFAULT_MAX_NAME_INDEX,
        }
    }
}

impl InstallerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the progress sampling interval, clamped to 1–3 seconds.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL);
        self
    }

    /// Set the progress sampling interval without clamping.
    ///
    /// Only tests need intervals outside the supported range.
    #[doc(hidden)]
    pub fn with_poll_interval_unchecked(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the HTTP timeout.
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Set the package root marker directory.
    pub fn with_marker_dir(mut self, marker: impl Into<String>) -> Self {
        self.marker_dir = marker.into();
        self
    }

    /// Set the disambiguation cap (minimum 1).
    pub fn with_max_name_index(mut self, max: usize) -> Self {
        self.max_name_index = max.max(1);
        self
    }
}
