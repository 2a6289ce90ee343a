//! HTTP archive downloader.
//!
//! Streams the response body to the target file in fixed-size chunks and
//! checks the cancellation token between chunks. There is no resume: a
//! cancelled or failed download leaves its partial file behind.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::Fetcher;
use crate::installer::config::DEFAULT_HTTP_TIMEOUT_SECS;
use crate::installer::error::{InstallError, InstallResult};

/// Buffer size for reading/writing during downloads (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Downloads archives over HTTP(S).
///
/// The blocking client is built per fetch on the calling thread, so the
/// downloader itself can be created and dropped inside an async runtime.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    timeout: Duration,
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpDownloader {
    /// Create a downloader with the default timeout.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
    }

    /// Create a downloader with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn fetch_error(url: &str, detail: impl ToString) -> InstallError {
        InstallError::Fetch {
            url: url.to_string(),
            detail: detail.to_string(),
        }
    }

    fn stream_to_file(
        &self,
        url: &str,
        target: &Path,
        cancel: &CancellationToken,
    ) -> InstallResult<u64> {
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| Self::fetch_error(url, e))?;

        let mut response = client.get(url).send().map_err(|e| {
            if e.is_timeout() {
                Self::fetch_error(
                    url,
                    format!("request timed out after {}s", self.timeout.as_secs()),
                )
            } else {
                Self::fetch_error(url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::fetch_error(
                url,
                format!("GET request failed with status {}", status),
            ));
        }

        let file = File::create(target).map_err(|e| InstallError::Fetch {
            url: url.to_string(),
            detail: format!("cannot create {}: {}", target.display(), e),
        })?;

        let mut writer = BufWriter::new(file);
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut downloaded = 0u64;

        loop {
            if cancel.is_cancelled() {
                writer.flush().ok();
                debug!(url, downloaded, "Download cancelled");
                return Err(InstallError::Cancelled);
            }

            let bytes_read = response
                .read(&mut buffer)
                .map_err(|e| Self::fetch_error(url, format!("read error: {}", e)))?;

            if bytes_read == 0 {
                break;
            }

            writer
                .write_all(&buffer[..bytes_read])
                .map_err(|e| Self::fetch_error(url, format!("write error: {}", e)))?;

            downloaded += bytes_read as u64;
        }

        writer
            .flush()
            .map_err(|e| Self::fetch_error(url, format!("write error: {}", e)))?;

        Ok(downloaded)
    }
}

impl Fetcher for HttpDownloader {
    fn fetch(&self, url: &str, target: &Path, cancel: &CancellationToken) -> InstallResult<u64> {
        info!(url, target = %target.display(), "Downloading archive");
        let bytes = self.stream_to_file(url, target, cancel)?;
        info!(url, bytes, "Download complete");
        Ok(bytes)
    }
}
