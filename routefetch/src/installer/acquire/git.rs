//! Repository clone via libgit2.
//!
//! Cancellation is cooperative: the transfer-progress callback returns
//! `false` once the token is cancelled, which makes libgit2 abort the transfer
//! and unwind cleanly instead of being killed mid-write.

use std::cell::Cell;
use std::path::Path;

use git2::build::RepoBuilder;
use git2::{FetchOptions, RemoteCallbacks};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::Fetcher;
use crate::installer::error::{InstallError, InstallResult};

/// Clones git repositories directly into the destination.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitCloner;

impl GitCloner {
    pub fn new() -> Self {
        Self
    }
}

impl Fetcher for GitCloner {
    fn fetch(&self, url: &str, target: &Path, cancel: &CancellationToken) -> InstallResult<u64> {
        if cancel.is_cancelled() {
            return Err(InstallError::Cancelled);
        }

        info!(url, target = %target.display(), "Cloning repository");

        let received = Cell::new(0u64);
        let mut callbacks = RemoteCallbacks::new();
        callbacks.transfer_progress(|stats| {
            received.set(stats.received_bytes() as u64);
            !cancel.is_cancelled()
        });

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(callbacks);

        let mut builder = RepoBuilder::new();
        builder.fetch_options(fetch_options);

        match builder.clone(url, target) {
            Ok(_repo) => {
                info!(url, bytes = received.get(), "Clone complete");
                Ok(received.get())
            }
            Err(_) if cancel.is_cancelled() => {
                debug!(url, "Clone cancelled");
                Err(InstallError::Cancelled)
            }
            Err(e) => Err(InstallError::Fetch {
                url: url.to_string(),
                detail: e.message().to_string(),
            }),
        }
    }
}
