//! Archive extraction.
//!
//! Applies only to the archive strategy: every entry is expanded into the
//! destination and the archive is deleted afterwards. A failure part way
//! through leaves the files written so far in place.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use zip::ZipArchive;

use super::error::{InstallError, InstallResult};

/// Expands a downloaded archive into a directory.
pub trait ArchiveExtractor: Send + Sync {
    /// Extract `archive` into `dest`, then remove `archive`.
    ///
    /// Returns the number of files written.
    fn extract(&self, archive: &Path, dest: &Path, cancel: &CancellationToken)
        -> InstallResult<usize>;
}

/// Zip extractor backed by the `zip` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipExtractor;

impl ZipExtractor {
    pub fn new() -> Self {
        Self
    }

    fn install_error(path: &Path, detail: impl ToString) -> InstallError {
        InstallError::Install {
            path: path.to_path_buf(),
            detail: detail.to_string(),
        }
    }

    fn expand(&self, archive: &Path, dest: &Path, cancel: &CancellationToken) -> InstallResult<usize> {
        let file = File::open(archive).map_err(|e| Self::install_error(archive, e))?;
        let mut zip = ZipArchive::new(file).map_err(|e| Self::install_error(archive, e))?;

        let mut written = 0usize;
        for index in 0..zip.len() {
            if cancel.is_cancelled() {
                debug!(archive = %archive.display(), written, "Extraction cancelled");
                return Err(InstallError::Cancelled);
            }

            let mut entry = zip
                .by_index(index)
                .map_err(|e| Self::install_error(archive, e))?;

            let Some(relative) = entry.enclosed_name() else {
                return Err(Self::install_error(
                    archive,
                    format!("entry '{}' escapes the destination", entry.name()),
                ));
            };
            let out_path = dest.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&out_path).map_err(|e| Self::install_error(&out_path, e))?;
                continue;
            }

            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent).map_err(|e| Self::install_error(parent, e))?;
            }

            let out = File::create(&out_path).map_err(|e| Self::install_error(&out_path, e))?;
            let mut writer = BufWriter::new(out);
            io::copy(&mut entry, &mut writer).map_err(|e| Self::install_error(&out_path, e))?;
            writer
                .flush()
                .map_err(|e| Self::install_error(&out_path, e))?;
            drop(writer);

            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&out_path, fs::Permissions::from_mode(mode))
                    .map_err(|e| Self::install_error(&out_path, e))?;
            }

            written += 1;
        }

        Ok(written)
    }
}

impl ArchiveExtractor for ZipExtractor {
    fn extract(
        &self,
        archive: &Path,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> InstallResult<usize> {
        info!(archive = %archive.display(), dest = %dest.display(), "Extracting archive");

        let written = self.expand(archive, dest, cancel)?;

        fs::remove_file(archive).map_err(|e| Self::install_error(archive, e))?;

        info!(archive = %archive.display(), files = written, "Extraction complete");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default();
        for (name, content) in files {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_extracts_nested_entries_and_removes_archive() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("Demo.zip");
        write_zip(
            &archive,
            &[
                ("payload/routes/demo/demo.trk", b"track"),
                ("payload/readme.txt", b"hello"),
            ],
        );

        let count = ZipExtractor::new()
            .extract(&archive, temp.path(), &CancellationToken::new())
            .unwrap();

        assert_eq!(count, 2);
        assert!(!archive.exists());
        assert_eq!(
            fs::read(temp.path().join("payload/routes/demo/demo.trk")).unwrap(),
            b"track"
        );
        assert_eq!(
            fs::read_to_string(temp.path().join("payload/readme.txt")).unwrap(),
            "hello"
        );
    }

    #[test]
    fn test_corrupt_archive_is_install_error() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("Broken.zip");
        fs::write(&archive, b"this is not a zip file").unwrap();

        let result = ZipExtractor::new().extract(&archive, temp.path(), &CancellationToken::new());

        match result {
            Err(InstallError::Install { path, .. }) => assert_eq!(path, archive),
            other => panic!("expected install error, got {:?}", other),
        }
        // Left for the user to inspect
        assert!(archive.exists());
    }

    #[test]
    fn test_entry_outside_destination_fails() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("dest");
        fs::create_dir(&dest).unwrap();
        let archive = dest.join("Demo.zip");
        write_zip(
            &archive,
            &[("routes/a.trk", b"a"), ("../outside.txt", b"escaped")],
        );

        let result = ZipExtractor::new().extract(&archive, &dest, &CancellationToken::new());

        match result {
            Err(InstallError::Install { path, detail }) => {
                assert_eq!(path, archive);
                assert!(detail.contains("../outside.txt"), "{}", detail);
            }
            other => panic!("expected install error, got {:?}", other),
        }
        assert!(!temp.path().join("outside.txt").exists());
        assert!(archive.exists());
    }

    #[test]
    fn test_cancelled_extraction_keeps_archive() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("Demo.zip");
        write_zip(&archive, &[("routes/a.trk", b"a")]);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = ZipExtractor::new().extract(&archive, temp.path(), &cancel);

        assert!(matches!(result, Err(InstallError::Cancelled)));
        assert!(archive.exists());
        assert!(!temp.path().join("routes").exists());
    }
}
