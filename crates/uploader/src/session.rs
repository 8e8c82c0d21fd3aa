use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tempfile::NamedTempFile;

use crate::UploadError;

/// One directory upload in flight.
///
/// Owns the temporary archive and the remaining-byte counter that identifies
/// the true last chunk. Created when the upload begins, destroyed when the
/// connection closes; dropping it removes the temp archive either way.
#[derive(Debug)]
pub struct UploadSession {
    source_dir: PathBuf,
    archive: NamedTempFile,
    archive_name: String,
    total_bytes: u64,
    remaining_bytes: u64,
    started_at: Instant,
}

impl UploadSession {
    /// Archives `source_dir` into a fresh temp file and opens the session.
    ///
    /// Fails with [`UploadError::Archive`] before any connection is made if
    /// packing fails; the temp file is removed on drop.
    pub fn archive(source_dir: &Path) -> Result<Self, UploadError> {
        let archive = tempfile::Builder::new()
            .prefix("dirship")
            .suffix(".tar")
            .tempfile()
            .map_err(UploadError::Filesystem)?;

        let total_bytes = dirship_archive::pack_to_file(source_dir, archive.path())?;
        let archive_name = archive
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dirship.tar".to_string());

        tracing::debug!(
            source = %source_dir.display(),
            archive = %archive.path().display(),
            total_bytes,
            "source directory archived"
        );

        Ok(Self {
            source_dir: source_dir.to_path_buf(),
            archive,
            archive_name,
            total_bytes,
            remaining_bytes: total_bytes,
            started_at: Instant::now(),
        })
    }

    /// The directory being uploaded.
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Path of the temporary archive on disk.
    pub fn archive_path(&self) -> &Path {
        self.archive.path()
    }

    /// File name of the temporary archive; used as the remote relative path
    /// for every chunk of this session.
    pub fn archive_name(&self) -> &str {
        &self.archive_name
    }

    /// Total archive size in bytes.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Bytes not yet confirmed sent.
    pub fn remaining_bytes(&self) -> u64 {
        self.remaining_bytes
    }

    /// Records a completed send of `bytes` and returns the new remainder.
    /// Sends complete in send order on this single connection, so the
    /// remainder hitting zero identifies the last chunk.
    pub fn mark_sent(&mut self, bytes: u64) -> u64 {
        self.remaining_bytes = self.remaining_bytes.saturating_sub(bytes);
        self.remaining_bytes
    }

    /// Time since the session was opened.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Removes the temporary archive. Best-effort: a failure is logged,
    /// never fatal.
    pub fn close(self) {
        let path = self.archive.path().display().to_string();
        if let Err(e) = self.archive.close() {
            tracing::warn!(archive = %path, error = %e, "failed to remove temp archive");
        }
    }
}
