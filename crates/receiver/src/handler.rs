use std::path::{Path, PathBuf};

use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use dirship_protocol::{ChunkMessage, sanitize_relative};

/// Handles inbound chunk messages against one working root.
///
/// The receiver keeps no state between messages: each one carries its own
/// path and offset. A filesystem failure is logged and the message's effect
/// skipped; the connection stays usable, so a single bad path can silently
/// truncate part of an upload.
#[derive(Debug, Clone)]
pub struct MessageHandler {
    working_root: PathBuf,
}

impl MessageHandler {
    /// Creates a handler rooted at `working_root`.
    pub fn new(working_root: impl Into<PathBuf>) -> Self {
        Self {
            working_root: working_root.into(),
        }
    }

    /// The base directory under which all relative paths resolve.
    pub fn working_root(&self) -> &Path {
        &self.working_root
    }

    /// Processes one message. Never fails the connection; all filesystem
    /// errors are logged and the message skipped.
    pub async fn handle(&self, msg: ChunkMessage) {
        if msg.deleted {
            self.delete_entry(&msg).await;
        } else if !msg.transfer_finished {
            self.write_chunk(&msg).await;
        } else {
            self.finish_transfer(&msg).await;
        }
    }

    /// Resolves a wire path under the working root, or `None` when nothing
    /// usable remains after sanitization.
    fn resolve(&self, raw: &str) -> Option<PathBuf> {
        let rel = sanitize_relative(raw);
        if rel.as_os_str().is_empty() {
            tracing::warn!(path = %raw, "message path empty after sanitization, skipping");
            return None;
        }
        Some(self.working_root.join(rel))
    }

    /// Deletion request: remove the entry if present, recursively for
    /// directories. A missing path is a no-op; a failed delete is logged.
    /// No write happens even if a payload is attached.
    async fn delete_entry(&self, msg: &ChunkMessage) {
        let Some(path) = self.resolve(&msg.relative_path) else {
            return;
        };
        let result = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(&path).await,
            Ok(_) => tokio::fs::remove_file(&path).await,
            Err(_) => {
                tracing::debug!(path = %path.display(), "delete request for absent path");
                return;
            }
        };
        match result {
            Ok(()) => tracing::info!(path = %path.display(), "deleted"),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to delete")
            }
        }
    }

    /// Data chunk: create parent directories, open the target for
    /// random-access write, seek to the declared offset, write the valid
    /// payload bytes. Offsets may arrive in any order; the file is created
    /// on first touch.
    async fn write_chunk(&self, msg: &ChunkMessage) {
        let Some(payload) = msg.valid_payload() else {
            tracing::warn!(
                path = %msg.relative_path,
                payload_len = msg.payload_len,
                buffer_len = msg.payload.len(),
                "malformed chunk: declared length overruns buffer, skipping"
            );
            return;
        };
        let Some(path) = self.resolve(&msg.relative_path) else {
            return;
        };

        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to create parent directories, skipping chunk"
                );
                return;
            }
        }

        let result = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(false)
                .open(&path)
                .await?;
            file.seek(std::io::SeekFrom::Start(msg.start_position))
                .await?;
            file.write_all(payload).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = result {
            tracing::warn!(
                path = %path.display(),
                offset = msg.start_position,
                error = %e,
                "failed to write chunk"
            );
        }
    }

    /// Finishing message: expand the received archive into the working root,
    /// drop the archive file, then swap the expanded directory into place
    /// (delete the old target, rename the new one onto its name).
    async fn finish_transfer(&self, msg: &ChunkMessage) {
        let Some(archive_path) = self.resolve(&msg.relative_path) else {
            return;
        };
        let Some(expanded) = self.resolve(&msg.final_name) else {
            return;
        };
        let Some(target) = self.resolve(&msg.target_dir_name) else {
            return;
        };

        // A stale expanded tree from an earlier failed session would merge
        // with this unpack; clear it first or abort.
        if expanded.exists() {
            let removed = if expanded.is_dir() {
                tokio::fs::remove_dir_all(&expanded).await
            } else {
                tokio::fs::remove_file(&expanded).await
            };
            if let Err(e) = removed {
                tracing::error!(
                    expanded = %expanded.display(),
                    error = %e,
                    "cannot clear stale expanded directory, finish aborted"
                );
                return;
            }
        }

        // Expansion failure leaves this session's artifacts as they stand.
        let root = self.working_root.clone();
        let unpack_from = archive_path.clone();
        let unpacked = tokio::task::spawn_blocking(move || {
            dirship_archive::unpack(&unpack_from, &root)
        })
        .await;
        match unpacked {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(
                    archive = %archive_path.display(),
                    error = %e,
                    "failed to expand archive"
                );
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "archive expansion task failed");
                return;
            }
        }

        if let Err(e) = tokio::fs::remove_file(&archive_path).await {
            tracing::warn!(
                archive = %archive_path.display(),
                error = %e,
                "failed to remove received archive"
            );
        }

        if !expanded.is_dir() {
            tracing::error!(
                expanded = %expanded.display(),
                "expanded directory missing, swap aborted"
            );
            return;
        }

        // Delete-then-rename swap. Not crash-safe: an interruption between
        // the two steps leaves the target absent.
        if target.exists() {
            let removed = if target.is_dir() {
                tokio::fs::remove_dir_all(&target).await
            } else {
                tokio::fs::remove_file(&target).await
            };
            if let Err(e) = removed {
                tracing::error!(
                    target = %target.display(),
                    error = %e,
                    "cannot replace target: old directory not removable"
                );
                return;
            }
        } else if let Some(parent) = target.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                tracing::error!(
                    target = %target.display(),
                    error = %e,
                    "failed to create target parent directories"
                );
                return;
            }
        }

        match tokio::fs::rename(&expanded, &target).await {
            Ok(()) => tracing::info!(target = %target.display(), "directory updated"),
            Err(e) => tracing::error!(
                expanded = %expanded.display(),
                target = %target.display(),
                error = %e,
                "failed to install expanded directory"
            ),
        }
    }
}
