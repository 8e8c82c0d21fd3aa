use std::path::Path;
use std::time::Duration;

use futures_util::SinkExt;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use dirship_protocol::{ChunkCodec, ChunkMessage, ProtocolError};

use crate::{DEFAULT_CHUNK_SIZE, UploadError, UploadSession};

/// Socket failures during a send are transport errors; only genuine
/// encoding trouble stays a protocol error.
fn send_error(e: ProtocolError) -> UploadError {
    match e {
        ProtocolError::Io(e) => UploadError::Transport(e),
        other => UploadError::Protocol(other),
    }
}

/// Settings for one upload.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Receiver host.
    pub host: String,
    /// Receiver port.
    pub port: u16,
    /// Name of the directory under the receiver's working root that the
    /// uploaded tree replaces.
    pub target_dir_name: String,
    /// Streaming block size in bytes.
    pub chunk_size: usize,
    /// Delete the local source directory after a successful upload.
    pub delete_source: bool,
}

impl UploadConfig {
    /// Configuration targeting `host:port` with defaults for the rest.
    pub fn new(host: impl Into<String>, port: u16, target_dir_name: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            target_dir_name: target_dir_name.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            delete_source: true,
        }
    }
}

/// Outcome of a successful upload. Scoped to the single session that
/// produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReport {
    /// Archive bytes put on the wire.
    pub bytes_sent: u64,
    /// Wall-clock duration from archiving start to the finishing send.
    pub elapsed: Duration,
    /// Whether the local source directory was removed.
    pub source_deleted: bool,
}

/// Uploads `source_dir` to the receiver named in `config`, replacing the
/// remote directory `config.target_dir_name`.
///
/// State machine: validate -> archive -> stream -> finish -> cleanup. Any
/// transport failure aborts immediately; the temp archive is cleaned up on
/// every path, the source directory only after success.
pub async fn upload(source_dir: &Path, config: &UploadConfig) -> Result<UploadReport, UploadError> {
    if !source_dir.exists() {
        return Err(UploadError::InvalidInput(format!(
            "source directory does not exist: {}",
            source_dir.display()
        )));
    }
    if source_dir.is_file() {
        return Err(UploadError::InvalidInput(format!(
            "only directories can be uploaded, {} is a file",
            source_dir.display()
        )));
    }
    let final_name = source_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            UploadError::InvalidInput(format!(
                "source directory has no name: {}",
                source_dir.display()
            ))
        })?;

    // Archiving. Fails before any connection is attempted.
    let mut session = UploadSession::archive(source_dir)?;

    let stream = TcpStream::connect((config.host.as_str(), config.port))
        .await
        .map_err(UploadError::Transport)?;
    stream.set_nodelay(true).map_err(UploadError::Transport)?;
    let mut framed = Framed::new(stream, ChunkCodec);

    tracing::info!(
        source = %source_dir.display(),
        host = %config.host,
        port = config.port,
        target = %config.target_dir_name,
        total_bytes = session.total_bytes(),
        "uploading directory"
    );

    // Streaming: one data message per block, offsets strictly increasing.
    // Sends are sequential on this task, so each completed send may
    // decrement the remaining counter in order.
    let mut archive = tokio::fs::File::open(session.archive_path())
        .await
        .map_err(UploadError::Filesystem)?;
    let mut buf = vec![0u8; config.chunk_size.max(1)];
    let mut position: u64 = 0;
    loop {
        let read = archive
            .read(&mut buf)
            .await
            .map_err(UploadError::Filesystem)?;
        if read == 0 {
            break;
        }
        framed
            .send(ChunkMessage::data(
                session.archive_name(),
                position,
                &buf[..read],
            ))
            .await
            .map_err(send_error)?;
        position += read as u64;
        let remaining = session.mark_sent(read as u64);
        tracing::trace!(position, remaining, "chunk sent");
    }
    drop(archive);

    if session.remaining_bytes() != 0 {
        return Err(UploadError::Filesystem(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!(
                "archive ended with {} bytes unsent",
                session.remaining_bytes()
            ),
        )));
    }

    // Remaining hit exactly zero: the finishing message may go out. Its
    // flushed send is the transport acknowledgment that closes the session
    // as a success.
    framed
        .send(ChunkMessage::finish(
            session.archive_name(),
            &final_name,
            &config.target_dir_name,
        ))
        .await
        .map_err(send_error)?;

    let elapsed = session.elapsed();
    let bytes_sent = session.total_bytes();
    let mib = bytes_sent as f64 / 1024.0 / 1024.0;
    let secs = elapsed.as_secs_f64();
    tracing::info!(
        source = %source_dir.display(),
        mib = format!("{mib:.2}"),
        secs = format!("{secs:.2}"),
        mib_per_sec = format!("{:.2}", if secs > 0.0 { mib / secs } else { 0.0 }),
        "upload finished"
    );

    session.close();

    let source_deleted = if config.delete_source {
        match tokio::fs::remove_dir_all(source_dir).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    source = %source_dir.display(),
                    error = %e,
                    "failed to delete local source directory"
                );
                false
            }
        }
    } else {
        false
    };

    Ok(UploadReport {
        bytes_sent,
        elapsed,
        source_deleted,
    })
}
