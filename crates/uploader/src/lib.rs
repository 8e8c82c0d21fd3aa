//! Client side of a dirship transfer.
//!
//! [`upload`] drives one directory upload through its states: validate the
//! source, archive it to a temp file, stream the archive as chunk messages
//! over one TCP connection, send the finishing message once every byte is
//! on the wire, then clean up. The returned [`UploadReport`] is the only
//! success signal; it is scoped to the session and never shared.

mod session;
mod upload;

pub use session::UploadSession;
pub use upload::{UploadConfig, UploadReport, upload};

/// Default streaming block size. A tunable, not a protocol constant.
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// Errors produced by the uploader.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The source is missing or not a directory. Raised before any I/O.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Archiving failed. Raised before any network I/O.
    #[error("archive error: {0}")]
    Archive(#[from] dirship_archive::ArchiveError),

    /// Connecting or sending failed. The session is aborted immediately;
    /// no retry is attempted here.
    #[error("transport error: {0}")]
    Transport(#[source] std::io::Error),

    /// A local filesystem operation failed on the client side.
    #[error("filesystem error: {0}")]
    Filesystem(#[source] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] dirship_protocol::ProtocolError),
}
