//! Wire protocol for dirship directory transfers.
//!
//! One message kind crosses the wire: [`ChunkMessage`]. The uploader streams
//! an archived directory as a sequence of data chunks with explicit offsets,
//! then closes the transfer with a finishing message that names the directory
//! swap on the receiver. Framing is a u32 length prefix followed by the
//! bincode record ([`ChunkCodec`]).

mod codec;
mod message;
mod path;

pub use codec::ChunkCodec;
pub use message::ChunkMessage;
pub use path::sanitize_relative;

/// Maximum accepted frame body size. Frames above this abort the connection.
pub const MAX_FRAME_SIZE: u32 = 64 * 1024 * 1024;

/// Errors produced while encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode error: {0}")]
    Encode(#[source] bincode::Error),

    #[error("decode error: {0}")]
    Decode(#[source] bincode::Error),

    #[error("frame too large: {0} bytes")]
    FrameTooLarge(u32),
}
