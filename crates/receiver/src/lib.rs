//! Server side of a dirship transfer.
//!
//! [`ReceiverServer`] accepts TCP connections and hands each one to its own
//! task. Every inbound [`ChunkMessage`](dirship_protocol::ChunkMessage) is
//! handled independently by [`MessageHandler`]: positional writes for data
//! chunks, recursive deletes for deletion requests, and archive expansion
//! plus the directory swap on the finishing message. Filesystem failures are
//! localized to the offending message; only protocol errors end a connection.

mod handler;
mod server;

pub use handler::MessageHandler;
pub use server::{ReceiverConfig, ReceiverServer};

/// Errors that end a receiver connection or the server itself.
#[derive(Debug, thiserror::Error)]
pub enum ReceiverError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] dirship_protocol::ProtocolError),
}
