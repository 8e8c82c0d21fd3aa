use serde::{Deserialize, Serialize};

/// A single record of the transfer protocol.
///
/// Every message is self-sufficient: it carries its own target path and byte
/// offset, so the receiver keeps no session state between messages. The
/// `deleted` and `transfer_finished` flags are mutually exclusive; the
/// constructors below are the only intended way to build a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMessage {
    /// Target path relative to the receiver's working root. During streaming
    /// this is the temporary archive's file name. Must be sanitized with
    /// [`sanitize_relative`](crate::sanitize_relative) before filesystem use.
    pub relative_path: String,
    /// Byte offset within the target file where `payload` is written.
    pub start_position: u64,
    /// Count of valid bytes in `payload`. A value exceeding the buffer length
    /// marks the message as malformed.
    pub payload_len: u32,
    /// Chunk bytes. Empty on control messages.
    pub payload: Vec<u8>,
    /// Delete `relative_path` (recursively for directories) instead of
    /// writing. No write happens even if a payload is attached.
    pub deleted: bool,
    /// Completion marker: the sender has no more bytes; expand the archive
    /// and perform the directory swap.
    pub transfer_finished: bool,
    /// Name of the expanded directory. Only set on the finishing message.
    pub final_name: String,
    /// Name of the existing directory to replace. Only set on the finishing
    /// message.
    pub target_dir_name: String,
}

impl ChunkMessage {
    /// A data chunk carrying `payload` for `relative_path` at `start_position`.
    pub fn data(relative_path: impl Into<String>, start_position: u64, payload: &[u8]) -> Self {
        Self {
            relative_path: relative_path.into(),
            start_position,
            payload_len: payload.len() as u32,
            payload: payload.to_vec(),
            deleted: false,
            transfer_finished: false,
            final_name: String::new(),
            target_dir_name: String::new(),
        }
    }

    /// A deletion request for `relative_path`.
    pub fn delete(relative_path: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            start_position: 0,
            payload_len: 0,
            payload: Vec::new(),
            deleted: true,
            transfer_finished: false,
            final_name: String::new(),
            target_dir_name: String::new(),
        }
    }

    /// The finishing message: no payload, names the expanded directory and
    /// the directory it replaces.
    pub fn finish(
        relative_path: impl Into<String>,
        final_name: impl Into<String>,
        target_dir_name: impl Into<String>,
    ) -> Self {
        Self {
            relative_path: relative_path.into(),
            start_position: 0,
            payload_len: 0,
            payload: Vec::new(),
            deleted: false,
            transfer_finished: true,
            final_name: final_name.into(),
            target_dir_name: target_dir_name.into(),
        }
    }

    /// The valid portion of the payload, or `None` if `payload_len` overruns
    /// the buffer (malformed sender).
    pub fn valid_payload(&self) -> Option<&[u8]> {
        self.payload.get(..self.payload_len as usize)
    }
}
