use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::{ChunkMessage, MAX_FRAME_SIZE, ProtocolError};

/// Length-prefixed bincode codec for [`ChunkMessage`] frames.
///
/// Each frame is a u32 big-endian body length followed by the bincode
/// encoding of one message. The length prefix is validated against
/// [`MAX_FRAME_SIZE`] before any allocation.
#[derive(Debug, Default)]
pub struct ChunkCodec;

impl Encoder<ChunkMessage> for ChunkCodec {
    type Error = ProtocolError;

    fn encode(&mut self, msg: ChunkMessage, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let body = bincode::serialize(&msg).map_err(ProtocolError::Encode)?;
        if body.len() > MAX_FRAME_SIZE as usize {
            return Err(ProtocolError::FrameTooLarge(body.len() as u32));
        }
        dst.reserve(4 + body.len());
        dst.put_u32(body.len() as u32);
        dst.put_slice(&body);
        Ok(())
    }
}

impl Decoder for ChunkCodec {
    type Item = ChunkMessage;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<ChunkMessage>, ProtocolError> {
        if src.len() < 4 {
            return Ok(None);
        }
        let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]);
        if len > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge(len));
        }
        let frame_len = 4 + len as usize;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }
        src.advance(4);
        let body = src.split_to(len as usize);
        let msg = bincode::deserialize(&body).map_err(ProtocolError::Decode)?;
        Ok(Some(msg))
    }
}
