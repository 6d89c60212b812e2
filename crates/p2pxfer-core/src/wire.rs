//! Wire framing primitives shared by the handshake, sender, and receiver.
//!
//! Everything after the handshake is length-prefixed with a big-endian u32.
//! The chunk-index request channel is the one exception: indices flow as a
//! raw, unframed `int32_be` sequence on the receiver-to-sender direction, per
//! the framing design (kept unframed here rather than upgraded, since the
//! completion sentinel alone is enough to make the channel unambiguous).

use crate::error::ProtocolError;

/// Maximum length of any length-prefixed frame, including the manifest and
/// chunk-response frames. Oversize frames abort the session.
pub const MAX_FRAME_LEN: u32 = 1024 * 1024;

/// Sentinel value on the chunk-index request channel meaning "no further
/// requests; transfer complete".
pub const COMPLETION_SENTINEL: i32 = -1;

/// Encode a length-prefixed frame: `len_be32 || payload`.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let len = payload.len() as u32;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len, MAX_FRAME_LEN));
    }
    let mut out = Vec::with_capacity(4 + payload.len());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Validate a frame length header read off the wire, returning the payload
/// length in bytes.
pub fn validate_frame_len(len: u32) -> Result<u32, ProtocolError> {
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len, MAX_FRAME_LEN));
    }
    Ok(len)
}

/// Encode a chunk-response frame's leading header: `chunk_index_be32`. The
/// caller appends the AEAD-encrypted chunk bytes and frames the whole thing
/// with [`encode_frame`].
pub fn encode_chunk_index(index: u32) -> [u8; 4] {
    index.to_be_bytes()
}

pub fn decode_chunk_index(bytes: [u8; 4]) -> u32 {
    u32::from_be_bytes(bytes)
}

/// Encode a raw (unframed) chunk-index request, or the completion sentinel.
pub fn encode_request(index: i32) -> [u8; 4] {
    index.to_be_bytes()
}

pub fn decode_request(bytes: [u8; 4]) -> i32 {
    i32::from_be_bytes(bytes)
}
