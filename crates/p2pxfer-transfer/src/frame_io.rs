//! Async length-prefixed frame I/O over any `AsyncRead`/`AsyncWrite` half.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use p2pxfer_core::error::ProtocolError;
use p2pxfer_core::wire::{self, MAX_FRAME_LEN};

/// Write `payload` as `len_be32 || payload`.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> std::io::Result<()> {
    let frame = wire::encode_frame(payload)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    writer.write_all(&frame).await
}

/// Read one length-prefixed frame, returning its payload bytes.
///
/// Fails with `ProtocolError::FrameTooLarge` if the declared length exceeds
/// the maximum, and with an I/O `UnexpectedEof` if the stream closes before
/// the length prefix or full payload arrives.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);

    wire::validate_frame_len(len)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Convert a declared-too-large frame length into the typed protocol error,
/// for call sites that want `ProtocolError` rather than a generic I/O error.
pub fn frame_too_large(len: u32) -> ProtocolError {
    ProtocolError::FrameTooLarge(len, MAX_FRAME_LEN)
}
