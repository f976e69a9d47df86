//! Binary frame protocol with length-prefixed messages
//!
//! Frame format:
//! ```text
//! +----------------+------------------+
//! | length         | payload          |
//! | (4 bytes, BE)  | (variable)       |
//! +----------------+------------------+
//! ```
//!
//! The length prefix counts payload bytes only and must be in
//! `1..=MAX_FRAME_SIZE`. A length of zero or above the cap is a protocol
//! violation: the stream position after a bad prefix cannot be trusted, so
//! the connection must be dropped rather than resynchronized.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ChatError, Result};

/// Frame header size: 4-byte big-endian payload length
pub const FRAME_HEADER_SIZE: usize = 4;

/// Maximum frame payload size (64 KiB)
pub const MAX_FRAME_SIZE: usize = 65536;

/// Encode a payload into a single contiguous frame buffer
///
/// Broadcast paths call this once and hand the same `Bytes` to every
/// recipient writer.
pub fn encode(payload: &[u8]) -> Result<Bytes> {
    if payload.is_empty() || payload.len() > MAX_FRAME_SIZE {
        return Err(ChatError::oversized_frame(payload.len() as u32));
    }

    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Write one frame: the 4-byte length prefix followed by the payload
///
/// The frame is assembled into one buffer and written with a single
/// `write_all`, so callers holding exclusive access to the writer (the
/// per-session write lock on the server, the client's writer half) never
/// interleave two frames' bytes.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode(payload)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read exactly one frame and return its payload
///
/// Blocks until 4 header bytes and then the full payload have arrived.
/// Fails with `ChatError::ShortRead` if the stream ends first (this is how
/// an ordinary peer disconnect surfaces) and with `ChatError::OversizedFrame`
/// if the decoded length is zero or above `MAX_FRAME_SIZE`. No partial-frame
/// state is kept across calls.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_SIZE];
    reader.read_exact(&mut header).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => {
            ChatError::short_read("stream ended while reading frame header")
        }
        _ => ChatError::from(e),
    })?;

    let length = u32::from_be_bytes(header);
    if length == 0 || length as usize > MAX_FRAME_SIZE {
        return Err(ChatError::oversized_frame(length));
    }

    let mut payload = vec![0u8; length as usize];
    reader.read_exact(&mut payload).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => {
            ChatError::short_read("stream ended inside frame payload")
        }
        _ => ChatError::from(e),
    })?;

    Ok(payload)
}
