//! Typed message encoding and decoding on top of frames
//!
//! This module glues the serde message schema to the length-prefixed frame
//! layer: a typed message serializes to a JSON payload which travels as one
//! frame. Decoding classifies a payload by its `type` discriminant and
//! reports mismatch as an error value, never as a panic, so callers can
//! treat an unrecognized payload as a recoverable condition.

use bytes::Bytes;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::Result;
use crate::protocol::frame;
use crate::protocol::messages::{ClientMessage, ServerMessage};

/// Encode a typed message into one complete frame buffer
///
/// Broadcast paths encode once and write the returned buffer to every
/// recipient; `Bytes` clones are cheap reference bumps.
pub fn encode_message<T: Serialize>(message: &T) -> Result<Bytes> {
    let payload = serde_json::to_vec(message)?;
    frame::encode(&payload)
}

/// Serialize and write one message as a single frame
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let encoded = encode_message(message)?;
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

/// Classify a frame payload as a client message
///
/// Returns `Err` when the payload is malformed or its discriminant matches
/// no client shape; the relay logs such payloads and drops them.
pub fn decode_client(payload: &[u8]) -> Result<ClientMessage> {
    Ok(serde_json::from_slice(payload)?)
}

/// Classify a frame payload as a server message
pub fn decode_server(payload: &[u8]) -> Result<ServerMessage> {
    Ok(serde_json::from_slice(payload)?)
}
