//! Protocol layer for the chat relay
//!
//! This module provides:
//! - Length-prefixed frame encoding/decoding
//! - Message type definitions
//! - Typed codec glue between messages and frames

pub mod codec;
pub mod frame;
pub mod messages;

// Re-export commonly used types
pub use codec::{decode_client, decode_server, encode_message, write_message};
pub use frame::{read_frame, write_frame, FRAME_HEADER_SIZE, MAX_FRAME_SIZE};
pub use messages::{validate_name, ClientMessage, ServerMessage, MAX_NAME_LEN};
