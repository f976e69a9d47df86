//! TCP chat relay with length-prefixed JSON messages
//!
//! This library provides a small chat relay: a server that fans every chat
//! line out to all other connected clients, and a client whose send and
//! receive paths run independently. Messages travel as JSON payloads behind
//! a 4-byte big-endian length prefix.

pub mod client;
pub mod error;
pub mod protocol;
pub mod server;

pub use client::{ChatClient, ChatClientConfig, ClientEvent};
pub use error::{ChatError, Result};
pub use protocol::{ClientMessage, ServerMessage};
pub use server::{ChatServer, ServerConfig};

use std::time::{SystemTime, UNIX_EPOCH};

/// Get current timestamp in seconds since UNIX epoch
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
