//! Error handling for the chat relay

use std::fmt;

/// Result type alias for chat operations
pub type Result<T> = std::result::Result<T, ChatError>;

/// Chat relay error types
#[derive(Debug, Clone)]
pub enum ChatError {
    /// Network-related errors
    Network(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// Protocol errors
    Protocol(String),
    /// Connection errors
    Connection(String),
    /// Stream ended before a complete frame was read
    ShortRead(String),
    /// Frame length prefix of zero or above the frame size cap
    OversizedFrame(u32),
    /// Display name rejected by validation
    InvalidName(String),
    /// Configuration error
    Config(String),
    /// Server internal error
    Internal(String),
}

impl ChatError {
    /// Get error code for this error type
    pub fn code(&self) -> u32 {
        match self {
            ChatError::Network(_) => 1000,
            ChatError::Serialization(_) => 1001,
            ChatError::Protocol(_) => 1002,
            ChatError::Connection(_) => 1003,
            ChatError::ShortRead(_) => 1004,
            ChatError::OversizedFrame(_) => 1005,
            ChatError::InvalidName(_) => 1006,
            ChatError::Config(_) => 1007,
            ChatError::Internal(_) => 1008,
        }
    }

    /// Get human-readable error message
    pub fn message(&self) -> &str {
        match self {
            ChatError::Network(msg) => msg,
            ChatError::Serialization(msg) => msg,
            ChatError::Protocol(msg) => msg,
            ChatError::Connection(msg) => msg,
            ChatError::ShortRead(msg) => msg,
            ChatError::OversizedFrame(_) => "frame length outside the valid range",
            ChatError::InvalidName(msg) => msg,
            ChatError::Config(msg) => msg,
            ChatError::Internal(msg) => msg,
        }
    }

    /// Create a network error
    pub fn network<T: Into<String>>(msg: T) -> Self {
        ChatError::Network(msg.into())
    }

    /// Create a serialization error
    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        ChatError::Serialization(msg.into())
    }

    /// Create a protocol error
    pub fn protocol<T: Into<String>>(msg: T) -> Self {
        ChatError::Protocol(msg.into())
    }

    /// Create a connection error
    pub fn connection<T: Into<String>>(msg: T) -> Self {
        ChatError::Connection(msg.into())
    }

    /// Create a short read error
    pub fn short_read<T: Into<String>>(msg: T) -> Self {
        ChatError::ShortRead(msg.into())
    }

    /// Create an oversized frame error from the offending length prefix
    pub fn oversized_frame(length: u32) -> Self {
        ChatError::OversizedFrame(length)
    }

    /// Create an invalid name error
    pub fn invalid_name<T: Into<String>>(msg: T) -> Self {
        ChatError::InvalidName(msg.into())
    }

    /// Create a configuration error
    pub fn config<T: Into<String>>(msg: T) -> Self {
        ChatError::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal<T: Into<String>>(msg: T) -> Self {
        ChatError::Internal(msg.into())
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::Network(msg) => write!(f, "Network error: {}", msg),
            ChatError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            ChatError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            ChatError::Connection(msg) => write!(f, "Connection error: {}", msg),
            ChatError::ShortRead(msg) => write!(f, "Short read: {}", msg),
            ChatError::OversizedFrame(length) => {
                write!(f, "Oversized frame: invalid length prefix {}", length)
            }
            ChatError::InvalidName(msg) => write!(f, "Invalid name: {}", msg),
            ChatError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ChatError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ChatError {}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        ChatError::Network(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Serialization(format!("JSON error: {}", err))
    }
}
