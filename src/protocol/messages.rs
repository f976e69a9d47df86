//! Protocol message types for the chat relay
//!
//! All message payloads that can be serialized/deserialized within frames.
//! Every shape carries an explicit `type` discriminant so a payload decodes
//! into exactly one variant; a structurally-valid payload with a foreign
//! discriminant is not a match.

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};

/// Maximum display name length in bytes
pub const MAX_NAME_LEN: usize = 20;

// =============================================================================
// Client -> Server
// =============================================================================

/// Messages a client sends to the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Register or replace the sender's display name
    SetName {
        /// Requested display name
        name: String,
    },
    /// Broadcast a chat line to every other connected client
    Chat {
        /// Message text; empty text is ignored by the server
        text: String,
    },
}

// =============================================================================
// Server -> Client
// =============================================================================

/// Messages the relay sends to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A chat line relayed from another client
    Chat {
        /// Sender display id: display name if set, else address id
        from: String,
        /// Message text
        message: String,
        /// Sender address id (remote ip:port), stable for the connection
        addr: String,
        /// Sender display name, if one was registered
        name: Option<String>,
        /// Unix epoch seconds at relay time
        timestamp: u64,
    },
    /// Outcome of a SetName request
    SetNameResult {
        /// Whether the name was accepted
        success: bool,
        /// Human-readable outcome description
        message: String,
        /// The name now in effect (set on success)
        new_name: Option<String>,
        /// The previously registered name, if there was one
        old_name: Option<String>,
    },
    /// A client joined the relay
    UserJoined {
        /// Display id of the joining client
        user: String,
        /// Address id of the joining client
        addr: String,
        /// Display name, if one was registered at join time
        name: Option<String>,
        /// Unix epoch seconds
        timestamp: u64,
    },
    /// A client left the relay
    UserLeft {
        /// Display id of the departing client
        user: String,
        /// Address id of the departing client
        addr: String,
        /// Display name, if one was registered
        name: Option<String>,
        /// Unix epoch seconds
        timestamp: u64,
    },
    /// Error notice for a recoverable client mistake
    Error {
        /// Machine-readable error code
        code: String,
        /// Human-readable error message
        message: String,
    },
}

impl ServerMessage {
    // Machine-readable error codes
    pub const INVALID_NAME: &'static str = "INVALID_NAME";

    /// Build a relayed chat line
    pub fn chat(
        from: impl Into<String>,
        message: impl Into<String>,
        addr: impl Into<String>,
        name: Option<String>,
        timestamp: u64,
    ) -> Self {
        ServerMessage::Chat {
            from: from.into(),
            message: message.into(),
            addr: addr.into(),
            name,
            timestamp,
        }
    }

    /// Build a successful SetName outcome
    pub fn name_accepted(new_name: impl Into<String>, old_name: Option<String>) -> Self {
        let new_name = new_name.into();
        ServerMessage::SetNameResult {
            success: true,
            message: format!("Name set to '{}'", new_name),
            new_name: Some(new_name),
            old_name,
        }
    }

    /// Build a failed SetName outcome
    pub fn name_rejected(reason: impl Into<String>) -> Self {
        ServerMessage::SetNameResult {
            success: false,
            message: reason.into(),
            new_name: None,
            old_name: None,
        }
    }

    /// Build a join notification
    pub fn user_joined(
        user: impl Into<String>,
        addr: impl Into<String>,
        name: Option<String>,
        timestamp: u64,
    ) -> Self {
        ServerMessage::UserJoined {
            user: user.into(),
            addr: addr.into(),
            name,
            timestamp,
        }
    }

    /// Build a leave notification
    pub fn user_left(
        user: impl Into<String>,
        addr: impl Into<String>,
        name: Option<String>,
        timestamp: u64,
    ) -> Self {
        ServerMessage::UserLeft {
            user: user.into(),
            addr: addr.into(),
            name,
            timestamp,
        }
    }

    /// Build an invalid-name error notice
    pub fn invalid_name(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: Self::INVALID_NAME.to_string(),
            message: message.into(),
        }
    }
}

/// Check a requested display name against the naming rules
///
/// A valid name is non-empty, at most `MAX_NAME_LEN` bytes, and every byte
/// is an ASCII letter, digit, underscore, or has the high bit set (which
/// admits multi-byte UTF-8 names).
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ChatError::invalid_name("name must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(ChatError::invalid_name(format!(
            "name must be at most {} bytes",
            MAX_NAME_LEN
        )));
    }
    for byte in name.bytes() {
        let allowed = byte.is_ascii_alphanumeric() || byte == b'_' || byte >= 0x80;
        if !allowed {
            return Err(ChatError::invalid_name(format!(
                "name contains invalid character '{}'",
                byte as char
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_roundtrip() {
        let messages = [
            ClientMessage::SetName {
                name: "alice".to_string(),
            },
            ClientMessage::Chat {
                text: "Hello, World!".to_string(),
            },
        ];

        for msg in messages {
            let json = serde_json::to_vec(&msg).unwrap();
            let decoded: ClientMessage = serde_json::from_slice(&json).unwrap();
            assert_eq!(msg, decoded);
        }
    }

    #[test]
    fn test_server_message_roundtrip() {
        let messages = [
            ServerMessage::chat("alice", "hi", "127.0.0.1:9000", Some("alice".into()), 42),
            ServerMessage::name_accepted("bob", Some("robert".to_string())),
            ServerMessage::name_rejected("name must not be empty"),
            ServerMessage::user_joined("127.0.0.1:9001", "127.0.0.1:9001", None, 43),
            ServerMessage::user_left("carol", "127.0.0.1:9002", Some("carol".into()), 44),
            ServerMessage::invalid_name("name contains invalid character '!'"),
        ];

        for msg in messages {
            let json = serde_json::to_vec(&msg).unwrap();
            let decoded: ServerMessage = serde_json::from_slice(&json).unwrap();
            assert_eq!(msg, decoded);
        }
    }

    #[test]
    fn test_discriminant_field_layout() {
        let json = serde_json::to_value(ClientMessage::SetName {
            name: "alice".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "set_name");
        assert_eq!(json["name"], "alice");

        let json = serde_json::to_value(ClientMessage::Chat {
            text: "hi".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "chat");
    }

    #[test]
    fn test_foreign_discriminant_is_not_a_match() {
        // Structurally plausible JSON with a server-side discriminant must
        // not decode as a client message
        let json = serde_json::to_vec(&ServerMessage::invalid_name("nope")).unwrap();
        assert!(serde_json::from_slice::<ClientMessage>(&json).is_err());

        // And an unknown discriminant matches nothing
        let unknown = br#"{"type":"shutdown","text":"now"}"#;
        assert!(serde_json::from_slice::<ClientMessage>(unknown).is_err());
        assert!(serde_json::from_slice::<ServerMessage>(unknown).is_err());
    }

    #[test]
    fn test_missing_fields_do_not_decode() {
        let missing_text = br#"{"type":"chat"}"#;
        assert!(serde_json::from_slice::<ClientMessage>(missing_text).is_err());
    }

    #[test]
    fn test_validate_name_accepts_allowed_charset() {
        assert!(validate_name("alice").is_ok());
        assert!(validate_name("a").is_ok());
        assert!(validate_name("user_42").is_ok());
        assert!(validate_name("ABCDEFGHIJKLMNOPQRST").is_ok()); // exactly 20 bytes
        assert!(validate_name("żółć").is_ok()); // multi-byte UTF-8, high bit set
    }

    #[test]
    fn test_validate_name_rejects_bad_names() {
        assert!(validate_name("").is_err());
        assert!(validate_name("ABCDEFGHIJKLMNOPQRSTU").is_err()); // 21 bytes
        assert!(validate_name("bad!").is_err());
        assert!(validate_name("has space").is_err());
        assert!(validate_name("semi;colon").is_err());

        // Byte length is what counts: six 2-byte chars fit, eleven do not
        assert!(validate_name("ęęęęęę").is_ok());
        assert!(validate_name("ęęęęęęęęęęę").is_err());
    }

    #[test]
    fn test_invalid_name_reason_is_carried() {
        let err = validate_name("bad!").unwrap_err();
        assert!(matches!(err, ChatError::InvalidName(_)));
        assert!(err.message().contains("invalid character"));
    }
}
