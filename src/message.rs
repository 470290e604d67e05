//! Message protocol definitions
//!
//! Server → client lines. The wire format is plain text, one message per
//! line; `Display` renders each variant without the trailing newline (the
//! line codec appends it).

use std::fmt;

use crate::error::ChatError;

/// Usage string for a malformed private message
pub const PRIVATE_USAGE: &str = "to {username} {msg}";

/// Presence text broadcast when a session comes online
pub const LOGIN: &str = "login";

/// Presence text broadcast when a session goes offline
pub const OFFLINE: &str = "offline";

/// Server → Client message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Broadcast line, also used for login/offline announcements
    Chat {
        addr: String,
        identity: String,
        text: String,
    },
    /// Private message addressed to the receiving session
    Direct { from: String, content: String },
    /// Snapshot of registered identities
    Online { identities: Vec<String> },
    /// Rename succeeded
    Renamed { identity: String },
    /// Inbound line exceeded the maximum length and was discarded
    LineTooLong { max: usize },
    /// Inbound line was not valid UTF-8
    InvalidEncoding,
    /// Plain notice sentence (errors and info)
    Notice(String),
}

impl ServerMessage {
    /// Build a broadcast line from a sender's identity and address
    pub fn chat(addr: &str, identity: &str, text: &str) -> Self {
        ServerMessage::Chat {
            addr: addr.to_string(),
            identity: identity.to_string(),
            text: text.to_string(),
        }
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Chat {
                addr,
                identity,
                text,
            } => write!(f, "[{}]{}: {}", addr, identity, text),
            ServerMessage::Direct { from, content } => {
                write!(f, "{} said to you: {}", from, content)
            }
            ServerMessage::Online { identities } => {
                write!(f, "online users: [{}]", identities.join(", "))
            }
            ServerMessage::Renamed { identity } => {
                write!(f, "You've changed name to \"{}\"", identity)
            }
            ServerMessage::LineTooLong { max } => {
                write!(f, "Line too long (max {} bytes)", max)
            }
            ServerMessage::InvalidEncoding => f.write_str("Invalid UTF-8 in message"),
            ServerMessage::Notice(text) => f.write_str(text),
        }
    }
}

/// Convert ChatError to ServerMessage for client notification
impl From<ChatError> for ServerMessage {
    fn from(err: ChatError) -> Self {
        let text = match &err {
            ChatError::NameTaken(_) => "User name already exists".to_string(),
            ChatError::UserNotOnline(_) => "User not online".to_string(),
            ChatError::MalformedCommand { usage } => {
                format!("Invalid message format, usage: {}", usage)
            }
            ChatError::IdleTimeout => "You've been kicked for timeout".to_string(),
            // Fatal errors are not typically converted (connection closes)
            _ => "Internal error".to_string(),
        };
        ServerMessage::Notice(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_format() {
        let msg = ServerMessage::chat("127.0.0.1:5000", "eve", "good morning");
        assert_eq!(msg.to_string(), "[127.0.0.1:5000]eve: good morning");
    }

    #[test]
    fn test_direct_format() {
        let msg = ServerMessage::Direct {
            from: "alice".to_string(),
            content: "hello there".to_string(),
        };
        assert_eq!(msg.to_string(), "alice said to you: hello there");
    }

    #[test]
    fn test_online_format() {
        let msg = ServerMessage::Online {
            identities: vec!["alice".to_string(), "bob".to_string()],
        };
        assert_eq!(msg.to_string(), "online users: [alice, bob]");

        let empty = ServerMessage::Online { identities: vec![] };
        assert_eq!(empty.to_string(), "online users: []");
    }

    #[test]
    fn test_renamed_is_quoted() {
        let msg = ServerMessage::Renamed {
            identity: "dave".to_string(),
        };
        assert_eq!(msg.to_string(), "You've changed name to \"dave\"");
    }

    #[test]
    fn test_error_replies() {
        let taken: ServerMessage = ChatError::NameTaken("carol".into()).into();
        assert_eq!(taken.to_string(), "User name already exists");

        let offline: ServerMessage = ChatError::UserNotOnline("nobody".into()).into();
        assert_eq!(offline.to_string(), "User not online");

        let usage: ServerMessage = ChatError::MalformedCommand {
            usage: PRIVATE_USAGE,
        }
        .into();
        assert_eq!(
            usage.to_string(),
            "Invalid message format, usage: to {username} {msg}"
        );

        let kicked: ServerMessage = ChatError::IdleTimeout.into();
        assert_eq!(kicked.to_string(), "You've been kicked for timeout");
    }
}
