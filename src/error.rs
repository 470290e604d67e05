//! Error types for the chat server
//!
//! Defines application-level errors and outbound queue send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Application-level errors
///
/// Covers both fatal errors (session teardown) and command errors
/// (a reply line is sent and the session continues).
#[derive(Debug, Error)]
pub enum ChatError {
    /// IO error on the transport (fatal to the session)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Line framing error (fatal to the session)
    #[error("Line codec error: {0}")]
    Codec(LinesCodecError),

    /// Delivery channel closed (the broadcaster has stopped)
    #[error("Channel send error")]
    ChannelSend,

    /// Identity already registered by another session
    #[error("Name already taken: {0}")]
    NameTaken(String),

    /// Direct message target is not registered
    #[error("User not online: {0}")]
    UserNotOnline(String),

    /// A recognized command was used with the wrong shape
    #[error("Malformed command, usage: {usage}")]
    MalformedCommand { usage: &'static str },

    /// No input within the idle window
    #[error("Idle timeout")]
    IdleTimeout,
}

impl From<LinesCodecError> for ChatError {
    fn from(e: LinesCodecError) -> Self {
        match e {
            LinesCodecError::Io(e) => ChatError::Io(e),
            other => ChatError::Codec(other),
        }
    }
}

/// Outbound queue send errors
///
/// Occurs when handing a line to a session's outbound queue.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The queue is at capacity (slow or stalled client)
    #[error("Outbound queue full")]
    QueueFull,

    /// The receiving end of the queue has been closed
    #[error("Channel closed")]
    ChannelClosed,
}
