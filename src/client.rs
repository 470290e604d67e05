//! Terminal client state
//!
//! Input interpretation and name tracking for the `im_client` binary. The
//! I/O loop lives in the binary.

use futures_util::SinkExt;
use tokio::io::AsyncWrite;
use tokio_util::codec::{FramedWrite, LinesCodec};

/// Prefix of a successful rename reply
const RENAMED_PREFIX: &str = "You've changed name to \"";

/// What the user typed, interpreted locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientInput {
    /// Blank input, nothing to do
    Empty,
    /// `quit` or `exit`
    Quit,
    /// `name`: show the current name
    ShowName,
    /// Anything else, sent to the server verbatim
    Send(String),
}

impl ClientInput {
    pub fn parse(input: &str) -> Self {
        match input.trim() {
            "" => ClientInput::Empty,
            "quit" | "exit" => ClientInput::Quit,
            "name" => ClientInput::ShowName,
            other => ClientInput::Send(other.to_string()),
        }
    }
}

/// Client-side view of the session
#[derive(Debug, Clone)]
pub struct ClientState {
    name: String,
}

impl ClientState {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The name the server last confirmed (or the requested one)
    pub fn current_name(&self) -> &str {
        &self.name
    }

    /// Track renames confirmed by the server
    ///
    /// Returns the new name if `line` was a rename confirmation.
    pub fn process_server_line(&mut self, line: &str) -> Option<&str> {
        let new_name = line
            .trim()
            .strip_prefix(RENAMED_PREFIX)?
            .strip_suffix('"')
            .filter(|name| !name.is_empty())?;
        self.name = new_name.to_string();
        Some(&self.name)
    }
}

/// The rename target of an outgoing line, if it is a rename command
pub fn rename_target(line: &str) -> Option<&str> {
    line.strip_prefix("rename ").filter(|name| !name.is_empty())
}

/// Flush pending lines and shut down the write side of the connection
pub async fn hang_up<W>(sink: &mut FramedWrite<W, LinesCodec>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    SinkExt::<String>::close(sink).await.map_err(|e| match e {
        tokio_util::codec::LinesCodecError::Io(e) => e,
        other => std::io::Error::other(other),
    })
}

/// Command summary printed when the client starts
pub const HELP: &str = "\
Commands:
  who                    - List online users
  name                   - Show your current username
  rename <newname>       - Change your username
  to <username> <msg>    - Send private message
  quit                   - Exit the client
  Any other text will be broadcast to all users";
