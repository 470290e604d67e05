//! Command dispatcher
//!
//! Each inbound line is offered to an ordered list of handlers; the first one
//! that claims it is responsible for every reply. Broadcast matches anything,
//! so it lives in a dedicated fallback slot instead of the list.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::ChatError;
use crate::message::{ServerMessage, PRIVATE_USAGE};
use crate::session::Session;

/// A command recognized by its shape
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Handle `line` if it is this command. Returns whether it was claimed.
    ///
    /// A malformed instance of a recognized command is still claimed; the
    /// handler replies with usage.
    async fn handle(&self, session: &mut Session, line: &str) -> bool;
}

/// `who`: list online identities
pub struct WhoHandler;

#[async_trait]
impl CommandHandler for WhoHandler {
    fn name(&self) -> &'static str {
        "who"
    }

    async fn handle(&self, session: &mut Session, line: &str) -> bool {
        if line != "who" {
            return false;
        }

        let identities = session
            .registry()
            .snapshot_identities()
            .await
            .into_iter()
            .collect();
        session.reply(ServerMessage::Online { identities });
        true
    }
}

/// `rename <name>`: change identity
pub struct RenameHandler;

#[async_trait]
impl CommandHandler for RenameHandler {
    fn name(&self) -> &'static str {
        "rename"
    }

    async fn handle(&self, session: &mut Session, line: &str) -> bool {
        let Some(new_identity) = line.strip_prefix("rename ").filter(|name| !name.is_empty())
        else {
            return false;
        };

        match session.rename(new_identity).await {
            Ok(()) => session.reply(ServerMessage::Renamed {
                identity: new_identity.to_string(),
            }),
            Err(e) => {
                debug!("Rename of '{}' refused: {}", session.identity(), e);
                session.reply(e.into());
            }
        }
        true
    }
}

/// `to <name> <text...>`: private message
pub struct PrivateHandler;

#[async_trait]
impl CommandHandler for PrivateHandler {
    fn name(&self) -> &'static str {
        "to"
    }

    async fn handle(&self, session: &mut Session, line: &str) -> bool {
        if !line.starts_with("to ") || line.len() <= 3 {
            return false;
        }

        let tokens: Vec<&str> = line.split(' ').collect();
        if tokens.len() < 3 {
            session.reply(
                ChatError::MalformedCommand {
                    usage: PRIVATE_USAGE,
                }
                .into(),
            );
            return true;
        }

        let target = tokens[1];
        let content = tokens[2..].join(" ");
        if let Err(e) = session.direct_message(target, &content).await {
            debug!("Private message from '{}' failed: {}", session.identity(), e);
            session.reply(e.into());
        }
        true
    }
}

/// Catch-all: broadcast the line to everyone online
pub struct BroadcastHandler;

impl BroadcastHandler {
    async fn handle(&self, session: &mut Session, line: &str) {
        if let Err(e) = session.broadcast(line).await {
            warn!("Broadcast from '{}' failed: {}", session.identity(), e);
        }
    }
}

/// Ordered handler chain with a fixed broadcast fallback
pub struct Dispatcher {
    handlers: Vec<Box<dyn CommandHandler>>,
    fallback: BroadcastHandler,
}

impl Dispatcher {
    /// A dispatcher with no commands: every line is broadcast
    pub fn empty() -> Self {
        Self {
            handlers: Vec::new(),
            fallback: BroadcastHandler,
        }
    }

    /// The standard chain: who, rename, to, then broadcast
    pub fn standard() -> Self {
        Self::empty()
            .with_handler(WhoHandler)
            .with_handler(RenameHandler)
            .with_handler(PrivateHandler)
    }

    /// Append a handler; it runs after the existing ones and before broadcast
    pub fn with_handler(mut self, handler: impl CommandHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Handler names in evaluation order
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Route one inbound line
    pub async fn dispatch(&self, session: &mut Session, line: &str) {
        debug!("Recv from '{}': {}", session.identity(), line);

        for handler in &self.handlers {
            if handler.handle(session, line).await {
                return;
            }
        }
        self.fallback.handle(session, line).await;
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::standard()
    }
}
