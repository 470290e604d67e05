//! Line-delimited TCP chat server library
//!
//! Clients connect over TCP, send one instruction per line, broadcast text to
//! everyone online, rename themselves and send private messages.
//!
//! # Commands
//! - `who` - list online identities
//! - `rename <name>` - change identity
//! - `to <name> <text...>` - private message
//! - anything else - broadcast
//!
//! # Architecture
//! - `Registry` is the only shared mutable state: identity → session behind
//!   an `RwLock`, with `register`/`rename` as single atomic operations
//! - A `Broadcaster` task drains one `mpsc` conduit and fans each line out
//! - Each connection runs a reader/idle-supervisor task and a writer task
//!   draining a bounded per-session queue
//! - Inbound lines go through an ordered `Dispatcher` with broadcast as the
//!   fixed fallback
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use im_server::{ChatServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::default();
//!     let listener = TcpListener::bind(config.bind_addr()).await.unwrap();
//!     ChatServer::new(config).serve(listener).await;
//! }
//! ```

pub mod client;
pub mod codec;
pub mod command;
pub mod config;
pub mod delivery;
pub mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use codec::{ChatCodec, Inbound};
pub use command::{CommandHandler, Dispatcher};
pub use config::{ServerArgs, ServerConfig};
pub use delivery::{Broadcaster, DeliveryChannel};
pub use error::{ChatError, SendError};
pub use handler::{handle_connection, run_session};
pub use message::ServerMessage;
pub use registry::Registry;
pub use server::{ChatServer, ServerContext};
pub use session::{CloseReason, Session, SessionHandle};
pub use types::SessionId;
