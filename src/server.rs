//! Chat server bootstrap
//!
//! Wires the shared pieces together (registry, delivery channel, dispatcher)
//! and runs the accept loop, one task per connection.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::command::Dispatcher;
use crate::config::ServerConfig;
use crate::delivery::{self, Broadcaster, DeliveryChannel};
use crate::handler::handle_connection;
use crate::registry::Registry;

/// Shared state handed to every connection task
#[derive(Clone)]
pub struct ServerContext {
    pub config: Arc<ServerConfig>,
    pub registry: Registry,
    pub delivery: DeliveryChannel,
    pub dispatcher: Arc<Dispatcher>,
}

impl ServerContext {
    /// Build a context with the standard command chain
    ///
    /// The returned broadcaster must be spawned for broadcasts to flow.
    pub fn new(config: ServerConfig) -> (Self, Broadcaster) {
        Self::with_dispatcher(config, Dispatcher::standard())
    }

    pub fn with_dispatcher(config: ServerConfig, dispatcher: Dispatcher) -> (Self, Broadcaster) {
        info!("Command chain: {:?} then broadcast", dispatcher.handler_names());
        let registry = Registry::new();
        let (delivery, broadcaster) = delivery::channel(registry.clone(), config.delivery_capacity);
        let ctx = Self {
            config: Arc::new(config),
            registry,
            delivery,
            dispatcher: Arc::new(dispatcher),
        };
        (ctx, broadcaster)
    }
}

/// The chat server
pub struct ChatServer {
    ctx: ServerContext,
    broadcaster: Broadcaster,
}

impl ChatServer {
    pub fn new(config: ServerConfig) -> Self {
        let (ctx, broadcaster) = ServerContext::new(config);
        Self { ctx, broadcaster }
    }

    /// Shared context, e.g. to inspect the registry
    pub fn context(&self) -> &ServerContext {
        &self.ctx
    }

    /// Accept connections forever
    ///
    /// Accept errors are logged and the loop continues.
    pub async fn serve(self, listener: TcpListener) {
        let Self { ctx, broadcaster } = self;
        tokio::spawn(broadcaster.run());

        if let Ok(addr) = listener.local_addr() {
            info!("Chat server listening on {}", addr);
        }

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let ctx = ctx.clone();

                    tokio::spawn(async move {
                        let registry = ctx.registry.clone();
                        let reason = handle_connection(stream, ctx).await;
                        debug!(
                            "Connection from {} ended: {:?}, {} online",
                            addr,
                            reason,
                            registry.len().await
                        );
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}
