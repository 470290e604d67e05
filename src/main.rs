//! Line-delimited chat server - Entry Point
//!
//! Parses flags, binds the listener and runs the accept loop.

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use im_server::{ChatServer, ServerArgs};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ServerArgs::parse();

    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=im_server=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("im_server=info")),
        )
        .init();

    let config = args.into_config();
    let addr = config.bind_addr();

    // Failing to bind is the only fatal error
    let listener = TcpListener::bind(&addr).await?;
    info!(
        "Chat server bound to {} (idle timeout {:?})",
        addr, config.idle_timeout
    );

    ChatServer::new(config).serve(listener).await;

    Ok(())
}
