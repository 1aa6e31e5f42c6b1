//! Chat relay - Entry point
//!
//! Starts the TCP listener and the server actor, accepting connections.

use std::env;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_relay::{activity, handle_connection, ServerActor};

/// Default server address
const DEFAULT_ADDR: &str = "127.0.0.1:8080";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_relay=info")),
        )
        .init();

    // Get bind address from command line or use default
    let addr = env::args().nth(1).unwrap_or_else(|| DEFAULT_ADDR.to_string());

    let listener = TcpListener::bind(&addr).await?;
    info!("chat relay listening on {}", addr);

    let server = ServerActor::spawn();

    // Connection accept loop
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let server = server.clone();

                // Per-connection activity stream with the default
                // tracing-backed consumer.
                let (activity_tx, activity_rx) = activity::activity_stream();
                tokio::spawn(activity::log_activity(peer.to_string(), activity_rx));

                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, server, activity_tx).await {
                        error!("connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("failed to accept connection: {}", e);
            }
        }
    }
}
