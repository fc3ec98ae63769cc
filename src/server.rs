//! TCP Server
//!
//! Accepts connections forever and spawns one task per client. All tasks
//! share the same [`Store`] and [`ServerConfig`].

use crate::commands::CommandHandler;
use crate::config::ServerConfig;
use crate::connection::handle_connection;
use crate::storage::Store;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error};

/// Runs the accept loop on an already-bound listener.
///
/// Never returns under normal operation. A failed `accept` is logged and
/// the loop keeps going.
pub async fn run(listener: TcpListener, store: Arc<Store>, config: Arc<ServerConfig>) {
    let handler = CommandHandler::new(store, config);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!(client = %addr, "Accepted connection");
                let handler = handler.clone();

                tokio::spawn(async move {
                    handle_connection(stream, addr, handler).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
