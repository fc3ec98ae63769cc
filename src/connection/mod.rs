//! Connection Module
//!
//! One async task per client connection, each running
//! [`ConnectionHandler::run`].
//!
//! ## Example
//!
//! ```ignore
//! use snapkv::commands::CommandHandler;
//! use snapkv::connection::handle_connection;
//!
//! let handler = CommandHandler::new(store, config);
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, handler.clone()));
//! ```

pub mod handler;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler};
