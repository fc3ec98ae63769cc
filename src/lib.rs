//! # SnapKV - An In-Memory Key-Value Server with Snapshot Recovery
//!
//! SnapKV speaks a small subset of the Redis wire protocol (RESP). It keeps
//! string keys in memory with optional millisecond expiry, and at startup
//! restores keys from a `REDIS0011` snapshot file.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                             SnapKV                               │
//! │                                                                  │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐           │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │           │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │           │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘           │
//! │                            │                  │                  │
//! │                            ▼                  ▼                  │
//! │                     ┌─────────────┐    ┌─────────────┐           │
//! │                     │   Frame     │    │    Store    │           │
//! │                     │  Decoder    │    │  (RwLock)   │           │
//! │                     └─────────────┘    └──────▲──────┘           │
//! │                                               │ startup          │
//! │                                        ┌──────┴──────┐           │
//! │                                        │  Snapshot   │           │
//! │                                        │  Loader     │           │
//! │                                        └─────────────┘           │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use snapkv::{server, snapshot, ServerConfig, Store};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Arc::new(ServerConfig::new("/var/lib/snapkv", "dump.rdb"));
//!     let store = Arc::new(Store::new());
//!
//!     snapshot::restore(&store, &config)?;
//!
//!     let listener = TcpListener::bind("0.0.0.0:6379").await?;
//!     server::run(listener, store, config).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `PING`
//! - `ECHO message`
//! - `SET key value [PX milliseconds]`
//! - `GET key`
//! - `CONFIG GET dir|dbfilename`
//! - `KEYS *`
//!
//! ## Module Overview
//!
//! - [`protocol`]: frame decoder and reply encoding
//! - [`storage`]: the expiring key-value store
//! - [`commands`]: command table and dispatch
//! - [`connection`]: per-client read/execute/reply loop
//! - [`snapshot`]: snapshot file reader and startup restore
//! - [`server`]: accept loop
//! - [`config`]: command-line flags
//!
//! ## Expiry
//!
//! Expiry is lazy. A key past its deadline is invisible to `GET` and `KEYS`
//! and is removed when one of them notices. There is no background sweeper.

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod snapshot;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use config::{Args, ServerConfig};
pub use connection::handle_connection;
pub use protocol::{DecodeError, Frame, FrameDecoder, Reply};
pub use snapshot::{SnapshotError, SnapshotReader, SnapshotRecord};
pub use storage::Store;

/// The port SnapKV listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The host SnapKV binds to
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Version of SnapKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
