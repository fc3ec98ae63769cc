//! Command Module
//!
//! Turns decoded frames into replies.
//!
//! ```text
//! Frame ──> CommandHandler::execute ──> CommandTable::lookup ──> CommandFn ──> Reply
//!                                                                   │
//!                                                                   ▼
//!                                                          Store / ServerConfig
//! ```
//!
//! Command names are matched case-insensitively. Unknown names get
//! `-ERR unknown command '<name>'` and the connection stays open.

pub mod handler;

pub use handler::{CommandContext, CommandFn, CommandHandler, CommandTable};
