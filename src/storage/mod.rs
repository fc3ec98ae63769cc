//! Storage Module
//!
//! The in-memory store every command reads from and writes to, and the
//! snapshot loader seeds at startup.
//!
//! ```text
//! ┌───────────────────────────────────────┐
//! │                Store                  │
//! │   RwLock<HashMap<Bytes, Entry>>       │
//! │                                       │
//! │   read / keys   -> shared lock        │
//! │   write / remove -> exclusive lock    │
//! └───────────────────────────────────────┘
//! ```
//!
//! Expired keys are reclaimed lazily, on access.

pub mod store;

pub use store::{Entry, Store};
