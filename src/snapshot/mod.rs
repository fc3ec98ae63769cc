//! Snapshot Recovery
//!
//! At startup the server reads the snapshot named by `--dir` and
//! `--dbfilename` and writes every key that has not yet expired into the
//! store, before any client is accepted.
//!
//! ```text
//! <dir>/<dbfilename> ──> SnapshotReader ──> SnapshotRecord* ──> restore ──> Store::write
//! ```
//!
//! Snapshots are only ever read; the server never writes one.

pub mod loader;
pub mod restore;

pub use loader::{load, load_file, SnapshotError, SnapshotReader, SnapshotRecord};
pub use restore::{restore, restore_records, RestoreSummary};
