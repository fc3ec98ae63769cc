//! Seeding the store from a snapshot.

use crate::config::ServerConfig;
use crate::snapshot::loader::{self, SnapshotRecord};
use crate::storage::Store;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

/// Outcome of a restore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Records written to the store
    pub loaded: usize,
    /// Records dropped because their expiry had already passed
    pub expired: usize,
}

/// Loads the configured snapshot into `store`.
///
/// Nothing is written unless the whole file parses.
pub fn restore(store: &Store, config: &ServerConfig) -> loader::Result<RestoreSummary> {
    let records = loader::load(&config.dir, &config.dbfilename)?;
    let summary = restore_records(store, records, SystemTime::now());

    info!(
        loaded = summary.loaded,
        expired = summary.expired,
        "Snapshot restored"
    );
    Ok(summary)
}

/// Writes `records` into `store`, turning absolute expiry times into TTLs
/// relative to `now`.
///
/// Records with less than a millisecond left are skipped.
pub fn restore_records<I>(store: &Store, records: I, now: SystemTime) -> RestoreSummary
where
    I: IntoIterator<Item = SnapshotRecord>,
{
    let mut summary = RestoreSummary::default();

    for record in records {
        let ttl = match record.expires_at {
            None => None,
            Some(at) => match at.duration_since(now) {
                Ok(ttl) if ttl >= Duration::from_millis(1) => Some(ttl),
                _ => {
                    debug!(key = %String::from_utf8_lossy(&record.key), "Skipping expired key");
                    summary.expired += 1;
                    continue;
                }
            },
        };

        store.write(record.key, record.value, ttl);
        summary.loaded += 1;
    }

    summary
}
