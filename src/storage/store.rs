//! Expiring Key-Value Store
//!
//! A single `HashMap` behind one reader/writer lock. Reads share the lock,
//! writes and removals take it exclusively.
//!
//! ## Expiry
//!
//! Expiry is lazy: nothing sweeps the map in the background. A key whose
//! expiry has passed is reported as absent by `read` and `keys`, which then
//! remove it. Removal re-checks the entry under the write lock, so a value
//! written between the check and the removal survives.
//!
//! A key is expired once the current instant is strictly after its
//! `expires_at`.

use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::trace;

/// A stored value with optional expiry time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub value: Bytes,
    /// When this entry expires (None = never expires)
    pub expires_at: Option<Instant>,
}

impl Entry {
    /// Creates an entry. A zero `ttl` means the entry never expires, and so
    /// does a `ttl` too far out for `Instant` to represent.
    pub fn new(value: Bytes, ttl: Option<Duration>) -> Self {
        let expires_at = ttl
            .filter(|ttl| !ttl.is_zero())
            .and_then(|ttl| Instant::now().checked_add(ttl));
        Self { value, expires_at }
    }

    /// Checks whether this entry has expired as of `now`.
    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|exp| now > exp)
    }
}

/// The key-value store shared by every connection.
///
/// Wrap it in an `Arc` and hand a clone to each task.
///
/// # Example
///
/// ```
/// use snapkv::storage::Store;
/// use bytes::Bytes;
/// use std::time::Duration;
///
/// let store = Store::new();
/// store.write(Bytes::from("name"), Bytes::from("Ariz"), None);
/// assert_eq!(store.read(b"name"), Some(Bytes::from("Ariz")));
///
/// store.write(
///     Bytes::from("session"),
///     Bytes::from("abc123"),
///     Some(Duration::from_secs(60)),
/// );
/// assert_eq!(store.keys().len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct Store {
    data: RwLock<HashMap<Bytes, Entry>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites `key`.
    ///
    /// A positive `ttl` sets the expiry to now + `ttl`; `None` or a zero
    /// duration stores the key without expiry.
    pub fn write(&self, key: Bytes, value: Bytes, ttl: Option<Duration>) {
        let entry = Entry::new(value, ttl);
        self.data.write().insert(key, entry);
    }

    /// Returns the value for `key` unless it is absent or expired.
    pub fn read(&self, key: &[u8]) -> Option<Bytes> {
        let now = Instant::now();

        {
            let data = self.data.read();
            let entry = data.get(key)?;
            if !entry.is_expired_at(now) {
                return Some(entry.value.clone());
            }
        }

        self.remove_expired(&[key], now);
        None
    }

    /// Returns every key that has not expired, in no particular order.
    pub fn keys(&self) -> Vec<Bytes> {
        let now = Instant::now();
        let mut live = Vec::new();
        let mut expired = Vec::new();

        {
            let data = self.data.read();
            live.reserve(data.len());
            for (key, entry) in data.iter() {
                if entry.is_expired_at(now) {
                    expired.push(key.clone());
                } else {
                    live.push(key.clone());
                }
            }
        }

        if !expired.is_empty() {
            self.remove_expired(&expired, now);
        }

        live
    }

    /// Removes `key`. Returns `true` if it was present.
    pub fn remove(&self, key: &[u8]) -> bool {
        self.data.write().remove(key).is_some()
    }

    /// Number of stored entries, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Removes each key that is still expired as of `now`.
    fn remove_expired<K: AsRef<[u8]>>(&self, keys: &[K], now: Instant) {
        let mut data = self.data.write();
        for key in keys {
            let key = key.as_ref();
            // Another writer may have replaced the entry since it was observed.
            if data.get(key).is_some_and(|entry| entry.is_expired_at(now)) {
                data.remove(key);
                trace!(key = %String::from_utf8_lossy(key), "Removed expired key");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn key(s: &str) -> Bytes {
        Bytes::from(s.to_string())
    }

    #[test]
    fn test_write_and_read() {
        let store = Store::new();

        store.write(key("key"), key("value"), None);
        assert_eq!(store.read(b"key"), Some(key("value")));
    }

    #[test]
    fn test_read_nonexistent() {
        let store = Store::new();
        assert_eq!(store.read(b"nonexistent"), None);
    }

    #[test]
    fn test_overwrite_clears_expiry() {
        let store = Store::new();

        store.write(key("key"), key("old"), Some(Duration::from_millis(30)));
        store.write(key("key"), key("new"), None);

        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(store.read(b"key"), Some(key("new")));
    }

    #[test]
    fn test_zero_ttl_never_expires() {
        let entry = Entry::new(key("v"), Some(Duration::ZERO));
        assert_eq!(entry.expires_at, None);
    }

    #[test]
    fn test_unrepresentable_ttl_never_expires() {
        let entry = Entry::new(key("v"), Some(Duration::MAX));
        assert_eq!(entry.expires_at, None);

        let store = Store::new();
        store.write(key("key"), key("value"), Some(Duration::MAX));
        assert_eq!(store.read(b"key"), Some(key("value")));
    }

    #[test]
    fn test_expiry() {
        let store = Store::new();

        store.write(key("key"), key("value"), Some(Duration::from_millis(50)));
        assert_eq!(store.read(b"key"), Some(key("value")));

        std::thread::sleep(Duration::from_millis(100));

        assert_eq!(store.read(b"key"), None);
        // The expired entry was reclaimed by the read.
        assert!(store.is_empty());
    }

    #[test]
    fn test_expiry_boundary_is_not_expired() {
        let now = Instant::now();
        let entry = Entry {
            value: key("v"),
            expires_at: Some(now),
        };

        assert!(!entry.is_expired_at(now));
        assert!(entry.is_expired_at(now + Duration::from_nanos(1)));
    }

    #[test]
    fn test_keys_skips_and_reclaims_expired() {
        let store = Store::new();

        store.write(key("k1"), key("v1"), None);
        store.write(key("k2"), key("v2"), None);
        store.write(key("gone"), key("v"), Some(Duration::from_millis(10)));

        std::thread::sleep(Duration::from_millis(40));

        let keys: HashSet<Bytes> = store.keys().into_iter().collect();
        assert_eq!(keys, HashSet::from([key("k1"), key("k2")]));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let store = Store::new();

        store.write(key("key"), key("value"), None);
        assert!(store.remove(b"key"));
        assert!(!store.remove(b"key"));
        assert_eq!(store.read(b"key"), None);
    }

    #[test]
    fn test_removal_keeps_fresh_write() {
        let store = Store::new();

        store.write(key("key"), key("old"), Some(Duration::from_millis(10)));
        std::thread::sleep(Duration::from_millis(30));
        let observed = Instant::now();

        // A writer replaces the key after the reader saw it expire.
        store.write(key("key"), key("new"), None);
        store.remove_expired(&[b"key"], observed);

        assert_eq!(store.read(b"key"), Some(key("new")));
    }

    #[test]
    fn test_concurrent_access() {
        let store = Arc::new(Store::new());
        let mut handles = vec![];

        for i in 0..10 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for j in 0..100 {
                    let k = key(&format!("key:{}:{}", i, j));
                    store.write(k.clone(), key("value"), None);
                    assert_eq!(store.read(&k), Some(key("value")));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 1000);
        assert_eq!(store.keys().len(), 1000);
    }
}
