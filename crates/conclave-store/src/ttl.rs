//! Generic key-value store with per-entry TTL.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// A key-value map where every entry carries its own deadline.
///
/// Expired entries are invisible to readers; their memory is reclaimed
/// by [`TtlStore::sweep`], which callers run periodically.
#[derive(Debug)]
pub struct TtlStore<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
}

impl<V> Default for TtlStore<V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<V: Clone> TtlStore<V> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an entry, setting its TTL from now.
    pub fn put(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.entries.write().insert(
            key.into(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Fetches a live entry; expired entries are misses.
    pub fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read();
        entries.get(key).and_then(|e| {
            if e.expires_at > Instant::now() {
                Some(e.value.clone())
            } else {
                None
            }
        })
    }

    /// Removes an entry, returning its value if it was live.
    pub fn remove(&self, key: &str) -> Option<V> {
        let entry = self.entries.write().remove(key)?;
        (entry.expires_at > Instant::now()).then_some(entry.value)
    }

    /// Drops every expired entry, returning how many were reclaimed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }

    /// Number of entries held, including not-yet-swept expired ones.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True when no entries are held.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get() {
        let store: TtlStore<String> = TtlStore::new();
        store.put("k", "v".to_string(), Duration::from_secs(60));
        assert_eq!(store.get("k").as_deref(), Some("v"));
        assert_eq!(store.get("missing"), None);
    }

    #[test]
    fn test_expired_entry_is_miss() {
        let store: TtlStore<u32> = TtlStore::new();
        store.put("k", 1, Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn test_put_refreshes_ttl() {
        let store: TtlStore<u32> = TtlStore::new();
        store.put("k", 1, Duration::from_millis(0));
        store.put("k", 2, Duration::from_secs(60));
        assert_eq!(store.get("k"), Some(2));
    }

    #[test]
    fn test_sweep_reclaims_expired() {
        let store: TtlStore<u32> = TtlStore::new();
        store.put("dead", 1, Duration::from_millis(0));
        store.put("live", 2, Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(store.len(), 2);
        assert_eq!(store.sweep(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("live"), Some(2));
    }

    #[test]
    fn test_remove() {
        let store: TtlStore<u32> = TtlStore::new();
        store.put("k", 7, Duration::from_secs(60));
        assert_eq!(store.remove("k"), Some(7));
        assert_eq!(store.get("k"), None);
        assert_eq!(store.remove("k"), None);
    }
}
