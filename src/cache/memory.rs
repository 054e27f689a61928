//! In-process fallback map used when the primary backend is unreachable.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Stored entry count at which a write first sweeps out expired entries.
pub const DEFAULT_PURGE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| now >= at).unwrap_or(false)
    }
}

/// Thread-safe map with optional per-entry expiry.
///
/// Expired entries are evicted on access, and swept in bulk by writes once
/// the map holds `purge_threshold` entries.
#[derive(Debug)]
pub struct FallbackMap {
    entries: RwLock<HashMap<String, MemoryEntry>>,
    purge_threshold: usize,
}

impl Default for FallbackMap {
    fn default() -> Self {
        Self::with_purge_threshold(DEFAULT_PURGE_THRESHOLD)
    }
}

impl FallbackMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_purge_threshold(purge_threshold: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            purge_threshold: purge_threshold.max(1),
        }
    }

    /// Live value for `key`. Expired entries are evicted on access.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        {
            let entries = self.entries.read().ok()?;
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: drop it so the key returns to absent.
        if let Ok(mut entries) = self.entries.write() {
            if entries.get(key).map(|e| e.is_expired(now)).unwrap_or(false) {
                entries.remove(key);
            }
        }
        None
    }

    /// Insert or replace `key`.
    pub fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let entry = MemoryEntry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        if let Ok(mut entries) = self.entries.write() {
            if entries.len() >= self.purge_threshold && !entries.contains_key(key) {
                let now = Instant::now();
                entries.retain(|_, e| !e.is_expired(now));
            }
            entries.insert(key.to_string(), entry);
        }
    }

    /// Remove `key`. Returns whether a live entry was removed.
    pub fn remove(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .write()
            .ok()
            .and_then(|mut entries| entries.remove(key))
            .map(|entry| !entry.is_expired(now))
            .unwrap_or(false)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .map(|entries| entries.values().filter(|e| !e.is_expired(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of stored entries, expired ones included.
    #[cfg(test)]
    fn stored(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        match self.entries.write() {
            Ok(mut entries) => {
                let before = entries.len();
                entries.retain(|_, e| !e.is_expired(now));
                before - entries.len()
            }
            Err(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get() {
        let map = FallbackMap::new();
        map.set("analysis:repo", "{}", None);
        assert_eq!(map.get("analysis:repo").as_deref(), Some("{}"));
        assert_eq!(map.get("analysis:other"), None);
    }

    #[test]
    fn test_set_overwrites() {
        let map = FallbackMap::new();
        map.set("k", "one", None);
        map.set("k", "two", None);
        assert_eq!(map.get("k").as_deref(), Some("two"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_expired_entry_is_absent() {
        let map = FallbackMap::new();
        map.set("k", "v", Some(Duration::ZERO));
        assert_eq!(map.get("k"), None);
        assert!(!map.contains("k"));
        assert!(map.is_empty());
    }

    #[test]
    fn test_remove() {
        let map = FallbackMap::new();
        map.set("k", "v", None);
        assert!(map.remove("k"));
        assert!(!map.remove("k"));
    }

    #[test]
    fn test_purge_expired() {
        let map = FallbackMap::new();
        map.set("old", "v", Some(Duration::ZERO));
        map.set("new", "v", Some(Duration::from_secs(60)));
        assert_eq!(map.purge_expired(), 1);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_writes_sweep_expired_entries_past_threshold() {
        let map = FallbackMap::with_purge_threshold(4);
        for i in 0..4 {
            map.set(&format!("stale{}", i), "v", Some(Duration::ZERO));
        }
        assert_eq!(map.stored(), 4);

        map.set("fresh", "v", Some(Duration::from_secs(60)));
        assert_eq!(map.stored(), 1);
        assert_eq!(map.get("fresh").as_deref(), Some("v"));
    }

    #[test]
    fn test_live_entries_kept_past_threshold() {
        let map = FallbackMap::with_purge_threshold(2);
        map.set("a", "1", None);
        map.set("b", "2", None);
        map.set("c", "3", None);
        assert_eq!(map.len(), 3);
        assert_eq!(map.get("a").as_deref(), Some("1"));
    }
}
