//! Cache manager holding values for a fixed freshness window
//!
//! Provides a `CacheManager` that stores values in memory together with the time
//! they were written. Every operation runs under one lock over the whole map.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::clock::{Clock, SystemClock};

/// Default freshness window in minutes
pub const DEFAULT_TTL_MINUTES: i64 = 30;

/// A stored value and the moment it was written
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    /// The cached data
    data: V,
    /// When the data was cached
    cached_at: DateTime<Utc>,
}

/// Diagnostic view of a single cache entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EntryInfo {
    /// Seconds since the entry was written
    pub age_seconds: f64,
    /// Seconds left before the entry expires, negative once it has
    pub expires_in_seconds: f64,
    /// Whether the entry is past its freshness window
    pub is_expired: bool,
}

/// Thread-safe store of values keyed by string
///
/// Clones share the same underlying store, so one manager created at startup can
/// be handed to every component that needs it. The freshness window is fixed at
/// construction.
pub struct CacheManager<V = Value> {
    entries: Arc<Mutex<HashMap<String, CacheEntry<V>>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V> Clone for CacheManager<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            ttl: self.ttl,
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<V> std::fmt::Debug for CacheManager<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("entries", &self.len())
            .field("ttl", &self.ttl)
            .field("clock", &self.clock)
            .finish()
    }
}

impl<V: Clone> Default for CacheManager<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> CacheManager<V> {
    /// Creates a cache with the default 30 minute window
    pub fn new() -> Self {
        Self::with_ttl(Duration::minutes(DEFAULT_TTL_MINUTES))
    }

    /// Creates a cache with a custom freshness window
    pub fn with_ttl(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Creates a cache that reads the time from `clock`
    ///
    /// Useful for testing expiry without waiting for real time to pass.
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            clock,
        }
    }

    /// Reads a value from the cache
    ///
    /// An expired entry is removed before returning.
    ///
    /// # Arguments
    /// * `key` - The cache key to read (e.g., "board_data_abc123")
    ///
    /// # Returns
    /// * `Some(V)` if the entry was written less than one window ago
    /// * `None` if the key was never written, was cleared, or has expired
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.lock();

        let fresh = now - entries.get(key)?.cached_at < self.ttl;
        if fresh {
            return entries.get(key).map(|entry| entry.data.clone());
        }

        entries.remove(key);
        debug!(key, "evicted expired cache entry");
        None
    }

    /// Stores `data` under `key`, replacing any previous entry
    pub fn set(&self, key: impl Into<String>, data: V) {
        let now = self.clock.now();
        let entry = CacheEntry {
            data,
            cached_at: now,
        };
        self.lock().insert(key.into(), entry);
    }

    /// Removes a single entry, or every entry when `key` is `None`
    ///
    /// Clearing a key that is not stored is a no-op.
    pub fn clear(&self, key: Option<&str>) {
        let mut entries = self.lock();
        match key {
            Some(key) => {
                entries.remove(key);
            }
            None => entries.clear(),
        }
    }

    /// Snapshot of every stored entry's age and remaining lifetime
    ///
    /// Expired entries are reported, not removed.
    ///
    /// # Returns
    /// A map from key to `EntryInfo`, sorted by key. Remaining lifetime is
    /// negative for entries past the window.
    pub fn info(&self) -> BTreeMap<String, EntryInfo> {
        let now = self.clock.now();
        let entries = self.lock();

        entries
            .iter()
            .map(|(key, entry)| {
                let age = now - entry.cached_at;
                // Subtract as seconds: `ttl - age` can leave the duration range
                let info = EntryInfo {
                    age_seconds: seconds(age),
                    expires_in_seconds: seconds(self.ttl) - seconds(age),
                    is_expired: age >= self.ttl,
                };
                (key.clone(), info)
            })
            .collect()
    }
}

impl<V> CacheManager<V> {
    /// Returns the freshness window
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of entries currently stored, expired ones included
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Locks the store, recovering the map if a previous holder panicked
    ///
    /// Each critical section performs at most one map mutation, so the map is
    /// consistent even after a poisoning panic.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Converts a chrono duration to fractional seconds
fn seconds(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use serde_json::json;

    fn create_test_cache() -> (CacheManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let cache = CacheManager::with_clock(Duration::minutes(30), clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_get_returns_none_for_missing_key() {
        let (cache, _clock) = create_test_cache();

        assert!(cache.get("nonexistent_key").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_get_returns_value_within_window() {
        let (cache, clock) = create_test_cache();
        let data = json!({ "name": "Roadmap", "cards": 12 });

        cache.set("board_data_abc", data.clone());
        clock.advance(Duration::minutes(29) + Duration::seconds(59));

        assert_eq!(cache.get("board_data_abc"), Some(data));
    }

    #[test]
    fn test_get_at_exact_window_is_a_miss() {
        let (cache, clock) = create_test_cache();

        cache.set("board_data_abc", json!(1));
        clock.advance(Duration::minutes(30));

        assert!(cache.get("board_data_abc").is_none());
    }

    #[test]
    fn test_expired_get_evicts_entry() {
        let (cache, clock) = create_test_cache();

        cache.set("board_data_abc", json!("stale"));
        clock.advance(Duration::minutes(45));

        assert_eq!(cache.len(), 1, "Expired entry lingers until read");
        assert!(cache.get("board_data_abc").is_none());
        assert_eq!(cache.len(), 0, "Read should evict the expired entry");
        assert!(!cache.info().contains_key("board_data_abc"));
    }

    #[test]
    fn test_overwrite_replaces_value_and_timestamp() {
        let (cache, clock) = create_test_cache();

        cache.set("board_data_abc", json!("first"));
        clock.advance(Duration::minutes(25));
        cache.set("board_data_abc", json!("second"));
        clock.advance(Duration::minutes(10));

        // 35 minutes after the first write, 10 after the second
        assert_eq!(cache.get("board_data_abc"), Some(json!("second")));
        let info = cache.info();
        assert!((info["board_data_abc"].age_seconds - 600.0).abs() < 0.01);
    }

    #[test]
    fn test_set_revives_expired_key() {
        let (cache, clock) = create_test_cache();

        cache.set("board_data_abc", json!("old"));
        clock.advance(Duration::hours(2));
        cache.set("board_data_abc", json!("new"));

        assert_eq!(cache.get("board_data_abc"), Some(json!("new")));
    }

    #[test]
    fn test_clear_missing_key_is_noop() {
        let (cache, _clock) = create_test_cache();
        cache.set("board_data_a", json!(1));

        cache.clear(Some("board_data_never_written"));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("board_data_a"), Some(json!(1)));
    }

    #[test]
    fn test_clear_single_key() {
        let (cache, _clock) = create_test_cache();
        cache.set("board_data_a", json!(1));
        cache.set("board_data_b", json!(2));

        cache.clear(Some("board_data_a"));

        assert!(cache.get("board_data_a").is_none());
        assert_eq!(cache.get("board_data_b"), Some(json!(2)));
    }

    #[test]
    fn test_clear_all() {
        let (cache, _clock) = create_test_cache();
        cache.set("board_data_a", json!(1));
        cache.set("board_data_b", json!(2));

        cache.clear(None);

        assert!(cache.get("board_data_a").is_none());
        assert!(cache.get("board_data_b").is_none());
        assert!(cache.info().is_empty());
    }

    #[test]
    fn test_info_reports_age_and_remaining_time() {
        let (cache, clock) = create_test_cache();

        cache.set("board_data_abc", json!({}));
        clock.advance(Duration::minutes(10));

        let info = cache.info();
        let entry = info["board_data_abc"];
        assert!((entry.age_seconds - 600.0).abs() < 0.01);
        assert!((entry.expires_in_seconds - 1200.0).abs() < 0.01);
        assert!(!entry.is_expired);

        clock.advance(Duration::minutes(21));

        let entry = cache.info()["board_data_abc"];
        assert!(entry.is_expired);
        assert!(entry.expires_in_seconds < 0.0);
    }

    #[test]
    fn test_info_marks_exact_window_as_expired() {
        let (cache, clock) = create_test_cache();

        cache.set("k", json!(null));
        clock.advance(Duration::minutes(30));

        let entry = cache.info()["k"];
        assert!(entry.is_expired);
        assert_eq!(entry.expires_in_seconds, 0.0);
    }

    #[test]
    fn test_info_with_huge_ttl_and_clock_moved_back() {
        let clock = Arc::new(ManualClock::default());
        let cache: CacheManager =
            CacheManager::with_clock(Duration::minutes(i64::MAX / 60_000), clock.clone());

        cache.set("k", json!(1));
        clock.advance(Duration::days(-1));

        let entry = cache.info()["k"];
        assert!(!entry.is_expired);
        assert!((entry.age_seconds + 86_400.0).abs() < 0.01);
        assert!(entry.expires_in_seconds > 0.0);
        assert_eq!(cache.get("k"), Some(json!(1)));
    }

    #[test]
    fn test_info_does_not_evict() {
        let (cache, clock) = create_test_cache();

        cache.set("k", json!(1));
        clock.advance(Duration::hours(1));

        assert!(cache.info()["k"].is_expired);
        assert!(cache.info().contains_key("k"), "info must leave expired entries");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clones_share_store() {
        let (cache, _clock) = create_test_cache();
        let handle = cache.clone();

        handle.set("shared", json!(true));

        assert_eq!(cache.get("shared"), Some(json!(true)));
    }

    #[test]
    fn test_default_ttl_is_thirty_minutes() {
        let cache: CacheManager = CacheManager::new();
        assert_eq!(cache.ttl(), Duration::minutes(30));
    }

    #[test]
    fn test_entry_info_serializes_snake_case() {
        let info = EntryInfo {
            age_seconds: 1.5,
            expires_in_seconds: -2.0,
            is_expired: true,
        };

        let json = serde_json::to_value(info).expect("Failed to serialize EntryInfo");

        assert_eq!(json["age_seconds"], json!(1.5));
        assert_eq!(json["expires_in_seconds"], json!(-2.0));
        assert_eq!(json["is_expired"], json!(true));
    }
}
