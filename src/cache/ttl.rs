//! Process-lifetime key/value cache with per-entry expiry.
//!
//! Entries are never consulted as a source of truth; losing the whole cache
//! (restart, `clear`) only costs extra upstream calls. Concurrent writers on
//! the same key race and the last write wins.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use metrics::counter;
use tracing::debug;

use super::clock::{Clock, SystemClock};

pub(crate) const METRIC_CACHE_HIT: &str = "marketdesk_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "marketdesk_cache_miss_total";
pub(crate) const METRIC_CACHE_EXPIRED: &str = "marketdesk_cache_expired_total";

/// Every this many writes, entries that expired without being read again are dropped.
const SWEEP_EVERY_WRITES: usize = 256;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) > self.ttl
    }
}

/// Keyed cache whose entries become logically absent once their TTL elapses.
pub struct TtlCache<V> {
    name: &'static str,
    entries: DashMap<String, CacheEntry<V>>,
    clock: Arc<dyn Clock>,
    writes: AtomicUsize,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache that reads time from the system clock.
    pub fn new(name: &'static str) -> Self {
        Self::with_clock(name, Arc::new(SystemClock))
    }

    pub fn with_clock(name: &'static str, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            entries: DashMap::new(),
            clock,
            writes: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Return the cached value when it is still fresh; expired entries are evicted.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();

        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                counter!(METRIC_CACHE_HIT, "cache" => self.name).increment(1);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            // Another writer may have refreshed the key since the read guard dropped.
            self.entries
                .remove_if(key, |_, entry| entry.is_expired(now));
            counter!(METRIC_CACHE_EXPIRED, "cache" => self.name).increment(1);
            debug!(
                target = "marketdesk::cache",
                cache = self.name,
                key,
                "evicted expired entry"
            );
        }

        counter!(METRIC_CACHE_MISS, "cache" => self.name).increment(1);
        None
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            stored_at: self.clock.now(),
            ttl,
        };
        self.entries.insert(key.into(), entry);

        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % SWEEP_EVERY_WRITES == 0 {
            self.sweep_expired();
        }
    }

    /// Drop every expired entry. Returns how many went away.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            counter!(METRIC_CACHE_EXPIRED, "cache" => self.name).increment(removed as u64);
            debug!(
                target = "marketdesk::cache",
                cache = self.name,
                removed,
                "swept expired entries"
            );
        }
        removed
    }

    /// Remove one key, or every key when `key` is `None`. Returns how many entries went away.
    pub fn clear(&self, key: Option<&str>) -> usize {
        match key {
            Some(key) => usize::from(self.entries.remove(key).is_some()),
            None => {
                let removed = self.entries.len();
                self.entries.clear();
                removed
            }
        }
    }

    /// Number of stored entries, including expired ones not yet read or swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;

    fn cache_with_clock() -> (TtlCache<String>, ManualClock) {
        let clock = ManualClock::new();
        let cache = TtlCache::with_clock("test", Arc::new(clock.clone()));
        (cache, clock)
    }

    #[test]
    fn writes_periodically_sweep_keys_that_are_never_read_again() {
        let (cache, clock) = cache_with_clock();
        cache.set("one-off query", "v".to_string(), Duration::from_secs(1));
        clock.advance(Duration::from_secs(2));

        for index in 1..SWEEP_EVERY_WRITES - 1 {
            cache.set(format!("fresh-{index}"), "v".to_string(), Duration::from_secs(60));
        }
        assert_eq!(cache.len(), SWEEP_EVERY_WRITES - 1);

        cache.set("last", "v".to_string(), Duration::from_secs(60));
        assert_eq!(cache.len(), SWEEP_EVERY_WRITES - 1);
        assert!(cache.get("last").is_some());
    }

    #[test]
    fn sweep_keeps_fresh_entries() {
        let (cache, clock) = cache_with_clock();
        cache.set("short", "v".to_string(), Duration::from_secs(1));
        cache.set("long", "v".to_string(), Duration::from_secs(60));
        clock.advance(Duration::from_secs(5));

        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("long").is_some());
    }

    #[test]
    fn returns_value_within_ttl() {
        let (cache, clock) = cache_with_clock();
        cache.set("k", "v".to_string(), Duration::from_secs(60));

        clock.advance(Duration::from_secs(60));
        assert_eq!(cache.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn expired_entries_are_absent_and_evicted() {
        let (cache, clock) = cache_with_clock();
        cache.set("k", "v".to_string(), Duration::from_secs(60));

        clock.advance(Duration::from_secs(61));
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn set_overwrites_and_restarts_ttl() {
        let (cache, clock) = cache_with_clock();
        cache.set("k", "old".to_string(), Duration::from_secs(10));
        clock.advance(Duration::from_secs(8));

        cache.set("k", "new".to_string(), Duration::from_secs(10));
        clock.advance(Duration::from_secs(8));

        assert_eq!(cache.get("k").as_deref(), Some("new"));
    }

    #[test]
    fn clear_single_key_and_everything() {
        let (cache, _) = cache_with_clock();
        cache.set("a", "1".to_string(), Duration::from_secs(60));
        cache.set("b", "2".to_string(), Duration::from_secs(60));
        cache.set("c", "3".to_string(), Duration::from_secs(60));

        assert_eq!(cache.clear(Some("a")), 1);
        assert_eq!(cache.clear(Some("a")), 0);
        assert!(cache.get("a").is_none());

        assert_eq!(cache.clear(None), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn missing_key_is_a_miss() {
        let (cache, _) = cache_with_clock();
        assert!(cache.get("absent").is_none());
    }
}
