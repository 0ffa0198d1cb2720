// Lookup caches for rarely-changing remote objects
// An injectable port plus a time-expiring implementation

//! # Cache Port
//!
//! Policies and Policy Types are read far more often than they change, so the
//! [`RemoteStore`](super::store::RemoteStore) keeps them in a read-through cache:
//!
//! - lookups consult the cache first and fill it on a miss
//! - creates and updates overwrite the cached value
//! - deletes invalidate it
//!
//! Keys are `(project id, remote id)` so tenants never see each other's objects.
//! The cache is an explicit value passed to the store, never ambient global state.
//!
//! ## Rust Learning Notes:
//!
//! ### DashMap
//! `DashMap` is a concurrent hash map with sharded internal locks. It allows
//! `&self` inserts from many tasks at once without wrapping it in a `RwLock`.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// Get / set / invalidate by `(project id, remote id)`
pub trait CachePort<V>: Send + Sync {
    fn get(&self, project_id: &str, id: i64) -> Option<V>;
    fn set(&self, project_id: &str, id: i64, value: V);
    fn invalidate(&self, project_id: &str, id: i64);
}

/// Cache whose entries expire a fixed time after they were written
pub struct TtlCache<V> {
    entries: DashMap<(String, i64), (V, DateTime<Utc>)>,
    ttl: Duration,
}

impl<V: Clone + Send + Sync> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn with_seconds(seconds: i64) -> Self {
        Self::new(Duration::seconds(seconds))
    }

    /// Number of entries held, expired or not
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Clone + Send + Sync> CachePort<V> for TtlCache<V> {
    fn get(&self, project_id: &str, id: i64) -> Option<V> {
        let key = (project_id.to_string(), id);
        let expired = match self.entries.get(&key) {
            Some(entry) => {
                let (value, expires_at) = entry.value();
                if Utc::now() < *expires_at {
                    return Some(value.clone());
                }
                true
            }
            None => false,
        };
        if expired {
            self.entries.remove(&key);
        }
        None
    }

    fn set(&self, project_id: &str, id: i64, value: V) {
        let expires_at = Utc::now() + self.ttl;
        self.entries
            .insert((project_id.to_string(), id), (value, expires_at));
    }

    fn invalidate(&self, project_id: &str, id: i64) {
        self.entries.remove(&(project_id.to_string(), id));
    }
}

/// Cache that never holds anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl<V> CachePort<V> for NoCache {
    fn get(&self, _project_id: &str, _id: i64) -> Option<V> {
        None
    }

    fn set(&self, _project_id: &str, _id: i64, _value: V) {}

    fn invalidate(&self, _project_id: &str, _id: i64) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_are_scoped_by_project() {
        let cache: TtlCache<String> = TtlCache::with_seconds(60);
        cache.set("a", 1, "first".to_string());
        assert_eq!(cache.get("a", 1), Some("first".to_string()));
        assert_eq!(cache.get("b", 1), None);

        cache.invalidate("a", 1);
        assert_eq!(cache.get("a", 1), None);
    }

    #[test]
    fn test_expired_entries_are_dropped() {
        let cache: TtlCache<u32> = TtlCache::new(Duration::seconds(-1));
        cache.set("a", 1, 7);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a", 1), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_no_cache_never_hits() {
        let cache = NoCache;
        CachePort::<u32>::set(&cache, "a", 1, 7);
        assert_eq!(CachePort::<u32>::get(&cache, "a", 1), None);
    }
}
