//! Sharded Cache Module
//!
//! Spreads keys across independent [`LruCache`] buckets by CRC-32 of the
//! key. Each bucket has its own lock, so contention is limited to keys that
//! land in the same bucket.
//!
//! Aggregate operations (`len`, `capacity`, `clear`, `expire*`, `stats`)
//! visit the buckets one at a time and are not atomic across buckets.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::cache::entry::current_time;
use crate::cache::{CacheStats, LruCache};
use crate::config::Config;
use crate::error::{CacheError, Result};

// == Multi LRU Cache ==
/// Fixed number of equally sized [`LruCache`] buckets.
#[derive(Debug)]
pub struct MultiLruCache<V> {
    buckets: Vec<LruCache<V>>,
}

impl<V> MultiLruCache<V> {
    // == Constructor ==
    /// Creates `buckets` caches of `bucket_capacity` entries each.
    ///
    /// # Errors
    /// Returns [`CacheError::InvalidConfig`] if `buckets` is zero.
    pub fn new(buckets: usize, bucket_capacity: usize) -> Result<Self> {
        if buckets == 0 {
            return Err(CacheError::InvalidConfig(
                "bucket count must be non-zero".to_string(),
            ));
        }

        debug!(buckets, bucket_capacity, "creating sharded lru cache");
        Ok(Self {
            buckets: (0..buckets).map(|_| LruCache::new(bucket_capacity)).collect(),
        })
    }

    /// Creates a sharded cache sized by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        Self::new(config.buckets, config.bucket_capacity)
    }

    /// Number of buckets.
    pub fn buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Index of the bucket responsible for `key`.
    pub fn bucket_for(&self, key: &str) -> usize {
        crc32fast::hash(key.as_bytes()) as usize % self.buckets.len()
    }

    fn bucket(&self, key: &str) -> &LruCache<V> {
        &self.buckets[self.bucket_for(key)]
    }

    // == Set ==
    /// See [`LruCache::set`].
    pub fn set(&self, key: impl Into<String>, value: V, expires_at: Option<DateTime<Utc>>) {
        let key = key.into();
        self.bucket(&key).set(key, value, expires_at);
    }

    /// See [`LruCache::set_at`].
    pub fn set_at(
        &self,
        key: impl Into<String>,
        value: V,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) {
        let key = key.into();
        self.bucket(&key).set_at(key, value, expires_at, now);
    }

    // == Delete ==
    /// See [`LruCache::delete`].
    pub fn delete(&self, key: &str) -> Option<V> {
        self.bucket(key).delete(key)
    }

    // == Aggregates ==
    /// Evicts every entry in every bucket.
    pub fn clear(&self) -> usize {
        self.buckets.iter().map(LruCache::clear).sum()
    }

    /// Evicts entries that expired before the current time.
    ///
    /// The clock is read once, so every bucket uses the same reference time.
    pub fn expire(&self) -> usize {
        self.expire_at(current_time())
    }

    /// Evicts entries that expired before `now` in every bucket.
    pub fn expire_at(&self, now: DateTime<Utc>) -> usize {
        self.buckets.iter().map(|b| b.expire_at(now)).sum()
    }

    /// Entries in use across all buckets.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(LruCache::len).sum()
    }

    /// Returns true if no bucket holds an entry.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(LruCache::is_empty)
    }

    /// Total slot count across all buckets.
    pub fn capacity(&self) -> usize {
        self.buckets.iter().map(LruCache::capacity).sum()
    }

    /// Sum of every bucket's statistics.
    pub fn stats(&self) -> CacheStats {
        let mut total = CacheStats::new();
        for bucket in &self.buckets {
            total += &bucket.stats();
        }
        total
    }

    /// Asserts the invariants of every bucket. O(total capacity)
    #[doc(hidden)]
    pub fn debug_validate_invariants(&self) {
        for bucket in &self.buckets {
            bucket.debug_validate_invariants();
        }
    }
}

impl<V: Clone> MultiLruCache<V> {
    // == Get ==
    /// See [`LruCache::get`].
    pub fn get(&self, key: &str) -> Option<V> {
        self.bucket(key).get(key)
    }

    /// See [`LruCache::get_quiet`].
    pub fn get_quiet(&self, key: &str) -> Option<V> {
        self.bucket(key).get_quiet(key)
    }

    /// See [`LruCache::get_not_stale`].
    pub fn get_not_stale(&self, key: &str) -> Option<V> {
        self.bucket(key).get_not_stale(key)
    }

    /// See [`LruCache::get_not_stale_at`].
    pub fn get_not_stale_at(&self, key: &str, now: DateTime<Utc>) -> Option<V> {
        self.bucket(key).get_not_stale_at(key, now)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn test_multi_zero_buckets_rejected() {
        let result: Result<MultiLruCache<u8>> = MultiLruCache::new(0, 10);
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));

        let config = Config {
            buckets: 0,
            bucket_capacity: 10,
        };
        assert!(MultiLruCache::<u8>::from_config(&config).is_err());
    }

    #[test]
    fn test_multi_capacity_is_product() {
        let cache: MultiLruCache<u8> = MultiLruCache::new(4, 8).unwrap();
        assert_eq!(cache.buckets(), 4);
        assert_eq!(cache.capacity(), 32);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_multi_bucket_selection_is_crc32() {
        let cache: MultiLruCache<u8> = MultiLruCache::new(7, 1).unwrap();

        for key in ["", "a", "user:123", "some longer key"] {
            let expected = crc32fast::hash(key.as_bytes()) as usize % 7;
            assert_eq!(cache.bucket_for(key), expected);
            assert_eq!(cache.bucket_for(key), cache.bucket_for(key));
        }
    }

    #[test]
    fn test_multi_set_get_delete() {
        let cache = MultiLruCache::new(4, 4).unwrap();

        cache.set("a", 1, None);
        cache.set("b", 2, Some(at(10)));

        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get_quiet("b"), Some(2));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.delete("a"), Some(1));
        assert_eq!(cache.get("a"), None);
        cache.debug_validate_invariants();
    }

    #[test]
    fn test_multi_get_quiet_does_not_touch() {
        let cache = MultiLruCache::new(1, 2).unwrap();

        cache.set("a", 1, None);
        cache.set("b", 2, None);
        assert_eq!(cache.get_quiet("a"), Some(1));
        cache.set("c", 3, None);

        assert_eq!(cache.get_quiet("a"), None);
        assert_eq!(cache.get_quiet("b"), Some(2));
    }

    #[test]
    fn test_multi_expire_and_stale_reads() {
        let cache = MultiLruCache::new(3, 12).unwrap();

        for i in 0..6 {
            cache.set_at(format!("exp{}", i), i, Some(at(i)), at(0));
            cache.set_at(format!("keep{}", i), i, None, at(0));
        }

        assert_eq!(cache.get_not_stale_at("exp5", at(6)), None);
        assert_eq!(cache.get_not_stale_at("exp4", at(4)), Some(4));
        assert_eq!(cache.expire_at(at(3)), 3);
        assert_eq!(cache.len(), 8);
        assert_eq!(cache.stats().expirations, 4);
        cache.debug_validate_invariants();
    }

    #[test]
    fn test_multi_clear() {
        let cache = MultiLruCache::new(4, 2).unwrap();
        for i in 0..20 {
            cache.set(format!("k{}", i), i, None);
        }

        let len = cache.len();
        assert!(len <= 8);
        assert_eq!(cache.clear(), len);
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), 8);
    }

    #[test]
    fn test_multi_from_config() {
        let config = Config {
            buckets: 3,
            bucket_capacity: 5,
        };
        let cache: MultiLruCache<u8> = MultiLruCache::from_config(&config).unwrap();
        assert_eq!(cache.capacity(), config.total_capacity());
    }
}
