//! Cache Store Module
//!
//! Single-bucket cache engine. Every entry lives in one pre-allocated arena
//! and is linked into three structures at once:
//! - `table` maps a key to its slot, hashing the key stored in the slot,
//! - `lru` orders slots in use by recency (front = most recent),
//! - `heap` orders slots that carry an expiration (root = soonest).
//!
//! Slots not in use sit on the `free` list. All four structures are guarded
//! by one mutex, held for the whole of every public operation.
//!
//! Lookups are O(1). Mutations are O(1) when no expiration is involved and
//! O(log n) when the expiration heap has to be updated. Once built, the
//! engine never allocates: each key is stored once, in the slot it was
//! handed to, and every structure is reserved up front.

use ahash::RandomState;
use chrono::{DateTime, Utc};
use hashbrown::HashTable;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::cache::entry::{arena, current_time, Entry};
use crate::cache::heap::ExpiryHeap;
use crate::cache::list::{IntrusiveList, ListKind};
use crate::cache::CacheStats;
use crate::config::Config;

// == Victim ==
/// Where a slot for a new key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Victim {
    /// Taken from the free list, nothing evicted
    Free,
    /// Evicted because it expired before the reference time
    Stale,
    /// Evicted because it was the least recently used
    Unpopular,
}

// == Inner State ==
/// Everything the lock protects.
#[derive(Debug)]
struct Inner<V> {
    entries: Vec<Entry<V>>,
    /// Slot indices, hashed and compared through `entries[slot].key`
    table: HashTable<usize>,
    hasher: RandomState,
    lru: IntrusiveList,
    free: IntrusiveList,
    heap: ExpiryHeap,
    stats: CacheStats,
}

impl<V> Inner<V> {
    fn new(capacity: usize) -> Self {
        let mut entries = arena(capacity);
        let mut free = IntrusiveList::new(ListKind::Free);
        for slot in 0..capacity {
            free.push_back(&mut entries, slot);
        }

        Self {
            entries,
            // Twice the slot count keeps tombstone cleanup an in-place rehash
            table: HashTable::with_capacity(capacity.saturating_mul(2)),
            hasher: RandomState::new(),
            lru: IntrusiveList::new(ListKind::Lru),
            free,
            heap: ExpiryHeap::with_capacity(capacity),
            stats: CacheStats::new(),
        }
    }

    fn capacity(&self) -> usize {
        self.lru.len() + self.free.len()
    }

    // == Table ==
    /// Slot holding `key`, if any.
    fn find(&self, key: &str) -> Option<usize> {
        let hash = self.hasher.hash_one(key);
        self.table
            .find(hash, |&slot| self.entries[slot].key == key)
            .copied()
    }

    fn table_insert(&mut self, slot: usize) {
        let hash = self.hasher.hash_one(self.entries[slot].key.as_str());
        let entries = &self.entries;
        let hasher = &self.hasher;
        self.table.insert_unique(hash, slot, |&other| {
            hasher.hash_one(entries[other].key.as_str())
        });
    }

    fn table_remove(&mut self, slot: usize) {
        let hash = self.hasher.hash_one(self.entries[slot].key.as_str());
        match self.table.find_entry(hash, |&other| other == slot) {
            Ok(entry) => {
                entry.remove();
            }
            Err(_) => panic!("slot {} is in use but missing from the table", slot),
        }
    }

    // == Expired Entry ==
    /// Slot at the heap root if it expired before `now`.
    ///
    /// The clock is read only when the heap is non-empty and no reference
    /// time was given.
    fn expired_entry(&self, now: Option<DateTime<Utc>>) -> Option<usize> {
        let slot = self.heap.peek()?;
        let now = now.unwrap_or_else(current_time);
        if self.entries[slot].is_stale(now) {
            Some(slot)
        } else {
            None
        }
    }

    // == Find Slot ==
    /// Picks a slot for a new key: free first, then stale, then least used.
    fn find_slot(&self, now: Option<DateTime<Utc>>) -> Option<(usize, Victim)> {
        if let Some(slot) = self.free.front() {
            return Some((slot, Victim::Free));
        }
        if let Some(slot) = self.expired_entry(now) {
            return Some((slot, Victim::Stale));
        }
        self.lru.back().map(|slot| (slot, Victim::Unpopular))
    }

    // == Remove Entry ==
    /// Moves an in-use slot to the front of the free list and clears it.
    fn remove_entry(&mut self, slot: usize) -> Option<V> {
        if !self.lru.owns(&self.entries, slot) {
            panic!("slot {} removed while not on the lru list", slot);
        }

        if self.entries[slot].heap_index.is_some() {
            self.heap.remove(&mut self.entries, slot);
        }
        self.table_remove(slot);
        self.lru.remove(&mut self.entries, slot);
        self.free.push_front(&mut self.entries, slot);
        self.entries[slot].clear()
    }

    // == Insert Entry ==
    /// Moves a filled free slot to the front of the lru list.
    fn insert_entry(&mut self, slot: usize) {
        if !self.free.owns(&self.entries, slot) {
            panic!("slot {} inserted while not on the free list", slot);
        }

        if self.entries[slot].expires_at.is_some() {
            self.heap.push(&mut self.entries, slot);
        }
        self.free.remove(&mut self.entries, slot);
        self.lru.push_front(&mut self.entries, slot);
        self.table_insert(slot);
    }

    fn touch_entry(&mut self, slot: usize) {
        self.lru.move_to_front(&mut self.entries, slot);
    }

    // == Set ==
    /// Returns the value displaced by the insert, if any, so the caller can
    /// drop it outside the lock.
    fn set(
        &mut self,
        key: String,
        value: V,
        expires_at: Option<DateTime<Utc>>,
        now: Option<DateTime<Utc>>,
    ) -> Option<V> {
        let (slot, displaced) = match self.find(&key) {
            Some(slot) => (slot, self.remove_entry(slot)),
            None => {
                let (slot, victim) = self.find_slot(now)?;
                let displaced = match victim {
                    Victim::Free => {
                        trace!(slot, "using free slot");
                        None
                    }
                    Victim::Stale => {
                        trace!(slot, key = %self.entries[slot].key, "evicting stale entry");
                        self.stats.record_eviction();
                        self.stats.record_expirations(1);
                        self.remove_entry(slot)
                    }
                    Victim::Unpopular => {
                        trace!(slot, key = %self.entries[slot].key, "evicting least recently used entry");
                        self.stats.record_eviction();
                        self.remove_entry(slot)
                    }
                };
                (slot, displaced)
            }
        };

        self.entries[slot].fill(key, value, expires_at);
        self.insert_entry(slot);
        displaced
    }

    fn lookup(&mut self, key: &str) -> Option<usize> {
        let slot = self.find(key);
        match slot {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        slot
    }

    // == Get Not Stale ==
    fn get_not_stale(&mut self, key: &str, now: DateTime<Utc>) -> Option<&V> {
        let slot = match self.find(key) {
            Some(slot) => slot,
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if self.entries[slot].is_stale(now) {
            trace!(slot, key, "evicting stale entry on read");
            self.remove_entry(slot);
            self.stats.record_miss();
            self.stats.record_expirations(1);
            return None;
        }

        self.stats.record_hit();
        self.touch_entry(slot);
        self.entries[slot].value.as_ref()
    }

    // == Clear ==
    fn clear(&mut self) -> usize {
        // Expiring entries first so each heap removal happens at the root
        let mut expiring = 0;
        while let Some(slot) = self.heap.peek() {
            self.remove_entry(slot);
            expiring += 1;
        }

        let mut rest = 0;
        while let Some(slot) = self.lru.back() {
            self.remove_entry(slot);
            rest += 1;
        }
        expiring + rest
    }

    // == Expire ==
    fn expire(&mut self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        while let Some(slot) = self.expired_entry(Some(now)) {
            self.remove_entry(slot);
            removed += 1;
        }
        self.stats.record_expirations(removed);
        removed
    }

    fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.entries = self.lru.len();
        stats.capacity = self.capacity();
        stats
    }

    fn debug_validate_invariants(&self) {
        self.lru.debug_validate_invariants(&self.entries);
        self.free.debug_validate_invariants(&self.entries);
        self.heap.debug_validate_invariants(&self.entries);

        assert_eq!(self.capacity(), self.entries.len(), "slots lost or duplicated");
        assert_eq!(self.table.len(), self.lru.len(), "table and lru list disagree");

        let mut expiring = 0;
        for slot in self.lru.iter(&self.entries) {
            let entry = &self.entries[slot];
            assert_eq!(
                self.find(&entry.key),
                Some(slot),
                "slot {} missing from table",
                slot
            );
            assert!(entry.value.is_some(), "slot {} in use without value", slot);
            assert_eq!(
                entry.heap_index.is_some(),
                entry.expires_at.is_some(),
                "slot {} heap membership",
                slot
            );
            if entry.expires_at.is_some() {
                expiring += 1;
            }
        }
        assert_eq!(expiring, self.heap.len(), "heap holds slots not in use");

        for slot in self.free.iter(&self.entries) {
            let entry = &self.entries[slot];
            assert!(entry.key.is_empty(), "free slot {} has a key", slot);
            assert!(entry.value.is_none(), "free slot {} has a value", slot);
            assert!(entry.heap_index.is_none(), "free slot {} in heap", slot);
        }
    }
}

// == Cache Store ==
/// Fixed-capacity cache with LRU eviction and optional per-entry expiration.
///
/// All memory for entries is reserved by [`LruCache::new`]. Values are
/// handed out by clone, so wrap large payloads in `Arc`.
///
/// # Example
/// ```
/// use chrono::{Duration, Utc};
/// use lrucache::LruCache;
///
/// let cache = LruCache::new(2);
/// let now = Utc::now();
///
/// cache.set("a", 1, None);
/// cache.set_at("b", 2, Some(now + Duration::seconds(30)), now);
///
/// assert_eq!(cache.get("a"), Some(1));
/// assert_eq!(cache.get_not_stale_at("b", now + Duration::seconds(60)), None);
/// assert_eq!(cache.len(), 1);
/// ```
#[derive(Debug)]
pub struct LruCache<V> {
    inner: Mutex<Inner<V>>,
}

impl<V> LruCache<V> {
    // == Constructor ==
    /// Creates a cache holding at most `capacity` entries. O(capacity)
    ///
    /// A zero capacity is valid: every insertion is then a no-op.
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "creating lru cache");
        Self {
            inner: Mutex::new(Inner::new(capacity)),
        }
    }

    /// Creates a single bucket sized by `config.bucket_capacity`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.bucket_capacity)
    }

    // == Set ==
    /// Inserts or overwrites `key`. `expires_at` of `None` never expires.
    ///
    /// An owned `String` key is stored as is; a `&str` is copied into a new
    /// `String` first. A value displaced by the insert is dropped after the
    /// lock is released.
    ///
    /// Overwriting always makes the entry the most recently used. When the
    /// cache is full, an expired entry is evicted in preference to the least
    /// recently used one. The clock is read only if that check is needed.
    pub fn set(&self, key: impl Into<String>, value: V, expires_at: Option<DateTime<Utc>>) {
        let displaced = self.inner.lock().set(key.into(), value, expires_at, None);
        drop(displaced);
    }

    /// Like [`set`](Self::set) with an explicit reference time for the
    /// staleness check.
    pub fn set_at(
        &self,
        key: impl Into<String>,
        value: V,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) {
        let displaced = self
            .inner
            .lock()
            .set(key.into(), value, expires_at, Some(now));
        drop(displaced);
    }

    // == Delete ==
    /// Removes `key` and returns its value. O(log n) if it had an expiration.
    pub fn delete(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock();
        let slot = inner.find(key)?;
        inner.remove_entry(slot)
    }

    // == Clear ==
    /// Evicts every entry and returns how many were removed. O(n log n)
    ///
    /// Evicted values are dropped while the lock is held.
    pub fn clear(&self) -> usize {
        let removed = self.inner.lock().clear();
        if removed > 0 {
            debug!(removed, "cleared lru cache");
        }
        removed
    }

    // == Expire ==
    /// Evicts entries that expired before the current time.
    pub fn expire(&self) -> usize {
        self.expire_at(current_time())
    }

    /// Evicts entries that expired before `now`. O(k log n)
    ///
    /// Evicted values are dropped while the lock is held.
    pub fn expire_at(&self, now: DateTime<Utc>) -> usize {
        let removed = self.inner.lock().expire(now);
        if removed > 0 {
            debug!(removed, "expired stale entries");
        }
        removed
    }

    // == Length ==
    /// Number of entries in use.
    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    /// Returns true if no entry is in use.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // == Capacity ==
    /// Total slot count, fixed at construction.
    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity()
    }

    // == Stats ==
    /// Returns a snapshot of the cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats()
    }

    /// Asserts every structural invariant; panics on the first violation.
    /// O(capacity)
    #[doc(hidden)]
    pub fn debug_validate_invariants(&self) {
        self.inner.lock().debug_validate_invariants();
    }
}

impl<V: Clone> LruCache<V> {
    // == Get ==
    /// Returns the value for `key`, possibly stale, and marks it most
    /// recently used. O(1)
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock();
        let slot = inner.lookup(key)?;
        inner.touch_entry(slot);
        inner.entries[slot].value.clone()
    }

    /// Returns the value for `key`, possibly stale, without touching its
    /// recency. O(1)
    pub fn get_quiet(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock();
        let slot = inner.lookup(key)?;
        inner.entries[slot].value.clone()
    }

    // == Get Not Stale ==
    /// Returns the value for `key` unless it expired before the current
    /// time. A stale entry is evicted.
    pub fn get_not_stale(&self, key: &str) -> Option<V> {
        self.get_not_stale_at(key, current_time())
    }

    /// Returns the value for `key` unless it expired before `now`, marking
    /// it most recently used. A stale entry is evicted. O(log n) on that
    /// path, O(1) otherwise.
    pub fn get_not_stale_at(&self, key: &str, now: DateTime<Utc>) -> Option<V> {
        self.inner.lock().get_not_stale(key, now).cloned()
    }
}
