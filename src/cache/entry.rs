//! Cache Entry Module
//!
//! Defines the fixed-size entry record and the arena that holds every
//! record a cache will ever use.

use chrono::{DateTime, Utc};

use crate::cache::heap::HeapSlot;
use crate::cache::list::{Linked, Links};

// == Cache Entry ==
/// One slot of the arena.
///
/// A slot is either free (linked on the free list, key and value cleared)
/// or in use (linked on the LRU list, present in the table, and present in
/// the expiration heap iff `expires_at` is set).
#[derive(Debug)]
pub(crate) struct Entry<V> {
    /// Key this slot is stored under; empty while free
    pub key: String,
    /// The stored value; `None` while free
    pub value: Option<V>,
    /// Expiration time, `None` = never expires
    pub expires_at: Option<DateTime<Utc>>,
    /// Position in the expiration heap, `None` = not in the heap
    pub heap_index: Option<usize>,
    /// Intrusive list links
    pub links: Links,
}

impl<V> Entry<V> {
    // == Constructor ==
    /// Creates an unlinked, cleared slot.
    pub fn vacant() -> Self {
        Self {
            key: String::new(),
            value: None,
            expires_at: None,
            heap_index: None,
            links: Links::default(),
        }
    }

    // == Is Stale ==
    /// Checks whether the entry expired strictly before `now`.
    ///
    /// An entry without an expiration is never stale.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires) => expires < now,
            None => false,
        }
    }

    // == Fill ==
    /// Assigns key, value and expiration to a cleared slot.
    ///
    /// The slot takes ownership of `key`; nothing is copied.
    pub fn fill(&mut self, key: String, value: V, expires_at: Option<DateTime<Utc>>) {
        self.key = key;
        self.value = Some(value);
        self.expires_at = expires_at;
    }

    // == Clear ==
    /// Resets the slot and hands back its value. The key is dropped.
    pub fn clear(&mut self) -> Option<V> {
        self.key = String::new();
        self.expires_at = None;
        self.value.take()
    }
}

impl<V> Linked for Entry<V> {
    fn links(&self) -> &Links {
        &self.links
    }

    fn links_mut(&mut self) -> &mut Links {
        &mut self.links
    }
}

impl<V> HeapSlot for Entry<V> {
    fn deadline(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    fn heap_index(&self) -> Option<usize> {
        self.heap_index
    }

    fn set_heap_index(&mut self, index: Option<usize>) {
        self.heap_index = index;
    }
}

// == Arena ==
/// Reserves `capacity` cleared slots in one contiguous block.
///
/// This is the only allocation of entry storage a cache ever performs.
pub(crate) fn arena<V>(capacity: usize) -> Vec<Entry<V>> {
    let mut entries = Vec::with_capacity(capacity);
    entries.resize_with(capacity, Entry::vacant);
    entries
}

// == Utility Functions ==
/// Returns the current wall-clock time.
pub fn current_time() -> DateTime<Utc> {
    Utc::now()
}
