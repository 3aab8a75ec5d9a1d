//! Cache Module
//!
//! Provides a fixed-capacity cache with LRU eviction and optional per-entry
//! expiration, plus a sharded wrapper over independent buckets.

mod entry;
mod heap;
mod list;
mod multi;
mod stats;
mod store;


// Re-export public types
pub use entry::current_time;
pub use multi::MultiLruCache;
pub use stats::CacheStats;
pub use store::LruCache;
