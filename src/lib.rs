//! lrucache - A fixed-capacity in-process cache
//!
//! Combines exact LRU eviction with optional per-entry expiration. All entry
//! storage is reserved up front; lookups are O(1) and mutations O(log n)
//! only when an expiration is involved.

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheStats, LruCache, MultiLruCache};
pub use config::Config;
pub use error::{CacheError, Result};
