//! Allocation Tests
//!
//! Drives pre-built caches through every operation under the dhat heap
//! profiler and checks that no block is allocated. Keys are handed over as
//! owned `String`s built before measuring starts.
//!
//! dhat allows one profiler per process, so everything runs in one test.

#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use lrucache::{LruCache, MultiLruCache};

// == Helper Functions ==

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
}

/// Blocks allocated while `f` runs.
fn blocks_during(f: impl FnOnce()) -> u64 {
    let before = dhat::HeapStats::get().total_blocks;
    f();
    dhat::HeapStats::get().total_blocks - before
}

/// Owned keys to hand to `set`, and a copy of each for lookups.
fn keys(prefix: &str, n: usize) -> (Vec<String>, Vec<String>) {
    // Every key repeats once, so the second half overwrites
    let owned: Vec<String> = (0..n)
        .map(|i| format!("{}-{}", prefix, i % (n / 2)))
        .collect();
    let lookups = owned.clone();
    (owned, lookups)
}

fn drive_single(cache: &LruCache<u64>, owned: Vec<String>, lookups: &[String]) {
    let now = at(0);
    for (i, key) in owned.into_iter().enumerate() {
        let expires = (i % 2 == 0).then(|| now + Duration::seconds((i % 5) as i64 - 2));
        cache.set_at(key, i as u64, expires, now);
        cache.get(&lookups[i]);
        cache.get_quiet(&lookups[i / 2]);
        cache.get_not_stale_at(&lookups[i], now);
        if i % 3 == 0 {
            cache.delete(&lookups[i.saturating_sub(1)]);
        }
        if i % 10 == 0 {
            cache.expire_at(now);
        }
    }
}

fn drive_sharded(cache: &MultiLruCache<u64>, owned: Vec<String>, lookups: &[String]) {
    let now = at(0);
    for (i, key) in owned.into_iter().enumerate() {
        let expires = (i % 3 == 0).then(|| now + Duration::seconds((i % 7) as i64 - 3));
        cache.set_at(key, i as u64, expires, now);
        cache.get(&lookups[i]);
        cache.get_not_stale_at(&lookups[i / 3], now);
        if i % 4 == 0 {
            cache.delete(&lookups[i / 2]);
        }
        if i % 25 == 0 {
            cache.expire_at(now);
        }
    }
}

// == Tests ==

#[test]
fn test_operations_do_not_allocate_after_construction() {
    let _profiler = dhat::Profiler::builder().testing().build();

    // Single bucket. The first pass registers every log callsite.
    let cache: LruCache<u64> = LruCache::new(7);
    let (owned, lookups) = keys("warm", 1_000);
    drive_single(&cache, owned, &lookups);

    let (owned, lookups) = keys("key", 1_000);
    let blocks = blocks_during(|| drive_single(&cache, owned, &lookups));
    dhat::assert_eq!(blocks, 0);
    cache.debug_validate_invariants();

    // Clear and refill
    cache.clear();
    let owned: Vec<String> = (0..7).map(|i| format!("refill-{}", i)).collect();
    let blocks = blocks_during(|| {
        for (i, key) in owned.into_iter().enumerate() {
            cache.set_at(key, i as u64, Some(at(i as i64)), at(0));
        }
        cache.clear();
    });
    dhat::assert_eq!(blocks, 0);
    dhat::assert!(cache.is_empty());

    // Sharded
    let sharded: MultiLruCache<u64> = MultiLruCache::new(4, 5).unwrap();
    let (owned, lookups) = keys("warm", 2_000);
    drive_sharded(&sharded, owned, &lookups);

    let (owned, lookups) = keys("key", 2_000);
    let blocks = blocks_during(|| drive_sharded(&sharded, owned, &lookups));
    dhat::assert_eq!(blocks, 0);
    dhat::assert!(sharded.len() <= 20);
    sharded.debug_validate_invariants();
}
