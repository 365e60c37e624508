use std::sync::Arc;

use stashcache::{OpenError, StashCache};
use stashdb::{Durability, StashStore};
use tempfile::TempDir;

fn shared_store(dir: &TempDir) -> Arc<StashStore> {
    Arc::new(StashStore::open(dir.path()).unwrap())
}

#[test]
fn test_unknown_key_is_a_single_miss() {
    let dir = TempDir::new().unwrap();
    let cache = StashCache::open(dir.path(), 8).unwrap();

    assert_eq!(cache.get(b"never-set").unwrap(), None);
    assert_eq!(cache.stats().misses(), 1);
    assert_eq!(cache.stats().hits(), 0);
    assert_eq!(cache.stats().accesses(), 1);
}

#[test]
fn test_set_then_get_from_either_tier() {
    let dir = TempDir::new().unwrap();
    let cache = StashCache::open(dir.path(), 1).unwrap();

    assert!(cache.set(b"resident", b"in memory", true).unwrap());
    assert!(!cache.set(b"overflow", b"in store", true).unwrap());

    assert_eq!(cache.get(b"resident").unwrap(), Some(b"in memory".to_vec()));
    assert_eq!(cache.get(b"overflow").unwrap(), Some(b"in store".to_vec()));
}

#[test]
fn test_eviction_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = shared_store(&dir);
    let cache = StashCache::with_store(Arc::clone(&store), 4).unwrap();

    cache.set(b"K", b"V", true).unwrap();
    assert!(!store.contains(b"K"));

    assert!(cache.evict(b"K").unwrap());
    assert!(!cache.evict(b"K").unwrap());

    assert!(!cache.contains(b"K"));
    assert_eq!(store.get(b"K").unwrap(), b"V");
    assert_eq!(cache.get(b"K").unwrap(), Some(b"V".to_vec()));
}

#[test]
fn test_resident_value_shadows_stale_store_value() {
    let dir = TempDir::new().unwrap();
    let store = shared_store(&dir);
    store.set(b"K", b"old", Durability::Sync).unwrap();

    let cache = StashCache::with_store(Arc::clone(&store), 4).unwrap();
    cache.prefetch([b"K"]).unwrap();
    cache.set(b"K", b"new", false).unwrap();

    assert_eq!(cache.get(b"K").unwrap(), Some(b"new".to_vec()));
    assert_eq!(store.get(b"K").unwrap(), b"old");

    cache.evict(b"K").unwrap();
    assert_eq!(store.get(b"K").unwrap(), b"new");
}

#[test]
fn test_capacity_two_scenario() {
    let dir = TempDir::new().unwrap();
    let store = shared_store(&dir);
    let cache = StashCache::with_store(Arc::clone(&store), 2).unwrap();

    assert_eq!(cache.remaining_capacity(), 2);
    assert!(cache.set(b"A", b"1", true).unwrap());
    assert_eq!(cache.remaining_capacity(), 1);
    assert!(cache.set(b"B", b"2", true).unwrap());
    assert_eq!(cache.remaining_capacity(), 0);

    assert!(!cache.set(b"C", b"3", true).unwrap());
    assert!(!cache.contains(b"C"));
    assert_eq!(store.get(b"C").unwrap(), b"3");
    assert_eq!(cache.get(b"C").unwrap(), Some(b"3".to_vec()));
}

#[test]
fn test_prefetch_counts_duplicates_once() {
    let dir = TempDir::new().unwrap();
    let store = shared_store(&dir);
    store.set(b"K2", b"two", Durability::Sync).unwrap();

    let cache = StashCache::with_store(Arc::clone(&store), 4).unwrap();
    cache.set(b"K1", b"one", true).unwrap();

    let count = cache.prefetch([&b"K1"[..], b"K1", b"K2"]).unwrap();

    assert_eq!(count, 2);
    assert!(cache.contains(b"K2"));
    assert_eq!(cache.stats().prefetches(), 1);
}

#[test]
fn test_prefetch_into_full_cache_is_non_evicting() {
    let dir = TempDir::new().unwrap();
    let store = shared_store(&dir);
    for key in [&b"s1"[..], b"s2", b"s3"] {
        store.set(key, b"stored", Durability::Sync).unwrap();
    }

    let cache = StashCache::with_store(Arc::clone(&store), 2).unwrap();
    cache.set(b"r1", b"a", true).unwrap();
    cache.set(b"r2", b"b", true).unwrap();

    let count = cache.prefetch([&b"s1"[..], b"s2", b"s3"]).unwrap();

    assert_eq!(count, 0);
    assert_eq!(cache.len(), 2);
    assert!(cache.contains(b"r1"));
    assert!(cache.contains(b"r2"));
    assert_eq!(cache.stats().evictions(), 0);
}

#[test]
fn test_prefetch_after_close_reports_partial_error() {
    let dir = TempDir::new().unwrap();
    let store = shared_store(&dir);
    store.set(b"x", b"1", Durability::Sync).unwrap();

    let cache = StashCache::with_store(Arc::clone(&store), 4).unwrap();
    cache.set(b"r", b"resident", true).unwrap();
    store.close().unwrap();

    let err = cache.prefetch([&b"r"[..], b"x"]).unwrap_err();
    assert_eq!(err.prefetched, 1);
    assert!(matches!(err.source, stashdb::Error::Closed));
}

#[test]
fn test_flush_then_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let cache = StashCache::open(dir.path(), 16).unwrap();
        for i in 0..10u8 {
            cache.set(&[i], &[i; 4], true).unwrap();
        }
        assert_eq!(cache.flush().unwrap(), 10);
        assert_eq!(cache.stats().evictions(), 10);
        cache.close().unwrap();
    }

    let cache = StashCache::open(dir.path(), 16).unwrap();
    assert!(cache.is_empty());
    assert_eq!(cache.prefetch((0..10u8).map(|i| [i])).unwrap(), 10);
    assert_eq!(cache.get(&[7]).unwrap(), Some(vec![7; 4]));
}

#[test]
fn test_unflushed_entries_are_not_persisted() {
    let dir = TempDir::new().unwrap();

    {
        let cache = StashCache::open(dir.path(), 16).unwrap();
        cache.set(b"volatile", b"lost", true).unwrap();
        cache.close().unwrap();
    }

    let cache = StashCache::open(dir.path(), 16).unwrap();
    assert_eq!(cache.get(b"volatile").unwrap(), None);
}

#[test]
fn test_zero_capacity_is_an_open_error() {
    let dir = TempDir::new().unwrap();

    let result = StashCache::open(dir.path(), 0);
    assert!(matches!(result, Err(OpenError::InvalidCapacity)));
}
