//! StashCache: bounded write-back cache in front of a durable store
//!
//! Writes land in memory when there is room and reach the store only when
//! the entry is evicted. There is no automatic eviction: callers decide
//! when an entry leaves the cache.
//!
//! Locking:
//! - `get` holds the read lock for the table lookup only; store reads run
//!   unlocked.
//! - `set` holds the write lock for the whole call, including the
//!   write-through when admission is declined. A slow synchronous store
//!   write blocks every other table operation for its duration.
//! - `evict` removes under the write lock and writes back after releasing
//!   it. A `set` for the same key may land while the old value is still
//!   being persisted; per-key linearizability needs outside coordination.
//! - `prefetch` takes short per-key locks around table checks and inserts;
//!   store reads run unlocked.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use ahash::RandomState;
use parking_lot::RwLock;
use stashdb::{Durability, Error, Result, StashStore};
use tracing::{debug, error, warn};

use crate::backend::DurableStore;
use crate::entry::{CacheEntry, EntryInfo};
use crate::error::{OpenError, PrefetchError};
use crate::stats::CacheStats;

/// Store directory used by [`StashCache::open_default`]
pub const DEFAULT_STORE_PATH: &str = "demo";

type Table = HashMap<Vec<u8>, CacheEntry, RandomState>;

/// Write-back cache layer over a [`DurableStore`]
pub struct StashCache<S = StashStore> {
    /// Underlying persistent storage
    store: S,

    /// Resident entries, keyed by exact key bytes
    table: RwLock<Table>,

    /// Mirror of `table.len()`, updated inside write critical sections
    resident: AtomicUsize,

    /// Cache statistics
    stats: CacheStats,

    /// Maximum number of resident entries
    capacity: usize,
}

impl StashCache<StashStore> {
    /// Open a [`StashStore`] at `path` and wrap it in a cache
    ///
    /// # Arguments
    /// * `path` - Store directory path
    /// * `capacity` - Maximum number of resident entries
    pub fn open<P: AsRef<Path>>(
        path: P,
        capacity: usize,
    ) -> std::result::Result<Self, OpenError> {
        if capacity == 0 {
            return Err(OpenError::InvalidCapacity);
        }

        let path = path.as_ref();
        let store = StashStore::open(path).map_err(|e| {
            error!(path = %path.display(), error = %e, "failed to open durable store");
            OpenError::Store(e)
        })?;

        Self::with_store(store, capacity)
    }

    /// Open the store at [`DEFAULT_STORE_PATH`]
    pub fn open_default(capacity: usize) -> std::result::Result<Self, OpenError> {
        Self::open(DEFAULT_STORE_PATH, capacity)
    }
}

impl<S: DurableStore> StashCache<S> {
    /// Wrap an already-open store
    ///
    /// # Arguments
    /// * `store` - Durable store handle
    /// * `capacity` - Maximum number of resident entries, must be positive
    pub fn with_store(store: S, capacity: usize) -> std::result::Result<Self, OpenError> {
        if capacity == 0 {
            return Err(OpenError::InvalidCapacity);
        }

        Ok(Self {
            store,
            table: RwLock::new(HashMap::with_capacity_and_hasher(
                capacity,
                RandomState::new(),
            )),
            resident: AtomicUsize::new(0),
            stats: CacheStats::new(),
            capacity,
        })
    }

    /// Get a value from the cache, falling back to the store
    ///
    /// A miss never admits the key. Store absence is `Ok(None)`.
    ///
    /// # Returns
    /// * `Result<Option<Vec<u8>>>` - Owned copy of the value, if any
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        {
            let table = self.table.read();
            if let Some(entry) = table.get(key) {
                self.stats.record_hit();
                return Ok(Some(entry.value().to_vec()));
            }
        }

        self.stats.record_miss();
        match self.store.get(key) {
            Ok(value) => Ok(Some(value)),
            Err(Error::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write a value
    ///
    /// A resident key is updated in place whatever `add_to_cache` says.
    /// Otherwise the pair is admitted when `add_to_cache` is set and there is
    /// free capacity, or else written synchronously to the store.
    ///
    /// # Returns
    /// * `Result<bool>` - `true` if the value is now resident, `false` if it
    ///   went straight to the store
    pub fn set(&self, key: &[u8], value: &[u8], add_to_cache: bool) -> Result<bool> {
        let mut table = self.table.write();

        if let Some(entry) = table.get_mut(key) {
            entry.update(value.to_vec());
            self.stats.record_hit();
            return Ok(true);
        }

        self.stats.record_miss();
        if add_to_cache && table.len() < self.capacity {
            table.insert(key.to_vec(), CacheEntry::new(value.to_vec()));
            self.resident.store(table.len(), Ordering::Release);
            self.stats.record_addition();
            return Ok(true);
        }

        // Write lock stays held across the store write
        self.store.set(key, value, Durability::Sync)?;
        drop(table);

        Ok(false)
    }

    /// Remove a resident entry and write its value to the store
    ///
    /// The entry leaves the table before the write-back. If the write-back
    /// fails the value is neither resident nor durable; the error is returned
    /// so the caller can retry or re-insert.
    ///
    /// # Returns
    /// * `Result<bool>` - `false` if the key was not resident
    pub fn evict(&self, key: &[u8]) -> Result<bool> {
        let entry = {
            let mut table = self.table.write();
            match table.remove(key) {
                Some(entry) => {
                    self.resident.store(table.len(), Ordering::Release);
                    entry
                }
                None => return Ok(false),
            }
        };

        let value = entry.into_value();
        if let Err(e) = self.store.set(key, &value, Durability::Sync) {
            warn!(
                key_len = key.len(),
                value_len = value.len(),
                error = %e,
                "write-back failed for evicted entry"
            );
            return Err(e);
        }

        self.stats.record_eviction();
        Ok(true)
    }

    /// Warm the cache from the store without evicting anything
    ///
    /// Duplicate keys are handled once, in first-occurrence order. A key
    /// counts as a success if it is resident when checked or gets admitted.
    /// Keys missing from the store, or found when the table is full, are
    /// skipped. The first real store error stops the prefetch; keys admitted
    /// before it stay resident.
    ///
    /// # Returns
    /// * `Result<usize, PrefetchError>` - Number of successful keys
    pub fn prefetch<I, K>(&self, keys: I) -> std::result::Result<usize, PrefetchError>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let keys: Vec<K> = keys.into_iter().collect();
        let mut seen = HashSet::with_capacity_and_hasher(keys.len(), RandomState::new());
        let distinct: Vec<&[u8]> = keys
            .iter()
            .map(|key| key.as_ref())
            .filter(|key| seen.insert(*key))
            .collect();

        let mut prefetched = 0;
        for &key in &distinct {
            if self.table.read().contains_key(key) {
                prefetched += 1;
                continue;
            }

            let value = match self.store.get(key) {
                Ok(value) => value,
                Err(Error::NotFound) => continue,
                Err(source) => return Err(PrefetchError { prefetched, source }),
            };

            let mut table = self.table.write();
            if table.contains_key(key) {
                // Raced with another writer
                prefetched += 1;
                continue;
            }
            if table.len() >= self.capacity {
                continue;
            }

            table.insert(key.to_vec(), CacheEntry::new(value));
            self.resident.store(table.len(), Ordering::Release);
            self.stats.record_prefetch();
            prefetched += 1;
        }

        debug!(
            requested = keys.len(),
            distinct = distinct.len(),
            prefetched,
            "prefetch complete"
        );
        Ok(prefetched)
    }

    /// Evict every resident entry, writing each back to the store
    ///
    /// Stops at the first failed write-back.
    ///
    /// # Returns
    /// * `Result<usize>` - Number of entries written back
    pub fn flush(&self) -> Result<usize> {
        let keys: Vec<Vec<u8>> = self.table.read().keys().cloned().collect();

        let mut flushed = 0;
        for key in keys {
            if self.evict(&key)? {
                flushed += 1;
            }
        }

        debug!(flushed, "flushed resident entries");
        Ok(flushed)
    }

    /// Free slots left in the table.
    ///
    /// Lock-free and advisory: it may be stale by the time the caller acts on
    /// it, so it is not a reservation.
    pub fn remaining_capacity(&self) -> usize {
        self.capacity.saturating_sub(self.resident.load(Ordering::Acquire))
    }

    /// Check whether a key is resident
    pub fn contains(&self, key: &[u8]) -> bool {
        self.table.read().contains_key(key)
    }

    /// Metadata for a resident key
    pub fn entry_info(&self, key: &[u8]) -> Option<EntryInfo> {
        self.table.read().get(key).map(CacheEntry::info)
    }

    /// Number of resident entries
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    /// Check if no entries are resident
    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }

    /// Get cache capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Get the underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Close the underlying store
    ///
    /// Resident entries are not written back; call [`flush`](Self::flush)
    /// first to persist them.
    pub fn close(self) -> Result<()> {
        let unflushed = self.table.read().len();
        if unflushed > 0 {
            warn!(unflushed, "closing cache with resident entries that were never written back");
        }
        self.store.close()
    }
}
