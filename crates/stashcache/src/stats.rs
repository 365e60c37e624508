//! Cache statistics tracking

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Statistics for cache behaviour.
///
/// Every counter is an independent atomic, so values stay exact under
/// concurrent callers even when a counter is bumped outside the table lock.
/// They are advisory: nothing couples them to the table's actual contents.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    accesses: AtomicU64,
    evictions: AtomicU64,
    prefetches: AtomicU64,
    additions: AtomicU64,
}

/// Point-in-time copy of [`CacheStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Lookups or writes that found the key resident
    pub hits: u64,
    /// Lookups or writes that did not
    pub misses: u64,
    /// `hits + misses`
    pub accesses: u64,
    /// Entries written back and removed by eviction
    pub evictions: u64,
    /// Entries admitted by prefetch
    pub prefetches: u64,
    /// Entries admitted by set
    pub additions: u64,
}

impl CacheStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cache hit
    pub fn record_hit(&self) {
        self.accesses.fetch_add(1, Ordering::Relaxed);
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache miss
    pub fn record_miss(&self) {
        self.accesses.fetch_add(1, Ordering::Relaxed);
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an eviction
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an admission by prefetch
    pub fn record_prefetch(&self) {
        self.prefetches.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an admission by set
    pub fn record_addition(&self) {
        self.additions.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total hits
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get total misses
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Get total accesses
    pub fn accesses(&self) -> u64 {
        self.accesses.load(Ordering::Relaxed)
    }

    /// Get total evictions
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Get total prefetch admissions
    pub fn prefetches(&self) -> u64 {
        self.prefetches.load(Ordering::Relaxed)
    }

    /// Get total set admissions
    pub fn additions(&self) -> u64 {
        self.additions.load(Ordering::Relaxed)
    }

    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Copy all counters.
    ///
    /// Each counter is read independently; a snapshot taken during concurrent
    /// traffic may not satisfy `accesses == hits + misses` exactly.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits(),
            misses: self.misses(),
            accesses: self.accesses(),
            evictions: self.evictions(),
            prefetches: self.prefetches(),
            additions: self.additions(),
        }
    }
}
