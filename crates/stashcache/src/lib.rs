//! # stashcache
//!
//! Bounded write-back cache in front of [`stashdb`].
//!
//! ## Architecture
//! - **Table**: AHash map of resident entries behind one `parking_lot` RwLock
//! - **Admission**: `set` admits only when asked to and a slot is free;
//!   otherwise it writes through synchronously
//! - **Write-back**: resident values reach the store when evicted
//! - **Prefetch**: fills free slots from the store, never evicts
//!
//! Eviction is caller-driven; there is no LRU/LFU/TTL reclamation.
//!
//! ```no_run
//! use stashcache::StashCache;
//!
//! let cache = StashCache::open("./data", 1024)?;
//! cache.set(b"user:1", b"alice", true)?;
//! assert_eq!(cache.get(b"user:1")?, Some(b"alice".to_vec()));
//! cache.evict(b"user:1")?;
//! cache.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]

mod backend;
mod cache;
mod entry;
mod error;
mod stats;

pub use backend::DurableStore;
pub use cache::{StashCache, DEFAULT_STORE_PATH};
pub use entry::EntryInfo;
pub use error::{OpenError, PrefetchError};
pub use stats::{CacheStats, StatsSnapshot};
