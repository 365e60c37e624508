//! The durable store seam

use std::sync::Arc;

use stashdb::{Durability, Result, StashStore};

/// Persistent key-value engine the cache writes back to.
///
/// `get` must report absence as [`stashdb::Error::NotFound`] so the cache can
/// tell it apart from real failures.
pub trait DurableStore {
    /// Read the value for `key`
    fn get(&self, key: &[u8]) -> Result<Vec<u8>>;

    /// Write `value` under `key` with the requested durability
    fn set(&self, key: &[u8], value: &[u8], durability: Durability) -> Result<()>;

    /// Release the store
    fn close(&self) -> Result<()>;
}

impl DurableStore for StashStore {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        StashStore::get(self, key)
    }

    fn set(&self, key: &[u8], value: &[u8], durability: Durability) -> Result<()> {
        StashStore::set(self, key, value, durability)
    }

    fn close(&self) -> Result<()> {
        StashStore::close(self)
    }
}

impl<S: DurableStore + ?Sized> DurableStore for Arc<S> {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        (**self).get(key)
    }

    fn set(&self, key: &[u8], value: &[u8], durability: Durability) -> Result<()> {
        (**self).set(key, value, durability)
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }
}
