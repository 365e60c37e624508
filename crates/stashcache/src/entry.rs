//! Resident cache entries

use chrono::{DateTime, Utc};

/// In-memory record for one resident key
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    value: Vec<u8>,
    size: usize,
    first_inserted: DateTime<Utc>,
    last_updated: DateTime<Utc>,
}

impl CacheEntry {
    pub(crate) fn new(value: Vec<u8>) -> Self {
        let now = Utc::now();
        Self {
            size: value.len(),
            value,
            first_inserted: now,
            last_updated: now,
        }
    }

    /// Replace the value in place; `first_inserted` is left untouched
    pub(crate) fn update(&mut self, value: Vec<u8>) {
        self.size = value.len();
        self.value = value;
        self.last_updated = Utc::now();
    }

    pub(crate) fn value(&self) -> &[u8] {
        &self.value
    }

    pub(crate) fn into_value(self) -> Vec<u8> {
        self.value
    }

    pub(crate) fn info(&self) -> EntryInfo {
        EntryInfo {
            size: self.size,
            first_inserted: self.first_inserted,
            last_updated: self.last_updated,
        }
    }
}

/// Metadata snapshot of a resident entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryInfo {
    /// Value length in bytes
    pub size: usize,
    /// When the key was admitted to the cache
    pub first_inserted: DateTime<Utc>,
    /// When the value was last written
    pub last_updated: DateTime<Utc>,
}
