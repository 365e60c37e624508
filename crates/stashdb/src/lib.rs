//! # stashdb
//!
//! Embedded ordered key-value store backing the stash write-back cache.
//!
//! ## Design
//! - Append-only data log, replayed through a memory map on open
//! - Ordered in-memory index (`BTreeMap`) from key to value location
//! - Per-write durability: [`Durability::Sync`] fsyncs before returning
//! - Torn trailing records are discarded during recovery

#![warn(missing_docs)]

mod error;
mod parser;
mod storage;

pub use error::{Error, Result};
pub use storage::{Durability, StashStore, DATA_FILE, MAX_KEY_SIZE, MAX_VALUE_SIZE};
