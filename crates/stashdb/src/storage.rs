//! Storage engine implementation
//!
//! File layout:
//! - `data.stash`: header followed by an append-only log of key/value records
//!
//! The ordered index (key -> value location) lives in memory and is rebuilt
//! from the log on open. Later records for a key shadow earlier ones.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use parking_lot::RwLock;
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::parser::{
    create_header, encode_record, parse_header, parse_record, FORMAT_VERSION, HEADER_LEN,
    RECORD_PREFIX_LEN,
};

/// Maximum key size (64 KiB)
pub const MAX_KEY_SIZE: usize = 64 * 1024;

/// Maximum value size (16 MiB)
pub const MAX_VALUE_SIZE: usize = 16 * 1024 * 1024;

/// Name of the data file inside the store directory
pub const DATA_FILE: &str = "data.stash";

/// Persistence guarantee requested for a single write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Durability {
    /// Flush the record to stable storage before returning
    #[default]
    Sync,
    /// Leave the record in the OS page cache
    NoSync,
}

/// Location of a value inside the data file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    offset: u64,
    len: u32,
}

/// StashStore is the main database handle
pub struct StashStore {
    /// Path to the store directory
    path: PathBuf,

    /// Data file handle
    data_file: RwLock<File>,

    /// In-memory ordered index: key -> value location in data file
    index: RwLock<BTreeMap<Vec<u8>, Slot>>,

    /// Is the store closed?
    closed: RwLock<bool>,

    /// Set when a failed append could not be rolled back
    poisoned: RwLock<bool>,
}

impl StashStore {
    /// Open or create a store at the given path
    ///
    /// # Arguments
    /// * `path` - Directory path for the store files
    ///
    /// # Returns
    /// * `Result<StashStore>` - Store handle
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;

        let data_path = path.join(DATA_FILE);
        let (data_file, index) = if data_path.exists() {
            Self::open_existing(&data_path)?
        } else {
            Self::create_new(&data_path)?
        };

        debug!(path = %path.display(), keys = index.len(), "opened stash store");

        Ok(StashStore {
            path: path.to_path_buf(),
            data_file: RwLock::new(data_file),
            index: RwLock::new(index),
            closed: RwLock::new(false),
            poisoned: RwLock::new(false),
        })
    }

    fn open_existing(data_path: &Path) -> Result<(File, BTreeMap<Vec<u8>, Slot>)> {
        let mut data_file = OpenOptions::new().read(true).write(true).open(data_path)?;

        let file_len = data_file.metadata()?.len();
        if file_len < HEADER_LEN as u64 {
            // Crashed between create and the end of the header write
            Self::repair_header(&mut data_file, data_path)?;
            return Ok((data_file, BTreeMap::new()));
        }

        // SAFETY: the file is opened by this handle only and is not truncated
        // while the map is alive; the map is dropped before any write below.
        let mmap = unsafe { Mmap::map(&data_file)? };

        let version = parse_header(&mmap)?;
        if version != FORMAT_VERSION {
            return Err(Error::Parse(format!("Unsupported format version {}", version)));
        }

        let (index, valid_len) = replay(&mmap)?;
        drop(mmap);

        if valid_len < file_len {
            warn!(
                path = %data_path.display(),
                valid_len,
                file_len,
                "discarding torn record at end of data file"
            );
            data_file.set_len(valid_len)?;
            data_file.sync_all()?;
        }

        Ok((data_file, index))
    }

    fn repair_header(data_file: &mut File, data_path: &Path) -> Result<()> {
        let mut existing = Vec::new();
        data_file.read_to_end(&mut existing)?;

        let header = create_header(FORMAT_VERSION);
        if !header.starts_with(&existing) {
            return Err(Error::Parse("Data file too short for header".to_string()));
        }

        warn!(
            path = %data_path.display(),
            len = existing.len(),
            "rewriting partially written header"
        );
        data_file.set_len(0)?;
        data_file.seek(SeekFrom::Start(0))?;
        data_file.write_all(&header)?;
        data_file.sync_all()?;
        Ok(())
    }

    fn create_new(data_path: &Path) -> Result<(File, BTreeMap<Vec<u8>, Slot>)> {
        let mut data_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(data_path)?;

        data_file.write_all(&create_header(FORMAT_VERSION))?;
        data_file.sync_all()?;

        Ok((data_file, BTreeMap::new()))
    }

    /// Write a key/value pair
    ///
    /// # Arguments
    /// * `key` - Key bytes (at most [`MAX_KEY_SIZE`])
    /// * `value` - Value bytes (at most [`MAX_VALUE_SIZE`])
    /// * `durability` - Whether to sync before returning
    pub fn set(&self, key: &[u8], value: &[u8], durability: Durability) -> Result<()> {
        self.check_usable()?;

        if key.len() > MAX_KEY_SIZE {
            return Err(Error::KeyTooLarge(key.len()));
        }
        if value.len() > MAX_VALUE_SIZE {
            return Err(Error::ValueTooLarge(value.len()));
        }

        let record = encode_record(key, value);

        // Lock order: data file, then index
        let mut data_file = self.data_file.write();
        let offset = data_file.seek(SeekFrom::End(0))?;

        let written = data_file.write_all(&record).and_then(|_| match durability {
            Durability::Sync => data_file.sync_data(),
            Durability::NoSync => Ok(()),
        });
        if let Err(write) = written {
            // Keep the log parseable for the next append
            if let Err(rollback) = data_file.set_len(offset) {
                error!(
                    path = %self.path.display(),
                    offset,
                    write_error = %write,
                    rollback_error = %rollback,
                    "could not roll back partial record; refusing further operations"
                );
                *self.poisoned.write() = true;
                return Err(Error::RollbackFailed { write, rollback });
            }
            return Err(write.into());
        }

        let slot = Slot {
            offset: offset + (RECORD_PREFIX_LEN + key.len()) as u64,
            len: value.len() as u32,
        };
        self.index.write().insert(key.to_vec(), slot);

        Ok(())
    }

    /// Get the value stored under a key
    ///
    /// # Returns
    /// * `Result<Vec<u8>>` - Value bytes, or [`Error::NotFound`]
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.check_usable()?;

        let slot = match self.index.read().get(key) {
            Some(slot) => *slot,
            None => return Err(Error::NotFound),
        };

        self.read_slot(slot)
    }

    fn check_usable(&self) -> Result<()> {
        if *self.closed.read() {
            return Err(Error::Closed);
        }
        if *self.poisoned.read() {
            return Err(Error::Poisoned);
        }
        Ok(())
    }

    fn read_slot(&self, slot: Slot) -> Result<Vec<u8>> {
        let mut data_file = self.data_file.write();
        data_file.seek(SeekFrom::Start(slot.offset))?;

        let mut value = vec![0u8; slot.len as usize];
        data_file.read_exact(&mut value)?;

        Ok(value)
    }

    /// Check whether a key exists without reading its value
    pub fn contains(&self, key: &[u8]) -> bool {
        self.index.read().contains_key(key)
    }

    /// Iterate all live pairs in ascending key order
    ///
    /// The key set is captured when the iterator is created; values are read
    /// lazily.
    pub fn scan(&self) -> impl Iterator<Item = Result<(Vec<u8>, Vec<u8>)>> + '_ {
        let snapshot: Vec<(Vec<u8>, Slot)> = self
            .index
            .read()
            .iter()
            .map(|(key, slot)| (key.clone(), *slot))
            .collect();

        snapshot.into_iter().map(move |(key, slot)| {
            self.check_usable()?;
            self.read_slot(slot).map(|value| (key, value))
        })
    }

    /// Get the number of live keys
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    /// Directory this store lives in
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the store and fsync all changes
    pub fn close(&self) -> Result<()> {
        let mut closed = self.closed.write();
        if *closed {
            return Ok(());
        }

        self.data_file.write().sync_all()?;
        *closed = true;

        debug!(path = %self.path.display(), "closed stash store");
        Ok(())
    }
}

impl Drop for StashStore {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Rebuild the index from a mapped data file.
///
/// Returns the index and the length of the valid prefix. Only the final
/// record may be torn: either cut short, or complete but failing its body
/// checksum with nothing after it. Damage anywhere else is `Error::Parse`.
fn replay(data: &[u8]) -> Result<(BTreeMap<Vec<u8>, Slot>, u64)> {
    let mut index = BTreeMap::new();
    let mut offset = HEADER_LEN;
    let mut rest = &data[HEADER_LEN..];

    while !rest.is_empty() {
        match parse_record(rest) {
            Ok((next, record)) if !record.is_intact() => {
                if next.is_empty() {
                    break;
                }
                return Err(Error::Parse(format!(
                    "Checksum mismatch in record at offset {}",
                    offset
                )));
            }
            Ok((next, record)) => {
                let slot = Slot {
                    offset: (offset + RECORD_PREFIX_LEN + record.key.len()) as u64,
                    len: record.value.len() as u32,
                };
                index.insert(record.key.to_vec(), slot);
                offset += record.encoded_len();
                rest = next;
            }
            Err(nom::Err::Incomplete(_)) => break,
            Err(_) => {
                return Err(Error::Parse(format!(
                    "Corrupt record header at offset {}",
                    offset
                )))
            }
        }
    }

    Ok((index, offset as u64))
}
