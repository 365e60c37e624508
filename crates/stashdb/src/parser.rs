//! Data file codec using nom
//!
//! File format:
//! ```text
//! STASH01\n
//! [version: u32]
//! ...records...
//! ```
//!
//! Record format (all integers little-endian):
//! ```text
//! [key_len: u32][value_len: u32][prefix_crc: u32][body_crc: u32][key bytes][value bytes]
//! ```
//!
//! `prefix_crc` covers the two length fields, so a damaged length is caught
//! before it is trusted. `body_crc` covers key and value.

use crc32fast::Hasher;
use nom::{
    bytes::complete::tag,
    bytes::streaming::take,
    error::ErrorKind,
    number::{complete, streaming},
    sequence::{preceded, tuple},
    IResult,
};

use crate::error::{Error, Result};

/// Magic header for stash data files
pub const STASH_MAGIC: &[u8] = b"STASH01\n";

/// Current data file format version
pub const FORMAT_VERSION: u32 = 1;

/// Header length in bytes
pub const HEADER_LEN: usize = STASH_MAGIC.len() + 4;

/// Fixed-size prefix of every record
pub const RECORD_PREFIX_LEN: usize = 16;

/// A record borrowed from the mapped data file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    /// Key bytes
    pub key: &'a [u8],
    /// Value bytes
    pub value: &'a [u8],
    /// Stored checksum of key and value
    pub checksum: u32,
}

impl Record<'_> {
    /// Encoded length of this record
    pub fn encoded_len(&self) -> usize {
        RECORD_PREFIX_LEN + self.key.len() + self.value.len()
    }

    /// Whether key and value match the stored checksum
    pub fn is_intact(&self) -> bool {
        body_checksum(self.key, self.value) == self.checksum
    }
}

fn prefix_checksum(key_len: u32, value_len: u32) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&key_len.to_le_bytes());
    hasher.update(&value_len.to_le_bytes());
    hasher.finalize()
}

fn body_checksum(key: &[u8], value: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(key);
    hasher.update(value);
    hasher.finalize()
}

/// Parse the data file header, returning the format version
pub fn parse_header(input: &[u8]) -> Result<u32> {
    if input.len() < HEADER_LEN {
        return Err(Error::Parse("Input too short for header".to_string()));
    }

    let parsed: IResult<&[u8], u32> = preceded(tag(STASH_MAGIC), complete::le_u32)(input);
    match parsed {
        Ok((_, version)) => Ok(version),
        Err(_) => Err(Error::Parse("Invalid stash magic header".to_string())),
    }
}

/// Create a data file header
pub fn create_header(version: u32) -> Vec<u8> {
    let mut header = Vec::with_capacity(HEADER_LEN);
    header.extend_from_slice(STASH_MAGIC);
    header.extend_from_slice(&version.to_le_bytes());
    header
}

/// Parse one record.
///
/// Returns `nom::Err::Incomplete` when the input ends mid-record, which is
/// how a torn trailing write shows up during recovery. A prefix whose
/// lengths fail their checksum is `nom::Err::Failure`: the lengths cannot
/// be trusted, so the record boundary is unknown. The body checksum is left
/// to the caller via [`Record::is_intact`].
pub fn parse_record(input: &[u8]) -> IResult<&[u8], Record<'_>> {
    let prefix: IResult<&[u8], (u32, u32, u32, u32)> = tuple((
        streaming::le_u32,
        streaming::le_u32,
        streaming::le_u32,
        streaming::le_u32,
    ))(input);
    let (rest, (key_len, value_len, prefix_crc, checksum)) = prefix?;

    if prefix_checksum(key_len, value_len) != prefix_crc {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::Verify,
        )));
    }

    let key: IResult<&[u8], &[u8]> = take(key_len as usize)(rest);
    let (rest, key) = key?;

    let value: IResult<&[u8], &[u8]> = take(value_len as usize)(rest);
    let (rest, value) = value?;

    Ok((rest, Record { key, value, checksum }))
}

/// Encode a record for appending to the data file
pub fn encode_record(key: &[u8], value: &[u8]) -> Vec<u8> {
    let key_len = key.len() as u32;
    let value_len = value.len() as u32;

    let mut buf = Vec::with_capacity(RECORD_PREFIX_LEN + key.len() + value.len());
    buf.extend_from_slice(&key_len.to_le_bytes());
    buf.extend_from_slice(&value_len.to_le_bytes());
    buf.extend_from_slice(&prefix_checksum(key_len, value_len).to_le_bytes());
    buf.extend_from_slice(&body_checksum(key, value).to_le_bytes());
    buf.extend_from_slice(key);
    buf.extend_from_slice(value);
    buf
}
