//! Error types for stashdb

use std::fmt;
use std::io;

/// Result type alias for stashdb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for store operations
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(io::Error),

    /// Corrupt or unrecognised data file
    Parse(String),

    /// Key exceeds [`MAX_KEY_SIZE`](crate::MAX_KEY_SIZE)
    KeyTooLarge(usize),

    /// Value exceeds [`MAX_VALUE_SIZE`](crate::MAX_VALUE_SIZE)
    ValueTooLarge(usize),

    /// Key not found
    NotFound,

    /// Store is closed
    Closed,

    /// An earlier failed write left the data file in an unknown state
    Poisoned,

    /// A write failed and truncating the partial record also failed
    RollbackFailed {
        /// Error from the append
        write: io::Error,
        /// Error from truncating back to the previous length
        rollback: io::Error,
    },
}

impl Error {
    /// True for the distinguished "not found" outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Parse(msg) => write!(f, "Parse error: {}", msg),
            Error::KeyTooLarge(size) => write!(f, "Key too large: {} bytes (max 64 KiB)", size),
            Error::ValueTooLarge(size) => {
                write!(f, "Value too large: {} bytes (max 16 MiB)", size)
            }
            Error::NotFound => write!(f, "Key not found"),
            Error::Closed => write!(f, "Store is closed"),
            Error::Poisoned => write!(f, "Store is unusable after a failed rollback"),
            Error::RollbackFailed { write, rollback } => write!(
                f,
                "Write failed ({}) and rollback failed ({})",
                write, rollback
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::RollbackFailed { write, .. } => Some(write),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for Error {
    fn from(err: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        Error::Parse(format!("{:?}", err))
    }
}
