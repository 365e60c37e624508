//! Replies printed by the command shell

use std::fmt;

/// Result of one shell command
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Status line, e.g. `OK`
    Status(String),
    /// A stored value
    Value(Vec<u8>),
    /// Key absent from both tiers
    Nil,
    /// Counter or count
    Integer(i64),
    /// Multi-line text such as a stats dump
    Text(String),
    /// Command failed
    Error(String),
    /// End the session
    Quit,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Status(s) => write!(f, "{}", s),
            Reply::Value(v) => write!(f, "{:?}", String::from_utf8_lossy(v)),
            Reply::Nil => write!(f, "(nil)"),
            Reply::Integer(i) => write!(f, "(integer) {}", i),
            Reply::Text(t) => write!(f, "{}", t),
            Reply::Error(e) => write!(f, "(error) {}", e),
            Reply::Quit => write!(f, "bye"),
        }
    }
}
