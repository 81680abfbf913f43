//! Command definitions
//!
//! Represents requests decoded from the wire.

/// A parsed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Get the value of a key
    Get { key: Vec<u8> },

    /// Set a key to a value
    Set { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Del { key: Vec<u8> },
}
