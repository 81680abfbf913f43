//! Protocol Module
//!
//! The RESP (REdis Serialization Protocol) subset spoken on the wire.
//!
//! ## Request Format
//! ```text
//! *<N>\r\n                    N ∈ {2, 3}
//! $<len>\r\n<operation>\r\n   GET | SET | DEL (byte-exact, upper case)
//! $<len>\r\n<key>\r\n
//! $<len>\r\n<value>\r\n       SET only
//! ```
//!
//! ## Reply Formats
//! - Simple string: `+OK\r\n`
//! - Error:         `-ERR <message>\r\n`
//! - Integer:       `:1\r\n`
//! - Bulk string:   `$<len>\r\n<bytes>\r\n` (empty: `$0\r\n\r\n`)
//! - Null bulk:     `$-1\r\n` (absent key)
//!
//! The decoder is incremental: it consumes exactly one frame and reports
//! how many bytes it used, so callers can pipeline requests and reassemble
//! frames split across reads.

mod command;
mod decoder;
pub mod encoder;

pub use command::Command;
pub use decoder::{decode, Decoded, FrameError};
