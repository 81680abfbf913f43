//! Segment Module
//!
//! Immutable on-disk sorted tables. Each segment is a pair of files sharing
//! a base name:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ <base>.data                                              │
//! │   [KeyLen: u32][Key][ValLen: u32][Value]                 │
//! │   ... repeated, keys strictly ascending ...              │
//! │   (ValLen = u32::MAX means tombstone, no value bytes)    │
//! ├──────────────────────────────────────────────────────────┤
//! │ <base>.index                                             │
//! │   Count: u64                                             │
//! │   [KeyLen: u32][Key][Offset: u64]                        │
//! │   ... one anchor per KEYS_PER_INDEX_ENTRY data records   │
//! │   starting at record 0, same key order as the data file  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. Lookups binary-search the in-memory
//! anchor array, then scan the data file forward from the anchored offset.

mod builder;
mod reader;

use std::path::Path;

pub use builder::SegmentBuilder;
pub use reader::Segment;

// =============================================================================
// Shared Constants (used by builder and reader)
// =============================================================================

/// File extension for the sparse index file
pub const INDEX_EXTENSION: &str = "index";

/// File extension for the data file
pub const DATA_EXTENSION: &str = "data";

/// Suffix for in-progress files, swept on startup
pub const TMP_SUFFIX: &str = ".tmp";

/// Number of data records per sparse index anchor
pub const KEYS_PER_INDEX_ENTRY: u64 = 10;

/// Value-length sentinel marking a tombstone record (no value bytes follow)
pub(crate) const TOMBSTONE_LEN: u32 = u32::MAX;

/// File-name prefix shared by all segment files
const BASE_PREFIX: &str = "sstable_";

// =============================================================================
// Segment Identity
// =============================================================================

/// Identity of a segment, embedded in its file names as
/// `sstable_<millis>_<seq>`. Ordering by `(millis, seq)` is creation-time
/// order; `seq` is a process-wide counter that disambiguates same-millisecond
/// creations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SegmentId {
    /// Unix timestamp in milliseconds at creation
    pub millis: u64,
    /// Monotonic creation counter
    pub seq: u64,
}

impl SegmentId {
    /// Base file name (no directory, no extension)
    pub fn base_name(&self) -> String {
        format!("{}{}_{}", BASE_PREFIX, self.millis, self.seq)
    }

    /// Parse an id from a segment file path
    /// `data/sstable_1711670000123_7.index` → `{ millis: 1711670000123, seq: 7 }`
    pub fn parse(path: &Path) -> Option<SegmentId> {
        let stem = path.file_stem()?.to_str()?;
        let rest = stem.strip_prefix(BASE_PREFIX)?;
        let (millis, seq) = rest.split_once('_')?;
        Some(SegmentId {
            millis: millis.parse().ok()?,
            seq: seq.parse().ok()?,
        })
    }
}
