//! Segment Reader
//!
//! Opens a segment file pair and serves point lookups via the sparse index.

use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::Result;
use crate::memtable::Entry;
use crate::BasaltError;

use super::{SegmentId, DATA_EXTENSION, TOMBSTONE_LEN};

/// An immutable on-disk sorted table
///
/// The sparse index lives fully in memory; the data file is opened once and
/// shared behind a mutex, so concurrent lookups through an `Arc<Segment>`
/// never touch the engine's segment-list lock. The descriptor stays valid
/// even after compaction unlinks the files.
pub struct Segment {
    /// Identity parsed from the file name
    id: SegmentId,
    /// Path of the index file
    index_path: PathBuf,
    /// Path of the data file
    data_path: PathBuf,
    /// Sparse anchors: (key, data-file offset), ascending
    index: Vec<(Vec<u8>, u64)>,
    /// Shared handle for point lookups
    data: Mutex<BufReader<File>>,
}

impl Segment {
    /// Open a segment given its index-file path.
    ///
    /// Loads the whole sparse index into memory and opens the sibling data
    /// file. Fails on a missing or truncated index; callers treat such a
    /// segment as unusable and discard it.
    pub fn open(index_path: &Path) -> Result<Self> {
        let id = SegmentId::parse(index_path).ok_or_else(|| {
            BasaltError::Storage(format!(
                "unrecognized segment file name: {}",
                index_path.display()
            ))
        })?;
        let data_path = index_path.with_extension(DATA_EXTENSION);

        let index = load_index(index_path)?;
        let data = File::open(&data_path)?;

        Ok(Self {
            id,
            index_path: index_path.to_path_buf(),
            data_path,
            index,
            data: Mutex::new(BufReader::new(data)),
        })
    }

    /// Segment identity (creation-time ordering key)
    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// Path of the index file
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Path of the data file
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Sparse index anchors, ascending (exposed for invariant checks)
    pub fn anchors(&self) -> &[(Vec<u8>, u64)] {
        &self.index
    }

    /// Look up a key.
    ///
    /// Returns:
    /// - `Ok(Some(Entry::Value(v)))` — key present with a live value
    /// - `Ok(Some(Entry::Tombstone))` — key deleted here; callers stop the
    ///   newest-wins walk
    /// - `Ok(None)` — key not in this segment
    pub fn get(&self, key: &[u8]) -> Result<Option<Entry>> {
        if self.index.is_empty() {
            return Ok(None);
        }

        // Greatest anchor with anchor_key <= key; keys below the first
        // anchor scan from the head of the data file
        let idx = self.index.partition_point(|(k, _)| k.as_slice() <= key);
        let start = if idx == 0 { 0 } else { self.index[idx - 1].1 };

        let mut data = self.data.lock();
        data.seek(SeekFrom::Start(start))?;

        // Records are sorted, so the scan stops at the first key > target
        loop {
            let record_key = match read_record_key(&mut *data, &self.data_path)? {
                Some(k) => k,
                None => return Ok(None), // clean EOF
            };

            let value_len = read_u32(&mut *data)?;
            match record_key.as_slice().cmp(key) {
                Ordering::Less => {
                    if value_len != TOMBSTONE_LEN {
                        data.seek_relative(i64::from(value_len))?;
                    }
                }
                Ordering::Equal => {
                    if value_len == TOMBSTONE_LEN {
                        return Ok(Some(Entry::Tombstone));
                    }
                    let mut value = vec![0u8; value_len as usize];
                    data.read_exact(&mut value)?;
                    return Ok(Some(Entry::Value(value)));
                }
                Ordering::Greater => return Ok(None),
            }
        }
    }

    /// Stream every record in key order (compaction input).
    ///
    /// Reads through a private handle so a long merge does not block
    /// concurrent point lookups.
    pub fn scan(&self) -> Result<Vec<(Vec<u8>, Entry)>> {
        let mut data = BufReader::new(File::open(&self.data_path)?);
        let mut records = Vec::new();

        loop {
            let key = match read_record_key(&mut data, &self.data_path)? {
                Some(k) => k,
                None => return Ok(records),
            };

            let value_len = read_u32(&mut data)?;
            let entry = if value_len == TOMBSTONE_LEN {
                Entry::Tombstone
            } else {
                let mut value = vec![0u8; value_len as usize];
                data.read_exact(&mut value)?;
                Entry::Value(value)
            };
            records.push((key, entry));
        }
    }
}

// =============================================================================
// Private Helpers
// =============================================================================

/// Read the whole sparse index: count header, then (klen, key, offset)
/// entries. Any truncation is an error.
fn load_index(path: &Path) -> Result<Vec<(Vec<u8>, u64)>> {
    let mut file = BufReader::new(File::open(path)?);

    let count = read_u64(&mut file)?;
    let mut index = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let key_len = read_u32(&mut file)?;
        if key_len & 0x8000_0000 != 0 {
            return Err(BasaltError::Storage(format!(
                "corrupt anchor header in {}",
                path.display()
            )));
        }
        let mut key = vec![0u8; key_len as usize];
        file.read_exact(&mut key)?;
        let offset = read_u64(&mut file)?;
        index.push((key, offset));
    }

    Ok(index)
}

/// Read the key of the next data record, or `None` on a clean end-of-file.
fn read_record_key<R: Read>(reader: &mut R, path: &Path) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let key_len = u32::from_le_bytes(len_buf);
    if key_len & 0x8000_0000 != 0 {
        return Err(BasaltError::Storage(format!(
            "corrupt record header in {}",
            path.display()
        )));
    }

    let mut key = vec![0u8; key_len as usize];
    reader.read_exact(&mut key)?;
    Ok(Some(key))
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}
