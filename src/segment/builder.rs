//! Segment Builder
//!
//! Writes sorted key-value entries to a new segment file pair.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::memtable::Entry;
use crate::BasaltError;

use super::{SegmentId, DATA_EXTENSION, INDEX_EXTENSION, KEYS_PER_INDEX_ENTRY, TMP_SUFFIX, TOMBSTONE_LEN};

/// Builder for creating new segments from sorted entries
///
/// Both files are written under `.tmp` names and renamed into place by
/// `finish()`; a failed build leaves only `.tmp` litter, which startup
/// discards. Call `add()` in strictly ascending key order.
pub struct SegmentBuilder {
    /// Final file paths
    data_path: PathBuf,
    index_path: PathBuf,
    /// In-progress file paths
    data_tmp: PathBuf,
    index_tmp: PathBuf,
    /// Buffered writers for both files
    data: BufWriter<File>,
    index: BufWriter<File>,
    /// Byte position of the next data record (anchored by the index)
    offset: u64,
    /// Number of data records written
    record_count: u64,
    /// Number of index anchors written (patched into the header in finish)
    anchor_count: u64,
}

impl SegmentBuilder {
    /// Create a new builder writing `sstable_<millis>_<seq>.{data,index}`
    /// under `dir`.
    ///
    /// Writes the index-count placeholder immediately; call `add()` in sorted
    /// order, then `finish()` to patch the header and publish both files.
    pub fn create(dir: &Path, id: SegmentId) -> Result<Self> {
        let base = dir.join(id.base_name());
        let data_path = base.with_extension(DATA_EXTENSION);
        let index_path = base.with_extension(INDEX_EXTENSION);
        let data_tmp = tmp_path(&data_path);
        let index_tmp = tmp_path(&index_path);

        let data = BufWriter::new(open_tmp(&data_tmp)?);
        let mut index = BufWriter::new(open_tmp(&index_tmp)?);

        // Anchor-count placeholder, patched in finish()
        index.write_all(&0u64.to_le_bytes())?;

        Ok(Self {
            data_path,
            index_path,
            data_tmp,
            index_tmp,
            data,
            index,
            offset: 0,
            record_count: 0,
            anchor_count: 0,
        })
    }

    /// Append an entry (must be called in strictly ascending key order)
    pub fn add(&mut self, key: &[u8], entry: &Entry) -> Result<()> {
        if key.len() as u64 > u64::from(u32::MAX >> 1) {
            return Err(BasaltError::Storage(format!(
                "key of {} bytes exceeds the segment format limit",
                key.len()
            )));
        }
        let key_len = key.len() as u32;

        // One anchor per KEYS_PER_INDEX_ENTRY records, starting at record 0
        if self.record_count % KEYS_PER_INDEX_ENTRY == 0 {
            self.index.write_all(&key_len.to_le_bytes())?;
            self.index.write_all(key)?;
            self.index.write_all(&self.offset.to_le_bytes())?;
            self.anchor_count += 1;
        }

        self.data.write_all(&key_len.to_le_bytes())?;
        self.data.write_all(key)?;

        let mut record_size = 8 + key.len() as u64;
        match entry {
            Entry::Value(value) => {
                if value.len() as u64 >= u64::from(TOMBSTONE_LEN) {
                    return Err(BasaltError::Storage(format!(
                        "value of {} bytes exceeds the segment format limit",
                        value.len()
                    )));
                }
                self.data.write_all(&(value.len() as u32).to_le_bytes())?;
                self.data.write_all(value)?;
                record_size += value.len() as u64;
            }
            Entry::Tombstone => {
                self.data.write_all(&TOMBSTONE_LEN.to_le_bytes())?;
            }
        }

        self.offset += record_size;
        self.record_count += 1;

        Ok(())
    }

    /// Patch the index header, flush both files, and rename them into place.
    /// Returns the final index path.
    pub fn finish(mut self) -> Result<PathBuf> {
        self.data.flush()?;
        self.index.flush()?;

        drop(self.data);

        // Seek back and patch the anchor count
        let mut index_file = self.index.into_inner().map_err(|e| {
            BasaltError::Storage(format!("failed to flush segment index: {}", e))
        })?;
        index_file.seek(SeekFrom::Start(0))?;
        index_file.write_all(&self.anchor_count.to_le_bytes())?;
        drop(index_file);

        // Publish: data first so a loadable index never points at a missing
        // data file
        fs::rename(&self.data_tmp, &self.data_path)?;
        fs::rename(&self.index_tmp, &self.index_path)?;

        Ok(self.index_path)
    }

    /// Number of data records written so far
    pub fn record_count(&self) -> u64 {
        self.record_count
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(TMP_SUFFIX);
    PathBuf::from(os)
}

fn open_tmp(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?)
}
