//! Segment compaction
//!
//! Merges the oldest contiguous prefix of the segment list into a single
//! segment, reconciling duplicate keys newest-wins and garbage-collecting
//! tombstones. Only the oldest prefix is ever merged, so a dropped tombstone
//! cannot uncover a stale value in some older segment.

use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;

use crate::error::Result;
use crate::memtable::Entry;
use crate::segment::{Segment, SegmentBuilder};

use super::Shared;

/// Run one compaction cycle.
///
/// The merged segment is written under the newest input's base name (built
/// as `.tmp` files and renamed over it), so file-name order keeps matching
/// data recency: segments flushed while the merge ran, and every segment
/// discovered after a restart, still sort as newer than the merged output.
pub(super) fn compact_once(shared: &Shared) -> Result<()> {
    // Detach the oldest prefix. Everything after this block runs without
    // the list lock.
    let detached: Vec<Arc<Segment>> = {
        let mut segments = shared.segments.lock();
        if segments.len() < shared.config.max_segment_count {
            return Ok(());
        }
        let take = shared.config.max_segment_count;
        segments.drain(..take).collect()
    };

    tracing::debug!("compacting {} segments", detached.len());

    match merge_and_publish(shared, &detached) {
        Ok(()) => Ok(()),
        Err(e) => {
            // Put the inputs back where they were; the cycle is abandoned
            shared.segments.lock().splice(0..0, detached);
            Err(e)
        }
    }
}

fn merge_and_publish(shared: &Shared, detached: &[Arc<Segment>]) -> Result<()> {
    // The newest input's base name is reused for the merged output
    let newest = match detached.last() {
        Some(segment) => segment,
        None => return Ok(()),
    };

    // Scan oldest to newest, always overwriting: the last write per key is
    // the newest record, so the map converges to newest-wins
    let mut merged: BTreeMap<Vec<u8>, Entry> = BTreeMap::new();
    for segment in detached {
        for (key, entry) in segment.scan()? {
            merged.insert(key, entry);
        }
    }

    let live_count = merged
        .values()
        .filter(|e| !matches!(e, Entry::Tombstone))
        .count();

    if live_count == 0 {
        // Every surviving entry was a tombstone; no output segment at all
        tracing::debug!("compaction produced no live entries, dropping inputs");
        remove_segment_files(detached);
        return Ok(());
    }

    let mut builder = SegmentBuilder::create(&shared.config.data_dir, newest.id())?;
    for (key, entry) in &merged {
        if matches!(entry, Entry::Tombstone) {
            continue;
        }
        builder.add(key, entry)?;
    }
    let index_path = builder.finish()?;
    let segment = Arc::new(Segment::open(&index_path)?);

    tracing::info!(
        "compacted {} segments into {} ({} live entries)",
        detached.len(),
        segment.index_path().display(),
        live_count
    );

    // The rename already unlinked the newest input's files; delete the rest.
    // Readers holding Arcs keep valid descriptors for the unlinked inodes.
    remove_segment_files(&detached[..detached.len() - 1]);

    // The merged data is older than everything still listed
    shared.segments.lock().insert(0, segment);

    Ok(())
}

fn remove_segment_files(segments: &[Arc<Segment>]) {
    for segment in segments {
        for path in [segment.data_path(), segment.index_path()] {
            if let Err(e) = fs::remove_file(path) {
                tracing::warn!("failed to remove {}: {}", path.display(), e);
            }
        }
    }
}
