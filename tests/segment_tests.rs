//! Segment tests
//!
//! Tests verify:
//! - Builder output and reader lookups over the file pair
//! - Sparse index anchor placement (one anchor per 10 records)
//! - Tombstone records
//! - Ordered full scans
//! - Invariants of the on-disk layout
//! - Failure handling for missing/truncated index files

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use basaltkv::memtable::Entry;
use basaltkv::segment::{Segment, SegmentBuilder, SegmentId, KEYS_PER_INDEX_ENTRY};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn test_id(seq: u64) -> SegmentId {
    SegmentId {
        millis: 1_700_000_000_000,
        seq,
    }
}

/// Build a segment with `count` numbered entries; returns its index path
fn build_segment(dir: &Path, count: usize) -> PathBuf {
    let mut builder = SegmentBuilder::create(dir, test_id(0)).unwrap();
    // Keys must be added in sorted order; zero-pad for lexicographic order
    for i in 0..count {
        let key = format!("key{:05}", i);
        let value = format!("value{}", i);
        builder
            .add(key.as_bytes(), &Entry::Value(value.into_bytes()))
            .unwrap();
    }
    builder.finish().unwrap()
}

// =============================================================================
// Builder Tests
// =============================================================================

#[test]
fn test_builder_creates_file_pair() {
    let temp = TempDir::new().unwrap();
    let index_path = build_segment(temp.path(), 5);

    assert!(index_path.exists());
    assert!(index_path.with_extension("data").exists());
}

#[test]
fn test_builder_leaves_no_tmp_files() {
    let temp = TempDir::new().unwrap();
    build_segment(temp.path(), 5);

    for entry in fs::read_dir(temp.path()).unwrap() {
        let name = entry.unwrap().file_name();
        assert!(
            !name.to_string_lossy().ends_with(".tmp"),
            "leftover tmp file {:?}",
            name
        );
    }
}

#[test]
fn test_builder_empty_segment() {
    let temp = TempDir::new().unwrap();
    let builder = SegmentBuilder::create(temp.path(), test_id(0)).unwrap();
    let index_path = builder.finish().unwrap();

    let segment = Segment::open(&index_path).unwrap();
    assert!(segment.anchors().is_empty());
    assert_eq!(segment.get(b"anything").unwrap(), None);
}

// =============================================================================
// Lookup Tests
// =============================================================================

#[test]
fn test_get_existing_keys() {
    let temp = TempDir::new().unwrap();
    let index_path = build_segment(temp.path(), 100);
    let segment = Segment::open(&index_path).unwrap();

    // Anchor keys and keys between anchors alike
    for i in [0, 1, 9, 10, 11, 25, 50, 99] {
        let key = format!("key{:05}", i);
        let expected = format!("value{}", i);
        assert_eq!(
            segment.get(key.as_bytes()).unwrap(),
            Some(Entry::Value(expected.into_bytes())),
            "lookup of key{:05}",
            i
        );
    }
}

#[test]
fn test_get_missing_key_between_records() {
    let temp = TempDir::new().unwrap();
    let index_path = build_segment(temp.path(), 50);
    let segment = Segment::open(&index_path).unwrap();

    // Sorts between key00013 and key00014, never written
    assert_eq!(segment.get(b"key00013a").unwrap(), None);
}

#[test]
fn test_get_below_first_key() {
    let temp = TempDir::new().unwrap();
    let index_path = build_segment(temp.path(), 10);
    let segment = Segment::open(&index_path).unwrap();

    assert_eq!(segment.get(b"aaa").unwrap(), None);
}

#[test]
fn test_get_above_last_key() {
    let temp = TempDir::new().unwrap();
    let index_path = build_segment(temp.path(), 10);
    let segment = Segment::open(&index_path).unwrap();

    assert_eq!(segment.get(b"zzz").unwrap(), None);
}

#[test]
fn test_get_tombstone() {
    let temp = TempDir::new().unwrap();
    let mut builder = SegmentBuilder::create(temp.path(), test_id(0)).unwrap();
    builder.add(b"key1", &Entry::Value(b"value1".to_vec())).unwrap();
    builder.add(b"key2", &Entry::Tombstone).unwrap();
    builder.add(b"key3", &Entry::Value(b"value3".to_vec())).unwrap();
    let index_path = builder.finish().unwrap();

    let segment = Segment::open(&index_path).unwrap();

    assert_eq!(segment.get(b"key2").unwrap(), Some(Entry::Tombstone));
    assert_eq!(
        segment.get(b"key1").unwrap(),
        Some(Entry::Value(b"value1".to_vec()))
    );
    assert_eq!(
        segment.get(b"key3").unwrap(),
        Some(Entry::Value(b"value3".to_vec()))
    );
}

#[test]
fn test_tombstone_sentinel_bytes_round_trip() {
    let temp = TempDir::new().unwrap();
    let mut builder = SegmentBuilder::create(temp.path(), test_id(0)).unwrap();
    builder
        .add(b"key", &Entry::Value(vec![0xFF, 0xFF, 0xFF, 0xFF]))
        .unwrap();
    let index_path = builder.finish().unwrap();

    let segment = Segment::open(&index_path).unwrap();

    // The byte string FF FF FF FF is a live value, not a deletion
    assert_eq!(
        segment.get(b"key").unwrap(),
        Some(Entry::Value(vec![0xFF, 0xFF, 0xFF, 0xFF]))
    );
}

#[test]
fn test_empty_value_round_trip() {
    let temp = TempDir::new().unwrap();
    let mut builder = SegmentBuilder::create(temp.path(), test_id(0)).unwrap();
    builder.add(b"key", &Entry::Value(vec![])).unwrap();
    let index_path = builder.finish().unwrap();

    let segment = Segment::open(&index_path).unwrap();
    assert_eq!(segment.get(b"key").unwrap(), Some(Entry::Value(vec![])));
}

// =============================================================================
// Sparse Index Invariants
// =============================================================================

#[test]
fn test_one_anchor_per_ten_records() {
    let temp = TempDir::new().unwrap();
    let index_path = build_segment(temp.path(), 25);
    let segment = Segment::open(&index_path).unwrap();

    // 25 records → anchors at records 0, 10, 20
    assert_eq!(segment.anchors().len(), 3);
    assert_eq!(segment.anchors()[0].0, b"key00000");
    assert_eq!(segment.anchors()[1].0, b"key00010");
    assert_eq!(segment.anchors()[2].0, b"key00020");
}

#[test]
fn test_exact_multiple_of_anchor_interval() {
    let temp = TempDir::new().unwrap();
    let index_path = build_segment(temp.path(), (KEYS_PER_INDEX_ENTRY * 2) as usize);
    let segment = Segment::open(&index_path).unwrap();

    assert_eq!(segment.anchors().len(), 2);
}

#[test]
fn test_anchor_offsets_point_at_anchor_keys() {
    let temp = TempDir::new().unwrap();
    let index_path = build_segment(temp.path(), 35);
    let segment = Segment::open(&index_path).unwrap();

    // Read the record at each anchored offset straight from the data file
    let mut data = File::open(index_path.with_extension("data")).unwrap();
    for (anchor_key, offset) in segment.anchors() {
        data.seek(SeekFrom::Start(*offset)).unwrap();

        let mut len_buf = [0u8; 4];
        data.read_exact(&mut len_buf).unwrap();
        let key_len = u32::from_le_bytes(len_buf) as usize;

        let mut key = vec![0u8; key_len];
        data.read_exact(&mut key).unwrap();

        assert_eq!(&key, anchor_key);
    }
}

#[test]
fn test_data_file_keys_strictly_increasing() {
    let temp = TempDir::new().unwrap();
    let index_path = build_segment(temp.path(), 60);
    let segment = Segment::open(&index_path).unwrap();

    let records = segment.scan().unwrap();
    assert_eq!(records.len(), 60);
    for window in records.windows(2) {
        assert!(window[0].0 < window[1].0);
    }
}

// =============================================================================
// Scan Tests
// =============================================================================

#[test]
fn test_scan_returns_all_records_including_tombstones() {
    let temp = TempDir::new().unwrap();
    let mut builder = SegmentBuilder::create(temp.path(), test_id(0)).unwrap();
    builder.add(b"a", &Entry::Value(b"1".to_vec())).unwrap();
    builder.add(b"b", &Entry::Tombstone).unwrap();
    builder.add(b"c", &Entry::Value(b"3".to_vec())).unwrap();
    let index_path = builder.finish().unwrap();

    let segment = Segment::open(&index_path).unwrap();
    let records = segment.scan().unwrap();

    assert_eq!(
        records,
        vec![
            (b"a".to_vec(), Entry::Value(b"1".to_vec())),
            (b"b".to_vec(), Entry::Tombstone),
            (b"c".to_vec(), Entry::Value(b"3".to_vec())),
        ]
    );
}

// =============================================================================
// Identity and Failure Handling
// =============================================================================

#[test]
fn test_segment_id_parse() {
    let id = SegmentId::parse(Path::new("data/sstable_1700000000000_7.index")).unwrap();
    assert_eq!(id.millis, 1_700_000_000_000);
    assert_eq!(id.seq, 7);

    assert!(SegmentId::parse(Path::new("data/other_file.index")).is_none());
    assert!(SegmentId::parse(Path::new("data/sstable_xyz.index")).is_none());
}

#[test]
fn test_segment_id_ordering_matches_creation_order() {
    let older = SegmentId { millis: 100, seq: 1 };
    let newer_same_millis = SegmentId { millis: 100, seq: 2 };
    let newer = SegmentId { millis: 200, seq: 0 };

    assert!(older < newer_same_millis);
    assert!(newer_same_millis < newer);
}

#[test]
fn test_open_missing_index() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("sstable_1_0.index");

    assert!(Segment::open(&path).is_err());
}

#[test]
fn test_open_truncated_index() {
    let temp = TempDir::new().unwrap();
    let index_path = build_segment(temp.path(), 30);

    // Chop the index mid-entry
    let len = fs::metadata(&index_path).unwrap().len();
    let file = fs::OpenOptions::new()
        .write(true)
        .open(&index_path)
        .unwrap();
    file.set_len(len - 5).unwrap();
    drop(file);

    assert!(Segment::open(&index_path).is_err());
}

#[test]
fn test_open_unrecognized_file_name() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("notatable.index");
    fs::write(&path, b"junk").unwrap();

    assert!(Segment::open(&path).is_err());
}
