//! MemTable Tests
//!
//! Tests verify:
//! - Basic put/get/delete operations
//! - Tombstone handling
//! - Monotone size tracking
//! - Sorted iteration including tombstones

use basaltkv::memtable::{Entry, MemTable};

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_new_memtable_is_empty() {
    let memtable = MemTable::new();
    assert_eq!(memtable.len(), 0);
    assert_eq!(memtable.approximate_size(), 0);
    assert!(memtable.is_empty());
}

#[test]
fn test_put_and_get() {
    let mut memtable = MemTable::new();

    memtable.put(b"key1".to_vec(), b"value1".to_vec());

    assert_eq!(
        memtable.get(b"key1"),
        Some(&Entry::Value(b"value1".to_vec()))
    );
}

#[test]
fn test_get_nonexistent_key() {
    let memtable = MemTable::new();

    assert_eq!(memtable.get(b"nonexistent"), None);
}

#[test]
fn test_put_overwrites_existing() {
    let mut memtable = MemTable::new();

    memtable.put(b"key1".to_vec(), b"value1".to_vec());
    memtable.put(b"key1".to_vec(), b"value2".to_vec());

    assert_eq!(memtable.len(), 1);
    assert_eq!(
        memtable.get(b"key1"),
        Some(&Entry::Value(b"value2".to_vec()))
    );
}

// =============================================================================
// Delete / Tombstone Tests
// =============================================================================

#[test]
fn test_delete_creates_tombstone() {
    let mut memtable = MemTable::new();

    memtable.put(b"key1".to_vec(), b"value1".to_vec());
    memtable.delete(b"key1".to_vec());

    assert_eq!(memtable.get(b"key1"), Some(&Entry::Tombstone));
    assert_eq!(memtable.len(), 1); // Tombstone still counts as an entry
}

#[test]
fn test_delete_nonexistent_key() {
    let mut memtable = MemTable::new();

    memtable.delete(b"nonexistent".to_vec());

    assert_eq!(memtable.get(b"nonexistent"), Some(&Entry::Tombstone));
}

#[test]
fn test_put_after_delete() {
    let mut memtable = MemTable::new();

    memtable.put(b"key1".to_vec(), b"value1".to_vec());
    memtable.delete(b"key1".to_vec());
    memtable.put(b"key1".to_vec(), b"value2".to_vec());

    assert_eq!(
        memtable.get(b"key1"),
        Some(&Entry::Value(b"value2".to_vec()))
    );
}

#[test]
fn test_tombstone_sentinel_bytes_are_a_legal_value() {
    let mut memtable = MemTable::new();

    // A value of exactly 0xFF 0xFF 0xFF 0xFF must stay a live value
    memtable.put(b"key".to_vec(), vec![0xFF, 0xFF, 0xFF, 0xFF]);

    assert_eq!(
        memtable.get(b"key"),
        Some(&Entry::Value(vec![0xFF, 0xFF, 0xFF, 0xFF]))
    );
}

// =============================================================================
// Size Tracking Tests
// =============================================================================

#[test]
fn test_size_grows_on_put() {
    let mut memtable = MemTable::new();

    assert_eq!(memtable.approximate_size(), 0);
    memtable.put(b"key".to_vec(), b"value".to_vec());
    assert!(memtable.approximate_size() >= b"key".len() + b"value".len());
}

#[test]
fn test_size_is_monotone_under_overwrite() {
    let mut memtable = MemTable::new();

    memtable.put(b"key".to_vec(), b"a_long_initial_value".to_vec());
    let after_first = memtable.approximate_size();

    // Overwriting with a shorter value must not shrink the estimate
    memtable.put(b"key".to_vec(), b"x".to_vec());
    assert!(memtable.approximate_size() >= after_first);
}

#[test]
fn test_size_grows_on_delete() {
    let mut memtable = MemTable::new();

    memtable.put(b"key".to_vec(), b"value".to_vec());
    let after_put = memtable.approximate_size();

    memtable.delete(b"key".to_vec());
    assert!(memtable.approximate_size() >= after_put);
}

// =============================================================================
// Iteration Tests
// =============================================================================

#[test]
fn test_iter_sorted_order() {
    let mut memtable = MemTable::new();

    // Insert in random order
    memtable.put(b"cherry".to_vec(), b"3".to_vec());
    memtable.put(b"apple".to_vec(), b"1".to_vec());
    memtable.put(b"banana".to_vec(), b"2".to_vec());

    let keys: Vec<Vec<u8>> = memtable.iter().map(|(k, _)| k.clone()).collect();

    assert_eq!(
        keys,
        vec![b"apple".to_vec(), b"banana".to_vec(), b"cherry".to_vec()]
    );
}

#[test]
fn test_iter_includes_tombstones() {
    let mut memtable = MemTable::new();

    memtable.put(b"key1".to_vec(), b"value1".to_vec());
    memtable.delete(b"key2".to_vec());
    memtable.put(b"key3".to_vec(), b"value3".to_vec());

    let entries: Vec<(&Vec<u8>, &Entry)> = memtable.iter().collect();

    assert_eq!(entries.len(), 3);
    assert!(matches!(entries[0].1, Entry::Value(_)));
    assert!(matches!(entries[1].1, Entry::Tombstone));
    assert!(matches!(entries[2].1, Entry::Value(_)));
}

#[test]
fn test_into_iter_consumes_in_order() {
    let mut memtable = MemTable::new();

    for i in (0..100).rev() {
        memtable.put(format!("key{:03}", i).into_bytes(), b"v".to_vec());
    }

    let keys: Vec<Vec<u8>> = memtable.into_iter().map(|(k, _)| k).collect();
    for window in keys.windows(2) {
        assert!(window[0] < window[1]);
    }
}

// =============================================================================
// Edge Cases
// =============================================================================

#[test]
fn test_empty_key() {
    let mut memtable = MemTable::new();

    memtable.put(vec![], b"value".to_vec());

    assert_eq!(memtable.get(&[]), Some(&Entry::Value(b"value".to_vec())));
}

#[test]
fn test_empty_value() {
    let mut memtable = MemTable::new();

    memtable.put(b"key".to_vec(), vec![]);

    assert_eq!(memtable.get(b"key"), Some(&Entry::Value(vec![])));
}

#[test]
fn test_many_entries() {
    let mut memtable = MemTable::new();

    for i in 0..1000 {
        let key = format!("key{:04}", i).into_bytes();
        let value = format!("value{}", i).into_bytes();
        memtable.put(key, value);
    }

    assert_eq!(memtable.len(), 1000);
    assert_eq!(
        memtable.get(b"key0500"),
        Some(&Entry::Value(b"value500".to_vec()))
    );
}
