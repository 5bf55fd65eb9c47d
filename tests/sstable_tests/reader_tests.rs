//! Tests for the SSTable reader
//!
//! These tests verify:
//! - Reopening a segment rebuilds the writer's sparse index
//! - Point lookups, misses, and scans
//! - Corruption detection on the filter and index
//! - Key cache accounting and concurrent lookups

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use ringstore::partitioner::{HashPartitioner, OrderPreservingPartitioner, Partitioner};
use ringstore::sstable::{Descriptor, SSTableReader, SSTableWriter};
use ringstore::{Config, DecoratedKey, RingError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

const INTERVAL: u64 = 8;

fn key(s: &str) -> DecoratedKey {
    OrderPreservingPartitioner.decorate_key(s.as_bytes())
}

fn key_name(i: usize) -> String {
    format!("key{:05}", i)
}

fn value_of(i: usize) -> Vec<u8> {
    format!("value-{}", i).into_bytes()
}

/// Write keys key00000, key00002, ... (even numbers only) and finalize
fn setup_segment(dir: &Path, n: usize, cache_fraction: f64) -> SSTableReader {
    let config = Config::builder()
        .data_dir(dir)
        .index_interval(INTERVAL)
        .build();
    let descriptor = Descriptor::new(dir, "items", 1).unwrap();
    let mut writer = SSTableWriter::open(
        descriptor,
        n as u64,
        Arc::new(OrderPreservingPartitioner),
        &config,
    )
    .unwrap();

    for i in (0..n * 2).step_by(2) {
        writer.append_value(&key(&key_name(i)), &value_of(i)).unwrap();
    }
    writer.finalize(cache_fraction).unwrap()
}

fn reopen(handle: &SSTableReader, cache_fraction: f64) -> ringstore::Result<SSTableReader> {
    SSTableReader::open(
        &handle.path(),
        Arc::new(OrderPreservingPartitioner),
        INTERVAL,
        cache_fraction,
    )
}

// =============================================================================
// Open
// =============================================================================

#[test]
fn test_open_rebuilds_sparse_index() {
    let temp = TempDir::new().unwrap();
    let handle = setup_segment(temp.path(), 100, 0.0);

    let reopened = reopen(&handle, 0.0).unwrap();

    assert_eq!(reopened.index_positions(), handle.index_positions());
    assert_eq!(reopened.bloom_filter(), handle.bloom_filter());
    assert_eq!(reopened.descriptor(), handle.descriptor());
}

#[test]
fn test_open_with_different_interval() {
    let temp = TempDir::new().unwrap();
    let handle = setup_segment(temp.path(), 100, 0.0);

    let reopened = SSTableReader::open(
        &handle.path(),
        Arc::new(OrderPreservingPartitioner),
        1,
        0.0,
    )
    .unwrap();

    assert_eq!(reopened.index_positions().len(), 100);
    assert_eq!(reopened.get(&key(&key_name(42))).unwrap(), Some(value_of(42)));
}

#[test]
fn test_open_missing_filter_fails() {
    let temp = TempDir::new().unwrap();
    let handle = setup_segment(temp.path(), 10, 0.0);
    fs::remove_file(handle.descriptor().filter_path()).unwrap();

    assert!(matches!(reopen(&handle, 0.0), Err(RingError::Io(_))));
}

#[test]
fn test_open_corrupted_filter_fails() {
    let temp = TempDir::new().unwrap();
    let handle = setup_segment(temp.path(), 10, 0.0);

    let filter_path = handle.descriptor().filter_path();
    let mut bytes = fs::read(&filter_path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    fs::write(&filter_path, bytes).unwrap();

    assert!(matches!(reopen(&handle, 0.0), Err(RingError::Corruption(_))));
}

#[test]
fn test_open_truncated_index_fails() {
    let temp = TempDir::new().unwrap();
    let handle = setup_segment(temp.path(), 10, 0.0);

    let mut index = OpenOptions::new()
        .append(true)
        .open(handle.descriptor().index_path())
        .unwrap();
    // a length prefix with no key behind it
    index.write_all(&[0, 9, b'k']).unwrap();
    drop(index);

    assert!(matches!(reopen(&handle, 0.0), Err(RingError::Corruption(_))));
}

// =============================================================================
// Lookups
// =============================================================================

#[test]
fn test_get_every_key() {
    let temp = TempDir::new().unwrap();
    let handle = setup_segment(temp.path(), 200, 0.0);

    for i in (0..400).step_by(2) {
        assert_eq!(
            handle.get(&key(&key_name(i))).unwrap(),
            Some(value_of(i)),
            "{}",
            key_name(i)
        );
    }
}

#[test]
fn test_get_missing_keys() {
    let temp = TempDir::new().unwrap();
    let handle = setup_segment(temp.path(), 50, 0.0);

    // between written keys
    for i in (1..100).step_by(2) {
        assert_eq!(handle.get(&key(&key_name(i))).unwrap(), None);
    }
    // before the first and after the last
    assert_eq!(handle.get(&key("a")).unwrap(), None);
    assert_eq!(handle.get(&key("zzz")).unwrap(), None);
}

#[test]
fn test_get_position_before_first_sample() {
    let temp = TempDir::new().unwrap();
    let handle = setup_segment(temp.path(), 10, 0.0);

    assert_eq!(handle.get_position(&key("a")).unwrap(), None);
    assert_eq!(handle.get_position(&key(&key_name(0))).unwrap(), Some(0));
}

#[test]
fn test_iter_returns_sorted_records() {
    let temp = TempDir::new().unwrap();
    let handle = setup_segment(temp.path(), 30, 0.0);

    let records: Vec<(DecoratedKey, Vec<u8>)> =
        handle.iter().unwrap().map(|r| r.unwrap()).collect();

    assert_eq!(records.len(), 30);
    for (n, (k, v)) in records.iter().enumerate() {
        assert_eq!(k, &key(&key_name(n * 2)));
        assert_eq!(v, &value_of(n * 2));
    }
}

#[test]
fn test_iter_stops_after_corrupt_record() {
    let temp = TempDir::new().unwrap();
    let handle = setup_segment(temp.path(), 3, 0.0);

    let mut data = OpenOptions::new().append(true).open(handle.path()).unwrap();
    data.write_all(&[0, 1, b'z', 0, 0, 0, 50, 1, 2]).unwrap();
    drop(data);

    let results: Vec<_> = handle.iter().unwrap().collect();
    assert_eq!(results.len(), 4);
    assert!(results[..3].iter().all(|r| r.is_ok()));
    assert!(results[3].is_err());
}

#[test]
fn test_oversized_length_header_is_corruption() {
    let temp = TempDir::new().unwrap();
    let handle = setup_segment(temp.path(), 2, 0.0);

    // claims i32::MAX value bytes, holds three
    let mut data = OpenOptions::new().append(true).open(handle.path()).unwrap();
    data.write_all(&[0, 1, b'z', 0x7f, 0xff, 0xff, 0xff, 1, 2, 3]).unwrap();
    drop(data);

    let results: Vec<_> = handle.iter().unwrap().collect();
    assert_eq!(results.len(), 3);
    assert!(matches!(results[2], Err(RingError::Corruption(_))));
}

#[test]
fn test_hash_partitioned_segment() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder().data_dir(temp.path()).index_interval(4).build();
    let partitioner: Arc<dyn Partitioner> = Arc::new(HashPartitioner);

    let mut keys: Vec<DecoratedKey> = (0..40)
        .map(|i| partitioner.decorate_key(format!("user{}", i).as_bytes()))
        .collect();
    keys.sort_by(|a, b| partitioner.compare(a, b));

    let descriptor = Descriptor::new(temp.path(), "users", 9).unwrap();
    let mut writer =
        SSTableWriter::open(descriptor, 40, Arc::clone(&partitioner), &config).unwrap();
    for k in &keys {
        writer.append_value(k, k.key()).unwrap();
    }
    let handle = writer.finalize(0.0).unwrap();

    let reopened = SSTableReader::open(&handle.path(), partitioner, 4, 0.0).unwrap();
    assert_eq!(reopened.index_positions(), handle.index_positions());
    for k in &keys {
        assert_eq!(reopened.get(k).unwrap().as_deref(), Some(k.key()));
    }
    let scanned: Vec<DecoratedKey> = reopened.iter().unwrap().map(|r| r.unwrap().0).collect();
    assert_eq!(scanned, keys);
}

// =============================================================================
// Key Cache
// =============================================================================

#[test]
fn test_key_cache_hits() {
    let temp = TempDir::new().unwrap();
    let handle = setup_segment(temp.path(), 100, 0.1);
    let cache = handle.key_cache().unwrap();
    assert_eq!(cache.capacity(), 10);

    let k = key(&key_name(20));
    let first = handle.get_position(&k).unwrap();
    let second = handle.get_position(&k).unwrap();

    assert_eq!(first, second);
    assert_eq!(cache.misses(), 1);
    assert_eq!(cache.hits(), 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_key_cache_stays_bounded() {
    let temp = TempDir::new().unwrap();
    let handle = setup_segment(temp.path(), 100, 0.05);

    for i in (0..200).step_by(2) {
        handle.get(&key(&key_name(i))).unwrap();
    }

    assert_eq!(handle.key_cache().unwrap().len(), 5);
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_gets() {
    let temp = TempDir::new().unwrap();
    let handle = Arc::new(setup_segment(temp.path(), 500, 0.1));

    crossbeam::scope(|s| {
        for t in 0..4 {
            let handle = Arc::clone(&handle);
            s.spawn(move |_| {
                for i in (t * 2..1000).step_by(8) {
                    assert_eq!(handle.get(&key(&key_name(i))).unwrap(), Some(value_of(i)));
                }
            });
        }
    })
    .unwrap();
}
