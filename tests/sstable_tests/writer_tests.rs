//! Tests for the SSTable writer
//!
//! These tests verify:
//! - Sort order enforcement (duplicates allowed, regressions rejected)
//! - Key and value validation
//! - Sparse index sampling
//! - Finalize: permanent names, closed state, handoff contents
//! - On-disk record layout, with and without compression

use std::fs;
use std::path::Path;
use std::sync::Arc;

use ringstore::compression::CompressionMethod;
use ringstore::partitioner::{HashPartitioner, OrderPreservingPartitioner, Partitioner};
use ringstore::sstable::{Descriptor, SSTableWriter};
use ringstore::{Config, DecoratedKey, RingError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn config(dir: &Path, index_interval: u64) -> Config {
    Config::builder()
        .data_dir(dir)
        .index_interval(index_interval)
        .flush_data_buffer_size_mb(0.01)
        .flush_index_buffer_size_mb(0.01)
        .build()
}

fn open_writer(dir: &Path, config: &Config, expected: u64) -> SSTableWriter {
    let descriptor = Descriptor::new(dir, "users", 1).unwrap();
    SSTableWriter::open(
        descriptor,
        expected,
        Arc::new(OrderPreservingPartitioner),
        config,
    )
    .unwrap()
}

fn key(s: &str) -> DecoratedKey {
    OrderPreservingPartitioner.decorate_key(s.as_bytes())
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// =============================================================================
// Sort Order
// =============================================================================

#[test]
fn test_sorted_appends_succeed() {
    let temp = TempDir::new().unwrap();
    let config = config(temp.path(), 128);
    let mut writer = open_writer(temp.path(), &config, 100);

    for i in 0..100 {
        let k = key(&format!("key{:05}", i));
        writer.append_value(&k, format!("value{}", i).as_bytes()).unwrap();
    }

    assert_eq!(writer.keys_written(), 100);
    assert_eq!(writer.last_written_key(), Some(&key("key00099")));
}

#[test]
fn test_duplicate_keys_allowed() {
    let temp = TempDir::new().unwrap();
    let config = config(temp.path(), 128);
    let mut writer = open_writer(temp.path(), &config, 3);

    writer.append_value(&key("b"), b"1").unwrap();
    writer.append_value(&key("b"), b"2").unwrap();
    writer.append_value(&key("b"), b"3").unwrap();

    assert_eq!(writer.keys_written(), 3);
}

#[test]
fn test_out_of_order_key_rejected() {
    let temp = TempDir::new().unwrap();
    let config = config(temp.path(), 128);
    let mut writer = open_writer(temp.path(), &config, 3);

    writer.append_value(&key("m"), b"1").unwrap();
    let result = writer.append_value(&key("a"), b"2");

    match result {
        Err(RingError::OutOfOrderKey { last, current, path }) => {
            assert!(last.contains('m'));
            assert!(current.contains('a'));
            assert!(path.ends_with("users-tmp-1-Data.db"));
        }
        other => panic!("expected OutOfOrderKey, got {:?}", other),
    }
    assert_eq!(writer.keys_written(), 1);
    assert_eq!(writer.last_written_key(), Some(&key("m")));
}

#[test]
fn test_rejected_key_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let config = config(temp.path(), 1);
    let mut writer = open_writer(temp.path(), &config, 3);

    writer.append_value(&key("m"), b"1").unwrap();
    assert!(writer.append_value(&key("a"), b"2").is_err());
    let handle = writer.finalize(0.0).unwrap();

    let records: Vec<_> = handle.iter().unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(records, vec![(key("m"), b"1".to_vec())]);
}

#[test]
fn test_hash_partitioner_order_is_enforced() {
    let temp = TempDir::new().unwrap();
    let config = config(temp.path(), 4);
    let partitioner = Arc::new(HashPartitioner);
    let descriptor = Descriptor::new(temp.path(), "events", 3).unwrap();
    let mut writer =
        SSTableWriter::open(descriptor, 50, partitioner.clone(), &config).unwrap();

    let mut keys: Vec<DecoratedKey> = (0..50)
        .map(|i| partitioner.decorate_key(format!("event{}", i).as_bytes()))
        .collect();
    keys.sort_by(|a, b| partitioner.compare(a, b));

    for k in &keys {
        writer.append_value(k, k.key()).unwrap();
    }
    assert_eq!(writer.keys_written(), 50);

    // going back to the smallest token is a regression
    let result = writer.append_value(&keys[0], b"again");
    assert!(matches!(result, Err(RingError::OutOfOrderKey { .. })));
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_empty_key_rejected() {
    let temp = TempDir::new().unwrap();
    let config = config(temp.path(), 128);
    let mut writer = open_writer(temp.path(), &config, 1);

    let result = writer.append_value(&key(""), b"value");
    assert!(matches!(result, Err(RingError::InvalidKey(_))));
    assert_eq!(writer.keys_written(), 0);
}

#[test]
fn test_empty_value_rejected() {
    let temp = TempDir::new().unwrap();
    let config = config(temp.path(), 128);
    let mut writer = open_writer(temp.path(), &config, 1);

    let result = writer.append(&key("a"), b"value", 0);
    assert!(matches!(result, Err(RingError::InvalidValue(_))));

    let result = writer.append(&key("a"), b"value", 6);
    assert!(matches!(result, Err(RingError::InvalidValue(_))));
    assert_eq!(writer.keys_written(), 0);
}

#[test]
fn test_length_prefix_of_buffer_is_stored() {
    let temp = TempDir::new().unwrap();
    let config = config(temp.path(), 128);
    let mut writer = open_writer(temp.path(), &config, 1);

    writer.append(&key("a"), b"hello world", 5).unwrap();
    let handle = writer.finalize(0.0).unwrap();

    assert_eq!(handle.get(&key("a")).unwrap(), Some(b"hello".to_vec()));
}

#[test]
fn test_writer_requires_temporary_descriptor() {
    let temp = TempDir::new().unwrap();
    let config = config(temp.path(), 128);
    let descriptor = Descriptor::new(temp.path(), "users", 1).unwrap().as_permanent();

    let result = SSTableWriter::open(
        descriptor,
        1,
        Arc::new(OrderPreservingPartitioner),
        &config,
    );
    assert!(matches!(result, Err(RingError::InvalidState(_))));
}

#[test]
fn test_oversized_bloom_filter_is_io_error() {
    let temp = TempDir::new().unwrap();
    let config = config(temp.path(), 128);
    let descriptor = Descriptor::new(temp.path(), "users", 1).unwrap();

    let result = SSTableWriter::open(
        descriptor,
        u64::MAX,
        Arc::new(OrderPreservingPartitioner),
        &config,
    );
    assert!(matches!(result, Err(RingError::Io(_))));
}

// =============================================================================
// Sparse Index
// =============================================================================

/// Index entry size for a single-byte OrderPreserving key: len(2) + key(1) + offset(8)
const ONE_BYTE_ENTRY: u64 = 11;

#[test]
fn test_sparse_index_sample_count() {
    for (n, k) in [(1u64, 1u64), (1, 4), (4, 4), (5, 4), (9, 4), (10, 3), (26, 128)] {
        let temp = TempDir::new().unwrap();
        let config = config(temp.path(), k);
        let mut writer = open_writer(temp.path(), &config, n);

        for i in 0..n {
            let letter = ((b'a' + i as u8) as char).to_string();
            writer.append_value(&key(&letter), b"v").unwrap();
        }

        let samples = writer.index_positions();
        assert_eq!(samples.len() as u64, n.div_ceil(k), "n={} k={}", n, k);
        assert_eq!(samples[0].key, key("a"));
        for (j, sample) in samples.iter().enumerate() {
            assert_eq!(sample.position, j as u64 * k * ONE_BYTE_ENTRY);
        }
    }
}

#[test]
fn test_example_segment() {
    let temp = TempDir::new().unwrap();
    let config = config(temp.path(), 2);
    let mut writer = open_writer(temp.path(), &config, 4);

    for (k, v) in [("a", 1u8), ("b", 2), ("b", 3), ("c", 4)] {
        writer.append_value(&key(k), &[v]).unwrap();
    }

    let samples = writer.index_positions().to_vec();
    assert_eq!(samples.len(), 2);
    assert_eq!(samples[0].key, key("a"));
    assert_eq!(samples[0].position, 0);
    assert_eq!(samples[1].key, key("b"));
    assert_eq!(samples[1].position, 2 * ONE_BYTE_ENTRY);

    let handle = writer.finalize(0.0).unwrap();
    assert_eq!(handle.index_positions(), samples.as_slice());
    assert!(handle.might_contain(&key("a")));
    assert!(handle.might_contain(&key("b")));
    assert!(handle.might_contain(&key("c")));
    assert!(!handle.might_contain(&key("z")));
}

// =============================================================================
// Finalize
// =============================================================================

#[test]
fn test_finalize_produces_permanent_files() {
    let temp = TempDir::new().unwrap();
    let config = config(temp.path(), 128);
    let mut writer = open_writer(temp.path(), &config, 2);

    writer.append_value(&key("a"), b"1").unwrap();
    writer.append_value(&key("b"), b"2").unwrap();

    assert_eq!(
        file_names(temp.path()),
        vec!["users-tmp-1-Data.db", "users-tmp-1-Index.db"]
    );

    let handle = writer.finalize(0.0).unwrap();

    assert_eq!(
        file_names(temp.path()),
        vec!["users-1-Data.db", "users-1-Filter.db", "users-1-Index.db"]
    );
    assert_eq!(handle.path(), temp.path().join("users-1-Data.db"));
    assert!(!handle.descriptor().is_temporary());
}

#[test]
fn test_append_after_finalize_fails() {
    let temp = TempDir::new().unwrap();
    let config = config(temp.path(), 128);
    let mut writer = open_writer(temp.path(), &config, 2);

    writer.append_value(&key("a"), b"1").unwrap();
    writer.finalize(0.0).unwrap();

    assert!(writer.is_closed());
    let result = writer.append_value(&key("b"), b"2");
    assert!(matches!(result, Err(RingError::InvalidState(_))));
    assert_eq!(writer.keys_written(), 1);

    let result = writer.finalize(0.0);
    assert!(matches!(result, Err(RingError::InvalidState(_))));
}

#[test]
fn test_finalize_empty_segment() {
    let temp = TempDir::new().unwrap();
    let config = config(temp.path(), 128);
    let mut writer = open_writer(temp.path(), &config, 0);

    let handle = writer.finalize(0.5).unwrap();

    assert!(handle.index_positions().is_empty());
    assert_eq!(handle.iter().unwrap().count(), 0);
    assert_eq!(handle.get(&key("a")).unwrap(), None);
}

#[test]
fn test_key_cache_sized_from_fraction() {
    let temp = TempDir::new().unwrap();
    let config = config(temp.path(), 128);
    let mut writer = open_writer(temp.path(), &config, 10);

    for i in 0..10 {
        writer.append_value(&key(&format!("k{}", i)), b"v").unwrap();
    }
    let handle = writer.finalize(0.5).unwrap();

    assert_eq!(handle.key_cache().map(|c| c.capacity()), Some(5));
}

#[test]
fn test_no_key_cache_without_fraction() {
    let temp = TempDir::new().unwrap();
    let config = config(temp.path(), 128);
    let mut writer = open_writer(temp.path(), &config, 1);

    writer.append_value(&key("a"), b"v").unwrap();
    let handle = writer.finalize(0.0).unwrap();

    assert!(handle.key_cache().is_none());
}

// =============================================================================
// On-disk Layout
// =============================================================================

#[test]
fn test_uncompressed_record_layout() {
    let temp = TempDir::new().unwrap();
    let config = config(temp.path(), 128);
    let mut writer = open_writer(temp.path(), &config, 2);

    writer.append_value(&key("a"), &[7]).unwrap();
    writer.append_value(&key("bc"), &[8, 9]).unwrap();
    let handle = writer.finalize(0.0).unwrap();

    let data = fs::read(handle.path()).unwrap();
    assert_eq!(
        data,
        vec![
            0, 1, b'a', 0, 0, 0, 1, 7, // first record
            0, 2, b'b', b'c', 0, 0, 0, 2, 8, 9, // second record
        ]
    );

    let index = fs::read(handle.descriptor().index_path()).unwrap();
    assert_eq!(
        index,
        vec![
            0, 1, b'a', 0, 0, 0, 0, 0, 0, 0, 0, // "a" at 0
            0, 2, b'b', b'c', 0, 0, 0, 0, 0, 0, 0, 8, // "bc" at 8
        ]
    );
}

#[test]
fn test_compressed_record_header() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp.path())
        .compression(CompressionMethod::Gzip)
        .build();
    let mut writer = open_writer(temp.path(), &config, 1);

    let value = vec![b'x'; 1000];
    writer.append_value(&key("a"), &value).unwrap();
    let handle = writer.finalize(0.0).unwrap();

    let data = fs::read(handle.path()).unwrap();
    // disk key
    assert_eq!(&data[0..3], &[0, 1, b'a']);
    // codec id -1, raw length 1000
    assert_eq!(i32::from_be_bytes(data[3..7].try_into().unwrap()), -1);
    assert_eq!(i32::from_be_bytes(data[7..11].try_into().unwrap()), 1000);
    let compressed_len = i32::from_be_bytes(data[11..15].try_into().unwrap()) as usize;
    assert_eq!(data.len(), 15 + compressed_len);
    assert!(compressed_len < 1000);
}

#[test]
fn test_compressed_segments_read_back() {
    for method in [CompressionMethod::Gzip, CompressionMethod::Zstd] {
        let temp = TempDir::new().unwrap();
        let config = Config::builder()
            .data_dir(temp.path())
            .compression(method)
            .index_interval(3)
            .build();
        let mut writer = open_writer(temp.path(), &config, 20);

        let values: Vec<Vec<u8>> = (0..20)
            .map(|i| format!("value-{}-", i).repeat(i + 1).into_bytes())
            .collect();
        for (i, value) in values.iter().enumerate() {
            writer.append_value(&key(&format!("key{:03}", i)), value).unwrap();
        }
        let handle = writer.finalize(0.0).unwrap();

        for (i, value) in values.iter().enumerate() {
            let got = handle.get(&key(&format!("key{:03}", i))).unwrap();
            assert_eq!(got.as_ref(), Some(value), "{} key{:03}", method, i);
        }
        let scanned: Vec<Vec<u8>> = handle.iter().unwrap().map(|r| r.unwrap().1).collect();
        assert_eq!(scanned, values);
    }
}
