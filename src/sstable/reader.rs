//! SSTable Reader
//!
//! Read side of a finalized segment. Owns the immutable sparse index and
//! bloom filter handed over by the writer (or rebuilt from disk) and
//! serves point lookups and full scans.

use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Result, RingError};
use crate::partitioner::{DecoratedKey, Partitioner};

use super::format;
use super::{BloomFilter, Descriptor, KeyCache, KeyPosition};

/// Immutable handle over a permanent segment
///
/// ## Concurrency:
/// Every method takes `&self` and opens its own file handles, so a reader
/// can be shared across threads behind an `Arc`. Only the key cache
/// mutates, under its own lock.
#[derive(Debug)]
pub struct SSTableReader {
    descriptor: Descriptor,
    partitioner: Arc<dyn Partitioner>,
    index_positions: Vec<KeyPosition>,
    bloom_filter: BloomFilter,
    key_cache: Option<KeyCache>,
}

impl SSTableReader {
    /// Handoff constructor used when a writer finalizes
    pub fn from_parts(
        descriptor: Descriptor,
        partitioner: Arc<dyn Partitioner>,
        index_positions: Vec<KeyPosition>,
        bloom_filter: BloomFilter,
        key_cache: Option<KeyCache>,
    ) -> Self {
        Self {
            descriptor,
            partitioner,
            index_positions,
            bloom_filter,
            key_cache,
        }
    }

    /// Open a segment from disk.
    ///
    /// Loads the bloom filter and rebuilds the sparse index by sampling
    /// every `index_interval`-th entry of the index file.
    pub fn open(
        data_path: &Path,
        partitioner: Arc<dyn Partitioner>,
        index_interval: u64,
        cache_fraction: f64,
    ) -> Result<Self> {
        let (descriptor, _) = Descriptor::from_path(data_path)?;
        let index_interval = index_interval.max(1);

        let mut filter_file = BufReader::new(File::open(descriptor.filter_path())?);
        let bloom_filter = BloomFilter::deserialize(&mut filter_file)?;

        let index_path = descriptor.index_path();
        let index_file = File::open(&index_path)?;
        let index_len = index_file.metadata()?.len();
        let mut index = BufReader::new(index_file);

        let mut index_positions = Vec::new();
        let mut position = 0u64;
        let mut keys = 0u64;
        while position < index_len {
            let (disk_key, _, size) = format::read_index_entry(&mut index).map_err(|e| {
                RingError::Corruption(format!(
                    "index {} truncated at {}: {}",
                    index_path.display(),
                    position,
                    e
                ))
            })?;
            if keys % index_interval == 0 {
                let key = partitioner.from_disk_format(&disk_key)?;
                index_positions.push(KeyPosition::new(key, position));
            }
            keys += 1;
            position += size;
        }

        let key_cache =
            (cache_fraction > 0.0).then(|| KeyCache::new((cache_fraction * keys as f64) as usize));

        tracing::debug!(
            "Opened {} ({} keys, {} index samples)",
            descriptor,
            keys,
            index_positions.len()
        );

        Ok(Self::from_parts(
            descriptor,
            partitioner,
            index_positions,
            bloom_filter,
            key_cache,
        ))
    }

    /// Point lookup
    pub fn get(&self, key: &DecoratedKey) -> Result<Option<Vec<u8>>> {
        let disk_key = self.partitioner.to_disk_format(key);
        if !self.bloom_filter.might_contain(&disk_key) {
            return Ok(None);
        }

        let Some(position) = self.get_position(key)? else {
            return Ok(None);
        };

        let data_path = self.descriptor.data_path();
        let mut data = BufReader::new(File::open(&data_path)?);
        data.seek(SeekFrom::Start(position))?;
        let record = format::read_record(&data_path, &mut data, position)?;
        if record.disk_key != disk_key {
            return Err(RingError::Corruption(format!(
                "index of {} points at a different key at {}",
                self.descriptor, position
            )));
        }
        Ok(Some(record.value))
    }

    /// Offset of `key`'s record in the data file
    pub fn get_position(&self, key: &DecoratedKey) -> Result<Option<u64>> {
        if let Some(cache) = &self.key_cache {
            if let Some(position) = cache.get(key) {
                return Ok(Some(position));
            }
        }

        // last sample not after `key`
        let idx = self
            .index_positions
            .partition_point(|sample| self.partitioner.compare(&sample.key, key).is_le());
        if idx == 0 {
            return Ok(None);
        }
        let start = self.index_positions[idx - 1].position;

        let index_path = self.descriptor.index_path();
        let index_file = File::open(&index_path)?;
        let index_len = index_file.metadata()?.len();
        let mut index = BufReader::new(index_file);
        index.seek(SeekFrom::Start(start))?;

        let mut position = start;
        while position < index_len {
            let (disk_key, data_offset, size) = format::read_index_entry(&mut index)?;
            let candidate = self.partitioner.from_disk_format(&disk_key)?;
            match self.partitioner.compare(&candidate, key) {
                std::cmp::Ordering::Less => position += size,
                std::cmp::Ordering::Equal => {
                    if let Some(cache) = &self.key_cache {
                        cache.insert(key.clone(), data_offset);
                    }
                    return Ok(Some(data_offset));
                }
                std::cmp::Ordering::Greater => break,
            }
        }
        Ok(None)
    }

    /// Bloom filter check on a decorated key
    pub fn might_contain(&self, key: &DecoratedKey) -> bool {
        self.bloom_filter
            .might_contain(&self.partitioner.to_disk_format(key))
    }

    /// Scan every record in key order
    pub fn iter(&self) -> Result<SSTableIterator> {
        SSTableIterator::new(self.descriptor.data_path(), Arc::clone(&self.partitioner))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn path(&self) -> PathBuf {
        self.descriptor.data_path()
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn partitioner(&self) -> &Arc<dyn Partitioner> {
        &self.partitioner
    }

    pub fn index_positions(&self) -> &[KeyPosition] {
        &self.index_positions
    }

    pub fn bloom_filter(&self) -> &BloomFilter {
        &self.bloom_filter
    }

    pub fn key_cache(&self) -> Option<&KeyCache> {
        self.key_cache.as_ref()
    }
}

/// Sequential scan over the records of a data file
pub struct SSTableIterator {
    data_path: PathBuf,
    reader: BufReader<File>,
    partitioner: Arc<dyn Partitioner>,
    position: u64,
    end: u64,
}

impl SSTableIterator {
    fn new(data_path: PathBuf, partitioner: Arc<dyn Partitioner>) -> Result<Self> {
        let file = File::open(&data_path)?;
        let end = file.metadata()?.len();
        Ok(Self {
            data_path,
            reader: BufReader::new(file),
            partitioner,
            position: 0,
            end,
        })
    }

    fn read_next(&mut self) -> Result<(DecoratedKey, Vec<u8>)> {
        let record = format::read_record(&self.data_path, &mut self.reader, self.position)?;
        self.position = record.next_position;
        let key = self.partitioner.from_disk_format(&record.disk_key)?;
        Ok((key, record.value))
    }
}

impl Iterator for SSTableIterator {
    type Item = Result<(DecoratedKey, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.end {
            return None;
        }
        let item = self.read_next();
        if item.is_err() {
            // stop after the first bad record
            self.position = self.end;
        }
        Some(item)
    }
}
