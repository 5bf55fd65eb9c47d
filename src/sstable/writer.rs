//! SSTable Writer
//!
//! Writes a strictly non-decreasing stream of keys into a temporary
//! segment, then finalizes it into a permanent one.
//!
//! ## Lifecycle
//! ```text
//! open ──► Open ──append*──► Open ──finalize──► Closed
//! ```
//! `finalize` is the only transition out of `Open`. Every call made after it
//! fails with `InvalidState`.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::sync::Arc;

use bytes::BytesMut;

use crate::compression::{self, CompressionMethod};
use crate::config::Config;
use crate::error::{Result, RingError};
use crate::partitioner::{DecoratedKey, Partitioner};

use super::format;
use super::rename;
use super::{BloomFilter, Descriptor, KeyCache, KeyPosition, SSTableReader};

/// Builds one segment from sorted input
///
/// ## Concurrency:
/// Not synchronized. A writer belongs to the single task producing its
/// keys from `open` until `finalize`.
pub struct SSTableWriter {
    descriptor: Descriptor,
    partitioner: Arc<dyn Partitioner>,
    compression: CompressionMethod,
    index_interval: u64,
    state: WriterState,
    last_written_key: Option<DecoratedKey>,
    keys_written: u64,
}

enum WriterState {
    Open(OpenSegment),
    Closed,
}

/// Everything a writer owns until it hands the segment off
struct OpenSegment {
    data_file: BufWriter<File>,
    /// Bytes written to the data file so far
    data_position: u64,
    index_file: BufWriter<File>,
    /// Bytes written to the index file so far
    index_position: u64,
    bloom_filter: BloomFilter,
    index_positions: Vec<KeyPosition>,
}

impl SSTableWriter {
    /// Create the temporary data and index files of a new segment.
    ///
    /// The bloom filter is sized for `expected_key_count` keys.
    pub fn open(
        descriptor: Descriptor,
        expected_key_count: u64,
        partitioner: Arc<dyn Partitioner>,
        config: &Config,
    ) -> Result<Self> {
        if !descriptor.is_temporary() {
            return Err(RingError::InvalidState(format!(
                "cannot write into permanent segment {}",
                descriptor
            )));
        }
        config.validate()?;
        fs::create_dir_all(descriptor.dir())?;

        let bloom_filter = BloomFilter::new(expected_key_count, config.bloom_buckets_per_element)?;
        let data_file = BufWriter::with_capacity(
            config.data_buffer_size(),
            open_read_write(&descriptor.data_path())?,
        );
        let index_file = BufWriter::with_capacity(
            config.index_buffer_size(),
            open_read_write(&descriptor.index_path())?,
        );

        tracing::debug!(
            "Opened segment writer {} for {} expected keys (compression={})",
            descriptor,
            expected_key_count,
            config.compression
        );

        Ok(Self {
            descriptor,
            partitioner,
            compression: config.compression,
            index_interval: config.index_interval,
            state: WriterState::Open(OpenSegment {
                data_file,
                data_position: 0,
                index_file,
                index_position: 0,
                bloom_filter,
                index_positions: Vec::new(),
            }),
            last_written_key: None,
            keys_written: 0,
        })
    }

    /// Append the whole of `value` under `key`
    pub fn append_value(&mut self, key: &DecoratedKey, value: &[u8]) -> Result<()> {
        self.append(key, value, value.len())
    }

    /// Append the first `length` bytes of `value` under `key`.
    ///
    /// `key` must not sort before the previously appended key. Nothing is
    /// written when validation fails, but the segment must still be
    /// abandoned: callers never skip a bad record and carry on.
    pub fn append(&mut self, key: &DecoratedKey, value: &[u8], length: usize) -> Result<()> {
        self.before_append(key)?;
        if length == 0 || length > value.len() || length > i32::MAX as usize {
            return Err(RingError::InvalidValue(format!(
                "value length {} not in 1..={} (buffer holds {} bytes)",
                length,
                value.len().min(i32::MAX as usize),
                value.len()
            )));
        }

        let disk_key = self.partitioner.to_disk_format(key);

        let mut record = BytesMut::with_capacity(2 + disk_key.len() + 12 + length);
        format::put_disk_key(&mut record, &disk_key)?;
        if self.compression != CompressionMethod::None {
            let compressed = compression::compress(self.compression, value, length)?;
            format::put_compressed_body(
                &mut record,
                compression::codec_to_id(self.compression),
                length,
                &compressed,
            )?;
        } else {
            format::put_raw_body(&mut record, &value[..length]);
        }

        let mut entry = BytesMut::with_capacity(2 + disk_key.len() + 8);

        let WriterState::Open(segment) = &mut self.state else {
            unreachable!("checked by before_append");
        };

        let current_position = segment.data_position;
        format::put_index_entry(&mut entry, &disk_key, current_position)?;

        segment.data_file.write_all(&record)?;
        segment.data_position += record.len() as u64;

        segment.bloom_filter.add(&disk_key);
        self.last_written_key = Some(key.clone());

        let index_position = segment.index_position;
        segment.index_file.write_all(&entry)?;
        segment.index_position += entry.len() as u64;
        tracing::trace!("wrote {} at {}", key, current_position);

        let sampled = self.keys_written % self.index_interval == 0;
        self.keys_written += 1;
        if sampled {
            segment
                .index_positions
                .push(KeyPosition::new(key.clone(), index_position));
            tracing::trace!("wrote index of {} at {}", key, index_position);
        }

        Ok(())
    }

    /// Validate `key` against the writer state and the last written key
    fn before_append(&self, key: &DecoratedKey) -> Result<()> {
        if !matches!(self.state, WriterState::Open(_)) {
            return Err(RingError::InvalidState(format!(
                "segment {} is already finalized",
                self.descriptor
            )));
        }
        if key.is_empty() {
            return Err(RingError::InvalidKey("keys must not be empty".to_string()));
        }
        if let Some(last) = &self.last_written_key {
            if self.partitioner.compare(last, key).is_gt() {
                tracing::info!("Last written key : {}", last);
                tracing::info!("Current key : {}", key);
                tracing::info!("Writing into file {}", self.descriptor);
                return Err(RingError::OutOfOrderKey {
                    last: last.to_string(),
                    current: key.to_string(),
                    path: self.descriptor.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Seal the segment and hand it to the read side.
    ///
    /// Order matters for crash safety:
    /// 1. filter written and synced
    /// 2. index synced and closed
    /// 3. data synced and closed
    /// 4. index, filter, data renamed to permanent names (data last)
    ///
    /// On error the temporary files stay on disk and the writer is closed.
    pub fn finalize(&mut self, cache_fraction: f64) -> Result<SSTableReader> {
        let segment = match std::mem::replace(&mut self.state, WriterState::Closed) {
            WriterState::Open(segment) => segment,
            WriterState::Closed => {
                return Err(RingError::InvalidState(format!(
                    "segment {} is already finalized",
                    self.descriptor
                )))
            }
        };
        let OpenSegment {
            data_file,
            index_file,
            bloom_filter,
            index_positions,
            ..
        } = segment;

        // bloom filter
        let mut filter_file = BufWriter::new(File::create(self.descriptor.filter_path())?);
        bloom_filter.serialize(&mut filter_file)?;
        close_synced(filter_file)?;

        // index
        close_synced(index_file)?;

        // main data
        close_synced(data_file)?;

        tracing::debug!("Synced {} keys into {}", self.keys_written, self.descriptor);

        let descriptor = rename::rename_components(&self.descriptor)?;

        let key_cache = (cache_fraction > 0.0)
            .then(|| KeyCache::new((cache_fraction * self.keys_written as f64) as usize));

        Ok(SSTableReader::from_parts(
            descriptor,
            Arc::clone(&self.partitioner),
            index_positions,
            bloom_filter,
            key_cache,
        ))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn keys_written(&self) -> u64 {
        self.keys_written
    }

    pub fn last_written_key(&self) -> Option<&DecoratedKey> {
        self.last_written_key.as_ref()
    }

    /// Sparse index samples taken so far; empty once finalized
    pub fn index_positions(&self) -> &[KeyPosition] {
        match &self.state {
            WriterState::Open(segment) => &segment.index_positions,
            WriterState::Closed => &[],
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, WriterState::Closed)
    }
}

fn open_read_write(path: &std::path::Path) -> Result<File> {
    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?)
}

/// Flush, fsync and drop a buffered file
fn close_synced(writer: BufWriter<File>) -> Result<()> {
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}
