//! Record encoding shared by the writer and the reader
//!
//! All integers are big-endian.
//! ```text
//! disk key:      [len: u16][bytes]
//! data record:   [disk key][raw_len: i32][raw bytes]
//!            or  [disk key][codec_id: i32][raw_len: i32][compressed_len: i32][compressed bytes]
//! index entry:   [disk key][data offset: i64]
//! ```
//! Codec ids of real codecs are negative and raw lengths are always
//! positive, so the first integer of a record body tells the two shapes
//! apart without consulting configuration.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use bytes::{BufMut, BytesMut};

use crate::compression::{self, CompressionMethod};
use crate::error::{Result, RingError};

/// Bytes of the three integers heading a compressed record body
const COMPRESSED_HEADER_SIZE: u64 = 12;

pub(crate) fn put_disk_key(buf: &mut BytesMut, disk_key: &[u8]) -> Result<()> {
    let len = u16::try_from(disk_key.len()).map_err(|_| {
        RingError::InvalidKey(format!(
            "disk key of {} bytes exceeds {} byte limit",
            disk_key.len(),
            u16::MAX
        ))
    })?;
    buf.put_u16(len);
    buf.put_slice(disk_key);
    Ok(())
}

pub(crate) fn put_raw_body(buf: &mut BytesMut, value: &[u8]) {
    buf.put_i32(value.len() as i32);
    buf.put_slice(value);
}

pub(crate) fn put_compressed_body(
    buf: &mut BytesMut,
    codec_id: i32,
    raw_len: usize,
    compressed: &[u8],
) -> Result<()> {
    let too_long = |what: &str, len: usize| {
        RingError::InvalidValue(format!(
            "{} length {} exceeds {} bytes",
            what,
            len,
            i32::MAX
        ))
    };
    let raw = i32::try_from(raw_len).map_err(|_| too_long("raw", raw_len))?;
    let packed =
        i32::try_from(compressed.len()).map_err(|_| too_long("compressed", compressed.len()))?;

    buf.put_i32(codec_id);
    buf.put_i32(raw);
    buf.put_i32(packed);
    buf.put_slice(compressed);
    Ok(())
}

pub(crate) fn put_index_entry(buf: &mut BytesMut, disk_key: &[u8], data_offset: u64) -> Result<()> {
    put_disk_key(buf, disk_key)?;
    buf.put_i64(data_offset as i64);
    Ok(())
}

// =============================================================================
// Decoding
// =============================================================================

fn read_u16<R: Read>(reader: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

fn read_i32<R: Read>(reader: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

fn read_i64<R: Read>(reader: &mut R) -> io::Result<i64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(i64::from_be_bytes(buf))
}

pub(crate) fn read_disk_key<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let len = read_u16(reader)? as usize;
    let mut key = vec![0u8; len];
    reader.read_exact(&mut key)?;
    Ok(key)
}

/// Returns `(disk key, data offset, encoded size)`
pub(crate) fn read_index_entry<R: Read>(reader: &mut R) -> io::Result<(Vec<u8>, u64, u64)> {
    let key = read_disk_key(reader)?;
    let offset = read_i64(reader)?;
    let size = 2 + key.len() as u64 + 8;
    Ok((key, offset as u64, size))
}

/// One decoded data record
pub(crate) struct Record {
    pub disk_key: Vec<u8>,
    pub value: Vec<u8>,
    /// Offset just past this record
    pub next_position: u64,
}

/// Decode the record starting at `position`; `reader` must be positioned
/// there. Compressed values are expanded through a ranged reader over
/// `data_path`.
pub(crate) fn read_record(
    data_path: &Path,
    reader: &mut BufReader<File>,
    position: u64,
) -> Result<Record> {
    let disk_key = read_disk_key(reader)?;
    let body_start = position + 2 + disk_key.len() as u64;
    let head = read_i32(reader)?;

    if head > 0 {
        let mut value = Vec::with_capacity(initial_capacity(head));
        reader.by_ref().take(head as u64).read_to_end(&mut value)?;
        if value.len() != head as usize {
            return Err(RingError::Corruption(format!(
                "record at {} in {} truncated: {} of {} value bytes",
                position,
                data_path.display(),
                value.len(),
                head
            )));
        }
        return Ok(Record {
            disk_key,
            value,
            next_position: body_start + 4 + head as u64,
        });
    }

    let method = compression::id_to_codec(head);
    if method == CompressionMethod::None {
        return Err(RingError::Corruption(format!(
            "record at {} in {} has invalid body header {}",
            position,
            data_path.display(),
            head
        )));
    }
    let raw_len = read_i32(reader)?;
    let compressed_len = read_i32(reader)?;
    if raw_len <= 0 || compressed_len < 0 {
        return Err(RingError::Corruption(format!(
            "record at {} in {} has lengths raw={} compressed={}",
            position,
            data_path.display(),
            raw_len,
            compressed_len
        )));
    }

    let value_start = body_start + COMPRESSED_HEADER_SIZE;
    let mut value = Vec::with_capacity(initial_capacity(raw_len));
    compression::decompress(
        method,
        data_path,
        value_start,
        compressed_len as u64,
        raw_len as usize,
    )?
    .take(raw_len as u64 + 1)
    .read_to_end(&mut value)?;
    if value.len() != raw_len as usize {
        return Err(RingError::Corruption(format!(
            "record at {} in {} expanded to {} bytes, expected {}",
            position,
            data_path.display(),
            value.len(),
            raw_len
        )));
    }
    reader.seek_relative(i64::from(compressed_len))?;

    Ok(Record {
        disk_key,
        value,
        next_position: value_start + compressed_len as u64,
    })
}

/// Lengths read from disk only size the first allocation up to a bound;
/// the buffer grows as bytes actually arrive
fn initial_capacity(len: i32) -> usize {
    (len.max(0) as usize).min(compression::WORKING_BUFFER_SIZE)
}
