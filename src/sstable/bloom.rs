//! Bloom Filter
//!
//! Probabilistic set of the disk-encoded keys of one segment.
//!
//! ## Serialized Form
//! ```text
//! ┌──────────────┬──────────────┬──────────────────────────┐
//! │ CRC32 (4 BE) │ Len (8 BE)   │ bincode(BloomFilter)     │
//! └──────────────┴──────────────┴──────────────────────────┘
//! ```

use std::f64::consts::LN_2;
use std::io::{self, Read, Write};

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RingError};

/// Extra bits added on top of `expected * buckets_per_element`
const EXCESS_BITS: u64 = 20;

/// Largest filter we agree to allocate (512 MiB of bits)
const MAX_BITS: u64 = u32::MAX as u64;

const MAX_HASHES: u32 = 16;

const HEADER_SIZE: usize = 12;

const SECOND_HASH_SEED: u64 = 0x9747_b28c;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloomFilter {
    hash_count: u32,
    num_bits: u64,
    words: Vec<u64>,
}

impl BloomFilter {
    /// Filter sized for `expected_keys` at `buckets_per_element` bits each.
    ///
    /// Sizes that do not fit are reported as `InvalidInput` I/O errors
    /// rather than silently truncated.
    pub fn new(expected_keys: u64, buckets_per_element: u32) -> Result<Self> {
        let num_bits = expected_keys
            .max(1)
            .checked_mul(u64::from(buckets_per_element.max(1)))
            .and_then(|bits| bits.checked_add(EXCESS_BITS))
            .filter(|bits| *bits <= MAX_BITS)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!(
                        "bloom filter for {} keys at {} buckets per element exceeds {} bits",
                        expected_keys, buckets_per_element, MAX_BITS
                    ),
                )
            })?;

        let hash_count = ((f64::from(buckets_per_element) * LN_2).round() as u32).clamp(1, MAX_HASHES);
        let words = vec![0u64; num_bits.div_ceil(64) as usize];

        Ok(Self {
            hash_count,
            num_bits,
            words,
        })
    }

    pub fn add(&mut self, key: &[u8]) {
        for bit in bit_indexes(key, self.hash_count, self.num_bits) {
            self.words[(bit / 64) as usize] |= 1u64 << (bit % 64);
        }
    }

    /// False means the key was never added
    pub fn might_contain(&self, key: &[u8]) -> bool {
        bit_indexes(key, self.hash_count, self.num_bits)
            .all(|bit| self.words[(bit / 64) as usize] & (1u64 << (bit % 64)) != 0)
    }

    pub fn hash_count(&self) -> u32 {
        self.hash_count
    }

    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    pub fn serialize<W: Write>(&self, writer: &mut W) -> Result<()> {
        let body = bincode::serialize(self)?;
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + body.len());
        buf.put_u32(crc32fast::hash(&body));
        buf.put_u64(body.len() as u64);
        buf.put_slice(&body);
        writer.write_all(&buf)?;
        Ok(())
    }

    pub fn deserialize<R: Read>(reader: &mut R) -> Result<Self> {
        let mut header = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header)?;
        let mut header = &header[..];
        let expected_crc = header.get_u32();
        let len = header.get_u64();

        let mut body = Vec::new();
        reader.by_ref().take(len).read_to_end(&mut body)?;
        if body.len() as u64 != len {
            return Err(RingError::Corruption(format!(
                "bloom filter truncated: expected {} bytes, found {}",
                len,
                body.len()
            )));
        }
        if crc32fast::hash(&body) != expected_crc {
            return Err(RingError::Corruption(
                "bloom filter checksum mismatch".to_string(),
            ));
        }

        let filter: BloomFilter = bincode::deserialize(&body)?;
        if filter.num_bits == 0 || filter.words.len() as u64 != filter.num_bits.div_ceil(64) {
            return Err(RingError::Corruption(
                "bloom filter geometry does not match its bitset".to_string(),
            ));
        }
        Ok(filter)
    }
}

/// Double-hashing bit positions of `key`.
///
/// `h1` derives from the key's CRC32 and `h2` from a multiplicative hash
/// of its bytes. CRC32 is linear, so a second CRC would collide exactly
/// when the first one does.
fn bit_indexes(key: &[u8], hash_count: u32, num_bits: u64) -> impl Iterator<Item = u64> {
    let crc = u64::from(crc32fast::hash(key));
    let h1 = fmix64((crc << 32) | (key.len() as u64 & 0xffff_ffff));
    let h2 = fmix64(mix_bytes(key, SECOND_HASH_SEED)) | 1;

    (0..u64::from(hash_count)).map(move |i| h1.wrapping_add(i.wrapping_mul(h2)) % num_bits)
}

/// Word-at-a-time multiply-rotate hash over the key bytes
fn mix_bytes(data: &[u8], seed: u64) -> u64 {
    let mut h = seed.wrapping_add(data.len() as u64);
    for chunk in data.chunks(8) {
        let mut word = [0u8; 8];
        word[..chunk.len()].copy_from_slice(chunk);
        h = h
            .wrapping_mul(0x9e37_79b9_7f4a_7c15)
            .wrapping_add(u64::from_le_bytes(word));
        h = h.rotate_left(31);
    }
    h
}

/// MurmurHash3 64-bit finalizer
fn fmix64(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51_afd7_ed55_8ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    k ^= k >> 33;
    k
}
