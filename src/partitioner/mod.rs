//! Partitioner Module
//!
//! Decides how keys are ordered and how they are encoded on disk.
//!
//! ## Responsibilities
//! - Decorate raw keys with a token
//! - Compare decorated keys (the only legal ordering of keys)
//! - Convert decorated keys to and from their on-disk encoding
//!
//! Two implementations ship with the crate:
//! - [`OrderPreservingPartitioner`]: token is the raw key, so segments are
//!   sorted by key bytes
//! - [`HashPartitioner`]: token is a CRC32 of the key, spreading keys
//!   uniformly around the ring

mod key;

use std::cmp::Ordering;

use crate::error::{Result, RingError};

pub use key::DecoratedKey;

/// Key ordering and disk encoding used by a segment
pub trait Partitioner: Send + Sync + std::fmt::Debug {
    /// Attach a token to a raw key
    fn decorate_key(&self, key: &[u8]) -> DecoratedKey;

    /// Total order over decorated keys
    fn compare(&self, a: &DecoratedKey, b: &DecoratedKey) -> Ordering;

    /// On-disk form of a key; also the bloom filter member
    fn to_disk_format(&self, key: &DecoratedKey) -> Vec<u8>;

    /// Inverse of `to_disk_format`
    fn from_disk_format(&self, bytes: &[u8]) -> Result<DecoratedKey>;
}

// =============================================================================
// Order Preserving
// =============================================================================

/// Tokens are the keys themselves
#[derive(Debug, Default, Clone, Copy)]
pub struct OrderPreservingPartitioner;

impl Partitioner for OrderPreservingPartitioner {
    fn decorate_key(&self, key: &[u8]) -> DecoratedKey {
        DecoratedKey::new(key.to_vec(), key.to_vec())
    }

    fn compare(&self, a: &DecoratedKey, b: &DecoratedKey) -> Ordering {
        a.key().cmp(b.key())
    }

    fn to_disk_format(&self, key: &DecoratedKey) -> Vec<u8> {
        key.key().to_vec()
    }

    fn from_disk_format(&self, bytes: &[u8]) -> Result<DecoratedKey> {
        Ok(self.decorate_key(bytes))
    }
}

// =============================================================================
// Hash
// =============================================================================

/// Tokens are CRC32 hashes of the key
///
/// Disk format: `[token: u32 BE][key bytes]`
#[derive(Debug, Default, Clone, Copy)]
pub struct HashPartitioner;

impl HashPartitioner {
    const TOKEN_SIZE: usize = 4;

    fn token_of(key: &[u8]) -> u32 {
        crc32fast::hash(key)
    }
}

impl Partitioner for HashPartitioner {
    fn decorate_key(&self, key: &[u8]) -> DecoratedKey {
        let token = Self::token_of(key).to_be_bytes().to_vec();
        DecoratedKey::new(token, key.to_vec())
    }

    fn compare(&self, a: &DecoratedKey, b: &DecoratedKey) -> Ordering {
        a.token()
            .cmp(b.token())
            .then_with(|| a.key().cmp(b.key()))
    }

    fn to_disk_format(&self, key: &DecoratedKey) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::TOKEN_SIZE + key.key().len());
        out.extend_from_slice(key.token());
        out.extend_from_slice(key.key());
        out
    }

    fn from_disk_format(&self, bytes: &[u8]) -> Result<DecoratedKey> {
        if bytes.len() < Self::TOKEN_SIZE {
            return Err(RingError::Corruption(format!(
                "hashed disk key too short: {} bytes",
                bytes.len()
            )));
        }
        let (token, key) = bytes.split_at(Self::TOKEN_SIZE);
        Ok(DecoratedKey::new(token.to_vec(), key.to_vec()))
    }
}
