//! Decorated keys

use std::fmt;

/// A key paired with the token its partitioner assigned to it.
///
/// Equality and hashing look at both parts. Ordering is deliberately not
/// implemented: keys are only ever ordered through
/// [`Partitioner::compare`](super::Partitioner::compare).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecoratedKey {
    token: Vec<u8>,
    key: Vec<u8>,
}

impl DecoratedKey {
    pub fn new(token: Vec<u8>, key: Vec<u8>) -> Self {
        Self { token, key }
    }

    pub fn token(&self) -> &[u8] {
        &self.token
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Absent keys have no bytes
    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }
}

impl fmt::Display for DecoratedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DecoratedKey({}", String::from_utf8_lossy(&self.key))?;
        if self.token != self.key {
            write!(f, ", token=")?;
            for b in &self.token {
                write!(f, "{:02x}", b)?;
            }
        }
        write!(f, ")")
    }
}
