//! Replica messages

use std::fmt;
use std::net::IpAddr;

use bytes::Bytes;

/// An acknowledgment received from a replica
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    from: IpAddr,
    id: u64,
    body: Bytes,
}

impl Message {
    pub fn new(from: IpAddr, id: u64, body: impl Into<Bytes>) -> Self {
        Self {
            from,
            id,
            body: body.into(),
        }
    }

    /// Body-less acknowledgment
    pub fn ack(from: IpAddr, id: u64) -> Self {
        Self::new(from, id, Bytes::new())
    }

    pub fn from(&self) -> IpAddr {
        self.from
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Message(id={}, from={}, {} bytes)",
            self.id,
            self.from,
            self.body.len()
        )
    }
}
