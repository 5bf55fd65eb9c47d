//! Write consistency levels

use std::fmt;
use std::str::FromStr;

use crate::error::RingError;

/// How many replica acknowledgments a write waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsistencyLevel {
    /// Any single replica
    One,
    /// A majority of all replicas
    Quorum,
    /// A majority of the replicas in the coordinator's datacenter; remote
    /// acknowledgments are collected but never counted
    LocalQuorum,
    /// Every replica
    All,
}

impl ConsistencyLevel {
    /// Acknowledgments required, given the total replication factor and
    /// the replication factor of the local datacenter
    pub fn block_for(self, replication_factor: usize, local_replication_factor: usize) -> i64 {
        let required = match self {
            ConsistencyLevel::One => 1.min(replication_factor),
            ConsistencyLevel::Quorum => majority(replication_factor),
            ConsistencyLevel::LocalQuorum => majority(local_replication_factor),
            ConsistencyLevel::All => replication_factor,
        };
        required as i64
    }

    /// Whether only local-datacenter acknowledgments count
    pub fn is_datacenter_local(self) -> bool {
        matches!(self, ConsistencyLevel::LocalQuorum)
    }
}

fn majority(replicas: usize) -> usize {
    if replicas == 0 {
        0
    } else {
        replicas / 2 + 1
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConsistencyLevel::One => "ONE",
            ConsistencyLevel::Quorum => "QUORUM",
            ConsistencyLevel::LocalQuorum => "LOCAL_QUORUM",
            ConsistencyLevel::All => "ALL",
        };
        f.write_str(name)
    }
}

impl FromStr for ConsistencyLevel {
    type Err = RingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ONE" => Ok(ConsistencyLevel::One),
            "QUORUM" => Ok(ConsistencyLevel::Quorum),
            "LOCAL_QUORUM" | "DCQUORUM" => Ok(ConsistencyLevel::LocalQuorum),
            "ALL" => Ok(ConsistencyLevel::All),
            other => Err(RingError::Config(format!(
                "unknown consistency level: {}",
                other
            ))),
        }
    }
}
