//! # ringstore
//!
//! The durable write path of a distributed, log-structured key-value store:
//! - Immutable sorted table segments with a bloom filter and sparse index
//! - Crash-safe finalize (sync barriers, then ordered renames) and recovery
//! - Pluggable row compression with stable on-disk codec ids
//! - Datacenter-aware write acknowledgment (local quorum)
//!
//! ## Architecture Overview
//!
//! ```text
//!   flush / compaction task                 write coordinator
//!            │                                      │
//! ┌──────────▼──────────┐              ┌────────────▼───────────┐
//! │    SSTableWriter    │              │  WriteResponseHandler  │
//! │  (single producer)  │              │ (many network threads) │
//! └──────────┬──────────┘              └────────────┬───────────┘
//!            │ finalize                             │ policy
//!   ┌────────▼────────┐  ┌─────────────┐   ┌────────▼────────┐
//!   │  SSTableReader  │  │ Compression │   │ EndpointSnitch  │
//!   │   (shared, RO)  │  │   codecs    │   │  (topology)     │
//!   └─────────────────┘  └─────────────┘   └─────────────────┘
//! ```
//!
//! The two halves share no state: the writer never waits on the network
//! and the handler never touches disk.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod compression;
pub mod partitioner;
pub mod service;
pub mod sstable;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use compression::CompressionMethod;
pub use config::Config;
pub use error::{Result, RingError};
pub use partitioner::{DecoratedKey, Partitioner};
pub use service::{ConsistencyLevel, Message, WriteResponseHandler};
pub use sstable::{Descriptor, SSTableReader, SSTableWriter};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of ringstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
