//! Configuration for ringstore
//!
//! Centralized configuration with sensible defaults. Every value is read
//! once when a writer or response handler is constructed; nothing here is
//! hot-reloaded mid-segment.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use crate::compression::CompressionMethod;
use crate::error::{Result, RingError};

/// Main configuration for a ringstore node
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for table segments
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── <table>-<gen>-Data.db
    ///     ├── <table>-<gen>-Index.db
    ///     └── <table>-<gen>-Filter.db
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Segment Writer Configuration
    // -------------------------------------------------------------------------
    /// Row compression applied to every record of a new segment
    pub compression: CompressionMethod,

    /// Buffer hint for the data file writer (in MB)
    pub flush_data_buffer_size_mb: f64,

    /// Buffer hint for the index file writer (in MB)
    pub flush_index_buffer_size_mb: f64,

    /// Sampling period (in keys) of the in-memory sparse index
    pub index_interval: u64,

    /// Bloom filter bits per expected key
    pub bloom_buckets_per_element: u32,

    // -------------------------------------------------------------------------
    // Key Cache Configuration
    // -------------------------------------------------------------------------
    /// Fraction of a segment's keys to hold in its key cache
    pub keys_cached_fraction: f64,

    /// Per-table overrides of `keys_cached_fraction`
    pub table_keys_cached_fraction: HashMap<String, f64>,

    // -------------------------------------------------------------------------
    // Replication Configuration
    // -------------------------------------------------------------------------
    /// This node's own endpoint
    pub local_endpoint: IpAddr,

    /// How long a coordinator waits for write acknowledgments (milliseconds)
    pub rpc_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./ringstore_data"),
            compression: CompressionMethod::None,
            flush_data_buffer_size_mb: 32.0,
            flush_index_buffer_size_mb: 8.0,
            index_interval: 128,
            bloom_buckets_per_element: 15,
            keys_cached_fraction: 0.01,
            table_keys_cached_fraction: HashMap::new(),
            local_endpoint: IpAddr::V4(Ipv4Addr::LOCALHOST),
            rpc_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Data file buffer size in bytes
    pub fn data_buffer_size(&self) -> usize {
        mb_to_bytes(self.flush_data_buffer_size_mb)
    }

    /// Index file buffer size in bytes
    pub fn index_buffer_size(&self) -> usize {
        mb_to_bytes(self.flush_index_buffer_size_mb)
    }

    /// Key cache fraction for a table, falling back to the global default
    pub fn keys_cached_fraction_for(&self, table: &str) -> f64 {
        self.table_keys_cached_fraction
            .get(table)
            .copied()
            .unwrap_or(self.keys_cached_fraction)
    }

    /// How long a coordinator waits in `await_completion`
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    /// Reject values the writer and handler cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.index_interval == 0 {
            return Err(RingError::Config("index_interval must be > 0".to_string()));
        }
        if self.bloom_buckets_per_element == 0 {
            return Err(RingError::Config(
                "bloom_buckets_per_element must be > 0".to_string(),
            ));
        }
        if !(self.flush_data_buffer_size_mb > 0.0) || !(self.flush_index_buffer_size_mb > 0.0) {
            return Err(RingError::Config(
                "flush buffer sizes must be positive".to_string(),
            ));
        }
        let fractions = std::iter::once(self.keys_cached_fraction)
            .chain(self.table_keys_cached_fraction.values().copied());
        for fraction in fractions {
            if !(0.0..=1.0).contains(&fraction) {
                return Err(RingError::Config(format!(
                    "keys cached fraction {} outside [0, 1]",
                    fraction
                )));
            }
        }
        Ok(())
    }
}

fn mb_to_bytes(mb: f64) -> usize {
    // BufWriter needs at least one byte of capacity
    ((mb * 1024.0 * 1024.0) as usize).max(1)
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the row compression method
    pub fn compression(mut self, method: CompressionMethod) -> Self {
        self.config.compression = method;
        self
    }

    /// Set the data file buffer hint (in MB)
    pub fn flush_data_buffer_size_mb(mut self, mb: f64) -> Self {
        self.config.flush_data_buffer_size_mb = mb;
        self
    }

    /// Set the index file buffer hint (in MB)
    pub fn flush_index_buffer_size_mb(mut self, mb: f64) -> Self {
        self.config.flush_index_buffer_size_mb = mb;
        self
    }

    /// Set the sparse index sampling interval
    pub fn index_interval(mut self, interval: u64) -> Self {
        self.config.index_interval = interval;
        self
    }

    /// Set the bloom filter bits per expected key
    pub fn bloom_buckets_per_element(mut self, buckets: u32) -> Self {
        self.config.bloom_buckets_per_element = buckets;
        self
    }

    /// Set the default key cache fraction
    pub fn keys_cached_fraction(mut self, fraction: f64) -> Self {
        self.config.keys_cached_fraction = fraction;
        self
    }

    /// Override the key cache fraction for one table
    pub fn table_keys_cached_fraction(mut self, table: impl Into<String>, fraction: f64) -> Self {
        self.config
            .table_keys_cached_fraction
            .insert(table.into(), fraction);
        self
    }

    /// Set this node's endpoint
    pub fn local_endpoint(mut self, endpoint: IpAddr) -> Self {
        self.config.local_endpoint = endpoint;
        self
    }

    /// Set the acknowledgment timeout (in milliseconds)
    pub fn rpc_timeout_ms(mut self, ms: u64) -> Self {
        self.config.rpc_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
