//! Error types for ringstore
//!
//! Provides a unified error type for the segment write path and the
//! replica acknowledgment path.

use thiserror::Error;

/// Result type alias using RingError
pub type Result<T> = std::result::Result<T, RingError>;

/// Unified error type for ringstore operations
#[derive(Debug, Error)]
pub enum RingError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Segment Construction Errors
    // -------------------------------------------------------------------------
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Keys must be written in ascending order: last={last}, current={current}, file={path}")]
    OutOfOrderKey {
        last: String,
        current: String,
        path: String,
    },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Invalid writer state: {0}")]
    InvalidState(String),

    // -------------------------------------------------------------------------
    // Compression Errors
    // -------------------------------------------------------------------------
    #[error("Unsupported compression codec: {0}")]
    UnsupportedCodec(String),

    // -------------------------------------------------------------------------
    // Read-side Errors
    // -------------------------------------------------------------------------
    #[error("Segment corruption detected: {0}")]
    Corruption(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Replication Errors
    // -------------------------------------------------------------------------
    #[error("Unresolved endpoint: {0}")]
    UnresolvedEndpoint(String),

    #[error("Timed out after {waited_ms}ms: {received} responses received, {remaining} still required")]
    Timeout {
        waited_ms: u64,
        received: usize,
        remaining: i64,
    },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for RingError {
    fn from(e: bincode::Error) -> Self {
        RingError::Serialization(e.to_string())
    }
}
