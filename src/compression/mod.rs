//! Compression Module
//!
//! Row compression for table segments.
//!
//! ## Responsibilities
//! - Map compression methods to the small integer ids persisted per record
//! - One-shot block compression of a record value
//! - Lazily decompressing readers over a byte range of a segment file
//!
//! ## Codec Ids
//! ```text
//! ┌────────┬──────┐
//! │ Method │  Id  │
//! ├────────┼──────┤
//! │ none   │   0  │
//! │ gzip   │  -1  │
//! │ zstd   │  -2  │
//! └────────┴──────┘
//! ```
//! Ids are written into every compressed record and must never be reused
//! for a different algorithm. Unknown ids decode as `none`.

mod codec;

use std::fmt;
use std::str::FromStr;

use crate::error::RingError;

pub use codec::{compress, decompress, WORKING_BUFFER_SIZE};

/// Compression applied to record values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressionMethod {
    /// Values stored verbatim
    #[default]
    None,

    /// zlib-wrapped DEFLATE, fastest level
    Gzip,

    /// Zstandard, level 1
    Zstd,
}

const NONE_ID: i32 = 0;
const GZIP_ID: i32 = -1;
const ZSTD_ID: i32 = -2;

/// Persisted id of a compression method
pub fn codec_to_id(method: CompressionMethod) -> i32 {
    match method {
        CompressionMethod::None => NONE_ID,
        CompressionMethod::Gzip => GZIP_ID,
        CompressionMethod::Zstd => ZSTD_ID,
    }
}

/// Compression method of a persisted id; unknown ids fall back to `None`
pub fn id_to_codec(id: i32) -> CompressionMethod {
    match id {
        GZIP_ID => CompressionMethod::Gzip,
        ZSTD_ID => CompressionMethod::Zstd,
        _ => CompressionMethod::None,
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompressionMethod::None => "none",
            CompressionMethod::Gzip => "gzip",
            CompressionMethod::Zstd => "zstd",
        };
        f.write_str(name)
    }
}

impl FromStr for CompressionMethod {
    type Err = RingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(CompressionMethod::None),
            "gzip" => Ok(CompressionMethod::Gzip),
            "zstd" => Ok(CompressionMethod::Zstd),
            other => Err(RingError::Config(format!(
                "unknown compression method: {}",
                other
            ))),
        }
    }
}
