//! Block compression and ranged decompression

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::{ZlibDecoder, ZlibEncoder};
use flate2::Compression;

use crate::error::{Result, RingError};

use super::CompressionMethod;

/// Upper bound of the buffer used while draining a compressor
pub const WORKING_BUFFER_SIZE: usize = 32 * 1024;

const ZSTD_LEVEL: i32 = 1;

/// Compress exactly `length` bytes of `value` into a self-contained block.
///
/// Bytes of `value` past `length` are ignored. `CompressionMethod::None`
/// is rejected: callers write uncompressed records themselves.
pub fn compress(method: CompressionMethod, value: &[u8], length: usize) -> Result<Vec<u8>> {
    if length > value.len() {
        return Err(RingError::InvalidValue(format!(
            "length {} exceeds buffer of {} bytes",
            length,
            value.len()
        )));
    }
    let input = &value[..length];
    let block = length.clamp(1, WORKING_BUFFER_SIZE);

    match method {
        CompressionMethod::Gzip => drain(ZlibEncoder::new(input, Compression::fast()), block),
        CompressionMethod::Zstd => drain(zstd::stream::read::Encoder::new(input, ZSTD_LEVEL)?, block),
        CompressionMethod::None => Err(RingError::UnsupportedCodec(
            "cannot compress with method none".to_string(),
        )),
    }
}

/// Reader yielding the expansion of `compressed_length` bytes stored at
/// `offset` in `source`.
///
/// `expanded_size_hint` only sizes the read buffer.
pub fn decompress(
    method: CompressionMethod,
    source: &Path,
    offset: u64,
    compressed_length: u64,
    expanded_size_hint: usize,
) -> Result<Box<dyn Read + Send>> {
    if method == CompressionMethod::None {
        return Err(RingError::UnsupportedCodec(
            "cannot decompress with method none".to_string(),
        ));
    }

    let mut file = File::open(source)?;
    file.seek(SeekFrom::Start(offset))?;
    let capacity = expanded_size_hint.clamp(1, WORKING_BUFFER_SIZE);
    let range = BufReader::with_capacity(capacity, file).take(compressed_length);

    match method {
        CompressionMethod::Gzip => Ok(Box::new(ZlibDecoder::new(range))),
        CompressionMethod::Zstd => Ok(Box::new(zstd::stream::read::Decoder::with_buffer(range)?)),
        CompressionMethod::None => unreachable!("rejected above"),
    }
}

/// Pull a compressor to completion through a bounded buffer
fn drain<R: Read>(mut encoder: R, block: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; block];
    let mut out = Vec::new();
    loop {
        let n = encoder.read(&mut buf)?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    Ok(out)
}
