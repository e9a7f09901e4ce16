//! zlib (DEFLATE) compression over byte streams
//!
//! Both directions move data in fixed 16 KiB chunks so the working set stays
//! bounded regardless of entry size.

use crate::error::{PakError, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{self, Read, Write};

/// Chunk size for streaming compression and decompression
pub const CHUNK_SIZE: usize = 16 * 1024;

/// Default zlib level
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Highest zlib level
pub const MAX_COMPRESSION_LEVEL: u32 = 9;

/// Compress everything readable from `src` into `dst`
///
/// Returns the number of compressed bytes written.
pub fn compress_stream<R: Read, W: Write>(mut src: R, dst: W, level: u32) -> Result<u64> {
    if level > MAX_COMPRESSION_LEVEL {
        return Err(PakError::CompressionFailure(format!(
            "level {} out of range 0..={}",
            level, MAX_COMPRESSION_LEVEL
        )));
    }

    let mut encoder = ZlibEncoder::new(dst, Compression::new(level));
    let mut chunk = vec![0u8; CHUNK_SIZE];

    loop {
        let n = match src.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        encoder
            .write_all(&chunk[..n])
            .map_err(|e| PakError::CompressionFailure(e.to_string()))?;
    }

    encoder
        .try_finish()
        .map_err(|e| PakError::CompressionFailure(e.to_string()))?;
    let written = encoder.total_out();
    encoder
        .finish()
        .map_err(|e| PakError::CompressionFailure(e.to_string()))?;

    Ok(written)
}

/// Decompress `src` into `dst`, requiring exactly `expected_len` output bytes
pub fn decompress_stream<R: Read, W: Write>(src: R, mut dst: W, expected_len: u64) -> Result<()> {
    let mut decoder = ZlibDecoder::new(src);
    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut total: u64 = 0;

    loop {
        let n = match decoder.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(PakError::DecompressionFailure(e.to_string())),
        };

        total += n as u64;
        if total > expected_len {
            return Err(PakError::DecompressionFailure(format!(
                "output exceeds expected length {}",
                expected_len
            )));
        }
        dst.write_all(&chunk[..n])?;
    }

    if total != expected_len {
        return Err(PakError::DecompressionFailure(format!(
            "length mismatch: expected {}, got {}",
            expected_len, total
        )));
    }

    Ok(())
}

/// Compress a byte slice
pub fn compress(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    compress_stream(data, &mut out, level)?;
    Ok(out)
}

/// Decompress a byte slice into a buffer pre-sized to `expected_len`
pub fn decompress(data: &[u8], expected_len: u64) -> Result<Vec<u8>> {
    let mut out = alloc_buffer(expected_len)?;
    decompress_stream(data, &mut out, expected_len)?;
    Ok(out)
}

/// Reserve an empty buffer with room for `len` bytes, without aborting on failure
pub(crate) fn alloc_buffer(len: u64) -> Result<Vec<u8>> {
    let size = usize::try_from(len).map_err(|_| PakError::AllocationFailure { requested: len })?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(size)
        .map_err(|_| PakError::AllocationFailure { requested: len })?;
    Ok(buf)
}
