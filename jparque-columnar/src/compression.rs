//! Column chunk compression.
//!
//! One compressor per codec, byte-buffer in, byte-buffer out. Decompression
//! takes the expected uncompressed length and rejects any mismatch: the
//! length comes from the page header, so a disagreement means the file is
//! damaged.

use jparque_result::{Error, Result};
use std::io::{Read, Write};

/// Compression codec tags. The numbering is stable and matches the
/// Parquet codec family; LZO, Brotli, and LZ4 are named for completeness
/// but not implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionCodec {
    Uncompressed,
    Snappy,
    Gzip,
    Lzo,
    Brotli,
    Lz4,
    Zstd,
}

/// Zstd effort level used for column payloads.
const ZSTD_LEVEL: i32 = 3;

impl CompressionCodec {
    pub fn value(self) -> i32 {
        match self {
            CompressionCodec::Uncompressed => 0,
            CompressionCodec::Snappy => 1,
            CompressionCodec::Gzip => 2,
            CompressionCodec::Lzo => 3,
            CompressionCodec::Brotli => 4,
            CompressionCodec::Lz4 => 5,
            CompressionCodec::Zstd => 6,
        }
    }

    pub fn from_value(value: i32) -> Result<Self> {
        Ok(match value {
            0 => CompressionCodec::Uncompressed,
            1 => CompressionCodec::Snappy,
            2 => CompressionCodec::Gzip,
            3 => CompressionCodec::Lzo,
            4 => CompressionCodec::Brotli,
            5 => CompressionCodec::Lz4,
            6 => CompressionCodec::Zstd,
            other => return Err(Error::corrupt(format!("unknown compression codec tag {other}"))),
        })
    }
}

/// Symmetric compression contract.
pub trait Compressor {
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Decompress `input`, which must expand to exactly
    /// `uncompressed_len` bytes.
    fn decompress(&self, input: &[u8], uncompressed_len: usize) -> Result<Vec<u8>>;
}

/// Look up the compressor for a codec tag. Unimplemented codecs yield
/// [`Error::Unsupported`].
pub fn compressor_for(codec: CompressionCodec) -> Result<Box<dyn Compressor>> {
    match codec {
        CompressionCodec::Uncompressed => Ok(Box::new(UncompressedCompressor)),
        CompressionCodec::Snappy => Ok(Box::new(SnappyCompressor)),
        CompressionCodec::Gzip => Ok(Box::new(GzipCompressor)),
        CompressionCodec::Zstd => Ok(Box::new(ZstdCompressor)),
        other => Err(Error::Unsupported(format!(
            "compression codec not supported: {other:?}"
        ))),
    }
}

fn check_len(got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(Error::corrupt(format!(
            "decompressed size mismatch: expected {expected}, got {got}"
        )));
    }
    Ok(())
}

/// Pass-through codec: copies bytes without transformation.
struct UncompressedCompressor;

impl Compressor for UncompressedCompressor {
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        Ok(input.to_vec())
    }

    fn decompress(&self, input: &[u8], uncompressed_len: usize) -> Result<Vec<u8>> {
        check_len(input.len(), uncompressed_len)?;
        Ok(input.to_vec())
    }
}

/// Raw Snappy block format.
struct SnappyCompressor;

impl Compressor for SnappyCompressor {
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        snap::raw::Encoder::new()
            .compress_vec(input)
            .map_err(|e| Error::Internal(format!("snappy compression failed: {e}")))
    }

    fn decompress(&self, input: &[u8], uncompressed_len: usize) -> Result<Vec<u8>> {
        let out = snap::raw::Decoder::new()
            .decompress_vec(input)
            .map_err(|e| Error::corrupt(format!("snappy decompression failed: {e}")))?;
        check_len(out.len(), uncompressed_len)?;
        Ok(out)
    }
}

/// Gzip via flate2.
struct GzipCompressor;

impl Compressor for GzipCompressor {
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(input)?;
        Ok(encoder.finish()?)
    }

    fn decompress(&self, input: &[u8], uncompressed_len: usize) -> Result<Vec<u8>> {
        let mut decoder = flate2::read::GzDecoder::new(input);
        let mut out = Vec::with_capacity(uncompressed_len);
        decoder
            .read_to_end(&mut out)
            .map_err(|e| Error::corrupt(format!("gzip decompression failed: {e}")))?;
        check_len(out.len(), uncompressed_len)?;
        Ok(out)
    }
}

/// Zstandard at a fixed level.
struct ZstdCompressor;

impl Compressor for ZstdCompressor {
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        Ok(zstd::bulk::compress(input, ZSTD_LEVEL)?)
    }

    fn decompress(&self, input: &[u8], uncompressed_len: usize) -> Result<Vec<u8>> {
        let out = zstd::bulk::decompress(input, uncompressed_len)
            .map_err(|e| Error::corrupt(format!("zstd decompression failed: {e}")))?;
        check_len(out.len(), uncompressed_len)?;
        Ok(out)
    }
}
