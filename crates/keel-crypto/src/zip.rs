//! JWE payload compression: raw DEFLATE (RFC 1951), no zlib wrapper.

use crate::error::CryptoError;

const DEFLATE_LEVEL: u8 = 6;

/// Compresses and decompresses JWE plaintexts.
///
/// Decompression is bounded by a caller-supplied limit so a small token
/// cannot expand into an arbitrarily large plaintext.
pub trait Compressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError>;
    fn decompress(&self, data: &[u8], max_size: usize) -> Result<Vec<u8>, CryptoError>;
}

/// The `DEF` compression algorithm.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeflateCompressor;

impl Compressor for DeflateCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(miniz_oxide::deflate::compress_to_vec(data, DEFLATE_LEVEL))
    }

    fn decompress(&self, data: &[u8], max_size: usize) -> Result<Vec<u8>, CryptoError> {
        miniz_oxide::inflate::decompress_to_vec_with_limit(data, max_size)
            .map_err(|e| CryptoError::DecompressionFailed(e.to_string()))
    }
}
