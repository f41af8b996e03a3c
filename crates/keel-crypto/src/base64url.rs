//! URL-safe, unpadded base64 (RFC 4648 §5) over caller-supplied byte spans.
//!
//! The span-based entry points never touch the heap; the `_string`/`_vec`
//! conveniences allocate.

use base64ct::{Base64UrlUnpadded, Encoding};

use crate::error::CryptoError;

/// Number of bytes `encode` writes for an `n`-byte input.
pub const fn encoded_size(n: usize) -> usize {
    (n * 4 + 2) / 3
}

/// Upper bound on the bytes `decode` writes for an `n`-byte input.
pub const fn decoded_size(n: usize) -> usize {
    n * 3 / 4
}

/// Encode `src` into `dst`, returning the number of bytes written.
///
/// `dst` must hold at least `encoded_size(src.len())` bytes.
pub fn encode(src: &[u8], dst: &mut [u8]) -> Result<usize, CryptoError> {
    let need = encoded_size(src.len());
    if dst.len() < need {
        return Err(CryptoError::BufferTooSmall {
            need,
            have: dst.len(),
        });
    }
    let written = Base64UrlUnpadded::encode(src, dst)
        .map_err(|_| CryptoError::Base64("encode buffer too small"))?
        .len();
    Ok(written)
}

/// Decode `src` into `dst`, returning the number of bytes written.
///
/// Fails on any byte outside the URL-safe alphabet, on padding characters,
/// on non-canonical trailing bits, and on input length ≡ 1 (mod 4).
pub fn decode(src: &[u8], dst: &mut [u8]) -> Result<usize, CryptoError> {
    let decoded = Base64UrlUnpadded::decode(src, dst)
        .map_err(|_| CryptoError::Base64("invalid character or length"))?;
    Ok(decoded.len())
}

/// Encode bytes to an owned base64url string without padding.
pub fn encode_string(data: &[u8]) -> String {
    Base64UrlUnpadded::encode_string(data)
}

/// Decode a base64url string to owned bytes.
pub fn decode_vec(data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    Base64UrlUnpadded::decode_vec(
        std::str::from_utf8(data).map_err(|_| CryptoError::Base64("not UTF-8"))?,
    )
    .map_err(|_| CryptoError::Base64("invalid character or length"))
}
