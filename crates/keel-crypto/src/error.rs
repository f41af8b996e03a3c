use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid base64url data: {0}")]
    Base64(&'static str),

    #[error("invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("buffer too small: need {need} bytes, have {have}")]
    BufferTooSmall { need: usize, have: usize },

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("JWK missing {0}")]
    MissingJwkField(&'static str),

    #[error("invalid JWK: {0}")]
    InvalidJwk(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("key wrap failed: {0}")]
    WrapFailed(String),

    #[error("key unwrap failed: {0}")]
    UnwrapFailed(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("compression failed: {0}")]
    CompressionFailed(String),

    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("random number generation failed: {0}")]
    RngFailed(String),
}
