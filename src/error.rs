use thiserror::Error;

/// Failures surfaced by token parsing, validation, and writing.
///
/// Underlying cryptographic errors are mapped onto `SignatureValidationFailed`
/// and `DecryptionFailed` at the pipeline boundary and never leak details
/// about why a particular key or primitive rejected the input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    MalformedToken,

    #[error("invalid header parameter `{0}`")]
    InvalidHeader(&'static str),

    #[error("JWE header is missing `enc`")]
    MissingEncryptionAlgorithm,

    #[error("no key matched the token for signature validation")]
    SignatureKeyNotFound,

    #[error("no key matched the token for decryption")]
    EncryptionKeyNotFound,

    #[error("signature validation failed")]
    SignatureValidationFailed,

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("decompression failed")]
    DecompressionFailed,

    #[error("token has expired")]
    Expired,

    #[error("token is not yet valid")]
    NotYetValid,

    #[error("invalid claim `{0}`")]
    InvalidClaim(&'static str),

    #[error("critical header `{0}` has no registered handler")]
    CriticalHeaderMissingHandler(String),

    #[error("critical header `{0}` was rejected")]
    CriticalHeaderRejected(String),

    #[error("input exceeds the configured size limit")]
    SizeLimitExceeded,

    #[error("document has been disposed")]
    InstanceInvalidated,
}
