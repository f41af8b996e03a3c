//! Cryptographic primitives for JOSE tokens.
//!
//! This crate provides pure-Rust implementations of:
//! - Base64url (RFC 4648 §5) over caller-supplied spans
//! - The registered JWS/JWE algorithm identifiers (RFC 7518)
//! - JWK key model with RFC 7638 thumbprints
//! - Signing and verification (HMAC, RSA PKCS#1 v1.5 and PSS, ECDSA)
//! - CEK wrapping (AES-KW, AES-GCM-KW, RSA, ECDH-ES with Concat KDF, PBES2)
//! - Content encryption (AES-CBC-HMAC, AES-GCM)
//! - Raw DEFLATE payload compression
//!
//! Token framing, validation policy, and document plumbing live in the
//! `keel-jose` crate.

pub mod alg;
pub mod base64url;
pub mod content;
mod error;
pub mod jwk;
pub mod keywrap;
pub mod sign;
pub mod zip;

pub use alg::{
    CompressionAlgorithm, EncryptionAlgorithm, KeyManagementAlgorithm, SignatureAlgorithm,
};
pub use content::{decryptor, encryptor, AuthenticatedDecryptor, AuthenticatedEncryptor};
pub use error::CryptoError;
pub use jwk::{EcCurve, EcPublicKey, EcSecretKey, Jwk, JwkParams, KeyUse, RsaParams};
pub use keywrap::{KeyUnwrapper, KeyWrapper, WrappedKey};
pub use sign::{Signer, Verifier};
pub use zip::{Compressor, DeflateCompressor};
