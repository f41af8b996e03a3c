//! Compact JSON Web Tokens: reading, validating, and writing.
//!
//! This crate provides:
//! - A zero-copy tokenizer and JSON index over pooled byte buffers
//! - JWS verification and JWE decryption with a fixed validation order
//! - Lifetime, issuer, audience, and critical-header policy checks
//! - Nested JWS-inside-JWE with optional raw-DEFLATE payload compression
//! - Descriptors that assemble signed and encrypted tokens bottom-up
//!
//! Cryptographic primitives (signing, key wrapping, content encryption,
//! JWK keys) live in the `keel-crypto` crate, re-exported here as
//! [`crypto`].
//!
//! ```no_run
//! use keel_jose::{
//!     parse, Jwk, JwsDescriptor, SignatureAlgorithm, TokenDescriptor, ValidationPolicy,
//! };
//!
//! let key = Jwk::symmetric(&[0u8; 32]);
//! let token = JwsDescriptor::new(SignatureAlgorithm::Hs256, key.clone())
//!     .subject("alice")
//!     .encode()?;
//!
//! let policy = ValidationPolicy::builder().verification_key(key).build();
//! let document = parse(token.as_bytes(), &policy)?;
//! assert_eq!(document.claim_str("sub")?.as_deref(), Some("alice"));
//! # Ok::<(), keel_jose::TokenError>(())
//! ```

mod cache;
mod document;
mod error;
mod header;
mod json;
mod policy;
mod pool;
mod reader;
mod tokenizer;
mod writer;

pub use keel_crypto as crypto;
pub use keel_crypto::{
    CompressionAlgorithm, EncryptionAlgorithm, Jwk, JwkParams, KeyManagementAlgorithm, KeyUse,
    SignatureAlgorithm,
};

pub use cache::{CachedHeader, HeaderCache, DEFAULT_HEADER_CACHE_CAPACITY};
pub use document::{JwtDocument, JwtElement};
pub use error::TokenError;
pub use header::JwtHeader;
pub use json::{JsonIndex, JsonKind, JsonNode, NO_NODE};
pub use policy::{
    Clock, CriticalHeaderHandler, JwkSet, KeyProvider, PolicyBuilder, StaticKeys,
    ValidationPolicy, DEFAULT_MAX_DECOMPRESSED_SIZE, DEFAULT_MAX_TOKEN_SIZE,
};
pub use pool::{rent, PooledBuf};
pub use reader::parse;
pub use tokenizer::{tokenize, Segment, MAX_SEGMENTS};
pub use writer::{write, JweDescriptor, JwePayload, JwsDescriptor, TokenDescriptor};
