//! Nested tokens (JWS inside JWE) and DEFLATE-compressed payloads.

use keel_jose::{
    parse, CompressionAlgorithm, EncryptionAlgorithm, Jwk, JweDescriptor, JwsDescriptor,
    KeyManagementAlgorithm, SignatureAlgorithm, TokenDescriptor, TokenError, ValidationPolicy,
};
use serde_json::json;

fn sign_key() -> Jwk {
    Jwk::symmetric(&[1u8; 32])
}

fn wrap_key() -> Jwk {
    Jwk::symmetric(&[2u8; 16])
}

fn nested_token() -> String {
    let inner = JwsDescriptor::new(SignatureAlgorithm::Hs256, sign_key())
        .subject("alice")
        .claim("n", json!(42));
    JweDescriptor::new(
        KeyManagementAlgorithm::A128Kw,
        EncryptionAlgorithm::A128CbcHs256,
        wrap_key(),
    )
    .nested(inner)
    .encode()
    .unwrap()
}

fn nested_policy() -> keel_jose::PolicyBuilder {
    ValidationPolicy::builder()
        .decryption_key(wrap_key())
        .verification_key(sign_key())
}

#[test]
fn jwe_wrapping_jws_exposes_inner_claims() {
    let doc = parse(nested_token().as_bytes(), &nested_policy().build()).unwrap();

    // Outer header, inner claims.
    assert_eq!(doc.header().alg(), Some("A128KW"));
    assert_eq!(doc.header().cty(), Some("JWT"));
    assert_eq!(doc.claim_str("sub").unwrap().as_deref(), Some("alice"));
    assert_eq!(doc.claim_i64("n").unwrap(), Some(42));

    let inner = doc.nested().unwrap();
    assert_eq!(inner.header().alg(), Some("HS256"));
}

#[test]
fn inner_signature_is_still_required() {
    let token = nested_token();
    // Decryption key alone is not enough; the inner JWS must verify.
    let policy = ValidationPolicy::builder()
        .decryption_key(wrap_key())
        .verification_key(Jwk::symmetric(&[9u8; 32]))
        .build();
    assert_eq!(
        parse(token.as_bytes(), &policy).map(|_| ()),
        Err(TokenError::SignatureValidationFailed)
    );
}

#[test]
fn ignore_nested_token_returns_the_raw_inner_form() {
    let token = nested_token();
    let policy = nested_policy().ignore_nested_token(true).build();
    let doc = parse(token.as_bytes(), &policy).unwrap();

    assert!(doc.nested().is_none());
    assert_eq!(doc.claim("sub").unwrap().map(|_| ()), None);

    // The payload is the inner compact JWS, parseable on its own.
    let raw = doc.payload_bytes().unwrap().to_vec();
    assert_eq!(raw.iter().filter(|b| **b == b'.').count(), 2);
    let inner_policy = ValidationPolicy::builder()
        .verification_key(sign_key())
        .build();
    let inner = parse(&raw, &inner_policy).unwrap();
    assert_eq!(inner.claim_str("sub").unwrap().as_deref(), Some("alice"));
}

#[test]
fn deflate_payload_round_trips() {
    let big = "a".repeat(10 * 1024);
    let token = JweDescriptor::new(
        KeyManagementAlgorithm::Dir,
        EncryptionAlgorithm::A128CbcHs256,
        Jwk::symmetric(&[3u8; 32]),
    )
    .compression(CompressionAlgorithm::Deflate)
    .claim("blob", json!(big))
    .encode()
    .unwrap();

    // Repetitive content compresses far below its plaintext size.
    assert!(token.len() < 2 * 1024, "token was {} bytes", token.len());

    let policy = ValidationPolicy::builder()
        .decryption_key(Jwk::symmetric(&[3u8; 32]))
        .build();
    let doc = parse(token.as_bytes(), &policy).unwrap();
    assert_eq!(doc.header().zip(), Some("DEF"));
    assert_eq!(doc.claim_str("blob").unwrap().as_deref(), Some(big.as_str()));
}

#[test]
fn decompression_bound_stops_expansion_bombs() {
    let big = "a".repeat(64 * 1024);
    let key = Jwk::symmetric(&[3u8; 32]);
    let token = JweDescriptor::new(
        KeyManagementAlgorithm::Dir,
        EncryptionAlgorithm::A128CbcHs256,
        key.clone(),
    )
    .compression(CompressionAlgorithm::Deflate)
    .claim("blob", json!(big))
    .encode()
    .unwrap();

    let policy = ValidationPolicy::builder()
        .decryption_key(key)
        .max_decompressed_size(1024)
        .build();
    assert_eq!(
        parse(token.as_bytes(), &policy).map(|_| ()),
        Err(TokenError::DecompressionFailed)
    );
}

#[test]
fn compressed_nested_token() {
    let inner = JwsDescriptor::new(SignatureAlgorithm::Hs256, sign_key()).subject("alice");
    let token = JweDescriptor::new(
        KeyManagementAlgorithm::A128Kw,
        EncryptionAlgorithm::A128Gcm,
        wrap_key(),
    )
    .compression(CompressionAlgorithm::Deflate)
    .nested(inner)
    .encode()
    .unwrap();

    let doc = parse(token.as_bytes(), &nested_policy().build()).unwrap();
    assert_eq!(doc.claim_str("sub").unwrap().as_deref(), Some("alice"));
}

#[test]
fn nesting_depth_is_bounded() {
    let key = Jwk::symmetric(&[4u8; 32]);
    let mut token = JwsDescriptor::new(SignatureAlgorithm::Hs256, sign_key())
        .subject("deep")
        .encode()
        .unwrap();
    for _ in 0..4 {
        token = JweDescriptor::new(
            KeyManagementAlgorithm::Dir,
            EncryptionAlgorithm::A256Gcm,
            key.clone(),
        )
        .cty("JWT")
        .raw_payload(token.into_bytes())
        .encode()
        .unwrap();
    }

    let policy = ValidationPolicy::builder()
        .decryption_key(key)
        .verification_key(sign_key())
        .build();
    assert_eq!(
        parse(token.as_bytes(), &policy).map(|_| ()),
        Err(TokenError::MalformedToken)
    );
}

#[test]
fn two_levels_of_wrapping_parse_fine() {
    let key = Jwk::symmetric(&[4u8; 32]);
    let inner = JwsDescriptor::new(SignatureAlgorithm::Hs256, sign_key())
        .subject("deep")
        .encode()
        .unwrap();
    let middle = JweDescriptor::new(
        KeyManagementAlgorithm::Dir,
        EncryptionAlgorithm::A256Gcm,
        key.clone(),
    )
    .cty("JWT")
    .raw_payload(inner.into_bytes())
    .encode()
    .unwrap();
    let outer = JweDescriptor::new(
        KeyManagementAlgorithm::Dir,
        EncryptionAlgorithm::A256Gcm,
        key.clone(),
    )
    .cty("JWT")
    .raw_payload(middle.into_bytes())
    .encode()
    .unwrap();

    let policy = ValidationPolicy::builder()
        .decryption_key(key)
        .verification_key(sign_key())
        .build();
    let doc = parse(outer.as_bytes(), &policy).unwrap();
    assert_eq!(doc.claim_str("sub").unwrap().as_deref(), Some("deep"));
    assert!(doc.nested().unwrap().nested().is_some());
}
