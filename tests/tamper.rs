//! Tamper detection: the header is the JWE AAD, the signature covers the
//! full signing input, and any modified segment must be rejected.

use keel_jose::crypto::base64url;
use keel_jose::{
    parse, EncryptionAlgorithm, Jwk, JweDescriptor, JwsDescriptor, KeyManagementAlgorithm,
    SignatureAlgorithm, TokenDescriptor, TokenError, ValidationPolicy,
};
use serde_json::{json, Value};

fn signed_token(key: &Jwk) -> String {
    JwsDescriptor::new(SignatureAlgorithm::Hs256, key.clone())
        .subject("alice")
        .encode()
        .unwrap()
}

fn encrypted_token(key: &Jwk) -> String {
    JweDescriptor::new(
        KeyManagementAlgorithm::Dir,
        EncryptionAlgorithm::A128CbcHs256,
        key.clone(),
    )
    .kid("aaaaaaaa")
    .claim("sub", json!("alice"))
    .encode()
    .unwrap()
}

/// Replace the first character of one segment with a different alphabet
/// character, so the segment still decodes but to different bytes.
fn flip_segment(token: &str, index: usize) -> String {
    let mut parts: Vec<String> = token.split('.').map(str::to_owned).collect();
    let mut bytes = parts[index].clone().into_bytes();
    bytes[0] = if bytes[0] == b'A' { b'B' } else { b'A' };
    parts[index] = String::from_utf8(bytes).unwrap();
    parts.join(".")
}

/// Re-encode the header after mutating its JSON, keeping it parseable.
fn rewrite_header(token: &str, mutate: impl Fn(&mut Value)) -> String {
    let mut parts: Vec<String> = token.split('.').map(str::to_owned).collect();
    let decoded = base64url::decode_vec(parts[0].as_bytes()).unwrap();
    let mut header: Value = serde_json::from_slice(&decoded).unwrap();
    mutate(&mut header);
    parts[0] = base64url::encode_string(&serde_json::to_vec(&header).unwrap());
    parts.join(".")
}

#[test]
fn flipped_signature_fails() {
    let key = Jwk::symmetric(&[0u8; 32]);
    let policy = ValidationPolicy::builder()
        .verification_key(key.clone())
        .build();
    let token = signed_token(&key);

    assert!(parse(token.as_bytes(), &policy).is_ok());
    assert_eq!(
        parse(flip_segment(&token, 2).as_bytes(), &policy).map(|_| ()),
        Err(TokenError::SignatureValidationFailed)
    );
}

#[test]
fn flipped_jws_payload_fails() {
    let key = Jwk::symmetric(&[0u8; 32]);
    let policy = ValidationPolicy::builder()
        .verification_key(key.clone())
        .build();
    let token = signed_token(&key);
    assert_eq!(
        parse(flip_segment(&token, 1).as_bytes(), &policy).map(|_| ()),
        Err(TokenError::SignatureValidationFailed)
    );
}

#[test]
fn flipped_jws_header_fails() {
    let key = Jwk::symmetric(&[0u8; 32]);
    let policy = ValidationPolicy::builder()
        .verification_key(key.clone())
        .build();
    let token = signed_token(&key);
    // The header is part of the signing input, so any parseable mutation
    // invalidates the signature.
    let tampered = rewrite_header(&token, |header| {
        header["kid"] = json!("injected");
    });
    assert_eq!(
        parse(tampered.as_bytes(), &policy).map(|_| ()),
        Err(TokenError::SignatureValidationFailed)
    );
}

#[test]
fn header_is_bound_as_aad() {
    let key = Jwk::symmetric(&[0u8; 32]);
    let policy = ValidationPolicy::builder()
        .decryption_key(key.clone())
        .build();
    let token = encrypted_token(&key);
    assert!(parse(token.as_bytes(), &policy).is_ok());

    // Still valid JSON with the same alg/enc, but different AAD bytes.
    let tampered = rewrite_header(&token, |header| {
        header["kid"] = json!("aaaaaaab");
    });
    assert_eq!(
        parse(tampered.as_bytes(), &policy).map(|_| ()),
        Err(TokenError::DecryptionFailed)
    );
}

#[test]
fn raw_header_bit_flip_is_rejected() {
    let key = Jwk::symmetric(&[0u8; 32]);
    let policy = ValidationPolicy::builder()
        .decryption_key(key.clone())
        .build();
    let token = encrypted_token(&key);
    // Breaking the header JSON itself is caught before decryption.
    assert!(parse(flip_segment(&token, 0).as_bytes(), &policy).is_err());
}

#[test]
fn flipped_ciphertext_fails() {
    let key = Jwk::symmetric(&[0u8; 32]);
    let policy = ValidationPolicy::builder()
        .decryption_key(key.clone())
        .build();
    let token = encrypted_token(&key);
    assert_eq!(
        parse(flip_segment(&token, 3).as_bytes(), &policy).map(|_| ()),
        Err(TokenError::DecryptionFailed)
    );
}

#[test]
fn flipped_tag_fails() {
    let key = Jwk::symmetric(&[0u8; 32]);
    let policy = ValidationPolicy::builder()
        .decryption_key(key.clone())
        .build();
    let token = encrypted_token(&key);
    assert_eq!(
        parse(flip_segment(&token, 4).as_bytes(), &policy).map(|_| ()),
        Err(TokenError::DecryptionFailed)
    );
}

#[test]
fn flipped_iv_fails() {
    let key = Jwk::symmetric(&[0u8; 32]);
    let policy = ValidationPolicy::builder()
        .decryption_key(key.clone())
        .build();
    let token = encrypted_token(&key);
    assert_eq!(
        parse(flip_segment(&token, 2).as_bytes(), &policy).map(|_| ()),
        Err(TokenError::DecryptionFailed)
    );
}

#[test]
fn flipped_wrapped_key_fails() {
    let key = Jwk::symmetric(&[6u8; 16]);
    let policy = ValidationPolicy::builder()
        .decryption_key(key.clone())
        .build();
    let token = JweDescriptor::new(
        KeyManagementAlgorithm::A128Kw,
        EncryptionAlgorithm::A128Gcm,
        key,
    )
    .claim("sub", json!("alice"))
    .encode()
    .unwrap();
    assert_eq!(
        parse(flip_segment(&token, 1).as_bytes(), &policy).map(|_| ()),
        Err(TokenError::DecryptionFailed)
    );
}

#[test]
fn gcm_kw_header_iv_tamper_fails() {
    let key = Jwk::symmetric(&[6u8; 16]);
    let policy = ValidationPolicy::builder()
        .decryption_key(key.clone())
        .build();
    let token = JweDescriptor::new(
        KeyManagementAlgorithm::A128GcmKw,
        EncryptionAlgorithm::A128Gcm,
        key,
    )
    .claim("sub", json!("alice"))
    .encode()
    .unwrap();
    let tampered = rewrite_header(&token, |header| {
        header["iv"] = json!(base64url::encode_string(&[0u8; 12]));
    });
    assert_eq!(
        parse(tampered.as_bytes(), &policy).map(|_| ()),
        Err(TokenError::DecryptionFailed)
    );
}
