//! Round-trip coverage: what the writer emits, the reader validates back to
//! the same claims, across the signature and key-management families.

use std::sync::OnceLock;

use keel_jose::crypto::{EcCurve, EcSecretKey};
use keel_jose::{
    parse, EncryptionAlgorithm, Jwk, JweDescriptor, JwsDescriptor, KeyManagementAlgorithm,
    SignatureAlgorithm, TokenDescriptor, ValidationPolicy,
};
use serde_json::json;

fn verify_policy(key: Jwk) -> ValidationPolicy {
    ValidationPolicy::builder().verification_key(key).build()
}

fn decrypt_policy(key: Jwk) -> ValidationPolicy {
    ValidationPolicy::builder().decryption_key(key).build()
}

fn ec_jwk(curve: EcCurve) -> Jwk {
    let secret = EcSecretKey::generate(curve).unwrap();
    Jwk::from_json(&secret.to_jwk_value()).unwrap()
}

/// One 2048-bit key for every RSA test; generation is the slow part.
fn rsa_jwk() -> &'static Jwk {
    static KEY: OnceLock<Jwk> = OnceLock::new();
    KEY.get_or_init(|| {
        use rsa::traits::{PrivateKeyParts, PublicKeyParts};
        let key = rsa::RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).unwrap();
        let b64 =
            |n: &rsa::BigUint| keel_jose::crypto::base64url::encode_string(&n.to_bytes_be());
        let primes = key.primes();
        let value = json!({
            "kty": "RSA",
            "n": b64(key.n()),
            "e": b64(key.e()),
            "d": b64(key.d()),
            "p": b64(&primes[0]),
            "q": b64(&primes[1]),
        });
        Jwk::from_json(&value).unwrap()
    })
}

fn assert_claims_round_trip(token: &str, policy: &ValidationPolicy) {
    let doc = parse(token.as_bytes(), policy).unwrap();
    assert_eq!(doc.claim_str("sub").unwrap().as_deref(), Some("alice"));
    assert_eq!(doc.claim_i64("n").unwrap(), Some(42));
}

#[test]
fn jws_hmac_family() {
    for (alg, len) in [
        (SignatureAlgorithm::Hs256, 32),
        (SignatureAlgorithm::Hs384, 48),
        (SignatureAlgorithm::Hs512, 64),
    ] {
        let key = Jwk::symmetric(&vec![7u8; len]);
        let token = JwsDescriptor::new(alg, key.clone())
            .subject("alice")
            .claim("n", json!(42))
            .encode()
            .unwrap();
        assert_claims_round_trip(&token, &verify_policy(key));
    }
}

#[test]
fn jws_hs256_with_zero_key() {
    let key = Jwk::symmetric(&[0u8; 32]);
    let token = JwsDescriptor::new(SignatureAlgorithm::Hs256, key.clone())
        .subject("alice")
        .encode()
        .unwrap();
    let doc = parse(token.as_bytes(), &verify_policy(key)).unwrap();
    assert_eq!(doc.claim_str("sub").unwrap().as_deref(), Some("alice"));
    assert_eq!(doc.header().alg(), Some("HS256"));
}

#[test]
fn jws_ecdsa_family() {
    for (alg, curve) in [
        (SignatureAlgorithm::Es256, EcCurve::P256),
        (SignatureAlgorithm::Es384, EcCurve::P384),
        (SignatureAlgorithm::Es512, EcCurve::P521),
    ] {
        let key = ec_jwk(curve);
        let token = JwsDescriptor::new(alg, key.clone())
            .subject("alice")
            .claim("n", json!(42))
            .encode()
            .unwrap();
        assert_claims_round_trip(&token, &verify_policy(key));
    }
}

#[test]
fn jws_rsa_pkcs1_and_pss() {
    for alg in [SignatureAlgorithm::Rs256, SignatureAlgorithm::Ps256] {
        let key = rsa_jwk().clone();
        let token = JwsDescriptor::new(alg, key.clone())
            .subject("alice")
            .claim("n", json!(42))
            .encode()
            .unwrap();
        assert_claims_round_trip(&token, &verify_policy(key));
    }
}

#[test]
fn jwe_direct_encryption() {
    for enc in [
        EncryptionAlgorithm::A128CbcHs256,
        EncryptionAlgorithm::A192CbcHs384,
        EncryptionAlgorithm::A256CbcHs512,
        EncryptionAlgorithm::A128Gcm,
        EncryptionAlgorithm::A256Gcm,
    ] {
        let key = Jwk::symmetric(&vec![9u8; enc.key_len()]);
        let token = JweDescriptor::new(KeyManagementAlgorithm::Dir, enc, key.clone())
            .claim("sub", json!("alice"))
            .claim("n", json!(42))
            .encode()
            .unwrap();
        assert_claims_round_trip(&token, &decrypt_policy(key));
    }
}

#[test]
fn jwe_aes_key_wrap() {
    for (alg, kek_len) in [
        (KeyManagementAlgorithm::A128Kw, 16),
        (KeyManagementAlgorithm::A192Kw, 24),
        (KeyManagementAlgorithm::A256Kw, 32),
    ] {
        let key = Jwk::symmetric(&vec![3u8; kek_len]);
        let token = JweDescriptor::new(alg, EncryptionAlgorithm::A128CbcHs256, key.clone())
            .claim("sub", json!("alice"))
            .claim("n", json!(42))
            .encode()
            .unwrap();
        assert_claims_round_trip(&token, &decrypt_policy(key));
    }
}

#[test]
fn jwe_aes_gcm_key_wrap() {
    let key = Jwk::symmetric(&[5u8; 32]);
    let token = JweDescriptor::new(
        KeyManagementAlgorithm::A256GcmKw,
        EncryptionAlgorithm::A256Gcm,
        key.clone(),
    )
    .claim("sub", json!("alice"))
    .claim("n", json!(42))
    .encode()
    .unwrap();
    assert_claims_round_trip(&token, &decrypt_policy(key));
}

#[test]
fn jwe_ecdh_es_direct_and_wrapped() {
    for (alg, enc) in [
        (KeyManagementAlgorithm::EcdhEs, EncryptionAlgorithm::A256Gcm),
        (
            KeyManagementAlgorithm::EcdhEsA128Kw,
            EncryptionAlgorithm::A128CbcHs256,
        ),
        (
            KeyManagementAlgorithm::EcdhEsA256Kw,
            EncryptionAlgorithm::A256CbcHs512,
        ),
    ] {
        let key = ec_jwk(EcCurve::P256);
        let token = JweDescriptor::new(alg, enc, key.clone())
            .claim("sub", json!("alice"))
            .claim("n", json!(42))
            .encode()
            .unwrap();
        assert_claims_round_trip(&token, &decrypt_policy(key));
    }
}

#[test]
fn jwe_rsa_key_transport() {
    for alg in [
        KeyManagementAlgorithm::RsaOaep,
        KeyManagementAlgorithm::RsaOaep256,
        KeyManagementAlgorithm::Rsa1_5,
    ] {
        let key = rsa_jwk().clone();
        let token = JweDescriptor::new(alg, EncryptionAlgorithm::A128Gcm, key.clone())
            .claim("sub", json!("alice"))
            .claim("n", json!(42))
            .encode()
            .unwrap();
        assert_claims_round_trip(&token, &decrypt_policy(key));
    }
}

#[test]
fn jwe_password_based() {
    let key = Jwk::password(b"correct horse battery staple");
    let token = JweDescriptor::new(
        KeyManagementAlgorithm::Pbes2Hs256A128Kw,
        EncryptionAlgorithm::A128CbcHs256,
        key.clone(),
    )
    .claim("sub", json!("alice"))
    .claim("n", json!(42))
    .encode()
    .unwrap();
    assert_claims_round_trip(&token, &decrypt_policy(key));
}

#[test]
fn wrong_symmetric_key_fails_to_decrypt() {
    let token = JweDescriptor::new(
        KeyManagementAlgorithm::A128Kw,
        EncryptionAlgorithm::A128Gcm,
        Jwk::symmetric(&[1u8; 16]),
    )
    .claim("sub", json!("alice"))
    .encode()
    .unwrap();
    let policy = decrypt_policy(Jwk::symmetric(&[2u8; 16]));
    assert_eq!(
        parse(token.as_bytes(), &policy).map(|_| ()),
        Err(keel_jose::TokenError::DecryptionFailed)
    );
}

#[test]
fn wrong_hmac_key_fails_to_verify() {
    let token = JwsDescriptor::new(SignatureAlgorithm::Hs256, Jwk::symmetric(&[1u8; 32]))
        .subject("alice")
        .encode()
        .unwrap();
    let policy = verify_policy(Jwk::symmetric(&[2u8; 32]));
    assert_eq!(
        parse(token.as_bytes(), &policy).map(|_| ()),
        Err(keel_jose::TokenError::SignatureValidationFailed)
    );
}

#[test]
fn claims_survive_complex_payloads() {
    let key = Jwk::symmetric(&[0u8; 32]);
    let token = JwsDescriptor::new(SignatureAlgorithm::Hs256, key.clone())
        .claim("roles", json!(["admin", "dev"]))
        .claim("ctx", json!({"tenant": "acme", "depth": 3}))
        .claim("note", json!("multi\nline \"quoted\""))
        .encode()
        .unwrap();
    let doc = parse(token.as_bytes(), &verify_policy(key)).unwrap();

    let roles = doc.claim("roles").unwrap().unwrap().to_value().unwrap();
    assert_eq!(roles, json!(["admin", "dev"]));
    let ctx = doc.claim("ctx").unwrap().unwrap();
    assert_eq!(
        ctx.member("tenant").unwrap().unwrap().as_str().unwrap().unwrap(),
        "acme"
    );
    assert_eq!(
        doc.claim_str("note").unwrap().as_deref(),
        Some("multi\nline \"quoted\"")
    );
}
