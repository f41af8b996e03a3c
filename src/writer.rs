//! Writer pipeline: descriptors that assemble compact tokens bottom-up.
//!
//! JWS: canonical header → base64url → signing input → signature. JWE: the
//! header (including parameters contributed by key wrapping) is serialized
//! first and its base64url bytes become the AAD; nonce and ciphertext are
//! produced afterwards, so the emitted header can never drift from what was
//! authenticated.

use keel_crypto::zip::Compressor;
use keel_crypto::{
    base64url, CompressionAlgorithm, DeflateCompressor, EncryptionAlgorithm, Jwk,
    KeyManagementAlgorithm, SignatureAlgorithm,
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::TokenError;
use crate::json::{canonical_object, serialize_claims};

/// Anything that can be encoded into a compact token.
pub trait TokenDescriptor {
    fn encode(&self) -> Result<String, TokenError>;
}

/// Encode a descriptor into its compact serialization.
pub fn write<D: TokenDescriptor + ?Sized>(descriptor: &D) -> Result<String, TokenError> {
    descriptor.encode()
}

/// Descriptor for a signed token.
pub struct JwsDescriptor {
    header: Map<String, Value>,
    claims: Map<String, Value>,
    alg: SignatureAlgorithm,
    signing_key: Option<Jwk>,
}

impl JwsDescriptor {
    pub fn new(alg: SignatureAlgorithm, signing_key: Jwk) -> Self {
        Self {
            header: Map::new(),
            claims: Map::new(),
            alg,
            signing_key: Some(signing_key),
        }
    }

    /// An unsecured (`alg=none`) descriptor with an empty signature segment.
    pub fn unsecured() -> Self {
        Self {
            header: Map::new(),
            claims: Map::new(),
            alg: SignatureAlgorithm::None,
            signing_key: None,
        }
    }

    pub fn typ(self, typ: impl Into<String>) -> Self {
        self.header_member("typ", Value::String(typ.into()))
    }

    pub fn cty(self, cty: impl Into<String>) -> Self {
        self.header_member("cty", Value::String(cty.into()))
    }

    pub fn kid(self, kid: impl Into<String>) -> Self {
        self.header_member("kid", Value::String(kid.into()))
    }

    pub fn header_member(mut self, name: impl Into<String>, value: Value) -> Self {
        self.header.insert(name.into(), value);
        self
    }

    pub fn claim(mut self, name: impl Into<String>, value: Value) -> Self {
        self.claims.insert(name.into(), value);
        self
    }

    pub fn subject(self, sub: impl Into<String>) -> Self {
        self.claim("sub", Value::String(sub.into()))
    }

    pub fn issuer(self, iss: impl Into<String>) -> Self {
        self.claim("iss", Value::String(iss.into()))
    }

    pub fn audience(self, aud: impl Into<String>) -> Self {
        self.claim("aud", Value::String(aud.into()))
    }

    pub fn expires_at(self, exp: i64) -> Self {
        self.claim("exp", Value::from(exp))
    }

    pub fn not_before(self, nbf: i64) -> Self {
        self.claim("nbf", Value::from(nbf))
    }

    pub fn issued_at(self, iat: i64) -> Self {
        self.claim("iat", Value::from(iat))
    }
}

impl TokenDescriptor for JwsDescriptor {
    fn encode(&self) -> Result<String, TokenError> {
        let mut members = Map::new();
        members.insert(
            "alg".to_owned(),
            Value::String(self.alg.name().to_owned()),
        );
        for (name, value) in &self.header {
            if name != "alg" {
                members.insert(name.clone(), value.clone());
            }
        }
        let header_json = canonical_object(&members)?;
        let payload_json = serialize_claims(&self.claims)?;

        let mut out = String::with_capacity(
            base64url::encoded_size(header_json.len())
                + base64url::encoded_size(payload_json.len())
                + 2,
        );
        out.push_str(&base64url::encode_string(&header_json));
        out.push('.');
        out.push_str(&base64url::encode_string(&payload_json));

        if self.alg.is_none() {
            out.push('.');
            return Ok(out);
        }

        let key = self
            .signing_key
            .as_ref()
            .ok_or(TokenError::SignatureKeyNotFound)?;
        let signer = key
            .create_signer(self.alg)
            .map_err(|_| TokenError::SignatureKeyNotFound)?;
        let mut signature = vec![0u8; signer.signature_len()];
        let written = signer
            .sign(out.as_bytes(), &mut signature)
            .map_err(|_| TokenError::SignatureValidationFailed)?;
        signature.truncate(written);
        debug!(alg = %self.alg, "signed compact token");

        out.push('.');
        out.push_str(&base64url::encode_string(&signature));
        Ok(out)
    }
}

/// Payload of an encrypted token.
pub enum JwePayload {
    Claims(Map<String, Value>),
    /// Inner JWS whose compact form becomes the plaintext (`cty: JWT`).
    Nested(Box<JwsDescriptor>),
    Raw(Vec<u8>),
}

/// Descriptor for an encrypted token.
pub struct JweDescriptor {
    header: Map<String, Value>,
    payload: JwePayload,
    alg: KeyManagementAlgorithm,
    enc: EncryptionAlgorithm,
    zip: Option<CompressionAlgorithm>,
    key: Jwk,
}

impl JweDescriptor {
    pub fn new(alg: KeyManagementAlgorithm, enc: EncryptionAlgorithm, key: Jwk) -> Self {
        Self {
            header: Map::new(),
            payload: JwePayload::Claims(Map::new()),
            alg,
            enc,
            zip: None,
            key,
        }
    }

    pub fn compression(mut self, zip: CompressionAlgorithm) -> Self {
        self.zip = Some(zip);
        self
    }

    pub fn typ(self, typ: impl Into<String>) -> Self {
        self.header_member("typ", Value::String(typ.into()))
    }

    pub fn cty(self, cty: impl Into<String>) -> Self {
        self.header_member("cty", Value::String(cty.into()))
    }

    pub fn kid(self, kid: impl Into<String>) -> Self {
        self.header_member("kid", Value::String(kid.into()))
    }

    pub fn header_member(mut self, name: impl Into<String>, value: Value) -> Self {
        self.header.insert(name.into(), value);
        self
    }

    /// Add a claim; only meaningful while the payload is a claims object.
    pub fn claim(mut self, name: impl Into<String>, value: Value) -> Self {
        if let JwePayload::Claims(claims) = &mut self.payload {
            claims.insert(name.into(), value);
        }
        self
    }

    /// Nest a signed token; sets `cty: JWT`.
    pub fn nested(mut self, inner: JwsDescriptor) -> Self {
        self.payload = JwePayload::Nested(Box::new(inner));
        self
    }

    pub fn raw_payload(mut self, bytes: Vec<u8>) -> Self {
        self.payload = JwePayload::Raw(bytes);
        self
    }
}

impl TokenDescriptor for JweDescriptor {
    fn encode(&self) -> Result<String, TokenError> {
        let plaintext: Vec<u8> = match &self.payload {
            JwePayload::Claims(claims) => serialize_claims(claims)?,
            JwePayload::Nested(inner) => inner.encode()?.into_bytes(),
            JwePayload::Raw(bytes) => bytes.clone(),
        };
        let plaintext = match self.zip {
            Some(CompressionAlgorithm::Deflate) => DeflateCompressor
                .compress(&plaintext)
                .map_err(|_| TokenError::DecompressionFailed)?,
            None => plaintext,
        };

        let mut members = Map::new();
        members.insert(
            "alg".to_owned(),
            Value::String(self.alg.name().to_owned()),
        );
        members.insert(
            "enc".to_owned(),
            Value::String(self.enc.name().to_owned()),
        );
        if let Some(zip) = self.zip {
            members.insert("zip".to_owned(), Value::String(zip.name().to_owned()));
        }
        if matches!(self.payload, JwePayload::Nested(_)) {
            members.insert("cty".to_owned(), Value::String("JWT".to_owned()));
        }
        for (name, value) in &self.header {
            if !matches!(name.as_str(), "alg" | "enc" | "zip") {
                members.insert(name.clone(), value.clone());
            }
        }

        // Key wrapping runs before header serialization so that epk, iv/tag,
        // and p2s/p2c land in the authenticated header.
        let wrapper = self
            .key
            .create_key_wrapper(self.alg)
            .map_err(|_| TokenError::EncryptionKeyNotFound)?;
        let wrapped = wrapper
            .wrap(self.enc, &mut members)
            .map_err(|_| TokenError::EncryptionKeyNotFound)?;

        // From here on the header is frozen: its base64url bytes are the AAD.
        let header_json = canonical_object(&members)?;
        let header_b64 = base64url::encode_string(&header_json);

        let mut nonce = vec![0u8; self.enc.iv_len()];
        getrandom::getrandom(&mut nonce).map_err(|_| TokenError::DecryptionFailed)?;

        let encryptor = keel_crypto::encryptor(self.enc, &wrapped.cek)
            .map_err(|_| TokenError::DecryptionFailed)?;
        let (ciphertext, tag) = encryptor
            .encrypt(&nonce, header_b64.as_bytes(), &plaintext)
            .map_err(|_| TokenError::DecryptionFailed)?;
        debug!(alg = %self.alg, enc = %self.enc, "encrypted compact token");

        let mut out = String::with_capacity(
            header_b64.len()
                + base64url::encoded_size(wrapped.encrypted_key.len())
                + base64url::encoded_size(nonce.len())
                + base64url::encoded_size(ciphertext.len())
                + base64url::encoded_size(tag.len())
                + 4,
        );
        out.push_str(&header_b64);
        out.push('.');
        out.push_str(&base64url::encode_string(&wrapped.encrypted_key));
        out.push('.');
        out.push_str(&base64url::encode_string(&nonce));
        out.push('.');
        out.push_str(&base64url::encode_string(&ciphertext));
        out.push('.');
        out.push_str(&base64url::encode_string(&tag));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jws_has_three_segments_and_canonical_header() {
        let key = Jwk::symmetric(&[0u8; 32]);
        let token = JwsDescriptor::new(SignatureAlgorithm::Hs256, key)
            .typ("JWT")
            .subject("alice")
            .encode()
            .unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);

        let header = base64url::decode_vec(parts[0].as_bytes()).unwrap();
        assert_eq!(header, br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = base64url::decode_vec(parts[1].as_bytes()).unwrap();
        assert_eq!(payload, br#"{"sub":"alice"}"#);
        assert!(!parts[2].is_empty());
    }

    #[test]
    fn unsecured_jws_has_empty_signature() {
        let token = JwsDescriptor::unsecured()
            .subject("nobody")
            .encode()
            .unwrap();
        assert!(token.ends_with('.'));
        let header = base64url::decode_vec(token.split('.').next().unwrap().as_bytes()).unwrap();
        assert_eq!(header, br#"{"alg":"none"}"#);
    }

    #[test]
    fn encoding_is_deterministic_for_jws() {
        let key = Jwk::symmetric(&[7u8; 32]);
        let make = || {
            JwsDescriptor::new(SignatureAlgorithm::Hs256, key.clone())
                .kid("k-1")
                .claim("n", Value::from(1))
                .encode()
                .unwrap()
        };
        assert_eq!(make(), make());
    }

    #[test]
    fn jwe_has_five_segments_with_empty_key_for_dir() {
        let key = Jwk::symmetric(&[0u8; 32]);
        let token = JweDescriptor::new(
            KeyManagementAlgorithm::Dir,
            EncryptionAlgorithm::A128CbcHs256,
            key,
        )
        .claim("sub", Value::from("alice"))
        .encode()
        .unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 5);
        assert!(parts[1].is_empty(), "dir carries no encrypted key");
        assert!(!parts[2].is_empty());
        assert!(!parts[4].is_empty());
    }

    #[test]
    fn jwe_header_orders_registered_members_first() {
        let key = Jwk::symmetric(&[0u8; 16]);
        let token = JweDescriptor::new(
            KeyManagementAlgorithm::A128GcmKw,
            EncryptionAlgorithm::A128Gcm,
            key,
        )
        .kid("kek-1")
        .encode()
        .unwrap();
        let header_b64 = token.split('.').next().unwrap();
        let header = base64url::decode_vec(header_b64.as_bytes()).unwrap();
        let text = String::from_utf8(header).unwrap();
        assert!(
            text.starts_with(r#"{"alg":"A128GCMKW","enc":"A128GCM","kid":"kek-1""#),
            "unexpected header: {text}"
        );
        assert!(text.contains(r#""iv":"#));
        assert!(text.contains(r#""tag":"#));
    }

    #[test]
    fn nested_descriptor_sets_cty() {
        let inner = JwsDescriptor::new(SignatureAlgorithm::Hs256, Jwk::symmetric(&[1u8; 32]))
            .subject("inner");
        let token = JweDescriptor::new(
            KeyManagementAlgorithm::A128Kw,
            EncryptionAlgorithm::A128CbcHs256,
            Jwk::symmetric(&[2u8; 16]),
        )
        .nested(inner)
        .encode()
        .unwrap();
        let header_b64 = token.split('.').next().unwrap();
        let header = base64url::decode_vec(header_b64.as_bytes()).unwrap();
        assert!(String::from_utf8(header).unwrap().contains(r#""cty":"JWT""#));
    }

    #[test]
    fn signing_key_must_support_the_algorithm() {
        let rsa_alg_with_oct_key =
            JwsDescriptor::new(SignatureAlgorithm::Rs256, Jwk::symmetric(&[0u8; 32]))
                .encode();
        assert_eq!(rsa_alg_with_oct_key, Err(TokenError::SignatureKeyNotFound));
    }

    #[test]
    fn wrap_key_must_support_the_algorithm() {
        let result = JweDescriptor::new(
            KeyManagementAlgorithm::A256Kw,
            EncryptionAlgorithm::A128Gcm,
            Jwk::symmetric(&[0u8; 16]), // 128-bit key cannot serve A256KW
        )
        .encode();
        assert_eq!(result, Err(TokenError::EncryptionKeyNotFound));
    }
}
