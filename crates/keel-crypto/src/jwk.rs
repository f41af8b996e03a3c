//! JSON Web Key (RFC 7517) model.
//!
//! A `Jwk` is a tagged variant over symmetric, RSA, EC, and password-based
//! key material. Keys are immutable after construction and advertise which
//! algorithms they support; primitive objects are created per operation.

use p256::elliptic_curve::sec1::ToEncodedPoint;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::alg::{EncryptionAlgorithm, KeyManagementAlgorithm, SignatureAlgorithm};
use crate::base64url;
use crate::content::{self, AuthenticatedDecryptor, AuthenticatedEncryptor};
use crate::error::CryptoError;
use crate::keywrap::{
    AesGcmKw, AesKw, DirectKey, EcdhEsUnwrapper, EcdhEsWrapper, KeyUnwrapper, KeyWrapper,
    Pbes2Key, RsaUnwrapper, RsaWrapper,
};
use crate::sign::{EcdsaSigner, EcdsaVerifier, HmacKey, RsaSigner, RsaVerifier, Signer, Verifier};

/// NIST curve carried by an EC key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EcCurve {
    P256,
    P384,
    P521,
}

impl EcCurve {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::P256 => "P-256",
            Self::P384 => "P-384",
            Self::P521 => "P-521",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "P-256" => Self::P256,
            "P-384" => Self::P384,
            "P-521" => Self::P521,
            _ => return None,
        })
    }

    /// Field element width in bytes.
    pub const fn field_len(&self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }
}

/// Intended key usage (`use` parameter).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyUse {
    Signature,
    Encryption,
}

impl KeyUse {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Signature => "sig",
            Self::Encryption => "enc",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sig" => Some(Self::Signature),
            "enc" => Some(Self::Encryption),
            _ => None,
        }
    }
}

/// Left-pad a big-endian coordinate or scalar to the curve field width.
/// JWKs may strip leading zero bytes.
fn pad_field(crv: EcCurve, bytes: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let width = crv.field_len();
    if bytes.len() > width {
        return Err(CryptoError::InvalidJwk(format!(
            "field element too long for {}",
            crv.name()
        )));
    }
    let mut out = Zeroizing::new(vec![0u8; width]);
    out[width - bytes.len()..].copy_from_slice(bytes);
    Ok(out)
}

/// Build a SEC1 uncompressed point: `0x04 || x || y`, coordinates padded.
fn uncompressed_point(crv: EcCurve, x: &[u8], y: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let width = crv.field_len();
    let mut out = Vec::with_capacity(1 + 2 * width);
    out.push(0x04);
    out.extend_from_slice(&pad_field(crv, x)?);
    out.extend_from_slice(&pad_field(crv, y)?);
    Ok(out)
}

/// Public EC point usable for verification and ECDH.
#[derive(Clone)]
pub enum EcPublicKey {
    P256(p256::PublicKey),
    P384(p384::PublicKey),
    P521(Box<p521::PublicKey>),
}

impl EcPublicKey {
    pub fn curve(&self) -> EcCurve {
        match self {
            Self::P256(_) => EcCurve::P256,
            Self::P384(_) => EcCurve::P384,
            Self::P521(_) => EcCurve::P521,
        }
    }

    pub fn from_coords(crv: EcCurve, x: &[u8], y: &[u8]) -> Result<Self, CryptoError> {
        let sec1 = uncompressed_point(crv, x, y)?;
        let map = |e: p256::elliptic_curve::Error| CryptoError::InvalidJwk(e.to_string());
        match crv {
            EcCurve::P256 => p256::PublicKey::from_sec1_bytes(&sec1)
                .map(Self::P256)
                .map_err(map),
            EcCurve::P384 => p384::PublicKey::from_sec1_bytes(&sec1)
                .map(Self::P384)
                .map_err(map),
            EcCurve::P521 => p521::PublicKey::from_sec1_bytes(&sec1)
                .map(|k| Self::P521(Box::new(k)))
                .map_err(map),
        }
    }

    /// Parse an `epk` header parameter.
    pub fn from_epk_value(value: &Value) -> Result<Self, CryptoError> {
        if value.get("kty").and_then(Value::as_str) != Some("EC") {
            return Err(CryptoError::InvalidJwk("epk must be an EC key".into()));
        }
        let crv = value
            .get("crv")
            .and_then(Value::as_str)
            .and_then(EcCurve::from_name)
            .ok_or(CryptoError::MissingJwkField("crv"))?;
        let x = b64_field(value, "x")?;
        let y = b64_field(value, "y")?;
        Self::from_coords(crv, &x, &y)
    }

    /// Serialize as a public JWK for the `epk` header parameter.
    pub fn to_epk_value(&self) -> Value {
        let (x, y) = self.coords();
        json!({
            "kty": "EC",
            "crv": self.curve().name(),
            "x": base64url::encode_string(&x),
            "y": base64url::encode_string(&y),
        })
    }

    fn coords(&self) -> (Vec<u8>, Vec<u8>) {
        macro_rules! xy {
            ($key:expr) => {{
                let point = $key.to_encoded_point(false);
                (
                    point.x().map(|c| c.to_vec()).unwrap_or_default(),
                    point.y().map(|c| c.to_vec()).unwrap_or_default(),
                )
            }};
        }
        match self {
            Self::P256(k) => xy!(k),
            Self::P384(k) => xy!(k),
            Self::P521(k) => xy!(k),
        }
    }
}

/// Private EC scalar usable for signing and ECDH.
#[derive(Clone)]
pub enum EcSecretKey {
    P256(p256::SecretKey),
    P384(p384::SecretKey),
    P521(Box<p521::SecretKey>),
}

impl EcSecretKey {
    pub fn curve(&self) -> EcCurve {
        match self {
            Self::P256(_) => EcCurve::P256,
            Self::P384(_) => EcCurve::P384,
            Self::P521(_) => EcCurve::P521,
        }
    }

    pub fn generate(crv: EcCurve) -> Result<Self, CryptoError> {
        let mut rng = rand::rngs::OsRng;
        Ok(match crv {
            EcCurve::P256 => Self::P256(p256::SecretKey::random(&mut rng)),
            EcCurve::P384 => Self::P384(p384::SecretKey::random(&mut rng)),
            EcCurve::P521 => Self::P521(Box::new(p521::SecretKey::random(&mut rng))),
        })
    }

    pub fn from_scalar(crv: EcCurve, d: &[u8]) -> Result<Self, CryptoError> {
        let padded = pad_field(crv, d)?;
        let map = |e: p256::elliptic_curve::Error| CryptoError::InvalidJwk(e.to_string());
        match crv {
            EcCurve::P256 => p256::SecretKey::from_slice(&padded)
                .map(Self::P256)
                .map_err(map),
            EcCurve::P384 => p384::SecretKey::from_slice(&padded)
                .map(Self::P384)
                .map_err(map),
            EcCurve::P521 => p521::SecretKey::from_slice(&padded)
                .map(|k| Self::P521(Box::new(k)))
                .map_err(map),
        }
    }

    pub fn public_key(&self) -> EcPublicKey {
        match self {
            Self::P256(k) => EcPublicKey::P256(k.public_key()),
            Self::P384(k) => EcPublicKey::P384(k.public_key()),
            Self::P521(k) => EcPublicKey::P521(Box::new(k.public_key())),
        }
    }

    /// Serialize as a private JWK value.
    pub fn to_jwk_value(&self) -> Value {
        let (x, y) = self.public_key().coords();
        // to_bytes() zeroizes on drop, but the Vec used for encoding must be
        // wiped explicitly.
        let mut scalar = match self {
            Self::P256(k) => k.to_bytes().to_vec(),
            Self::P384(k) => k.to_bytes().to_vec(),
            Self::P521(k) => k.to_bytes().to_vec(),
        };
        let d = base64url::encode_string(&scalar);
        zeroize::Zeroize::zeroize(&mut scalar);

        json!({
            "kty": "EC",
            "crv": self.curve().name(),
            "x": base64url::encode_string(&x),
            "y": base64url::encode_string(&y),
            "d": d,
        })
    }

    /// ECDH agreement; both keys must be on the same curve.
    pub fn diffie_hellman(&self, other: &EcPublicKey) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        match (self, other) {
            (Self::P256(sk), EcPublicKey::P256(pk)) => Ok(Zeroizing::new(
                p256::ecdh::diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine())
                    .raw_secret_bytes()
                    .to_vec(),
            )),
            (Self::P384(sk), EcPublicKey::P384(pk)) => Ok(Zeroizing::new(
                p384::ecdh::diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine())
                    .raw_secret_bytes()
                    .to_vec(),
            )),
            (Self::P521(sk), EcPublicKey::P521(pk)) => Ok(Zeroizing::new(
                p521::ecdh::diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine())
                    .raw_secret_bytes()
                    .to_vec(),
            )),
            _ => Err(CryptoError::InvalidJwk("curve mismatch".into())),
        }
    }
}

/// RSA key components, big-endian unsigned integers.
#[derive(Clone)]
pub struct RsaParams {
    pub n: Vec<u8>,
    pub e: Vec<u8>,
    pub d: Option<Zeroizing<Vec<u8>>>,
    pub p: Option<Zeroizing<Vec<u8>>>,
    pub q: Option<Zeroizing<Vec<u8>>>,
}

/// Key material variants.
#[derive(Clone)]
pub enum JwkParams {
    Symmetric { k: Zeroizing<Vec<u8>> },
    Rsa(Box<RsaParams>),
    Ec {
        crv: EcCurve,
        x: Vec<u8>,
        y: Vec<u8>,
        d: Option<Zeroizing<Vec<u8>>>,
    },
    Password { secret: Zeroizing<Vec<u8>> },
}

/// An immutable JSON Web Key.
#[derive(Clone)]
pub struct Jwk {
    kid: Option<String>,
    key_use: Option<KeyUse>,
    alg: Option<String>,
    key_ops: Vec<String>,
    params: JwkParams,
}

fn b64_field(value: &Value, name: &'static str) -> Result<Vec<u8>, CryptoError> {
    let raw = value
        .get(name)
        .and_then(Value::as_str)
        .ok_or(CryptoError::MissingJwkField(name))?;
    base64url::decode_vec(raw.as_bytes())
}

fn b64_field_opt(value: &Value, name: &'static str) -> Result<Option<Vec<u8>>, CryptoError> {
    match value.get(name) {
        Some(_) => b64_field(value, name).map(Some),
        None => Ok(None),
    }
}

impl Jwk {
    pub fn symmetric(k: &[u8]) -> Self {
        Self::new(JwkParams::Symmetric {
            k: Zeroizing::new(k.to_vec()),
        })
    }

    pub fn password(secret: &[u8]) -> Self {
        Self::new(JwkParams::Password {
            secret: Zeroizing::new(secret.to_vec()),
        })
    }

    pub fn new(params: JwkParams) -> Self {
        Self {
            kid: None,
            key_use: None,
            alg: None,
            key_ops: Vec::new(),
            params,
        }
    }

    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    pub fn with_use(mut self, key_use: KeyUse) -> Self {
        self.key_use = Some(key_use);
        self
    }

    pub fn with_alg(mut self, alg: impl Into<String>) -> Self {
        self.alg = Some(alg.into());
        self
    }

    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    pub fn key_use(&self) -> Option<KeyUse> {
        self.key_use
    }

    pub fn preferred_alg(&self) -> Option<&str> {
        self.alg.as_deref()
    }

    pub fn key_ops(&self) -> &[String] {
        &self.key_ops
    }

    pub fn params(&self) -> &JwkParams {
        &self.params
    }

    /// Parse a JWK from its JSON representation.
    pub fn from_json(value: &Value) -> Result<Self, CryptoError> {
        let kty = value
            .get("kty")
            .and_then(Value::as_str)
            .ok_or(CryptoError::MissingJwkField("kty"))?;

        let params = match kty {
            "oct" => JwkParams::Symmetric {
                k: Zeroizing::new(b64_field(value, "k")?),
            },
            "RSA" => JwkParams::Rsa(Box::new(RsaParams {
                n: b64_field(value, "n")?,
                e: b64_field(value, "e")?,
                d: b64_field_opt(value, "d")?.map(Zeroizing::new),
                p: b64_field_opt(value, "p")?.map(Zeroizing::new),
                q: b64_field_opt(value, "q")?.map(Zeroizing::new),
            })),
            "EC" => {
                let crv = value
                    .get("crv")
                    .and_then(Value::as_str)
                    .and_then(EcCurve::from_name)
                    .ok_or(CryptoError::MissingJwkField("crv"))?;
                JwkParams::Ec {
                    crv,
                    x: b64_field(value, "x")?,
                    y: b64_field(value, "y")?,
                    d: b64_field_opt(value, "d")?.map(Zeroizing::new),
                }
            }
            other => {
                return Err(CryptoError::InvalidJwk(format!(
                    "unsupported kty `{}`",
                    other
                )))
            }
        };

        let key_ops = value
            .get("key_ops")
            .and_then(Value::as_array)
            .map(|ops| {
                ops.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            kid: value
                .get("kid")
                .and_then(Value::as_str)
                .map(str::to_owned),
            key_use: value
                .get("use")
                .and_then(Value::as_str)
                .and_then(KeyUse::from_name),
            alg: value
                .get("alg")
                .and_then(Value::as_str)
                .map(str::to_owned),
            key_ops,
            params,
        })
    }

    /// Serialize the public part of an asymmetric key as JSON.
    pub fn to_public_json(&self) -> Result<Value, CryptoError> {
        let mut out = match &self.params {
            JwkParams::Ec { crv, x, y, .. } => {
                let public = EcPublicKey::from_coords(*crv, x, y)?;
                public.to_epk_value()
            }
            JwkParams::Rsa(rsa) => json!({
                "kty": "RSA",
                "n": base64url::encode_string(&rsa.n),
                "e": base64url::encode_string(&rsa.e),
            }),
            _ => {
                return Err(CryptoError::InvalidJwk(
                    "symmetric keys have no public form".into(),
                ))
            }
        };
        if let (Some(kid), Some(map)) = (&self.kid, out.as_object_mut()) {
            map.insert("kid".to_owned(), Value::String(kid.clone()));
        }
        Ok(out)
    }

    /// RFC 7638 thumbprint: SHA-256 over the canonical required members,
    /// base64url-encoded.
    pub fn thumbprint(&self) -> Result<String, CryptoError> {
        // Required members in lexicographic order per key type.
        let input = match &self.params {
            JwkParams::Symmetric { k } => {
                format!(r#"{{"k":"{}","kty":"oct"}}"#, base64url::encode_string(k))
            }
            JwkParams::Rsa(rsa) => format!(
                r#"{{"e":"{}","kty":"RSA","n":"{}"}}"#,
                base64url::encode_string(&rsa.e),
                base64url::encode_string(&rsa.n)
            ),
            JwkParams::Ec { crv, x, y, .. } => {
                let padded_x = pad_field(*crv, x)?;
                let padded_y = pad_field(*crv, y)?;
                format!(
                    r#"{{"crv":"{}","kty":"EC","x":"{}","y":"{}"}}"#,
                    crv.name(),
                    base64url::encode_string(&padded_x),
                    base64url::encode_string(&padded_y)
                )
            }
            JwkParams::Password { .. } => {
                return Err(CryptoError::InvalidJwk(
                    "password keys have no thumbprint".into(),
                ))
            }
        };
        let hash = Sha256::digest(input.as_bytes());
        Ok(base64url::encode_string(&hash))
    }

    /// Whether this key can serve the named algorithm, taking the key's own
    /// `alg` preference into account.
    pub fn supports(&self, alg: &str) -> bool {
        if let Some(preferred) = &self.alg {
            if preferred != alg {
                return false;
            }
        }
        if let Some(sig) = SignatureAlgorithm::from_name(alg) {
            return self.supports_signature(sig);
        }
        if let Some(kma) = KeyManagementAlgorithm::from_name(alg) {
            return self.supports_key_management(kma);
        }
        false
    }

    fn supports_signature(&self, alg: SignatureAlgorithm) -> bool {
        match (&self.params, alg) {
            (JwkParams::Symmetric { k }, a) if a.is_hmac() => k.len() >= a.min_key_len(),
            (JwkParams::Rsa(_), a) if a.is_rsa() => true,
            (JwkParams::Ec { crv, .. }, SignatureAlgorithm::Es256) => *crv == EcCurve::P256,
            (JwkParams::Ec { crv, .. }, SignatureAlgorithm::Es384) => *crv == EcCurve::P384,
            (JwkParams::Ec { crv, .. }, SignatureAlgorithm::Es512) => *crv == EcCurve::P521,
            _ => false,
        }
    }

    fn supports_key_management(&self, alg: KeyManagementAlgorithm) -> bool {
        use KeyManagementAlgorithm as K;
        match (&self.params, alg) {
            (JwkParams::Symmetric { .. }, K::Dir) => true,
            (JwkParams::Symmetric { k }, a) if a.kek_len().is_some() => {
                // AES key wrap families take the KEK directly from `k`.
                !matches!(
                    a,
                    K::EcdhEsA128Kw
                        | K::EcdhEsA192Kw
                        | K::EcdhEsA256Kw
                        | K::Pbes2Hs256A128Kw
                        | K::Pbes2Hs384A192Kw
                        | K::Pbes2Hs512A256Kw
                ) && a.kek_len() == Some(k.len())
            }
            (
                JwkParams::Rsa(_),
                K::Rsa1_5 | K::RsaOaep | K::RsaOaep256 | K::RsaOaep384 | K::RsaOaep512,
            ) => true,
            (
                JwkParams::Ec { .. },
                K::EcdhEs | K::EcdhEsA128Kw | K::EcdhEsA192Kw | K::EcdhEsA256Kw,
            ) => true,
            (
                JwkParams::Password { .. },
                K::Pbes2Hs256A128Kw | K::Pbes2Hs384A192Kw | K::Pbes2Hs512A256Kw,
            ) => true,
            _ => false,
        }
    }

    fn rsa_public(&self) -> Result<RsaPublicKey, CryptoError> {
        let JwkParams::Rsa(rsa) = &self.params else {
            return Err(CryptoError::InvalidJwk("not an RSA key".into()));
        };
        RsaPublicKey::new(
            BigUint::from_bytes_be(&rsa.n),
            BigUint::from_bytes_be(&rsa.e),
        )
        .map_err(|e| CryptoError::InvalidJwk(e.to_string()))
    }

    fn rsa_private(&self) -> Result<RsaPrivateKey, CryptoError> {
        let JwkParams::Rsa(rsa) = &self.params else {
            return Err(CryptoError::InvalidJwk("not an RSA key".into()));
        };
        let d = rsa.d.as_ref().ok_or(CryptoError::MissingJwkField("d"))?;
        let mut primes = Vec::new();
        if let (Some(p), Some(q)) = (&rsa.p, &rsa.q) {
            primes.push(BigUint::from_bytes_be(p));
            primes.push(BigUint::from_bytes_be(q));
        }
        RsaPrivateKey::from_components(
            BigUint::from_bytes_be(&rsa.n),
            BigUint::from_bytes_be(&rsa.e),
            BigUint::from_bytes_be(d),
            primes,
        )
        .map_err(|e| CryptoError::InvalidJwk(e.to_string()))
    }

    fn ec_public(&self) -> Result<EcPublicKey, CryptoError> {
        let JwkParams::Ec { crv, x, y, .. } = &self.params else {
            return Err(CryptoError::InvalidJwk("not an EC key".into()));
        };
        EcPublicKey::from_coords(*crv, x, y)
    }

    fn ec_secret(&self) -> Result<EcSecretKey, CryptoError> {
        let JwkParams::Ec { crv, d, .. } = &self.params else {
            return Err(CryptoError::InvalidJwk("not an EC key".into()));
        };
        let d = d.as_ref().ok_or(CryptoError::MissingJwkField("d"))?;
        EcSecretKey::from_scalar(*crv, d)
    }

    pub fn create_signer(&self, alg: SignatureAlgorithm) -> Result<Box<dyn Signer>, CryptoError> {
        if !self.supports_signature(alg) {
            return Err(CryptoError::UnsupportedAlgorithm(alg.name().to_owned()));
        }
        match &self.params {
            JwkParams::Symmetric { k } => Ok(Box::new(HmacKey::new(alg, k)?)),
            JwkParams::Rsa(_) => Ok(Box::new(RsaSigner::new(alg, self.rsa_private()?)?)),
            JwkParams::Ec { .. } => {
                let secret = self.ec_secret()?;
                Ok(Box::new(match secret {
                    EcSecretKey::P256(k) => EcdsaSigner::P256(k.into()),
                    EcSecretKey::P384(k) => EcdsaSigner::P384(k.into()),
                    EcSecretKey::P521(k) => {
                        EcdsaSigner::P521(Box::new(ecdsa::SigningKey::from(*k).into()))
                    }
                }))
            }
            JwkParams::Password { .. } => {
                Err(CryptoError::UnsupportedAlgorithm(alg.name().to_owned()))
            }
        }
    }

    pub fn create_verifier(
        &self,
        alg: SignatureAlgorithm,
    ) -> Result<Box<dyn Verifier>, CryptoError> {
        if !self.supports_signature(alg) {
            return Err(CryptoError::UnsupportedAlgorithm(alg.name().to_owned()));
        }
        match &self.params {
            JwkParams::Symmetric { k } => Ok(Box::new(HmacKey::new(alg, k)?)),
            JwkParams::Rsa(_) => Ok(Box::new(RsaVerifier::new(alg, self.rsa_public()?)?)),
            JwkParams::Ec { .. } => {
                let public = self.ec_public()?;
                Ok(Box::new(match public {
                    EcPublicKey::P256(k) => EcdsaVerifier::P256(k.into()),
                    EcPublicKey::P384(k) => EcdsaVerifier::P384(k.into()),
                    EcPublicKey::P521(k) => {
                        EcdsaVerifier::P521(Box::new(ecdsa::VerifyingKey::from(*k).into()))
                    }
                }))
            }
            JwkParams::Password { .. } => {
                Err(CryptoError::UnsupportedAlgorithm(alg.name().to_owned()))
            }
        }
    }

    pub fn create_key_wrapper(
        &self,
        alg: KeyManagementAlgorithm,
    ) -> Result<Box<dyn KeyWrapper>, CryptoError> {
        use KeyManagementAlgorithm as K;
        if !self.supports_key_management(alg) {
            return Err(CryptoError::UnsupportedAlgorithm(alg.name().to_owned()));
        }
        match (&self.params, alg) {
            (JwkParams::Symmetric { k }, K::Dir) => Ok(Box::new(DirectKey::new(k))),
            (JwkParams::Symmetric { k }, K::A128Kw | K::A192Kw | K::A256Kw) => {
                Ok(Box::new(AesKw::new(alg, k)?))
            }
            (JwkParams::Symmetric { k }, K::A128GcmKw | K::A192GcmKw | K::A256GcmKw) => {
                Ok(Box::new(AesGcmKw::new(alg, k)?))
            }
            (JwkParams::Rsa(_), _) => Ok(Box::new(RsaWrapper::new(alg, self.rsa_public()?))),
            (JwkParams::Ec { .. }, _) => Ok(Box::new(EcdhEsWrapper::new(alg, self.ec_public()?))),
            (JwkParams::Password { secret }, _) => Ok(Box::new(Pbes2Key::new(alg, secret)?)),
            _ => Err(CryptoError::UnsupportedAlgorithm(alg.name().to_owned())),
        }
    }

    pub fn create_key_unwrapper(
        &self,
        alg: KeyManagementAlgorithm,
    ) -> Result<Box<dyn KeyUnwrapper>, CryptoError> {
        use KeyManagementAlgorithm as K;
        if !self.supports_key_management(alg) {
            return Err(CryptoError::UnsupportedAlgorithm(alg.name().to_owned()));
        }
        match (&self.params, alg) {
            (JwkParams::Symmetric { k }, K::Dir) => Ok(Box::new(DirectKey::new(k))),
            (JwkParams::Symmetric { k }, K::A128Kw | K::A192Kw | K::A256Kw) => {
                Ok(Box::new(AesKw::new(alg, k)?))
            }
            (JwkParams::Symmetric { k }, K::A128GcmKw | K::A192GcmKw | K::A256GcmKw) => {
                Ok(Box::new(AesGcmKw::new(alg, k)?))
            }
            (JwkParams::Rsa(_), _) => Ok(Box::new(RsaUnwrapper::new(alg, self.rsa_private()?))),
            (JwkParams::Ec { .. }, _) => {
                Ok(Box::new(EcdhEsUnwrapper::new(alg, self.ec_secret()?)))
            }
            (JwkParams::Password { secret }, _) => Ok(Box::new(Pbes2Key::new(alg, secret)?)),
            _ => Err(CryptoError::UnsupportedAlgorithm(alg.name().to_owned())),
        }
    }

    /// Direct content encryption with this key as the CEK (symmetric keys only).
    pub fn create_authenticated_encryptor(
        &self,
        enc: EncryptionAlgorithm,
    ) -> Result<Box<dyn AuthenticatedEncryptor>, CryptoError> {
        match &self.params {
            JwkParams::Symmetric { k } => content::encryptor(enc, k),
            _ => Err(CryptoError::InvalidJwk(
                "content encryption requires a symmetric key".into(),
            )),
        }
    }

    /// Direct content decryption with this key as the CEK (symmetric keys only).
    pub fn create_authenticated_decryptor(
        &self,
        enc: EncryptionAlgorithm,
    ) -> Result<Box<dyn AuthenticatedDecryptor>, CryptoError> {
        match &self.params {
            JwkParams::Symmetric { k } => content::decryptor(enc, k),
            _ => Err(CryptoError::InvalidJwk(
                "content decryption requires a symmetric key".into(),
            )),
        }
    }
}

impl std::fmt::Debug for Jwk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        let kty = match &self.params {
            JwkParams::Symmetric { .. } => "oct",
            JwkParams::Rsa(_) => "RSA",
            JwkParams::Ec { .. } => "EC",
            JwkParams::Password { .. } => "password",
        };
        f.debug_struct("Jwk")
            .field("kty", &kty)
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}
