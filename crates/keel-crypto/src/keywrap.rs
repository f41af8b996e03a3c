//! JWE key management: CEK wrapping and unwrapping (RFC 7518 §4).
//!
//! Wrappers produce the CEK together with its encrypted form and insert any
//! algorithm-specific header parameters (`epk`, `iv`/`tag`, `p2s`/`p2c`,
//! `apu`/`apv`) before the header is serialized. Unwrappers read the same
//! parameters back.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

use crate::alg::{EncryptionAlgorithm, KeyManagementAlgorithm};
use crate::base64url;
use crate::content::{gcm_open, gcm_seal};
use crate::error::CryptoError;
use crate::jwk::{EcPublicKey, EcSecretKey};

/// Upper bound on `p2c` accepted from untrusted headers.
const MAX_PBES2_ITERATIONS: u64 = 1_000_000;
/// PBES2 iteration count used when producing tokens (RFC 7518 suggests >= 1000).
pub const PBES2_ITERATIONS: u32 = 4096;
const PBES2_SALT_LEN: usize = 16;

/// A CEK and its transported form.
pub struct WrappedKey {
    pub cek: Zeroizing<Vec<u8>>,
    /// Contents of the encrypted-key segment; empty for direct algorithms.
    pub encrypted_key: Vec<u8>,
}

/// Produces the CEK for one JWE, inserting key-management header parameters.
pub trait KeyWrapper {
    fn algorithm(&self) -> KeyManagementAlgorithm;

    fn wrap(
        &self,
        enc: EncryptionAlgorithm,
        header: &mut Map<String, Value>,
    ) -> Result<WrappedKey, CryptoError>;
}

/// Recovers the CEK from the encrypted-key segment and header parameters.
pub trait KeyUnwrapper {
    fn algorithm(&self) -> KeyManagementAlgorithm;

    fn unwrap(
        &self,
        encrypted_key: &[u8],
        enc: EncryptionAlgorithm,
        header: &Map<String, Value>,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError>;
}

pub(crate) fn random_bytes(len: usize) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let mut buf = Zeroizing::new(vec![0u8; len]);
    getrandom::getrandom(&mut buf).map_err(|e| CryptoError::RngFailed(e.to_string()))?;
    Ok(buf)
}

fn header_b64_param(header: &Map<String, Value>, name: &str) -> Result<Vec<u8>, CryptoError> {
    let raw = header
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| CryptoError::UnwrapFailed(format!("missing header parameter `{}`", name)))?;
    base64url::decode_vec(raw.as_bytes())
}

/// AES key wrap (RFC 3394) with a 128/192/256-bit KEK.
pub(crate) fn aes_wrap(kek: &[u8], cek: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut out = vec![0u8; cek.len() + 8];
    let map = |e: aes_kw::Error| CryptoError::WrapFailed(format!("{:?}", e));
    match kek.len() {
        16 => {
            let kek: [u8; 16] = kek.try_into().expect("length checked");
            aes_kw::KekAes128::from(kek).wrap(cek, &mut out).map_err(map)?;
        }
        24 => {
            let kek: [u8; 24] = kek.try_into().expect("length checked");
            aes_kw::KekAes192::from(kek).wrap(cek, &mut out).map_err(map)?;
        }
        32 => {
            let kek: [u8; 32] = kek.try_into().expect("length checked");
            aes_kw::KekAes256::from(kek).wrap(cek, &mut out).map_err(map)?;
        }
        n => {
            return Err(CryptoError::InvalidKeyLength {
                expected: 32,
                got: n,
            })
        }
    }
    Ok(out)
}

/// AES key unwrap (RFC 3394); fails on an integrity-check mismatch.
pub(crate) fn aes_unwrap(kek: &[u8], wrapped: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if wrapped.len() < 16 || wrapped.len() % 8 != 0 {
        return Err(CryptoError::UnwrapFailed("bad wrapped key length".into()));
    }
    let mut out = Zeroizing::new(vec![0u8; wrapped.len() - 8]);
    let map = |e: aes_kw::Error| CryptoError::UnwrapFailed(format!("{:?}", e));
    match kek.len() {
        16 => {
            let kek: [u8; 16] = kek.try_into().expect("length checked");
            aes_kw::KekAes128::from(kek)
                .unwrap(wrapped, &mut out)
                .map_err(map)?;
        }
        24 => {
            let kek: [u8; 24] = kek.try_into().expect("length checked");
            aes_kw::KekAes192::from(kek)
                .unwrap(wrapped, &mut out)
                .map_err(map)?;
        }
        32 => {
            let kek: [u8; 32] = kek.try_into().expect("length checked");
            aes_kw::KekAes256::from(kek)
                .unwrap(wrapped, &mut out)
                .map_err(map)?;
        }
        n => {
            return Err(CryptoError::InvalidKeyLength {
                expected: 32,
                got: n,
            })
        }
    }
    Ok(out)
}

/// Concat KDF (NIST SP 800-56A §5.8.1) over SHA-256.
///
/// `alg_id` is the `enc` name for direct ECDH-ES and the `alg` name for the
/// `+AnnnKW` variants (RFC 7518 §4.6.2).
pub(crate) fn concat_kdf(
    z: &[u8],
    alg_id: &str,
    key_len: usize,
    apu: &[u8],
    apv: &[u8],
) -> Zeroizing<Vec<u8>> {
    let mut out = Zeroizing::new(Vec::with_capacity(key_len.next_multiple_of(32)));
    let reps = key_len.div_ceil(32) as u32;
    for round in 1..=reps {
        let mut hasher = Sha256::new();
        hasher.update(round.to_be_bytes());
        hasher.update(z);
        hasher.update((alg_id.len() as u32).to_be_bytes());
        hasher.update(alg_id.as_bytes());
        hasher.update((apu.len() as u32).to_be_bytes());
        hasher.update(apu);
        hasher.update((apv.len() as u32).to_be_bytes());
        hasher.update(apv);
        hasher.update(((key_len * 8) as u32).to_be_bytes());
        out.extend_from_slice(&hasher.finalize());
    }
    out.truncate(key_len);
    out
}

/// `dir`: the key is the CEK, the encrypted-key segment stays empty.
pub struct DirectKey {
    key: Zeroizing<Vec<u8>>,
}

impl DirectKey {
    pub fn new(key: &[u8]) -> Self {
        Self {
            key: Zeroizing::new(key.to_vec()),
        }
    }
}

impl KeyWrapper for DirectKey {
    fn algorithm(&self) -> KeyManagementAlgorithm {
        KeyManagementAlgorithm::Dir
    }

    fn wrap(
        &self,
        enc: EncryptionAlgorithm,
        _header: &mut Map<String, Value>,
    ) -> Result<WrappedKey, CryptoError> {
        if self.key.len() != enc.key_len() {
            return Err(CryptoError::InvalidKeyLength {
                expected: enc.key_len(),
                got: self.key.len(),
            });
        }
        Ok(WrappedKey {
            cek: self.key.clone(),
            encrypted_key: Vec::new(),
        })
    }
}

impl KeyUnwrapper for DirectKey {
    fn algorithm(&self) -> KeyManagementAlgorithm {
        KeyManagementAlgorithm::Dir
    }

    fn unwrap(
        &self,
        encrypted_key: &[u8],
        enc: EncryptionAlgorithm,
        _header: &Map<String, Value>,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        if !encrypted_key.is_empty() {
            return Err(CryptoError::UnwrapFailed(
                "encrypted key must be empty for dir".into(),
            ));
        }
        if self.key.len() != enc.key_len() {
            return Err(CryptoError::InvalidKeyLength {
                expected: enc.key_len(),
                got: self.key.len(),
            });
        }
        Ok(self.key.clone())
    }
}

/// A128KW / A192KW / A256KW.
pub struct AesKw {
    alg: KeyManagementAlgorithm,
    key: Zeroizing<Vec<u8>>,
}

impl AesKw {
    pub fn new(alg: KeyManagementAlgorithm, key: &[u8]) -> Result<Self, CryptoError> {
        let expected = alg
            .kek_len()
            .ok_or_else(|| CryptoError::UnsupportedAlgorithm(alg.name().to_owned()))?;
        if key.len() != expected {
            return Err(CryptoError::InvalidKeyLength {
                expected,
                got: key.len(),
            });
        }
        Ok(Self {
            alg,
            key: Zeroizing::new(key.to_vec()),
        })
    }
}

impl KeyWrapper for AesKw {
    fn algorithm(&self) -> KeyManagementAlgorithm {
        self.alg
    }

    fn wrap(
        &self,
        enc: EncryptionAlgorithm,
        _header: &mut Map<String, Value>,
    ) -> Result<WrappedKey, CryptoError> {
        let cek = random_bytes(enc.key_len())?;
        let encrypted_key = aes_wrap(&self.key, &cek)?;
        Ok(WrappedKey { cek, encrypted_key })
    }
}

impl KeyUnwrapper for AesKw {
    fn algorithm(&self) -> KeyManagementAlgorithm {
        self.alg
    }

    fn unwrap(
        &self,
        encrypted_key: &[u8],
        _enc: EncryptionAlgorithm,
        _header: &Map<String, Value>,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        aes_unwrap(&self.key, encrypted_key)
    }
}

/// A128GCMKW / A192GCMKW / A256GCMKW; carries `iv` and `tag` in the header.
pub struct AesGcmKw {
    alg: KeyManagementAlgorithm,
    key: Zeroizing<Vec<u8>>,
}

impl AesGcmKw {
    pub fn new(alg: KeyManagementAlgorithm, key: &[u8]) -> Result<Self, CryptoError> {
        let expected = alg
            .kek_len()
            .ok_or_else(|| CryptoError::UnsupportedAlgorithm(alg.name().to_owned()))?;
        if key.len() != expected {
            return Err(CryptoError::InvalidKeyLength {
                expected,
                got: key.len(),
            });
        }
        Ok(Self {
            alg,
            key: Zeroizing::new(key.to_vec()),
        })
    }
}

impl KeyWrapper for AesGcmKw {
    fn algorithm(&self) -> KeyManagementAlgorithm {
        self.alg
    }

    fn wrap(
        &self,
        enc: EncryptionAlgorithm,
        header: &mut Map<String, Value>,
    ) -> Result<WrappedKey, CryptoError> {
        let cek = random_bytes(enc.key_len())?;
        let iv = random_bytes(12)?;
        let mut sealed = gcm_seal(&self.key, &iv, b"", &cek)?;
        let tag = sealed.split_off(sealed.len() - 16);
        header.insert(
            "iv".to_owned(),
            Value::String(base64url::encode_string(&iv)),
        );
        header.insert(
            "tag".to_owned(),
            Value::String(base64url::encode_string(&tag)),
        );
        Ok(WrappedKey {
            cek,
            encrypted_key: sealed,
        })
    }
}

impl KeyUnwrapper for AesGcmKw {
    fn algorithm(&self) -> KeyManagementAlgorithm {
        self.alg
    }

    fn unwrap(
        &self,
        encrypted_key: &[u8],
        _enc: EncryptionAlgorithm,
        header: &Map<String, Value>,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let iv = header_b64_param(header, "iv")?;
        let tag = header_b64_param(header, "tag")?;
        let mut sealed = Vec::with_capacity(encrypted_key.len() + tag.len());
        sealed.extend_from_slice(encrypted_key);
        sealed.extend_from_slice(&tag);
        gcm_open(&self.key, &iv, b"", &sealed)
            .map(Zeroizing::new)
            .map_err(|e| CryptoError::UnwrapFailed(e.to_string()))
    }
}

/// RSA1_5 and RSA-OAEP variants over a recipient public key.
pub struct RsaWrapper {
    alg: KeyManagementAlgorithm,
    key: rsa::RsaPublicKey,
}

impl RsaWrapper {
    pub fn new(alg: KeyManagementAlgorithm, key: rsa::RsaPublicKey) -> Self {
        Self { alg, key }
    }
}

fn rsa_encrypt(
    alg: KeyManagementAlgorithm,
    key: &rsa::RsaPublicKey,
    msg: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let mut rng = rand::rngs::OsRng;
    let map = |e: rsa::Error| CryptoError::WrapFailed(e.to_string());
    match alg {
        KeyManagementAlgorithm::Rsa1_5 => {
            key.encrypt(&mut rng, rsa::Pkcs1v15Encrypt, msg).map_err(map)
        }
        KeyManagementAlgorithm::RsaOaep => key
            .encrypt(&mut rng, rsa::Oaep::new::<sha1::Sha1>(), msg)
            .map_err(map),
        KeyManagementAlgorithm::RsaOaep256 => key
            .encrypt(&mut rng, rsa::Oaep::new::<sha2::Sha256>(), msg)
            .map_err(map),
        KeyManagementAlgorithm::RsaOaep384 => key
            .encrypt(&mut rng, rsa::Oaep::new::<sha2::Sha384>(), msg)
            .map_err(map),
        KeyManagementAlgorithm::RsaOaep512 => key
            .encrypt(&mut rng, rsa::Oaep::new::<sha2::Sha512>(), msg)
            .map_err(map),
        _ => Err(CryptoError::UnsupportedAlgorithm(alg.name().to_owned())),
    }
}

impl KeyWrapper for RsaWrapper {
    fn algorithm(&self) -> KeyManagementAlgorithm {
        self.alg
    }

    fn wrap(
        &self,
        enc: EncryptionAlgorithm,
        _header: &mut Map<String, Value>,
    ) -> Result<WrappedKey, CryptoError> {
        let cek = random_bytes(enc.key_len())?;
        let encrypted_key = rsa_encrypt(self.alg, &self.key, &cek)?;
        Ok(WrappedKey { cek, encrypted_key })
    }
}

/// RSA unwrap over the recipient private key.
pub struct RsaUnwrapper {
    alg: KeyManagementAlgorithm,
    key: rsa::RsaPrivateKey,
}

impl RsaUnwrapper {
    pub fn new(alg: KeyManagementAlgorithm, key: rsa::RsaPrivateKey) -> Self {
        Self { alg, key }
    }
}

impl KeyUnwrapper for RsaUnwrapper {
    fn algorithm(&self) -> KeyManagementAlgorithm {
        self.alg
    }

    fn unwrap(
        &self,
        encrypted_key: &[u8],
        _enc: EncryptionAlgorithm,
        _header: &Map<String, Value>,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let map = |e: rsa::Error| CryptoError::UnwrapFailed(e.to_string());
        let cek = match self.alg {
            KeyManagementAlgorithm::Rsa1_5 => self
                .key
                .decrypt(rsa::Pkcs1v15Encrypt, encrypted_key)
                .map_err(map)?,
            KeyManagementAlgorithm::RsaOaep => self
                .key
                .decrypt(rsa::Oaep::new::<sha1::Sha1>(), encrypted_key)
                .map_err(map)?,
            KeyManagementAlgorithm::RsaOaep256 => self
                .key
                .decrypt(rsa::Oaep::new::<sha2::Sha256>(), encrypted_key)
                .map_err(map)?,
            KeyManagementAlgorithm::RsaOaep384 => self
                .key
                .decrypt(rsa::Oaep::new::<sha2::Sha384>(), encrypted_key)
                .map_err(map)?,
            KeyManagementAlgorithm::RsaOaep512 => self
                .key
                .decrypt(rsa::Oaep::new::<sha2::Sha512>(), encrypted_key)
                .map_err(map)?,
            _ => return Err(CryptoError::UnsupportedAlgorithm(self.alg.name().to_owned())),
        };
        Ok(Zeroizing::new(cek))
    }
}

/// ECDH-ES and ECDH-ES+AnnnKW over NIST curves.
///
/// The wrap side holds the recipient public key and generates an ephemeral
/// keypair per token, publishing it as `epk`. The unwrap side holds the
/// recipient private key and reads `epk` back.
pub struct EcdhEsWrapper {
    alg: KeyManagementAlgorithm,
    recipient: EcPublicKey,
    apu: Option<Vec<u8>>,
    apv: Option<Vec<u8>>,
}

impl EcdhEsWrapper {
    pub fn new(alg: KeyManagementAlgorithm, recipient: EcPublicKey) -> Self {
        Self {
            alg,
            recipient,
            apu: None,
            apv: None,
        }
    }

    pub fn with_party_info(mut self, apu: Option<Vec<u8>>, apv: Option<Vec<u8>>) -> Self {
        self.apu = apu;
        self.apv = apv;
        self
    }
}

fn ecdh_derive(
    alg: KeyManagementAlgorithm,
    enc: EncryptionAlgorithm,
    shared: &[u8],
    apu: &[u8],
    apv: &[u8],
) -> Zeroizing<Vec<u8>> {
    // AlgorithmID and derived key width differ between direct and +KW modes.
    match alg.kek_len() {
        Some(kek_len) => concat_kdf(shared, alg.name(), kek_len, apu, apv),
        None => concat_kdf(shared, enc.name(), enc.key_len(), apu, apv),
    }
}

impl KeyWrapper for EcdhEsWrapper {
    fn algorithm(&self) -> KeyManagementAlgorithm {
        self.alg
    }

    fn wrap(
        &self,
        enc: EncryptionAlgorithm,
        header: &mut Map<String, Value>,
    ) -> Result<WrappedKey, CryptoError> {
        let ephemeral = EcSecretKey::generate(self.recipient.curve())?;
        let mut shared = ephemeral.diffie_hellman(&self.recipient)?;

        let apu = self.apu.as_deref().unwrap_or(&[]);
        let apv = self.apv.as_deref().unwrap_or(&[]);
        let derived = ecdh_derive(self.alg, enc, &shared, apu, apv);
        shared.zeroize();

        header.insert("epk".to_owned(), ephemeral.public_key().to_epk_value());
        if let Some(apu) = &self.apu {
            header.insert(
                "apu".to_owned(),
                Value::String(base64url::encode_string(apu)),
            );
        }
        if let Some(apv) = &self.apv {
            header.insert(
                "apv".to_owned(),
                Value::String(base64url::encode_string(apv)),
            );
        }

        if self.alg.kek_len().is_some() {
            let cek = random_bytes(enc.key_len())?;
            let encrypted_key = aes_wrap(&derived, &cek)?;
            Ok(WrappedKey { cek, encrypted_key })
        } else {
            Ok(WrappedKey {
                cek: derived,
                encrypted_key: Vec::new(),
            })
        }
    }
}

pub struct EcdhEsUnwrapper {
    alg: KeyManagementAlgorithm,
    secret: EcSecretKey,
}

impl EcdhEsUnwrapper {
    pub fn new(alg: KeyManagementAlgorithm, secret: EcSecretKey) -> Self {
        Self { alg, secret }
    }
}

impl KeyUnwrapper for EcdhEsUnwrapper {
    fn algorithm(&self) -> KeyManagementAlgorithm {
        self.alg
    }

    fn unwrap(
        &self,
        encrypted_key: &[u8],
        enc: EncryptionAlgorithm,
        header: &Map<String, Value>,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let epk = header
            .get("epk")
            .ok_or_else(|| CryptoError::UnwrapFailed("missing header parameter `epk`".into()))?;
        let ephemeral = EcPublicKey::from_epk_value(epk)?;
        if ephemeral.curve() != self.secret.curve() {
            return Err(CryptoError::UnwrapFailed("epk curve mismatch".into()));
        }
        let mut shared = self.secret.diffie_hellman(&ephemeral)?;

        let apu = match header.get("apu") {
            Some(_) => header_b64_param(header, "apu")?,
            None => Vec::new(),
        };
        let apv = match header.get("apv") {
            Some(_) => header_b64_param(header, "apv")?,
            None => Vec::new(),
        };
        let derived = ecdh_derive(self.alg, enc, &shared, &apu, &apv);
        shared.zeroize();

        if self.alg.kek_len().is_some() {
            aes_unwrap(&derived, encrypted_key)
        } else {
            if !encrypted_key.is_empty() {
                return Err(CryptoError::UnwrapFailed(
                    "encrypted key must be empty for ECDH-ES".into(),
                ));
            }
            Ok(derived)
        }
    }
}

/// PBES2-HS256+A128KW / PBES2-HS384+A192KW / PBES2-HS512+A256KW.
pub struct Pbes2Key {
    alg: KeyManagementAlgorithm,
    password: Zeroizing<Vec<u8>>,
    iterations: u32,
}

impl Pbes2Key {
    pub fn new(alg: KeyManagementAlgorithm, password: &[u8]) -> Result<Self, CryptoError> {
        if !matches!(
            alg,
            KeyManagementAlgorithm::Pbes2Hs256A128Kw
                | KeyManagementAlgorithm::Pbes2Hs384A192Kw
                | KeyManagementAlgorithm::Pbes2Hs512A256Kw
        ) {
            return Err(CryptoError::UnsupportedAlgorithm(alg.name().to_owned()));
        }
        Ok(Self {
            alg,
            password: Zeroizing::new(password.to_vec()),
            iterations: PBES2_ITERATIONS,
        })
    }

    /// Salt is `alg-name || 0x00 || salt_input` (RFC 7518 §4.8.1.1).
    fn derive_kek(&self, salt_input: &[u8], iterations: u32) -> Zeroizing<Vec<u8>> {
        let name = self.alg.name().as_bytes();
        let mut salt = Vec::with_capacity(name.len() + 1 + salt_input.len());
        salt.extend_from_slice(name);
        salt.push(0);
        salt.extend_from_slice(salt_input);

        let kek_len = self.alg.kek_len().unwrap_or(32);
        let mut kek = Zeroizing::new(vec![0u8; kek_len]);
        match self.alg {
            KeyManagementAlgorithm::Pbes2Hs256A128Kw => {
                pbkdf2::pbkdf2_hmac::<Sha256>(&self.password, &salt, iterations, &mut kek)
            }
            KeyManagementAlgorithm::Pbes2Hs384A192Kw => {
                pbkdf2::pbkdf2_hmac::<sha2::Sha384>(&self.password, &salt, iterations, &mut kek)
            }
            _ => pbkdf2::pbkdf2_hmac::<sha2::Sha512>(&self.password, &salt, iterations, &mut kek),
        }
        kek
    }
}

impl KeyWrapper for Pbes2Key {
    fn algorithm(&self) -> KeyManagementAlgorithm {
        self.alg
    }

    fn wrap(
        &self,
        enc: EncryptionAlgorithm,
        header: &mut Map<String, Value>,
    ) -> Result<WrappedKey, CryptoError> {
        let salt_input = random_bytes(PBES2_SALT_LEN)?;
        let kek = self.derive_kek(&salt_input, self.iterations);

        header.insert(
            "p2s".to_owned(),
            Value::String(base64url::encode_string(&salt_input)),
        );
        header.insert("p2c".to_owned(), Value::from(self.iterations));

        let cek = random_bytes(enc.key_len())?;
        let encrypted_key = aes_wrap(&kek, &cek)?;
        Ok(WrappedKey { cek, encrypted_key })
    }
}

impl KeyUnwrapper for Pbes2Key {
    fn algorithm(&self) -> KeyManagementAlgorithm {
        self.alg
    }

    fn unwrap(
        &self,
        encrypted_key: &[u8],
        _enc: EncryptionAlgorithm,
        header: &Map<String, Value>,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let salt_input = header_b64_param(header, "p2s")?;
        let iterations = header
            .get("p2c")
            .and_then(Value::as_u64)
            .ok_or_else(|| CryptoError::UnwrapFailed("missing header parameter `p2c`".into()))?;
        // Bound attacker-controlled work before deriving.
        if iterations == 0 || iterations > MAX_PBES2_ITERATIONS {
            return Err(CryptoError::UnwrapFailed(format!(
                "p2c out of range: {}",
                iterations
            )));
        }
        let kek = self.derive_kek(&salt_input, iterations as u32);
        aes_unwrap(&kek, encrypted_key)
    }
}
