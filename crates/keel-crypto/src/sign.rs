//! JWS signing and verification primitives.
//!
//! HMAC tags are compared in constant time. ECDSA signatures use the raw
//! IEEE P1363 format (r||s) required by JWS, not ASN.1 DER.

use hmac::{Hmac, Mac};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Signer as _, Verifier as _};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::alg::SignatureAlgorithm;
use crate::error::CryptoError;

/// Produces a detached signature over a message.
pub trait Signer {
    fn algorithm(&self) -> SignatureAlgorithm;

    /// Exact size of the signature this signer emits.
    fn signature_len(&self) -> usize;

    /// Sign `message` into `dst`, returning the number of bytes written.
    fn sign(&self, message: &[u8], dst: &mut [u8]) -> Result<usize, CryptoError>;
}

/// Checks a detached signature over a message.
pub trait Verifier {
    fn algorithm(&self) -> SignatureAlgorithm;

    /// Returns true only for a valid signature. Never errors on garbage input.
    fn verify(&self, message: &[u8], signature: &[u8]) -> bool;
}

fn copy_signature(sig: &[u8], dst: &mut [u8]) -> Result<usize, CryptoError> {
    if dst.len() < sig.len() {
        return Err(CryptoError::BufferTooSmall {
            need: sig.len(),
            have: dst.len(),
        });
    }
    dst[..sig.len()].copy_from_slice(sig);
    Ok(sig.len())
}

fn hmac_tag(
    alg: SignatureAlgorithm,
    key: &[u8],
    message: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let tag = match alg {
        SignatureAlgorithm::Hs256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key)
                .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
            mac.update(message);
            mac.finalize().into_bytes().to_vec()
        }
        SignatureAlgorithm::Hs384 => {
            let mut mac = Hmac::<Sha384>::new_from_slice(key)
                .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
            mac.update(message);
            mac.finalize().into_bytes().to_vec()
        }
        SignatureAlgorithm::Hs512 => {
            let mut mac = Hmac::<Sha512>::new_from_slice(key)
                .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
            mac.update(message);
            mac.finalize().into_bytes().to_vec()
        }
        _ => return Err(CryptoError::UnsupportedAlgorithm(alg.name().to_owned())),
    };
    Ok(Zeroizing::new(tag))
}

/// HMAC-SHA2 signer and verifier over a shared secret.
pub struct HmacKey {
    alg: SignatureAlgorithm,
    key: Zeroizing<Vec<u8>>,
}

impl HmacKey {
    /// The secret must be at least as long as the hash output (RFC 7518 §3.2).
    pub fn new(alg: SignatureAlgorithm, key: &[u8]) -> Result<Self, CryptoError> {
        if !alg.is_hmac() {
            return Err(CryptoError::UnsupportedAlgorithm(alg.name().to_owned()));
        }
        if key.len() < alg.min_key_len() {
            return Err(CryptoError::InvalidKeyLength {
                expected: alg.min_key_len(),
                got: key.len(),
            });
        }
        Ok(Self {
            alg,
            key: Zeroizing::new(key.to_vec()),
        })
    }
}

impl Signer for HmacKey {
    fn algorithm(&self) -> SignatureAlgorithm {
        self.alg
    }

    fn signature_len(&self) -> usize {
        self.alg.min_key_len()
    }

    fn sign(&self, message: &[u8], dst: &mut [u8]) -> Result<usize, CryptoError> {
        let tag = hmac_tag(self.alg, &self.key, message)?;
        copy_signature(&tag, dst)
    }
}

impl Verifier for HmacKey {
    fn algorithm(&self) -> SignatureAlgorithm {
        self.alg
    }

    fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(tag) = hmac_tag(self.alg, &self.key, message) else {
            return false;
        };
        if signature.len() != tag.len() {
            return false;
        }
        bool::from(tag.ct_eq(signature))
    }
}

/// RSA signer over a private key (RS* = PKCS#1 v1.5, PS* = PSS).
pub struct RsaSigner {
    alg: SignatureAlgorithm,
    key: RsaPrivateKey,
}

impl RsaSigner {
    pub fn new(alg: SignatureAlgorithm, key: RsaPrivateKey) -> Result<Self, CryptoError> {
        if !alg.is_rsa() {
            return Err(CryptoError::UnsupportedAlgorithm(alg.name().to_owned()));
        }
        if key.size() < alg.min_key_len() {
            return Err(CryptoError::InvalidKeyLength {
                expected: alg.min_key_len(),
                got: key.size(),
            });
        }
        Ok(Self { alg, key })
    }
}

impl Signer for RsaSigner {
    fn algorithm(&self) -> SignatureAlgorithm {
        self.alg
    }

    fn signature_len(&self) -> usize {
        self.key.size()
    }

    fn sign(&self, message: &[u8], dst: &mut [u8]) -> Result<usize, CryptoError> {
        let map = |e: rsa::signature::Error| CryptoError::SigningFailed(e.to_string());
        let sig: Vec<u8> = match self.alg {
            SignatureAlgorithm::Rs256 => rsa::pkcs1v15::SigningKey::<Sha256>::new(self.key.clone())
                .try_sign(message)
                .map_err(map)?
                .to_vec(),
            SignatureAlgorithm::Rs384 => rsa::pkcs1v15::SigningKey::<Sha384>::new(self.key.clone())
                .try_sign(message)
                .map_err(map)?
                .to_vec(),
            SignatureAlgorithm::Rs512 => rsa::pkcs1v15::SigningKey::<Sha512>::new(self.key.clone())
                .try_sign(message)
                .map_err(map)?
                .to_vec(),
            SignatureAlgorithm::Ps256 => rsa::pss::SigningKey::<Sha256>::new(self.key.clone())
                .try_sign_with_rng(&mut rand::rngs::OsRng, message)
                .map_err(map)?
                .to_vec(),
            SignatureAlgorithm::Ps384 => rsa::pss::SigningKey::<Sha384>::new(self.key.clone())
                .try_sign_with_rng(&mut rand::rngs::OsRng, message)
                .map_err(map)?
                .to_vec(),
            SignatureAlgorithm::Ps512 => rsa::pss::SigningKey::<Sha512>::new(self.key.clone())
                .try_sign_with_rng(&mut rand::rngs::OsRng, message)
                .map_err(map)?
                .to_vec(),
            _ => return Err(CryptoError::UnsupportedAlgorithm(self.alg.name().to_owned())),
        };
        copy_signature(&sig, dst)
    }
}

/// RSA verifier over a public key.
pub struct RsaVerifier {
    alg: SignatureAlgorithm,
    key: RsaPublicKey,
}

impl RsaVerifier {
    pub fn new(alg: SignatureAlgorithm, key: RsaPublicKey) -> Result<Self, CryptoError> {
        if !alg.is_rsa() {
            return Err(CryptoError::UnsupportedAlgorithm(alg.name().to_owned()));
        }
        Ok(Self { alg, key })
    }
}

impl Verifier for RsaVerifier {
    fn algorithm(&self) -> SignatureAlgorithm {
        self.alg
    }

    fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        match self.alg {
            SignatureAlgorithm::Rs256 => rsa::pkcs1v15::Signature::try_from(signature)
                .map(|sig| {
                    rsa::pkcs1v15::VerifyingKey::<Sha256>::new(self.key.clone())
                        .verify(message, &sig)
                        .is_ok()
                })
                .unwrap_or(false),
            SignatureAlgorithm::Rs384 => rsa::pkcs1v15::Signature::try_from(signature)
                .map(|sig| {
                    rsa::pkcs1v15::VerifyingKey::<Sha384>::new(self.key.clone())
                        .verify(message, &sig)
                        .is_ok()
                })
                .unwrap_or(false),
            SignatureAlgorithm::Rs512 => rsa::pkcs1v15::Signature::try_from(signature)
                .map(|sig| {
                    rsa::pkcs1v15::VerifyingKey::<Sha512>::new(self.key.clone())
                        .verify(message, &sig)
                        .is_ok()
                })
                .unwrap_or(false),
            SignatureAlgorithm::Ps256 => rsa::pss::Signature::try_from(signature)
                .map(|sig| {
                    rsa::pss::VerifyingKey::<Sha256>::new(self.key.clone())
                        .verify(message, &sig)
                        .is_ok()
                })
                .unwrap_or(false),
            SignatureAlgorithm::Ps384 => rsa::pss::Signature::try_from(signature)
                .map(|sig| {
                    rsa::pss::VerifyingKey::<Sha384>::new(self.key.clone())
                        .verify(message, &sig)
                        .is_ok()
                })
                .unwrap_or(false),
            SignatureAlgorithm::Ps512 => rsa::pss::Signature::try_from(signature)
                .map(|sig| {
                    rsa::pss::VerifyingKey::<Sha512>::new(self.key.clone())
                        .verify(message, &sig)
                        .is_ok()
                })
                .unwrap_or(false),
            _ => false,
        }
    }
}

/// ECDSA signer; curve chosen by the algorithm (ES256/384/512).
pub enum EcdsaSigner {
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
    P521(Box<p521::ecdsa::SigningKey>),
}

impl Signer for EcdsaSigner {
    fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            Self::P256(_) => SignatureAlgorithm::Es256,
            Self::P384(_) => SignatureAlgorithm::Es384,
            Self::P521(_) => SignatureAlgorithm::Es512,
        }
    }

    fn signature_len(&self) -> usize {
        match self {
            Self::P256(_) => 64,
            Self::P384(_) => 96,
            Self::P521(_) => 132,
        }
    }

    fn sign(&self, message: &[u8], dst: &mut [u8]) -> Result<usize, CryptoError> {
        let map = |e: rsa::signature::Error| CryptoError::SigningFailed(e.to_string());
        match self {
            Self::P256(key) => {
                let sig: p256::ecdsa::Signature = key.try_sign(message).map_err(map)?;
                copy_signature(&sig.to_bytes(), dst)
            }
            Self::P384(key) => {
                let sig: p384::ecdsa::Signature = key.try_sign(message).map_err(map)?;
                copy_signature(&sig.to_bytes(), dst)
            }
            Self::P521(key) => {
                let sig: p521::ecdsa::Signature = key.try_sign(message).map_err(map)?;
                copy_signature(&sig.to_bytes(), dst)
            }
        }
    }
}

/// ECDSA verifier; curve chosen by the algorithm (ES256/384/512).
pub enum EcdsaVerifier {
    P256(p256::ecdsa::VerifyingKey),
    P384(p384::ecdsa::VerifyingKey),
    P521(Box<p521::ecdsa::VerifyingKey>),
}

impl Verifier for EcdsaVerifier {
    fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            Self::P256(_) => SignatureAlgorithm::Es256,
            Self::P384(_) => SignatureAlgorithm::Es384,
            Self::P521(_) => SignatureAlgorithm::Es512,
        }
    }

    fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        match self {
            Self::P256(key) => p256::ecdsa::Signature::from_slice(signature)
                .map(|sig| key.verify(message, &sig).is_ok())
                .unwrap_or(false),
            Self::P384(key) => p384::ecdsa::Signature::from_slice(signature)
                .map(|sig| key.verify(message, &sig).is_ok())
                .unwrap_or(false),
            Self::P521(key) => p521::ecdsa::Signature::from_slice(signature)
                .map(|sig| key.verify(message, &sig).is_ok())
                .unwrap_or(false),
        }
    }
}
