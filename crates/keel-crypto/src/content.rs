//! JWE content encryption (RFC 7518 §5).
//!
//! AES-CBC-HMAC composes AES-128/192/256-CBC with HMAC-SHA-256/384/512: the
//! CEK is MAC key and AES key halves of equal size, and the tag is the
//! leading half of HMAC over `aad || iv || ciphertext || be64(aad_bits)`.
//! AES-GCM uses a 12-byte nonce and a 16-byte tag.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm, Nonce};
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::alg::EncryptionAlgorithm;
use crate::error::CryptoError;

type Aes192Gcm = AesGcm<aes::Aes192, U12>;

const GCM_NONCE_LEN: usize = 12;
const GCM_TAG_LEN: usize = 16;

/// Encrypts a plaintext under a fixed CEK with caller-supplied nonce and AAD.
pub trait AuthenticatedEncryptor {
    fn algorithm(&self) -> EncryptionAlgorithm;

    /// Returns `(ciphertext, tag)`.
    fn encrypt(
        &self,
        nonce: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>), CryptoError>;
}

/// Decrypts and authenticates a ciphertext under a fixed CEK.
pub trait AuthenticatedDecryptor {
    fn algorithm(&self) -> EncryptionAlgorithm;

    fn decrypt(
        &self,
        nonce: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError>;
}

/// Build a content encryptor for `enc` from raw CEK bytes.
pub fn encryptor(
    enc: EncryptionAlgorithm,
    cek: &[u8],
) -> Result<Box<dyn AuthenticatedEncryptor>, CryptoError> {
    if enc.is_cbc_hmac() {
        Ok(Box::new(AesCbcHmacCipher::new(enc, cek)?))
    } else {
        Ok(Box::new(AesGcmCipher::new(enc, cek)?))
    }
}

/// Build a content decryptor for `enc` from raw CEK bytes.
pub fn decryptor(
    enc: EncryptionAlgorithm,
    cek: &[u8],
) -> Result<Box<dyn AuthenticatedDecryptor>, CryptoError> {
    if enc.is_cbc_hmac() {
        Ok(Box::new(AesCbcHmacCipher::new(enc, cek)?))
    } else {
        Ok(Box::new(AesGcmCipher::new(enc, cek)?))
    }
}

/// AES-GCM seal producing `ciphertext || tag`. Shared with AES-GCM key wrap.
pub(crate) fn gcm_seal(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if nonce.len() != GCM_NONCE_LEN {
        return Err(CryptoError::EncryptionFailed(format!(
            "GCM nonce must be {} bytes, got {}",
            GCM_NONCE_LEN,
            nonce.len()
        )));
    }
    let payload = Payload {
        msg: plaintext,
        aad,
    };
    let init = |e: aes_gcm::aead::Error| CryptoError::EncryptionFailed(format!("{:?}", e));
    match key.len() {
        16 => Aes128Gcm::new_from_slice(key)
            .map_err(|e| CryptoError::EncryptionFailed(format!("{:?}", e)))?
            .encrypt(Nonce::from_slice(nonce), payload)
            .map_err(init),
        24 => Aes192Gcm::new_from_slice(key)
            .map_err(|e| CryptoError::EncryptionFailed(format!("{:?}", e)))?
            .encrypt(Nonce::from_slice(nonce), payload)
            .map_err(init),
        32 => Aes256Gcm::new_from_slice(key)
            .map_err(|e| CryptoError::EncryptionFailed(format!("{:?}", e)))?
            .encrypt(Nonce::from_slice(nonce), payload)
            .map_err(init),
        n => Err(CryptoError::InvalidKeyLength {
            expected: 32,
            got: n,
        }),
    }
}

/// AES-GCM open over `ciphertext || tag`. Shared with AES-GCM key unwrap.
pub(crate) fn gcm_open(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if nonce.len() != GCM_NONCE_LEN || data.len() < GCM_TAG_LEN {
        return Err(CryptoError::DecryptionFailed("malformed GCM input".into()));
    }
    let payload = Payload { msg: data, aad };
    let open = |e: aes_gcm::aead::Error| CryptoError::DecryptionFailed(format!("{:?}", e));
    match key.len() {
        16 => Aes128Gcm::new_from_slice(key)
            .map_err(|e| CryptoError::DecryptionFailed(format!("{:?}", e)))?
            .decrypt(Nonce::from_slice(nonce), payload)
            .map_err(open),
        24 => Aes192Gcm::new_from_slice(key)
            .map_err(|e| CryptoError::DecryptionFailed(format!("{:?}", e)))?
            .decrypt(Nonce::from_slice(nonce), payload)
            .map_err(open),
        32 => Aes256Gcm::new_from_slice(key)
            .map_err(|e| CryptoError::DecryptionFailed(format!("{:?}", e)))?
            .decrypt(Nonce::from_slice(nonce), payload)
            .map_err(open),
        n => Err(CryptoError::InvalidKeyLength {
            expected: 32,
            got: n,
        }),
    }
}

/// A128GCM / A192GCM / A256GCM content cipher.
pub struct AesGcmCipher {
    enc: EncryptionAlgorithm,
    key: Zeroizing<Vec<u8>>,
}

impl AesGcmCipher {
    pub fn new(enc: EncryptionAlgorithm, cek: &[u8]) -> Result<Self, CryptoError> {
        if enc.is_cbc_hmac() {
            return Err(CryptoError::UnsupportedAlgorithm(enc.name().to_owned()));
        }
        if cek.len() != enc.key_len() {
            return Err(CryptoError::InvalidKeyLength {
                expected: enc.key_len(),
                got: cek.len(),
            });
        }
        Ok(Self {
            enc,
            key: Zeroizing::new(cek.to_vec()),
        })
    }
}

impl AuthenticatedEncryptor for AesGcmCipher {
    fn algorithm(&self) -> EncryptionAlgorithm {
        self.enc
    }

    fn encrypt(
        &self,
        nonce: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
        let mut combined = gcm_seal(&self.key, nonce, aad, plaintext)?;
        let tag = combined.split_off(combined.len() - GCM_TAG_LEN);
        Ok((combined, tag))
    }
}

impl AuthenticatedDecryptor for AesGcmCipher {
    fn algorithm(&self) -> EncryptionAlgorithm {
        self.enc
    }

    fn decrypt(
        &self,
        nonce: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        if tag.len() != GCM_TAG_LEN {
            return Err(CryptoError::DecryptionFailed("bad tag length".into()));
        }
        let mut combined = Vec::with_capacity(ciphertext.len() + tag.len());
        combined.extend_from_slice(ciphertext);
        combined.extend_from_slice(tag);
        gcm_open(&self.key, nonce, aad, &combined).map(Zeroizing::new)
    }
}

/// A128CBC-HS256 / A192CBC-HS384 / A256CBC-HS512 content cipher.
pub struct AesCbcHmacCipher {
    enc: EncryptionAlgorithm,
    mac_key: Zeroizing<Vec<u8>>,
    enc_key: Zeroizing<Vec<u8>>,
}

impl AesCbcHmacCipher {
    pub fn new(enc: EncryptionAlgorithm, cek: &[u8]) -> Result<Self, CryptoError> {
        if !enc.is_cbc_hmac() {
            return Err(CryptoError::UnsupportedAlgorithm(enc.name().to_owned()));
        }
        if cek.len() != enc.key_len() {
            return Err(CryptoError::InvalidKeyLength {
                expected: enc.key_len(),
                got: cek.len(),
            });
        }
        // MAC key is the first half, AES key the second (RFC 7518 §5.2.2.1).
        let half = cek.len() / 2;
        Ok(Self {
            enc,
            mac_key: Zeroizing::new(cek[..half].to_vec()),
            enc_key: Zeroizing::new(cek[half..].to_vec()),
        })
    }

    /// Full-width HMAC over `aad || iv || ciphertext || be64(bits(aad))`.
    fn full_tag(
        &self,
        aad: &[u8],
        iv: &[u8],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let al = ((aad.len() as u64) * 8).to_be_bytes();
        macro_rules! mac_with {
            ($hash:ty) => {{
                let mut mac = <Hmac<$hash> as Mac>::new_from_slice(&self.mac_key)
                    .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
                mac.update(aad);
                mac.update(iv);
                mac.update(ciphertext);
                mac.update(&al);
                mac.finalize().into_bytes().to_vec()
            }};
        }
        let tag = match self.enc {
            EncryptionAlgorithm::A128CbcHs256 => mac_with!(Sha256),
            EncryptionAlgorithm::A192CbcHs384 => mac_with!(Sha384),
            EncryptionAlgorithm::A256CbcHs512 => mac_with!(Sha512),
            _ => return Err(CryptoError::UnsupportedAlgorithm(self.enc.name().to_owned())),
        };
        Ok(Zeroizing::new(tag))
    }

    fn cbc_encrypt(&self, iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let map = |e: aes::cipher::InvalidLength| CryptoError::EncryptionFailed(e.to_string());
        Ok(match self.enc_key.len() {
            16 => cbc::Encryptor::<aes::Aes128>::new_from_slices(&self.enc_key, iv)
                .map_err(map)?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            24 => cbc::Encryptor::<aes::Aes192>::new_from_slices(&self.enc_key, iv)
                .map_err(map)?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            32 => cbc::Encryptor::<aes::Aes256>::new_from_slices(&self.enc_key, iv)
                .map_err(map)?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            n => {
                return Err(CryptoError::InvalidKeyLength {
                    expected: 32,
                    got: n,
                })
            }
        })
    }

    fn cbc_decrypt(&self, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let map = |_| CryptoError::DecryptionFailed("CBC decrypt failed".into());
        match self.enc_key.len() {
            16 => cbc::Decryptor::<aes::Aes128>::new_from_slices(&self.enc_key, iv)
                .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                .map_err(map),
            24 => cbc::Decryptor::<aes::Aes192>::new_from_slices(&self.enc_key, iv)
                .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                .map_err(map),
            32 => cbc::Decryptor::<aes::Aes256>::new_from_slices(&self.enc_key, iv)
                .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                .map_err(map),
            n => Err(CryptoError::InvalidKeyLength {
                expected: 32,
                got: n,
            }),
        }
    }
}

impl AuthenticatedEncryptor for AesCbcHmacCipher {
    fn algorithm(&self) -> EncryptionAlgorithm {
        self.enc
    }

    fn encrypt(
        &self,
        nonce: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
        let ciphertext = self.cbc_encrypt(nonce, plaintext)?;
        let full = self.full_tag(aad, nonce, &ciphertext)?;
        let tag = full[..self.enc.tag_len()].to_vec();
        Ok((ciphertext, tag))
    }
}

impl AuthenticatedDecryptor for AesCbcHmacCipher {
    fn algorithm(&self) -> EncryptionAlgorithm {
        self.enc
    }

    fn decrypt(
        &self,
        nonce: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let full = self.full_tag(aad, nonce, ciphertext)?;
        let expected = &full[..self.enc.tag_len()];
        if tag.len() != expected.len() || !bool::from(expected.ct_eq(tag)) {
            return Err(CryptoError::DecryptionFailed(
                "authentication tag mismatch".into(),
            ));
        }
        self.cbc_decrypt(nonce, ciphertext).map(Zeroizing::new)
    }
}
