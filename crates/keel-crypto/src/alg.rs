//! Registered JOSE algorithm identifiers (RFC 7518).
//!
//! Closed enumerations; lookup is by exact UTF-8 name so an unknown or
//! mis-cased identifier fails instead of falling back to a default.

use std::fmt;

/// JWS signature algorithm (RFC 7518 §3.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    Hs256,
    Hs384,
    Hs512,
    Rs256,
    Rs384,
    Rs512,
    Ps256,
    Ps384,
    Ps512,
    Es256,
    Es384,
    Es512,
    /// Unsecured JWS. Rejected by readers unless explicitly allowed.
    None,
}

impl SignatureAlgorithm {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Hs256 => "HS256",
            Self::Hs384 => "HS384",
            Self::Hs512 => "HS512",
            Self::Rs256 => "RS256",
            Self::Rs384 => "RS384",
            Self::Rs512 => "RS512",
            Self::Ps256 => "PS256",
            Self::Ps384 => "PS384",
            Self::Ps512 => "PS512",
            Self::Es256 => "ES256",
            Self::Es384 => "ES384",
            Self::Es512 => "ES512",
            Self::None => "none",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "HS256" => Self::Hs256,
            "HS384" => Self::Hs384,
            "HS512" => Self::Hs512,
            "RS256" => Self::Rs256,
            "RS384" => Self::Rs384,
            "RS512" => Self::Rs512,
            "PS256" => Self::Ps256,
            "PS384" => Self::Ps384,
            "PS512" => Self::Ps512,
            "ES256" => Self::Es256,
            "ES384" => Self::Es384,
            "ES512" => Self::Es512,
            "none" => Self::None,
            _ => return None,
        })
    }

    /// Exact-match byte lookup.
    pub fn from_bytes(name: &[u8]) -> Option<Self> {
        std::str::from_utf8(name).ok().and_then(Self::from_name)
    }

    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub const fn is_hmac(&self) -> bool {
        matches!(self, Self::Hs256 | Self::Hs384 | Self::Hs512)
    }

    pub const fn is_rsa(&self) -> bool {
        matches!(
            self,
            Self::Rs256 | Self::Rs384 | Self::Rs512 | Self::Ps256 | Self::Ps384 | Self::Ps512
        )
    }

    pub const fn is_ecdsa(&self) -> bool {
        matches!(self, Self::Es256 | Self::Es384 | Self::Es512)
    }

    /// Minimum key material length in bytes (HMAC secret, RSA modulus, EC field).
    pub const fn min_key_len(&self) -> usize {
        match self {
            Self::Hs256 => 32,
            Self::Hs384 => 48,
            Self::Hs512 => 64,
            Self::Rs256 | Self::Rs384 | Self::Rs512 | Self::Ps256 | Self::Ps384 | Self::Ps512 => {
                256
            }
            Self::Es256 => 32,
            Self::Es384 => 48,
            Self::Es512 => 66,
            Self::None => 0,
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// JWE key management algorithm (RFC 7518 §4.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyManagementAlgorithm {
    Dir,
    A128Kw,
    A192Kw,
    A256Kw,
    A128GcmKw,
    A192GcmKw,
    A256GcmKw,
    Rsa1_5,
    RsaOaep,
    RsaOaep256,
    RsaOaep384,
    RsaOaep512,
    EcdhEs,
    EcdhEsA128Kw,
    EcdhEsA192Kw,
    EcdhEsA256Kw,
    Pbes2Hs256A128Kw,
    Pbes2Hs384A192Kw,
    Pbes2Hs512A256Kw,
}

impl KeyManagementAlgorithm {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Dir => "dir",
            Self::A128Kw => "A128KW",
            Self::A192Kw => "A192KW",
            Self::A256Kw => "A256KW",
            Self::A128GcmKw => "A128GCMKW",
            Self::A192GcmKw => "A192GCMKW",
            Self::A256GcmKw => "A256GCMKW",
            Self::Rsa1_5 => "RSA1_5",
            Self::RsaOaep => "RSA-OAEP",
            Self::RsaOaep256 => "RSA-OAEP-256",
            Self::RsaOaep384 => "RSA-OAEP-384",
            Self::RsaOaep512 => "RSA-OAEP-512",
            Self::EcdhEs => "ECDH-ES",
            Self::EcdhEsA128Kw => "ECDH-ES+A128KW",
            Self::EcdhEsA192Kw => "ECDH-ES+A192KW",
            Self::EcdhEsA256Kw => "ECDH-ES+A256KW",
            Self::Pbes2Hs256A128Kw => "PBES2-HS256+A128KW",
            Self::Pbes2Hs384A192Kw => "PBES2-HS384+A192KW",
            Self::Pbes2Hs512A256Kw => "PBES2-HS512+A256KW",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "dir" => Self::Dir,
            "A128KW" => Self::A128Kw,
            "A192KW" => Self::A192Kw,
            "A256KW" => Self::A256Kw,
            "A128GCMKW" => Self::A128GcmKw,
            "A192GCMKW" => Self::A192GcmKw,
            "A256GCMKW" => Self::A256GcmKw,
            "RSA1_5" => Self::Rsa1_5,
            "RSA-OAEP" => Self::RsaOaep,
            "RSA-OAEP-256" => Self::RsaOaep256,
            "RSA-OAEP-384" => Self::RsaOaep384,
            "RSA-OAEP-512" => Self::RsaOaep512,
            "ECDH-ES" => Self::EcdhEs,
            "ECDH-ES+A128KW" => Self::EcdhEsA128Kw,
            "ECDH-ES+A192KW" => Self::EcdhEsA192Kw,
            "ECDH-ES+A256KW" => Self::EcdhEsA256Kw,
            "PBES2-HS256+A128KW" => Self::Pbes2Hs256A128Kw,
            "PBES2-HS384+A192KW" => Self::Pbes2Hs384A192Kw,
            "PBES2-HS512+A256KW" => Self::Pbes2Hs512A256Kw,
            _ => return None,
        })
    }

    pub fn from_bytes(name: &[u8]) -> Option<Self> {
        std::str::from_utf8(name).ok().and_then(Self::from_name)
    }

    /// True when the CEK is used directly and the encrypted-key segment is empty.
    pub const fn is_direct(&self) -> bool {
        matches!(self, Self::Dir | Self::EcdhEs)
    }

    /// AES-KW key-encryption-key length for algorithms that wrap with AES-KW.
    pub const fn kek_len(&self) -> Option<usize> {
        match self {
            Self::A128Kw | Self::A128GcmKw | Self::EcdhEsA128Kw | Self::Pbes2Hs256A128Kw => {
                Some(16)
            }
            Self::A192Kw | Self::A192GcmKw | Self::EcdhEsA192Kw | Self::Pbes2Hs384A192Kw => {
                Some(24)
            }
            Self::A256Kw | Self::A256GcmKw | Self::EcdhEsA256Kw | Self::Pbes2Hs512A256Kw => {
                Some(32)
            }
            _ => None,
        }
    }
}

impl fmt::Display for KeyManagementAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// JWE content encryption algorithm (RFC 7518 §5.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EncryptionAlgorithm {
    A128CbcHs256,
    A192CbcHs384,
    A256CbcHs512,
    A128Gcm,
    A192Gcm,
    A256Gcm,
}

impl EncryptionAlgorithm {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::A128CbcHs256 => "A128CBC-HS256",
            Self::A192CbcHs384 => "A192CBC-HS384",
            Self::A256CbcHs512 => "A256CBC-HS512",
            Self::A128Gcm => "A128GCM",
            Self::A192Gcm => "A192GCM",
            Self::A256Gcm => "A256GCM",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "A128CBC-HS256" => Self::A128CbcHs256,
            "A192CBC-HS384" => Self::A192CbcHs384,
            "A256CBC-HS512" => Self::A256CbcHs512,
            "A128GCM" => Self::A128Gcm,
            "A192GCM" => Self::A192Gcm,
            "A256GCM" => Self::A256Gcm,
            _ => return None,
        })
    }

    pub fn from_bytes(name: &[u8]) -> Option<Self> {
        std::str::from_utf8(name).ok().and_then(Self::from_name)
    }

    /// Content encryption key length in bytes.
    /// CBC-HMAC keys are MAC key and AES key halves of equal size.
    pub const fn key_len(&self) -> usize {
        match self {
            Self::A128CbcHs256 => 32,
            Self::A192CbcHs384 => 48,
            Self::A256CbcHs512 => 64,
            Self::A128Gcm => 16,
            Self::A192Gcm => 24,
            Self::A256Gcm => 32,
        }
    }

    pub const fn iv_len(&self) -> usize {
        match self {
            Self::A128CbcHs256 | Self::A192CbcHs384 | Self::A256CbcHs512 => 16,
            Self::A128Gcm | Self::A192Gcm | Self::A256Gcm => 12,
        }
    }

    pub const fn tag_len(&self) -> usize {
        match self {
            Self::A128CbcHs256 => 16,
            Self::A192CbcHs384 => 24,
            Self::A256CbcHs512 => 32,
            Self::A128Gcm | Self::A192Gcm | Self::A256Gcm => 16,
        }
    }

    pub const fn is_cbc_hmac(&self) -> bool {
        matches!(
            self,
            Self::A128CbcHs256 | Self::A192CbcHs384 | Self::A256CbcHs512
        )
    }
}

impl fmt::Display for EncryptionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// JWE compression algorithm (RFC 7516 §4.1.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompressionAlgorithm {
    /// Raw DEFLATE (RFC 1951), no zlib wrapper.
    Deflate,
}

impl CompressionAlgorithm {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Deflate => "DEF",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "DEF" => Some(Self::Deflate),
            _ => None,
        }
    }
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_names_round_trip() {
        for alg in [
            SignatureAlgorithm::Hs256,
            SignatureAlgorithm::Rs384,
            SignatureAlgorithm::Ps512,
            SignatureAlgorithm::Es256,
            SignatureAlgorithm::None,
        ] {
            assert_eq!(SignatureAlgorithm::from_name(alg.name()), Some(alg));
        }
    }

    #[test]
    fn key_management_names_round_trip() {
        for alg in [
            KeyManagementAlgorithm::Dir,
            KeyManagementAlgorithm::A256Kw,
            KeyManagementAlgorithm::A128GcmKw,
            KeyManagementAlgorithm::RsaOaep256,
            KeyManagementAlgorithm::EcdhEsA128Kw,
            KeyManagementAlgorithm::Pbes2Hs512A256Kw,
        ] {
            assert_eq!(KeyManagementAlgorithm::from_name(alg.name()), Some(alg));
        }
    }

    #[test]
    fn lookup_is_exact_match() {
        assert_eq!(SignatureAlgorithm::from_name("hs256"), None);
        assert_eq!(SignatureAlgorithm::from_name("HS256 "), None);
        assert_eq!(SignatureAlgorithm::from_name("NONE"), None);
        assert_eq!(KeyManagementAlgorithm::from_name("rsa-oaep"), None);
        assert_eq!(EncryptionAlgorithm::from_name("a128gcm"), None);
        assert_eq!(CompressionAlgorithm::from_name("def"), None);
    }

    #[test]
    fn cbc_keys_are_double_width() {
        assert_eq!(EncryptionAlgorithm::A128CbcHs256.key_len(), 32);
        assert_eq!(EncryptionAlgorithm::A256CbcHs512.key_len(), 64);
        assert_eq!(EncryptionAlgorithm::A256Gcm.key_len(), 32);
    }

    #[test]
    fn direct_algorithms() {
        assert!(KeyManagementAlgorithm::Dir.is_direct());
        assert!(KeyManagementAlgorithm::EcdhEs.is_direct());
        assert!(!KeyManagementAlgorithm::EcdhEsA128Kw.is_direct());
        assert!(!KeyManagementAlgorithm::A128Kw.is_direct());
    }

    #[test]
    fn kek_lengths() {
        assert_eq!(KeyManagementAlgorithm::A128Kw.kek_len(), Some(16));
        assert_eq!(KeyManagementAlgorithm::Pbes2Hs384A192Kw.kek_len(), Some(24));
        assert_eq!(KeyManagementAlgorithm::EcdhEsA256Kw.kek_len(), Some(32));
        assert_eq!(KeyManagementAlgorithm::Dir.kek_len(), None);
        assert_eq!(KeyManagementAlgorithm::RsaOaep.kek_len(), None);
    }
}
