//! Parsed JOSE header.
//!
//! A header is a JSON object; property names are byte-compared and
//! case-sensitive, and a duplicated name takes its last value. Beyond the
//! recognized members the full map stays available for critical-header
//! handlers and key-management parameters.

use keel_crypto::{
    CompressionAlgorithm, EncryptionAlgorithm, KeyManagementAlgorithm, SignatureAlgorithm,
};
use serde_json::{Map, Value};

use crate::error::TokenError;

#[derive(Clone, Debug)]
pub struct JwtHeader {
    members: Map<String, Value>,
}

impl JwtHeader {
    /// Parse UTF-8 JSON header bytes. The top level must be an object.
    pub fn parse(bytes: &[u8]) -> Result<Self, TokenError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|_| TokenError::MalformedToken)?;
        match value {
            Value::Object(members) => Ok(Self { members }),
            _ => Err(TokenError::MalformedToken),
        }
    }

    pub fn from_members(members: Map<String, Value>) -> Self {
        Self { members }
    }

    pub fn members(&self) -> &Map<String, Value> {
        &self.members
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.members.get(name)
    }

    fn str_member(&self, name: &str) -> Option<&str> {
        self.members.get(name).and_then(Value::as_str)
    }

    pub fn alg(&self) -> Option<&str> {
        self.str_member("alg")
    }

    pub fn enc(&self) -> Option<&str> {
        self.str_member("enc")
    }

    pub fn zip(&self) -> Option<&str> {
        self.str_member("zip")
    }

    pub fn kid(&self) -> Option<&str> {
        self.str_member("kid")
    }

    pub fn typ(&self) -> Option<&str> {
        self.str_member("typ")
    }

    pub fn cty(&self) -> Option<&str> {
        self.str_member("cty")
    }

    /// Whether the payload is itself a compact JWT (RFC 7519 §5.2).
    pub fn carries_nested_token(&self) -> bool {
        self.cty()
            .is_some_and(|cty| cty.eq_ignore_ascii_case("JWT"))
    }

    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm, TokenError> {
        self.alg()
            .and_then(SignatureAlgorithm::from_name)
            .ok_or(TokenError::InvalidHeader("alg"))
    }

    pub fn key_management_algorithm(&self) -> Result<KeyManagementAlgorithm, TokenError> {
        self.alg()
            .and_then(KeyManagementAlgorithm::from_name)
            .ok_or(TokenError::InvalidHeader("alg"))
    }

    pub fn encryption_algorithm(&self) -> Result<EncryptionAlgorithm, TokenError> {
        match self.enc() {
            None if !self.members.contains_key("enc") => {
                Err(TokenError::MissingEncryptionAlgorithm)
            }
            None => Err(TokenError::InvalidHeader("enc")),
            Some(name) => {
                EncryptionAlgorithm::from_name(name).ok_or(TokenError::InvalidHeader("enc"))
            }
        }
    }

    pub fn compression_algorithm(&self) -> Result<Option<CompressionAlgorithm>, TokenError> {
        match self.zip() {
            None if !self.members.contains_key("zip") => Ok(None),
            None => Err(TokenError::InvalidHeader("zip")),
            Some(name) => CompressionAlgorithm::from_name(name)
                .map(Some)
                .ok_or(TokenError::InvalidHeader("zip")),
        }
    }

    /// The `crit` list: a non-empty array of member names, each of which
    /// must itself be present in the header.
    pub fn crit(&self) -> Result<Option<Vec<&str>>, TokenError> {
        match self.members.get("crit") {
            None => Ok(None),
            Some(Value::Array(items)) if !items.is_empty() => {
                let mut names = Vec::with_capacity(items.len());
                for item in items {
                    let name = item.as_str().ok_or(TokenError::InvalidHeader("crit"))?;
                    if !self.members.contains_key(name) {
                        return Err(TokenError::InvalidHeader("crit"));
                    }
                    names.push(name);
                }
                Ok(Some(names))
            }
            Some(_) => Err(TokenError::InvalidHeader("crit")),
        }
    }
}
