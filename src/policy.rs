//! Validation policy: which keys, algorithms, lifetimes, audiences, and
//! critical headers a reader accepts.
//!
//! Policies are immutable after `build()` and safe to share across threads;
//! the optional header cache they own is internally synchronized.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use keel_crypto::{Jwk, KeyUse, SignatureAlgorithm};
use serde_json::Value;

use crate::cache::{HeaderCache, DEFAULT_HEADER_CACHE_CAPACITY};
use crate::document::JwtDocument;
use crate::error::TokenError;
use crate::header::JwtHeader;

pub const DEFAULT_MAX_TOKEN_SIZE: usize = 256 * 1024;
pub const DEFAULT_MAX_DECOMPRESSED_SIZE: usize = 1024 * 1024;

/// Source of verification or decryption keys for a header.
pub trait KeyProvider: Send + Sync {
    /// Keys that may apply to this header. Providers may over-return; the
    /// reader filters for capability and orders `kid` matches first.
    fn keys(&self, header: &JwtHeader) -> Vec<Jwk>;
}

/// A fixed key list.
pub struct StaticKeys {
    keys: Vec<Jwk>,
}

impl StaticKeys {
    pub fn new(keys: Vec<Jwk>) -> Self {
        Self { keys }
    }
}

fn match_header(keys: &[Jwk], header: &JwtHeader) -> Vec<Jwk> {
    if let Some(kid) = header.kid() {
        let matched: Vec<Jwk> = keys
            .iter()
            .filter(|key| key.kid() == Some(kid))
            .cloned()
            .collect();
        if !matched.is_empty() {
            return matched;
        }
    }
    keys.iter()
        .filter(|key| header.alg().is_none_or(|alg| key.supports(alg)))
        .cloned()
        .collect()
}

impl KeyProvider for StaticKeys {
    fn keys(&self, header: &JwtHeader) -> Vec<Jwk> {
        match_header(&self.keys, header)
    }
}

/// An RFC 7517 key set (`{"keys":[...]}`); unparseable entries are skipped
/// so one exotic key does not take the whole set offline.
pub struct JwkSet {
    keys: Vec<Jwk>,
}

impl JwkSet {
    pub fn from_json(value: &Value) -> Result<Self, TokenError> {
        let entries = value
            .get("keys")
            .and_then(Value::as_array)
            .ok_or(TokenError::MalformedToken)?;
        let keys = entries
            .iter()
            .filter_map(|entry| Jwk::from_json(entry).ok())
            .collect();
        Ok(Self { keys })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, TokenError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|_| TokenError::MalformedToken)?;
        Self::from_json(&value)
    }

    pub fn keys(&self) -> &[Jwk] {
        &self.keys
    }
}

impl KeyProvider for JwkSet {
    fn keys(&self, header: &JwtHeader) -> Vec<Jwk> {
        match_header(&self.keys, header)
    }
}

/// Approves or rejects one critical header member.
pub trait CriticalHeaderHandler: Send + Sync {
    fn accept(&self, name: &str, value: &Value) -> bool;
}

impl<F> CriticalHeaderHandler for F
where
    F: Fn(&str, &Value) -> bool + Send + Sync,
{
    fn accept(&self, name: &str, value: &Value) -> bool {
        self(name, value)
    }
}

/// Time source for lifetime claims; a fixed clock keeps tests deterministic.
#[derive(Clone, Copy, Debug)]
pub enum Clock {
    System,
    Fixed(i64),
}

impl Clock {
    pub fn now(&self) -> i64 {
        match self {
            Self::System => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0),
            Self::Fixed(at) => *at,
        }
    }
}

pub struct ValidationPolicy {
    pub(crate) signature_algorithms: Vec<SignatureAlgorithm>,
    pub(crate) signature_keys: Vec<Arc<dyn KeyProvider>>,
    pub(crate) decryption_keys: Vec<Arc<dyn KeyProvider>>,
    pub(crate) require_exp: bool,
    pub(crate) require_nbf: bool,
    pub(crate) clock_skew: i64,
    pub(crate) audiences: Vec<String>,
    pub(crate) issuers: Vec<String>,
    pub(crate) crit_handlers: HashMap<String, Arc<dyn CriticalHeaderHandler>>,
    pub(crate) max_token_size: usize,
    pub(crate) max_decompressed_size: usize,
    pub(crate) ignore_nested_token: bool,
    pub(crate) allow_unsecured: bool,
    pub(crate) header_cache: Option<HeaderCache>,
    pub(crate) clock: Clock,
}

impl ValidationPolicy {
    pub fn builder() -> PolicyBuilder {
        PolicyBuilder::default()
    }

    pub fn max_token_size(&self) -> usize {
        self.max_token_size
    }

    pub(crate) fn accepts_signature_algorithm(&self, alg: SignatureAlgorithm) -> bool {
        self.signature_algorithms.is_empty() || self.signature_algorithms.contains(&alg)
    }

    pub(crate) fn resolve_signature_keys(&self, header: &JwtHeader) -> Vec<Jwk> {
        resolve(&self.signature_keys, header, KeyUse::Signature)
    }

    pub(crate) fn resolve_decryption_keys(&self, header: &JwtHeader) -> Vec<Jwk> {
        resolve(&self.decryption_keys, header, KeyUse::Encryption)
    }

    /// Every `crit` entry needs a registered handler that approves it.
    pub(crate) fn check_critical(&self, header: &JwtHeader) -> Result<(), TokenError> {
        let Some(names) = header.crit()? else {
            return Ok(());
        };
        for name in names {
            let value = header.get(name).ok_or(TokenError::InvalidHeader("crit"))?;
            match self.crit_handlers.get(name) {
                None => {
                    return Err(TokenError::CriticalHeaderMissingHandler(name.to_owned()));
                }
                Some(handler) if handler.accept(name, value) => {}
                Some(_) => return Err(TokenError::CriticalHeaderRejected(name.to_owned())),
            }
        }
        Ok(())
    }

    /// Lifetime, issuer, and audience checks, in that order.
    pub(crate) fn validate_claims(&self, doc: &JwtDocument) -> Result<(), TokenError> {
        let now = self.clock.now();
        let skew = self.clock_skew;

        match numeric_claim(doc, "exp")? {
            Some(exp) => {
                if exp.saturating_add(skew) < now {
                    return Err(TokenError::Expired);
                }
            }
            None if self.require_exp => return Err(TokenError::InvalidClaim("exp")),
            None => {}
        }

        match numeric_claim(doc, "nbf")? {
            Some(nbf) => {
                if nbf.saturating_sub(skew) > now {
                    return Err(TokenError::NotYetValid);
                }
            }
            None if self.require_nbf => return Err(TokenError::InvalidClaim("nbf")),
            None => {}
        }

        if !self.issuers.is_empty() {
            let issuer = doc.claim_str("iss")?;
            if !issuer.is_some_and(|iss| self.issuers.iter().any(|ok| *ok == iss)) {
                return Err(TokenError::InvalidClaim("iss"));
            }
        }

        if !self.audiences.is_empty() {
            let audiences = doc.audiences()?;
            let accepted = audiences.is_some_and(|list| {
                list.iter()
                    .any(|aud| self.audiences.iter().any(|ok| ok == aud))
            });
            if !accepted {
                return Err(TokenError::InvalidClaim("aud"));
            }
        }

        Ok(())
    }
}

fn numeric_claim(doc: &JwtDocument, name: &'static str) -> Result<Option<i64>, TokenError> {
    match doc.claim(name)? {
        None => Ok(None),
        Some(element) => element
            .as_i64()?
            .ok_or(TokenError::InvalidClaim(name))
            .map(Some),
    }
}

fn resolve(
    providers: &[Arc<dyn KeyProvider>],
    header: &JwtHeader,
    required_use: KeyUse,
) -> Vec<Jwk> {
    let mut keys: Vec<Jwk> = providers
        .iter()
        .flat_map(|provider| provider.keys(header))
        .collect();
    keys.retain(|key| key.key_use().is_none_or(|u| u == required_use));
    if let Some(alg) = header.alg() {
        keys.retain(|key| key.supports(alg));
    }
    if let Some(kid) = header.kid() {
        // Stable sort keeps provider order within each group.
        keys.sort_by_key(|key| key.kid() != Some(kid));
    }
    keys
}

pub struct PolicyBuilder {
    signature_algorithms: Vec<SignatureAlgorithm>,
    signature_key_list: Vec<Jwk>,
    signature_providers: Vec<Arc<dyn KeyProvider>>,
    decryption_key_list: Vec<Jwk>,
    decryption_providers: Vec<Arc<dyn KeyProvider>>,
    require_exp: bool,
    require_nbf: bool,
    clock_skew: i64,
    audiences: Vec<String>,
    issuers: Vec<String>,
    crit_handlers: HashMap<String, Arc<dyn CriticalHeaderHandler>>,
    max_token_size: usize,
    max_decompressed_size: usize,
    ignore_nested_token: bool,
    allow_unsecured: bool,
    cache_headers: bool,
    clock: Clock,
}

impl Default for PolicyBuilder {
    fn default() -> Self {
        Self {
            signature_algorithms: Vec::new(),
            signature_key_list: Vec::new(),
            signature_providers: Vec::new(),
            decryption_key_list: Vec::new(),
            decryption_providers: Vec::new(),
            require_exp: false,
            require_nbf: false,
            clock_skew: 0,
            audiences: Vec::new(),
            issuers: Vec::new(),
            crit_handlers: HashMap::new(),
            max_token_size: DEFAULT_MAX_TOKEN_SIZE,
            max_decompressed_size: DEFAULT_MAX_DECOMPRESSED_SIZE,
            ignore_nested_token: false,
            allow_unsecured: false,
            cache_headers: false,
            clock: Clock::System,
        }
    }
}

impl PolicyBuilder {
    /// Restrict acceptable signature algorithms; empty means any the key
    /// supports.
    pub fn signature_algorithm(mut self, alg: SignatureAlgorithm) -> Self {
        self.signature_algorithms.push(alg);
        self
    }

    pub fn verification_key(mut self, key: Jwk) -> Self {
        self.signature_key_list.push(key);
        self
    }

    pub fn verification_key_provider(mut self, provider: Arc<dyn KeyProvider>) -> Self {
        self.signature_providers.push(provider);
        self
    }

    pub fn decryption_key(mut self, key: Jwk) -> Self {
        self.decryption_key_list.push(key);
        self
    }

    pub fn decryption_key_provider(mut self, provider: Arc<dyn KeyProvider>) -> Self {
        self.decryption_providers.push(provider);
        self
    }

    pub fn require_expiration(mut self, required: bool) -> Self {
        self.require_exp = required;
        self
    }

    pub fn require_not_before(mut self, required: bool) -> Self {
        self.require_nbf = required;
        self
    }

    pub fn clock_skew(mut self, seconds: u32) -> Self {
        self.clock_skew = i64::from(seconds);
        self
    }

    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audiences.push(audience.into());
        self
    }

    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuers.push(issuer.into());
        self
    }

    pub fn critical_handler(
        mut self,
        name: impl Into<String>,
        handler: impl CriticalHeaderHandler + 'static,
    ) -> Self {
        self.crit_handlers.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn max_token_size(mut self, bytes: usize) -> Self {
        self.max_token_size = bytes;
        self
    }

    pub fn max_decompressed_size(mut self, bytes: usize) -> Self {
        self.max_decompressed_size = bytes;
        self
    }

    /// Return the decrypted payload raw even when `cty` says it nests a JWT.
    pub fn ignore_nested_token(mut self, ignore: bool) -> Self {
        self.ignore_nested_token = ignore;
        self
    }

    /// Accept unsecured (`alg=none`) tokens. Off by default.
    pub fn allow_unsecured(mut self, allow: bool) -> Self {
        self.allow_unsecured = allow;
        self
    }

    pub fn cache_headers(mut self, enabled: bool) -> Self {
        self.cache_headers = enabled;
        self
    }

    pub fn fixed_clock(mut self, now: i64) -> Self {
        self.clock = Clock::Fixed(now);
        self
    }

    pub fn build(self) -> ValidationPolicy {
        let mut signature_keys = self.signature_providers;
        if !self.signature_key_list.is_empty() {
            signature_keys.insert(0, Arc::new(StaticKeys::new(self.signature_key_list)));
        }
        let mut decryption_keys = self.decryption_providers;
        if !self.decryption_key_list.is_empty() {
            decryption_keys.insert(0, Arc::new(StaticKeys::new(self.decryption_key_list)));
        }
        ValidationPolicy {
            signature_algorithms: self.signature_algorithms,
            signature_keys,
            decryption_keys,
            require_exp: self.require_exp,
            require_nbf: self.require_nbf,
            clock_skew: self.clock_skew,
            audiences: self.audiences,
            issuers: self.issuers,
            crit_handlers: self.crit_handlers,
            max_token_size: self.max_token_size,
            max_decompressed_size: self.max_decompressed_size,
            ignore_nested_token: self.ignore_nested_token,
            allow_unsecured: self.allow_unsecured,
            header_cache: self
                .cache_headers
                .then(|| HeaderCache::new(DEFAULT_HEADER_CACHE_CAPACITY)),
            clock: self.clock,
        }
    }
}
