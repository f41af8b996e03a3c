//! Reader pipeline.
//!
//! Fixed validation order: size → tokenize → header parse → critical-header
//! check → signature verify (JWS) or key unwrap + authenticated decrypt +
//! optional decompress (JWE) → payload parse → claim checks → nested
//! recursion. The first failure short-circuits; the payload is never
//! decoded before the signature over it has been verified.

use keel_crypto::zip::Compressor;
use keel_crypto::{base64url, CompressionAlgorithm, DeflateCompressor};
use tracing::{debug, trace};
use zeroize::Zeroizing;

use crate::cache::CachedHeader;
use crate::document::JwtDocument;
use crate::error::TokenError;
use crate::header::JwtHeader;
use crate::json::JsonIndex;
use crate::policy::ValidationPolicy;
use crate::pool::{self, PooledBuf};
use crate::tokenizer::{tokenize, Segment, MAX_SEGMENTS};

/// Bound on `cty: JWT` recursion.
const MAX_NESTING_DEPTH: usize = 4;

/// Parse and validate a compact token under `policy`.
pub fn parse(token: &[u8], policy: &ValidationPolicy) -> Result<JwtDocument, TokenError> {
    parse_at_depth(token, policy, 0)
}

fn parse_at_depth(
    token: &[u8],
    policy: &ValidationPolicy,
    depth: usize,
) -> Result<JwtDocument, TokenError> {
    if token.len() > policy.max_token_size() {
        return Err(TokenError::SizeLimitExceeded);
    }

    let mut segments = [Segment::default(); MAX_SEGMENTS];
    let count = tokenize(token, &mut segments)?;
    trace!(segments = count, "tokenized compact token");

    let header = load_header(policy, segments[0].slice(token))?;

    let storage = match count {
        3 => jws_payload(token, &segments, &header, policy)?,
        5 => jwe_payload(token, &segments, &header, policy)?,
        _ => return Err(TokenError::MalformedToken),
    };

    finish_document(storage, header, policy, depth)
}

/// Header decode with the policy's content-addressed cache.
fn load_header(policy: &ValidationPolicy, header_b64: &[u8]) -> Result<JwtHeader, TokenError> {
    let Some(cache) = &policy.header_cache else {
        let header = decode_header(header_b64)?;
        policy.check_critical(&header)?;
        return Ok(header);
    };

    if let Some(hit) = cache.get(header_b64) {
        trace!("header cache hit");
        if !hit.crit_ok {
            policy.check_critical(&hit.header)?;
        }
        return Ok(hit.header);
    }

    let header = decode_header(header_b64)?;
    let crit = policy.check_critical(&header);
    cache.insert(
        header_b64,
        CachedHeader {
            header: header.clone(),
            crit_ok: crit.is_ok(),
        },
    );
    crit.map(|_| header)
}

fn decode_header(header_b64: &[u8]) -> Result<JwtHeader, TokenError> {
    let max = base64url::decoded_size(header_b64.len());
    let mut buf = pool::rent(max);
    buf.resize(max, 0);
    let written =
        base64url::decode(header_b64, &mut buf).map_err(|_| TokenError::MalformedToken)?;
    JwtHeader::parse(&buf[..written])
}

fn decode_segment(b64: &[u8]) -> Result<Vec<u8>, TokenError> {
    base64url::decode_vec(b64).map_err(|_| TokenError::MalformedToken)
}

fn decode_into_pool(b64: &[u8]) -> Result<PooledBuf, TokenError> {
    let max = base64url::decoded_size(b64.len());
    let mut buf = pool::rent(max);
    buf.resize(max, 0);
    let written = base64url::decode(b64, &mut buf).map_err(|_| TokenError::MalformedToken)?;
    buf.truncate(written);
    Ok(buf)
}

/// Verify the JWS signature, then decode the payload segment.
fn jws_payload(
    token: &[u8],
    segments: &[Segment; MAX_SEGMENTS],
    header: &JwtHeader,
    policy: &ValidationPolicy,
) -> Result<PooledBuf, TokenError> {
    let alg = header.signature_algorithm()?;
    let signature_b64 = segments[2].slice(token);

    if alg.is_none() {
        if !policy.allow_unsecured {
            return Err(TokenError::InvalidHeader("alg"));
        }
        if !signature_b64.is_empty() {
            return Err(TokenError::MalformedToken);
        }
    } else {
        if !policy.accepts_signature_algorithm(alg) {
            return Err(TokenError::SignatureValidationFailed);
        }
        let keys = policy.resolve_signature_keys(header);
        debug!(candidates = keys.len(), %alg, "resolved verification keys");
        if keys.is_empty() {
            return Err(TokenError::SignatureKeyNotFound);
        }

        let signature = decode_segment(signature_b64)?;
        let signing_input = &token[..segments[1].end()];

        // Try each candidate; only if every key fails is the failure reported.
        let verified = keys.iter().any(|key| {
            key.create_verifier(alg)
                .map(|verifier| verifier.verify(signing_input, &signature))
                .unwrap_or(false)
        });
        if !verified {
            return Err(TokenError::SignatureValidationFailed);
        }
    }

    decode_into_pool(segments[1].slice(token))
}

/// Unwrap the CEK, decrypt, and optionally decompress the JWE payload.
fn jwe_payload(
    token: &[u8],
    segments: &[Segment; MAX_SEGMENTS],
    header: &JwtHeader,
    policy: &ValidationPolicy,
) -> Result<PooledBuf, TokenError> {
    let alg = header.key_management_algorithm()?;
    let enc = header.encryption_algorithm()?;
    let zip = header.compression_algorithm()?;

    let keys = policy.resolve_decryption_keys(header);
    debug!(candidates = keys.len(), %alg, %enc, "resolved decryption keys");
    if keys.is_empty() {
        return Err(TokenError::EncryptionKeyNotFound);
    }

    let encrypted_key = decode_segment(segments[1].slice(token))?;
    let iv = decode_segment(segments[2].slice(token))?;
    let ciphertext = decode_segment(segments[3].slice(token))?;
    let tag = decode_segment(segments[4].slice(token))?;

    if iv.len() != enc.iv_len() || tag.len() != enc.tag_len() {
        return Err(TokenError::DecryptionFailed);
    }

    // The AAD is the raw base64url header segment, bit-exact.
    let aad = segments[0].slice(token);

    let mut plaintext: Option<Zeroizing<Vec<u8>>> = None;
    for key in &keys {
        let Ok(unwrapper) = key.create_key_unwrapper(alg) else {
            continue;
        };
        let Ok(cek) = unwrapper.unwrap(&encrypted_key, enc, header.members()) else {
            continue;
        };
        let Ok(decryptor) = keel_crypto::decryptor(enc, &cek) else {
            continue;
        };
        if let Ok(decrypted) = decryptor.decrypt(&iv, aad, &ciphertext, &tag) {
            plaintext = Some(decrypted);
            break;
        }
    }
    let plaintext = plaintext.ok_or(TokenError::DecryptionFailed)?;

    let mut storage;
    match zip {
        Some(CompressionAlgorithm::Deflate) => {
            let inflated = DeflateCompressor
                .decompress(&plaintext, policy.max_decompressed_size)
                .map_err(|_| TokenError::DecompressionFailed)?;
            storage = pool::rent(inflated.len());
            storage.extend_from_slice(&inflated);
        }
        None => {
            storage = pool::rent(plaintext.len());
            storage.extend_from_slice(&plaintext);
        }
    }
    Ok(storage)
}

/// Parse claims, validate them, and recurse into nested tokens.
fn finish_document(
    storage: PooledBuf,
    header: JwtHeader,
    policy: &ValidationPolicy,
    depth: usize,
) -> Result<JwtDocument, TokenError> {
    if header.carries_nested_token() {
        if policy.ignore_nested_token {
            return Ok(JwtDocument::with_raw_payload(storage, header));
        }
        if depth + 1 >= MAX_NESTING_DEPTH {
            return Err(TokenError::MalformedToken);
        }
        let nested = parse_at_depth(&storage, policy, depth + 1)?;
        return Ok(JwtDocument::with_nested(storage, header, nested));
    }

    let index = JsonIndex::parse(&storage)?;
    let document = JwtDocument::with_claims(storage, header, index);
    policy.validate_claims(&document)?;
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b64(data: &[u8]) -> String {
        base64url::encode_string(data)
    }

    fn unsecured_token() -> String {
        format!(
            "{}.{}.",
            b64(br#"{"alg":"none"}"#),
            b64(br#"{"sub":"alice"}"#)
        )
    }

    #[test]
    fn unsecured_tokens_are_rejected_by_default() {
        let policy = ValidationPolicy::builder().build();
        assert_eq!(
            parse(unsecured_token().as_bytes(), &policy).map(|_| ()),
            Err(TokenError::InvalidHeader("alg"))
        );
    }

    #[test]
    fn unsecured_tokens_require_opt_in() {
        let policy = ValidationPolicy::builder().allow_unsecured(true).build();
        let doc = parse(unsecured_token().as_bytes(), &policy).unwrap();
        assert_eq!(doc.claim_str("sub").unwrap().as_deref(), Some("alice"));
    }

    #[test]
    fn unsecured_token_with_signature_is_malformed() {
        let policy = ValidationPolicy::builder().allow_unsecured(true).build();
        let token = format!(
            "{}.{}.{}",
            b64(br#"{"alg":"none"}"#),
            b64(br#"{}"#),
            b64(b"bogus")
        );
        assert_eq!(
            parse(token.as_bytes(), &policy).map(|_| ()),
            Err(TokenError::MalformedToken)
        );
    }

    #[test]
    fn size_limit_applies_before_decoding() {
        let policy = ValidationPolicy::builder().max_token_size(10).build();
        // Not even close to valid base64url; the size gate fires first.
        assert_eq!(
            parse(b"############", &policy).map(|_| ()),
            Err(TokenError::SizeLimitExceeded)
        );
    }

    #[test]
    fn four_segments_are_malformed() {
        let policy = ValidationPolicy::builder().build();
        let token = format!("{}.a.b.c", b64(br#"{"alg":"none"}"#));
        assert_eq!(
            parse(token.as_bytes(), &policy).map(|_| ()),
            Err(TokenError::MalformedToken)
        );
    }

    #[test]
    fn garbage_base64_header_is_malformed() {
        let policy = ValidationPolicy::builder().build();
        assert_eq!(
            parse(b"!!!.AAA.BBB", &policy).map(|_| ()),
            Err(TokenError::MalformedToken)
        );
    }
}
