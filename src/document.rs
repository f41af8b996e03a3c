//! Parsed token documents and element handles.
//!
//! A `JwtDocument` owns a rented buffer holding the payload plaintext and
//! an index over it; claim strings are slices into that buffer, not copies.
//! Disposal returns the buffer to the pool exactly once, and every element
//! handle derived from the document fails afterwards.

use std::borrow::Cow;

use serde_json::Value;

use crate::error::TokenError;
use crate::header::JwtHeader;
use crate::json::{JsonIndex, JsonKind};
use crate::pool::PooledBuf;

enum Payload {
    /// JSON claims indexed over the storage buffer.
    Claims(JsonIndex),
    /// Opaque plaintext (e.g. a nested compact token kept raw).
    Raw,
}

pub struct JwtDocument {
    storage: Option<PooledBuf>,
    header: JwtHeader,
    payload: Payload,
    nested: Option<Box<JwtDocument>>,
}

impl JwtDocument {
    pub(crate) fn with_claims(storage: PooledBuf, header: JwtHeader, index: JsonIndex) -> Self {
        Self {
            storage: Some(storage),
            header,
            payload: Payload::Claims(index),
            nested: None,
        }
    }

    pub(crate) fn with_raw_payload(storage: PooledBuf, header: JwtHeader) -> Self {
        Self {
            storage: Some(storage),
            header,
            payload: Payload::Raw,
            nested: None,
        }
    }

    pub(crate) fn with_nested(
        storage: PooledBuf,
        header: JwtHeader,
        nested: JwtDocument,
    ) -> Self {
        Self {
            storage: Some(storage),
            header,
            payload: Payload::Raw,
            nested: Some(Box::new(nested)),
        }
    }

    /// The outermost header of this token.
    pub fn header(&self) -> &JwtHeader {
        &self.header
    }

    /// The inner document when this token carried `cty: JWT`.
    pub fn nested(&self) -> Option<&JwtDocument> {
        self.nested.as_deref()
    }

    pub fn is_disposed(&self) -> bool {
        self.storage.is_none()
    }

    /// Return the rented buffer to the pool. A second call is a no-op;
    /// element handles fail with `InstanceInvalidated` afterwards.
    pub fn dispose(&mut self) {
        self.storage = None;
        if let Some(nested) = &mut self.nested {
            nested.dispose();
        }
    }

    fn bytes(&self) -> Result<&[u8], TokenError> {
        self.storage
            .as_ref()
            .map(|buf| buf.as_slice())
            .ok_or(TokenError::InstanceInvalidated)
    }

    /// Raw payload plaintext: claims JSON text, or the inner compact form
    /// when nested parsing was skipped.
    pub fn payload_bytes(&self) -> Result<&[u8], TokenError> {
        self.bytes()
    }

    /// Document whose claims answer claim queries: the innermost one.
    fn claims_document(&self) -> &JwtDocument {
        let mut doc = self;
        while let Some(nested) = doc.nested.as_deref() {
            doc = nested;
        }
        doc
    }

    /// Root element of the claims object.
    pub fn payload(&self) -> Result<JwtElement<'_>, TokenError> {
        let doc = self.claims_document();
        doc.bytes()?;
        match &doc.payload {
            Payload::Claims(index) => Ok(JwtElement {
                doc,
                node: index.root(),
            }),
            Payload::Raw => Err(TokenError::MalformedToken),
        }
    }

    /// Look up a top-level claim (delegates to the nested document).
    pub fn claim(&self, name: &str) -> Result<Option<JwtElement<'_>>, TokenError> {
        let doc = self.claims_document();
        let bytes = doc.bytes()?;
        match &doc.payload {
            Payload::Claims(index) => Ok(index
                .member(bytes, index.root(), name)
                .map(|node| JwtElement { doc, node })),
            Payload::Raw => Ok(None),
        }
    }

    pub fn claim_str(&self, name: &str) -> Result<Option<String>, TokenError> {
        match self.claim(name)? {
            Some(element) => Ok(element.as_str()?.map(Cow::into_owned)),
            None => Ok(None),
        }
    }

    pub fn claim_i64(&self, name: &str) -> Result<Option<i64>, TokenError> {
        match self.claim(name)? {
            Some(element) => element.as_i64(),
            None => Ok(None),
        }
    }

    /// The `aud` claim as a list: a string counts as a single audience.
    pub fn audiences(&self) -> Result<Option<Vec<String>>, TokenError> {
        let Some(aud) = self.claim("aud")? else {
            return Ok(None);
        };
        match aud.kind()? {
            JsonKind::String => Ok(Some(vec![aud
                .as_str()?
                .ok_or(TokenError::InvalidClaim("aud"))?
                .into_owned()])),
            JsonKind::Array => {
                let mut all = Vec::new();
                for item in aud.items()? {
                    let value = item
                        .as_str()?
                        .ok_or(TokenError::InvalidClaim("aud"))?;
                    all.push(value.into_owned());
                }
                Ok(Some(all))
            }
            _ => Err(TokenError::InvalidClaim("aud")),
        }
    }
}

/// Handle to one node of a document's claims index; valid only while the
/// document is alive and undisposed.
#[derive(Clone, Copy)]
pub struct JwtElement<'a> {
    doc: &'a JwtDocument,
    node: u32,
}

impl<'a> JwtElement<'a> {
    fn resolve(&self) -> Result<(&'a JsonIndex, &'a [u8]), TokenError> {
        let bytes = self.doc.bytes()?;
        match &self.doc.payload {
            Payload::Claims(index) => Ok((index, bytes)),
            Payload::Raw => Err(TokenError::InstanceInvalidated),
        }
    }

    pub fn kind(&self) -> Result<JsonKind, TokenError> {
        let (index, _) = self.resolve()?;
        index.kind(self.node).ok_or(TokenError::MalformedToken)
    }

    pub fn as_str(&self) -> Result<Option<Cow<'a, str>>, TokenError> {
        let (index, bytes) = self.resolve()?;
        Ok(index.string_value(bytes, self.node))
    }

    pub fn as_i64(&self) -> Result<Option<i64>, TokenError> {
        let (index, bytes) = self.resolve()?;
        Ok(index.i64_value(bytes, self.node))
    }

    /// Object member lookup; duplicate names take the last value.
    pub fn member(&self, name: &str) -> Result<Option<JwtElement<'a>>, TokenError> {
        let (index, bytes) = self.resolve()?;
        Ok(index.member(bytes, self.node, name).map(|node| JwtElement {
            doc: self.doc,
            node,
        }))
    }

    /// Array elements.
    pub fn items(&self) -> Result<Vec<JwtElement<'a>>, TokenError> {
        let (index, _) = self.resolve()?;
        if index.kind(self.node) != Some(JsonKind::Array) {
            return Err(TokenError::MalformedToken);
        }
        Ok(index
            .children(self.node)
            .map(|node| JwtElement {
                doc: self.doc,
                node,
            })
            .collect())
    }

    /// Materialize the subtree as an owned value.
    pub fn to_value(&self) -> Result<Value, TokenError> {
        let (index, bytes) = self.resolve()?;
        index
            .to_value(bytes, self.node)
            .ok_or(TokenError::MalformedToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool;

    fn claims_document(json: &str) -> JwtDocument {
        let mut storage = pool::rent(json.len());
        storage.extend_from_slice(json.as_bytes());
        let index = JsonIndex::parse(&storage).unwrap();
        let header = JwtHeader::parse(br#"{"alg":"HS256"}"#).unwrap();
        JwtDocument::with_claims(storage, header, index)
    }

    #[test]
    fn claim_access() {
        let doc = claims_document(r#"{"sub":"alice","exp":1516239022,"aud":["a","b"]}"#);
        assert_eq!(doc.claim_str("sub").unwrap().as_deref(), Some("alice"));
        assert_eq!(doc.claim_i64("exp").unwrap(), Some(1516239022));
        assert_eq!(
            doc.audiences().unwrap(),
            Some(vec!["a".to_owned(), "b".to_owned()])
        );
        assert_eq!(doc.claim("missing").unwrap().map(|_| ()), None);
    }

    #[test]
    fn scalar_audience_is_a_single_entry() {
        let doc = claims_document(r#"{"aud":"solo"}"#);
        assert_eq!(doc.audiences().unwrap(), Some(vec!["solo".to_owned()]));
    }

    #[test]
    fn numeric_audience_is_invalid() {
        let doc = claims_document(r#"{"aud":42}"#);
        assert_eq!(doc.audiences(), Err(TokenError::InvalidClaim("aud")));
    }

    #[test]
    fn dispose_is_idempotent() {
        let mut doc = claims_document(r#"{"sub":"alice"}"#);
        assert!(!doc.is_disposed());
        doc.dispose();
        assert!(doc.is_disposed());
        doc.dispose();
        assert!(doc.is_disposed());
    }

    #[test]
    fn access_after_dispose_fails() {
        let mut doc = claims_document(r#"{"sub":"alice"}"#);
        doc.dispose();
        assert_eq!(doc.payload_bytes(), Err(TokenError::InstanceInvalidated));
        assert!(matches!(
            doc.claim("sub"),
            Err(TokenError::InstanceInvalidated)
        ));
        assert!(matches!(
            doc.payload(),
            Err(TokenError::InstanceInvalidated)
        ));
    }

    #[test]
    fn elements_traverse_nested_values() {
        let doc = claims_document(r#"{"ctx":{"roles":["admin","dev"]}}"#);
        let ctx = doc.claim("ctx").unwrap().unwrap();
        let roles = ctx.member("roles").unwrap().unwrap();
        let items = roles.items().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].as_str().unwrap().unwrap(), "dev");
        assert_eq!(
            ctx.to_value().unwrap(),
            serde_json::json!({"roles":["admin","dev"]})
        );
    }

    #[test]
    fn nested_document_answers_claims() {
        let inner = claims_document(r#"{"sub":"inner"}"#);
        let mut storage = pool::rent(16);
        storage.extend_from_slice(b"raw-inner-token");
        let header = JwtHeader::parse(br#"{"alg":"dir","enc":"A128GCM","cty":"JWT"}"#).unwrap();
        let outer = JwtDocument::with_nested(storage, header, inner);

        assert_eq!(outer.claim_str("sub").unwrap().as_deref(), Some("inner"));
        assert_eq!(outer.payload_bytes().unwrap(), b"raw-inner-token");
        assert!(outer.nested().is_some());
    }

    #[test]
    fn element_handles_fail_after_dispose() {
        let mut doc = claims_document(r#"{"exp":1}"#);
        doc.dispose();
        assert!(doc.claim_i64("exp").is_err());
        assert!(doc.audiences().is_err());
    }
}
