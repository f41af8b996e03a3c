//! Canonical JSON output for headers and claims.
//!
//! Headers are emitted without whitespace and with registered members in a
//! fixed order (`alg`, `enc`, `zip`, `cty`, `typ`, `kid`) followed by
//! extension members in insertion order, so the same logical header always
//! produces the same bytes. Header bytes double as the JWE AAD, which makes
//! this reproducibility load-bearing.

use serde_json::{Map, Value};

use crate::error::TokenError;

/// Registered members, in emission order.
const ORDERED_MEMBERS: [&str; 6] = ["alg", "enc", "zip", "cty", "typ", "kid"];

/// Serialize an object with canonical member ordering.
pub fn canonical_object(members: &Map<String, Value>) -> Result<Vec<u8>, TokenError> {
    let mut ordered = Map::with_capacity(members.len());
    for name in ORDERED_MEMBERS {
        if let Some(value) = members.get(name) {
            ordered.insert(name.to_owned(), value.clone());
        }
    }
    for (name, value) in members {
        if !ORDERED_MEMBERS.contains(&name.as_str()) {
            ordered.insert(name.clone(), value.clone());
        }
    }
    serde_json::to_vec(&ordered).map_err(|_| TokenError::MalformedToken)
}

/// Serialize a claims object in insertion order, no whitespace.
pub fn serialize_claims(claims: &Map<String, Value>) -> Result<Vec<u8>, TokenError> {
    serde_json::to_vec(claims).map_err(|_| TokenError::MalformedToken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn registered_members_come_first_in_fixed_order() {
        let members = map(&[
            ("kid", json!("key-1")),
            ("custom", json!(1)),
            ("enc", json!("A128GCM")),
            ("alg", json!("dir")),
        ]);
        let bytes = canonical_object(&members).unwrap();
        assert_eq!(
            bytes,
            br#"{"alg":"dir","enc":"A128GCM","kid":"key-1","custom":1}"#
        );
    }

    #[test]
    fn extensions_keep_insertion_order() {
        let members = map(&[
            ("alg", json!("HS256")),
            ("zzz", json!(1)),
            ("aaa", json!(2)),
        ]);
        let bytes = canonical_object(&members).unwrap();
        assert_eq!(bytes, br#"{"alg":"HS256","zzz":1,"aaa":2}"#);
    }

    #[test]
    fn no_superfluous_whitespace() {
        let members = map(&[("alg", json!("none")), ("crit", json!(["exp"]))]);
        let bytes = canonical_object(&members).unwrap();
        assert!(!bytes.contains(&b' '));
        assert_eq!(bytes, br#"{"alg":"none","crit":["exp"]}"#);
    }

    #[test]
    fn same_input_same_bytes() {
        let members = map(&[("alg", json!("HS256")), ("typ", json!("JWT"))]);
        assert_eq!(
            canonical_object(&members).unwrap(),
            canonical_object(&members).unwrap()
        );
    }

    #[test]
    fn string_escaping_is_applied() {
        let members = map(&[("alg", json!("HS256")), ("note", json!("a\"b"))]);
        let bytes = canonical_object(&members).unwrap();
        assert_eq!(bytes, br#"{"alg":"HS256","note":"a\"b"}"#);
    }
}
