//! # Canonical JSON — Deterministic Text for Literals and Cache Keys
//!
//! `CanonicalJson` is the single construction path for JSON text that must
//! be byte-stable: literals rendered into generated condition expressions,
//! schema-fragment cache keys, and validation-error digests.
//!
//! ## Invariant
//!
//! The inner `String` is private. The only constructor is
//! [`CanonicalJson::new()`], which serializes through `serde_jcs`
//! (RFC 8785): sorted object keys, compact separators, ECMAScript number
//! formatting. Two structurally equal values therefore always produce the
//! same text, regardless of the key order they were built with.

use serde::Serialize;

use crate::error::CanonicalizationError;

/// JSON text produced exclusively by RFC 8785 canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalJson(String);

impl CanonicalJson {
    /// Canonicalize any serializable value.
    ///
    /// # Errors
    ///
    /// Returns `CanonicalizationError::SerializationFailed` if the value
    /// cannot be represented as JSON.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let text = serde_jcs::to_string(obj)?;
        Ok(Self(text))
    }

    /// The canonical text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The canonical text as UTF-8 bytes, for digest computation.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Length of the canonical text in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the canonical text is empty (never true for valid JSON).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume and return the inner text.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<[u8]> for CanonicalJson {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl std::fmt::Display for CanonicalJson {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Render a JSON value as a literal suitable for a condition expression.
///
/// `serde_json::Value` always serializes, so this never fails; it is the
/// form the schema composer uses when generating expressions.
pub fn literal(value: &serde_json::Value) -> String {
    CanonicalJson::new(value)
        .map(CanonicalJson::into_string)
        .unwrap_or_else(|_| "null".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_canonical_sorted_keys() {
        let data = json!({"z": 1, "m": 2, "a": 3});
        let cj = CanonicalJson::new(&data).expect("should canonicalize");
        assert_eq!(cj.as_str(), r#"{"a":3,"m":2,"z":1}"#);
    }

    #[test]
    fn test_canonical_nested() {
        let data = json!({"outer": {"b": 2, "a": 1}, "list": [3, 2, 1]});
        let cj = CanonicalJson::new(&data).expect("should canonicalize");
        assert_eq!(cj.as_str(), r#"{"list":[3,2,1],"outer":{"a":1,"b":2}}"#);
    }

    #[test]
    fn test_canonical_float_allowed() {
        let cj = CanonicalJson::new(&json!({"ratio": 1.5})).unwrap();
        assert_eq!(cj.as_str(), r#"{"ratio":1.5}"#);
    }

    #[test]
    fn test_literal_string_is_quoted() {
        assert_eq!(literal(&json!("movie")), r#""movie""#);
        assert_eq!(literal(&json!("say \"hi\"")), r#""say \"hi\"""#);
        assert_eq!(literal(&Value::Null), "null");
        assert_eq!(literal(&json!(["a", 1, true])), r#"["a",1,true]"#);
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let a: Value = serde_json::from_str(r#"{"b":1,"a":2}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a":2,"b":1}"#).unwrap();
        assert_eq!(CanonicalJson::new(&a).unwrap(), CanonicalJson::new(&b).unwrap());
    }

    #[test]
    fn test_len_and_is_empty() {
        let cj = CanonicalJson::new(&json!({"a": 1})).unwrap();
        assert!(!cj.is_empty());
        assert_eq!(cj.len(), 7);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::Value;

    fn json_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| serde_json::json!(n)),
            "[a-zA-Z0-9_ ]{0,20}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..6)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        /// Canonical text parses back to a structurally equal value.
        #[test]
        fn canonical_text_is_valid_json(value in json_value()) {
            let cj = CanonicalJson::new(&value).unwrap();
            let parsed: Value = serde_json::from_str(cj.as_str()).unwrap();
            prop_assert_eq!(parsed, value);
        }

        /// Same input, same bytes.
        #[test]
        fn canonical_is_deterministic(value in json_value()) {
            let a = CanonicalJson::new(&value).unwrap();
            let b = CanonicalJson::new(&value).unwrap();
            prop_assert_eq!(a.as_bytes(), b.as_bytes());
        }
    }
}
