//! # Error Pipeline
//!
//! Raw validator records become [`JsonSchemaError`]s in three steps:
//!
//! 1. **Transform.** Instance paths are normalized to pointer form.
//!    `required` errors point at the container, so the missing property
//!    is appended as one more segment. Optionally each error gets a
//!    sequence key for list-rendering identity.
//! 2. **Filter.** Composition bookkeeping is dropped: `oneOf` and `enum`
//!    keyword errors wherever they occur, and `required` failures of a
//!    branch's own `required` list (the tree already expresses those
//!    through branch-driven visibility).
//! 3. **Digest.** An order-sensitive SHA-256 over `(schemaPath, params)`
//!    pairs tells callers whether a validation pass changed anything.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use formtree_core::pointer::{join, normalize_instance_path};
use formtree_core::{fragment_digest, ContentDigest};

use crate::validate::{RawError, SchemaValidationError};

/// Keyword of the synthetic error that replaces a failed compilation.
pub const COMPILE_KEYWORD: &str = "compile";

/// A validation error in tree form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonSchemaError {
    /// Sequence key, when key assignment is on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<u64>,
    /// The failing keyword.
    pub keyword: String,
    /// Pointer to the node the error belongs to.
    pub data_path: String,
    /// Pointer to the failing keyword inside the schema.
    pub schema_path: String,
    /// Keyword-specific details.
    pub params: Map<String, Value>,
    /// Human-readable message.
    pub message: String,
}

impl JsonSchemaError {
    /// The `missingProperty` parameter of a `required` error.
    pub fn missing_property(&self) -> Option<&str> {
        self.params.get("missingProperty").and_then(Value::as_str)
    }
}

/// Converts raw records, handing out increasing keys across calls.
#[derive(Debug, Clone, Default)]
pub struct ErrorTransformer {
    next_key: u64,
}

impl ErrorTransformer {
    /// Create a transformer whose first key is 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transform raw records.
    pub fn transform(&mut self, raw: &[RawError], assign_key: bool) -> Vec<JsonSchemaError> {
        raw.iter()
            .map(|error| {
                let mut data_path = normalize_instance_path(&error.instance_path);
                if error.keyword == "required" {
                    if let Some(missing) = error.params.get("missingProperty").and_then(Value::as_str) {
                        data_path = join(&data_path, missing);
                    }
                }
                let key = assign_key.then(|| {
                    let key = self.next_key;
                    self.next_key += 1;
                    key
                });
                JsonSchemaError {
                    key,
                    keyword: error.keyword.clone(),
                    data_path,
                    schema_path: error.schema_path.clone(),
                    params: error.params.clone(),
                    message: error.message.clone(),
                }
            })
            .collect()
    }
}

/// The schema pointer of the innermost `oneOf` branch on `schema_path`.
fn innermost_one_of_branch(schema_path: &str) -> Option<&str> {
    let path = schema_path.strip_prefix('#').unwrap_or(schema_path);
    let start = path.rfind("/oneOf/")?;
    let index_start = start + "/oneOf/".len();
    let index_len = path[index_start..]
        .find('/')
        .unwrap_or(path.len() - index_start);
    if index_len == 0 {
        return None;
    }
    Some(&path[..index_start + index_len])
}

/// Drop composition bookkeeping errors. `schema` is the schema the
/// validator ran against.
pub fn filter_errors(errors: Vec<JsonSchemaError>, schema: &Value) -> Vec<JsonSchemaError> {
    errors
        .into_iter()
        .filter(|error| match error.keyword.as_str() {
            "oneOf" | "enum" => false,
            "required" => {
                let Some(branch_path) = innermost_one_of_branch(&error.schema_path) else {
                    return true;
                };
                let Some(missing) = error.missing_property() else {
                    return true;
                };
                let listed = schema
                    .pointer(branch_path)
                    .and_then(|branch| branch.get("required"))
                    .and_then(Value::as_array)
                    .is_some_and(|required| required.iter().any(|r| r == missing));
                !listed
            }
            _ => true,
        })
        .collect()
}

/// Order-sensitive digest over `(schemaPath, params)` pairs.
pub fn errors_digest(errors: &[JsonSchemaError]) -> ContentDigest {
    let pairs: Vec<Value> = errors
        .iter()
        .map(|e| json!([e.schema_path, e.params]))
        .collect();
    fragment_digest(&Value::Array(pairs))
}

/// The synthetic record reported when the validator cannot compile.
pub fn compile_error(error: &SchemaValidationError) -> RawError {
    RawError {
        keyword: COMPILE_KEYWORD.to_string(),
        instance_path: String::new(),
        schema_path: String::new(),
        params: Map::new(),
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(keyword: &str, instance_path: &str, schema_path: &str, params: Value) -> RawError {
        RawError {
            keyword: keyword.into(),
            instance_path: instance_path.into(),
            schema_path: schema_path.into(),
            params: params.as_object().cloned().unwrap_or_default(),
            message: format!("{keyword} failed"),
        }
    }

    #[test]
    fn test_required_error_points_at_missing_field() {
        let mut t = ErrorTransformer::new();
        let out = t.transform(
            &[raw("required", "", "/required", json!({"missingProperty": "email"}))],
            false,
        );
        assert_eq!(out[0].data_path, "/email");
        assert_eq!(out[0].key, None);

        let nested = t.transform(
            &[raw("required", "/a", "/properties/a/required", json!({"missingProperty": "b/c"}))],
            false,
        );
        assert_eq!(nested[0].data_path, "/a/b~1c");
    }

    #[test]
    fn test_dotted_paths_normalized() {
        let mut t = ErrorTransformer::new();
        let out = t.transform(&[raw("minLength", ".items[0].name", "/x", json!({}))], false);
        assert_eq!(out[0].data_path, "/items/0/name");
    }

    #[test]
    fn test_keys_increase_across_calls() {
        let mut t = ErrorTransformer::new();
        let first = t.transform(&[raw("type", "/a", "/t", json!({})), raw("type", "/b", "/t", json!({}))], true);
        let second = t.transform(&[raw("type", "/c", "/t", json!({}))], true);
        assert_eq!(first[0].key, Some(0));
        assert_eq!(first[1].key, Some(1));
        assert_eq!(second[0].key, Some(2));
    }

    fn media_schema() -> Value {
        json!({
            "type": "object",
            "properties": {"category": {"enum": ["movie", "game"]}, "address": {"type": "object"}},
            "oneOf": [
                {
                    "properties": {
                        "category": {"enum": ["movie"]},
                        "address": {"required": ["street"]}
                    },
                    "required": ["title"]
                },
                {"properties": {"category": {"enum": ["game"]}}, "required": ["numOfPlayers"]}
            ]
        })
    }

    #[test]
    fn test_filter_drops_composition_noise() {
        let mut t = ErrorTransformer::new();
        let errors = t.transform(
            &[
                raw("oneOf", "", "/oneOf", json!({})),
                raw("enum", "/category", "/oneOf/0/properties/category/enum", json!({})),
                raw("required", "", "/oneOf/1/required", json!({"missingProperty": "numOfPlayers"})),
                raw(
                    "required",
                    "/address",
                    "/oneOf/0/properties/address/required",
                    json!({"missingProperty": "street"}),
                ),
                raw("enum", "/category", "/properties/category/enum", json!({})),
            ],
            false,
        );
        let kept = filter_errors(errors, &media_schema());
        let paths: Vec<(&str, &str)> = kept
            .iter()
            .map(|e| (e.keyword.as_str(), e.data_path.as_str()))
            .collect();
        assert_eq!(paths, vec![("required", "/address/street")]);
    }

    #[test]
    fn test_innermost_branch_pointer() {
        assert_eq!(innermost_one_of_branch("/oneOf/1/required"), Some("/oneOf/1"));
        assert_eq!(
            innermost_one_of_branch("#/properties/a/oneOf/0/properties/b/oneOf/12/required"),
            Some("/properties/a/oneOf/0/properties/b/oneOf/12")
        );
        assert_eq!(innermost_one_of_branch("/properties/a/required"), None);
    }

    #[test]
    fn test_digest_tracks_paths_and_params() {
        let mut t = ErrorTransformer::new();
        let a = t.transform(&[raw("minLength", "/a", "/p/a/minLength", json!({"limit": 2}))], true);
        let b = t.transform(&[raw("minLength", "/a", "/p/a/minLength", json!({"limit": 2}))], true);
        let c = t.transform(&[raw("minLength", "/a", "/p/a/minLength", json!({"limit": 3}))], true);
        assert_eq!(errors_digest(&a), errors_digest(&b), "keys and messages do not count");
        assert_ne!(errors_digest(&a), errors_digest(&c));
        assert_ne!(errors_digest(&a), errors_digest(&[]));
    }

    #[test]
    fn test_compile_error_is_node_wide() {
        let raw = compile_error(&SchemaValidationError::ValidatorBuildError {
            reason: "bad regex".into(),
        });
        assert_eq!(raw.keyword, COMPILE_KEYWORD);
        assert_eq!(raw.instance_path, "");
        assert!(raw.message.contains("bad regex"));
    }
}
