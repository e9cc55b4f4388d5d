//! # Validator Collaborator
//!
//! The tree does not validate values itself. It hands `(value, schema)`
//! to a [`SchemaValidator`] and receives raw error records back.
//!
//! ## Contract
//!
//! - `Ok(errors)` is the normal outcome, including an empty list.
//! - `Err(_)` means the schema could not be compiled. The tree degrades
//!   that to one synthetic node-wide error; it never aborts.
//!
//! ## jsonschema Backend
//!
//! [`JsonSchemaValidator`] compiles Draft 2020-12 validators with the
//! `jsonschema` crate and caches them by schema content digest. External
//! `$ref` URIs are answered by an offline retriever with a permissive
//! empty schema, so validation never touches the network.

use std::collections::HashMap;
use std::sync::Arc;

use jsonschema::error::ValidationErrorKind;
use jsonschema::{Retrieve, Uri, Validator};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use formtree_core::{fragment_digest, ContentDigest};

/// One raw validator error record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawError {
    /// The failing keyword (`required`, `minLength`, ...).
    pub keyword: String,
    /// Pointer to the failing value.
    pub instance_path: String,
    /// Pointer to the failing keyword inside the schema.
    pub schema_path: String,
    /// Keyword-specific details (`missingProperty`, `limit`, ...).
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Human-readable message.
    pub message: String,
}

/// Error raised when a validator cannot be built.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaValidationError {
    /// The compiled validator could not be built (e.g., invalid schema).
    #[error("validator build error: {reason}")]
    ValidatorBuildError {
        /// Reason the validator could not be built.
        reason: String,
    },
}

/// Validates a value against a schema, returning raw error records.
pub trait SchemaValidator {
    /// Validate `value` against `schema`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaValidationError` when the schema cannot be compiled.
    fn validate(&self, value: &Value, schema: &Value) -> Result<Vec<RawError>, SchemaValidationError>;
}

impl<F> SchemaValidator for F
where
    F: Fn(&Value, &Value) -> Result<Vec<RawError>, SchemaValidationError>,
{
    fn validate(&self, value: &Value, schema: &Value) -> Result<Vec<RawError>, SchemaValidationError> {
        self(value, schema)
    }
}

/// Retriever that answers every external reference with `{}`.
struct OfflineRetriever;

impl Retrieve for OfflineRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        tracing::debug!(uri = %uri.as_str(), "external reference answered with permissive schema");
        Ok(json!({}))
    }
}

/// A [`SchemaValidator`] backed by the `jsonschema` crate.
///
/// ## Thread Safety
///
/// `JsonSchemaValidator` is `Send + Sync`; the compiled-validator cache is
/// behind a mutex and compiled validators are shared through `Arc`.
#[derive(Default)]
pub struct JsonSchemaValidator {
    compiled: Mutex<HashMap<ContentDigest, Arc<Validator>>>,
}

impl std::fmt::Debug for JsonSchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSchemaValidator")
            .field("cached", &self.compiled.lock().len())
            .finish()
    }
}

impl JsonSchemaValidator {
    /// Create a validator with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of compiled validators held in the cache.
    pub fn cached_count(&self) -> usize {
        self.compiled.lock().len()
    }

    /// Fetch or compile the validator for `schema`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaValidationError::ValidatorBuildError` if the schema
    /// does not compile.
    pub fn build_validator(&self, schema: &Value) -> Result<Arc<Validator>, SchemaValidationError> {
        let digest = fragment_digest(schema);
        if let Some(found) = self.compiled.lock().get(&digest) {
            return Ok(Arc::clone(found));
        }

        let mut opts = jsonschema::options();
        opts.with_draft(jsonschema::Draft::Draft202012);
        opts.with_retriever(OfflineRetriever);
        let validator = opts
            .build(schema)
            .map(Arc::new)
            .map_err(|e| SchemaValidationError::ValidatorBuildError {
                reason: e.to_string(),
            })?;

        tracing::debug!(digest = %digest, "compiled schema validator");
        self.compiled.lock().insert(digest, Arc::clone(&validator));
        Ok(validator)
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, value: &Value, schema: &Value) -> Result<Vec<RawError>, SchemaValidationError> {
        let validator = self.build_validator(schema)?;
        let errors = validator
            .iter_errors(value)
            .map(|e| {
                let schema_path = e.schema_path.to_string();
                let keyword = schema_path
                    .rsplit('/')
                    .next()
                    .unwrap_or_default()
                    .to_string();
                let mut params = Map::new();
                if let ValidationErrorKind::Required { property } = &e.kind {
                    let name = property
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| property.to_string());
                    params.insert("missingProperty".to_string(), Value::String(name));
                } else if let Some(constraint) = schema.pointer(&schema_path) {
                    params.insert(param_name(&keyword).to_string(), constraint.clone());
                }
                RawError {
                    keyword,
                    instance_path: e.instance_path.to_string(),
                    schema_path,
                    params,
                    message: e.to_string(),
                }
            })
            .collect();
        Ok(errors)
    }
}

/// Parameter name under which a keyword's constraint value is reported.
fn param_name(keyword: &str) -> &'static str {
    match keyword {
        "enum" => "allowedValues",
        "const" => "allowedValue",
        "pattern" => "pattern",
        "format" => "format",
        "type" => "type",
        "multipleOf" => "multipleOf",
        "additionalProperties" => "additionalProperty",
        _ => "limit",
    }
}
