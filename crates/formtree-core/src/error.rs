//! # Error Types — Structured Error Hierarchy
//!
//! All errors use `thiserror` for derive-based `Display` and `Error`
//! implementations.
//!
//! ## Taxonomy
//!
//! - **Schema structural errors** ([`SchemaError`]) abort tree
//!   construction. Every variant carries the offending schema fragment.
//! - **Condition errors** ([`ConditionError`]) are raised while compiling
//!   a computed-property expression and surface as
//!   [`SchemaError::InvalidCondition`].
//! - **Configuration errors** ([`ConfigError`]) come from loading
//!   [`TreeOptions`](crate::config::TreeOptions).
//!
//! Value validation errors are not Rust errors at all: they are data,
//! delivered to nodes through events.

use serde_json::Value;
use thiserror::Error;

/// Top-level error type for formtree.
#[derive(Error, Debug)]
pub enum FormTreeError {
    /// The schema cannot be turned into a node tree.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Structural problems in a schema, detected at construction time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// The fragment declares no `type` and none could be derived.
    #[error("schema has no type: {schema}")]
    MissingType {
        /// The offending fragment.
        schema: Value,
    },

    /// The fragment declares a type the tree cannot represent.
    #[error("unsupported schema type '{type_name}': {schema}")]
    UnsupportedType {
        /// The declared type name.
        type_name: String,
        /// The offending fragment.
        schema: Value,
    },

    /// An array schema cannot produce child schemas for its bounds.
    #[error("invalid array schema ({reason}); resolved bounds min={min}, max={max:?}: {schema}")]
    InvalidArray {
        /// What is wrong with the array schema.
        reason: String,
        /// Resolved minimum item count.
        min: usize,
        /// Resolved maximum item count (`None` = unbounded).
        max: Option<usize>,
        /// The offending fragment.
        schema: Value,
    },

    /// A `virtual` field definition is inconsistent with `properties`.
    #[error("invalid virtual field '{name}': {reason}")]
    VirtualField {
        /// Virtual field name.
        name: String,
        /// Why the definition was rejected.
        reason: String,
        /// The owning object schema.
        schema: Value,
    },

    /// Two `allOf` operands cannot be intersected for a keyword.
    #[error("allOf conflict on '{keyword}': {base} vs {branch}")]
    AllOfConflict {
        /// The keyword whose values conflict.
        keyword: String,
        /// Value from the base schema.
        base: Value,
        /// Value from the branch schema.
        branch: Value,
    },

    /// An `allOf` branch declares a type incompatible with the base.
    #[error("allOf branch type {branch} is incompatible with base type {base}")]
    IncompatibleType {
        /// Base `type` value.
        base: Value,
        /// Branch `type` value.
        branch: Value,
        /// The offending branch fragment.
        schema: Value,
    },

    /// A `$ref` could not be resolved against the root schema.
    #[error("unresolvable reference '{reference}'")]
    InvalidReference {
        /// The reference string.
        reference: String,
        /// The fragment containing the reference.
        schema: Value,
    },

    /// A computed-property expression failed to compile.
    #[error("invalid {property} expression '{expression}': {reason}")]
    InvalidCondition {
        /// Which computed property (`visible`, `readOnly`, ...).
        property: String,
        /// The expression source.
        expression: String,
        /// Compiler diagnostic.
        reason: String,
        /// The fragment declaring the expression.
        schema: Value,
    },
}

impl SchemaError {
    /// The schema fragment the error refers to.
    pub fn schema(&self) -> &Value {
        match self {
            Self::MissingType { schema }
            | Self::UnsupportedType { schema, .. }
            | Self::InvalidArray { schema, .. }
            | Self::VirtualField { schema, .. }
            | Self::IncompatibleType { schema, .. }
            | Self::InvalidReference { schema, .. }
            | Self::InvalidCondition { schema, .. } => schema,
            Self::AllOfConflict { branch, .. } => branch,
        }
    }
}

/// Failure while tokenizing or parsing a condition expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConditionError {
    /// An unexpected character was found.
    #[error("unexpected character '{found}' at offset {offset}")]
    UnexpectedChar {
        /// The character.
        found: char,
        /// Byte offset in the source.
        offset: usize,
    },

    /// A token appeared where the grammar does not allow it.
    #[error("unexpected token '{found}' at offset {offset}")]
    UnexpectedToken {
        /// Rendered token.
        found: String,
        /// Byte offset in the source.
        offset: usize,
    },

    /// The expression ended early.
    #[error("unexpected end of expression")]
    UnexpectedEnd,

    /// A string literal was not terminated.
    #[error("unterminated string literal starting at offset {offset}")]
    UnterminatedString {
        /// Byte offset of the opening quote.
        offset: usize,
    },

    /// A literal could not be parsed.
    #[error("invalid literal '{text}': {reason}")]
    InvalidLiteral {
        /// Literal text.
        text: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// A path token has no segments after its marker.
    #[error("path '{path}' must name at least one field")]
    EmptyPath {
        /// The path text.
        path: String,
    },

    /// Only `.includes(...)` is callable.
    #[error("unknown method '{name}'")]
    UnknownMethod {
        /// The method name.
        name: String,
    },
}

/// Failure while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read configuration '{path}': {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration text is not valid YAML/JSON for `TreeOptions`.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// An environment override holds an unrecognized value.
    #[error("invalid value '{value}' for {variable}")]
    InvalidEnv {
        /// Variable name.
        variable: String,
        /// Offending value.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_error_exposes_fragment() {
        let err = SchemaError::MissingType {
            schema: json!({"title": "x"}),
        };
        assert_eq!(err.schema(), &json!({"title": "x"}));
        assert!(err.to_string().contains("no type"));
    }

    #[test]
    fn test_invalid_array_message_has_bounds() {
        let err = SchemaError::InvalidArray {
            reason: "neither items nor prefixItems".into(),
            min: 0,
            max: None,
            schema: json!({"type": "array"}),
        };
        let msg = err.to_string();
        assert!(msg.contains("min=0"));
        assert!(msg.contains("max=None"));
    }

    #[test]
    fn test_top_level_from_schema_error() {
        let err: FormTreeError = SchemaError::MissingType { schema: json!({}) }.into();
        assert!(matches!(err, FormTreeError::Schema(_)));
    }
}
