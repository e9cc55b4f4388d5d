//! # Schema Composer
//!
//! Turns an authored schema fragment into the flat fragment a node is
//! built from, and extracts the branch metadata object nodes consume.
//!
//! ## Normalization Pipeline
//!
//! 1. Inline a top-level local `$ref` (siblings intersect with the target).
//! 2. Fold `allOf` branches into the base ([`all_of`]), inlining each
//!    branch's `$ref` first.
//! 3. Inline `$ref`s at the top of each `oneOf` / `anyOf` branch so the
//!    branch analysis in [`branches`] sees concrete property schemas.
//!
//! Normalization is shallow: `properties` and `items` keep their authored
//! form and are normalized when their own node is built.

pub mod all_of;
pub mod branches;

pub use all_of::{intersect, merge_all_of};
pub use branches::{
    BranchMeta, CompositionKind, CompositionMeta, Discriminant, FieldCondition, RequiredStatus,
};

use serde_json::Value;

use formtree_core::SchemaError;

use crate::reference::RefResolver;

/// Normalizes schema fragments that belong to one root document.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer<'a> {
    refs: Option<RefResolver<'a>>,
}

impl<'a> Normalizer<'a> {
    /// Create a normalizer. With `resolve_references` off, `$ref`s are
    /// left in place and the fragment must carry its own `type`.
    pub fn new(root: &'a Value, resolve_references: bool) -> Self {
        Self {
            refs: resolve_references.then(|| RefResolver::new(root)),
        }
    }

    fn inline(&self, schema: &Value) -> Result<Value, SchemaError> {
        match &self.refs {
            Some(refs) => refs.inline(schema),
            None => Ok(schema.clone()),
        }
    }

    /// Normalize one fragment.
    ///
    /// # Errors
    ///
    /// Propagates reference and allOf errors.
    pub fn normalize(&self, schema: &Value) -> Result<Value, SchemaError> {
        let prepare = |fragment: &Value| self.inline(fragment);
        let mut merged = all_of::merge_all_of_with(schema, &prepare)?;

        if let Some(obj) = merged.as_object_mut() {
            for keyword in ["oneOf", "anyOf"] {
                let Some(Value::Array(branches)) = obj.get(keyword) else {
                    continue;
                };
                let inlined = branches
                    .iter()
                    .map(|b| all_of::merge_all_of_with(b, &prepare))
                    .collect::<Result<Vec<_>, _>>()?;
                obj.insert(keyword.to_string(), Value::Array(inlined));
            }
        }
        Ok(merged)
    }
}

/// The JSON type a node is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaType {
    /// `"object"`.
    Object,
    /// `"array"`.
    Array,
    /// `"string"`.
    String,
    /// `"number"`.
    Number,
    /// `"integer"`.
    Integer,
    /// `"boolean"`.
    Boolean,
    /// `"null"`.
    Null,
}

impl SchemaType {
    /// Parse a `type` keyword member.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "object" => Self::Object,
            "array" => Self::Array,
            "string" => Self::String,
            "number" => Self::Number,
            "integer" => Self::Integer,
            "boolean" => Self::Boolean,
            "null" => Self::Null,
            _ => return None,
        })
    }

    /// The keyword spelling.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Null => "null",
        }
    }

    /// Resolve the dispatch type of a normalized fragment.
    ///
    /// Nullable unions (`["string", "null"]`) dispatch on the non-null
    /// member. A fragment without `type` is an object if it declares
    /// `properties` or `virtual`, and an array if it declares `items` or
    /// `prefixItems`.
    ///
    /// # Errors
    ///
    /// `SchemaError::MissingType` when no type can be derived, and
    /// `SchemaError::UnsupportedType` for unknown names or unions of
    /// several non-null types.
    pub fn of(schema: &Value) -> Result<Self, SchemaError> {
        let unsupported = |type_name: String| SchemaError::UnsupportedType {
            type_name,
            schema: schema.clone(),
        };
        match schema.get("type") {
            Some(Value::String(name)) => {
                Self::from_name(name).ok_or_else(|| unsupported(name.clone()))
            }
            Some(Value::Array(names)) => {
                let names: Vec<&str> = names.iter().filter_map(Value::as_str).collect();
                let non_null: Vec<&str> = names.iter().copied().filter(|n| *n != "null").collect();
                match non_null.as_slice() {
                    [] if names.contains(&"null") => Ok(Self::Null),
                    [] => Err(SchemaError::MissingType {
                        schema: schema.clone(),
                    }),
                    [single] => Self::from_name(single).ok_or_else(|| unsupported(single.to_string())),
                    // number ∪ integer dispatches as number.
                    [a, b] if matches!((*a, *b), ("number", "integer") | ("integer", "number")) => {
                        Ok(Self::Number)
                    }
                    many => Err(unsupported(many.join("|"))),
                }
            }
            Some(other) => Err(unsupported(other.to_string())),
            None => {
                let has = |k: &str| schema.get(k).is_some();
                if has("properties") || has("virtual") {
                    Ok(Self::Object)
                } else if has("items") || has("prefixItems") {
                    Ok(Self::Array)
                } else {
                    Err(SchemaError::MissingType {
                        schema: schema.clone(),
                    })
                }
            }
        }
    }
}

/// Whether the fragment admits `null` in addition to its dispatch type.
pub fn is_nullable(schema: &Value) -> bool {
    if schema.get("nullable").and_then(Value::as_bool) == Some(true) {
        return true;
    }
    schema
        .get("type")
        .and_then(Value::as_array)
        .is_some_and(|names| names.iter().any(|n| n == "null"))
}
