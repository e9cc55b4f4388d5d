//! # Array Schema Rules
//!
//! Item-count bounds, construction-time shape checks, and per-index child
//! schema selection for `array` fragments.
//!
//! `items: false` is read as "no additional items": it closes a tuple the
//! same way an absent `items` does.

use serde_json::Value;

use formtree_core::SchemaError;

/// Resolved item-count bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayLimits {
    /// Minimum item count.
    pub min: usize,
    /// Maximum item count (`None` = unbounded).
    pub max: Option<usize>,
}

impl ArrayLimits {
    /// Whether one more item fits.
    pub fn can_grow(&self, len: usize) -> bool {
        self.max.map_or(true, |max| len < max)
    }

    /// Whether one item can be removed.
    pub fn can_shrink(&self, len: usize) -> bool {
        len > self.min
    }
}

fn count(schema: &Value, keyword: &str) -> Option<usize> {
    schema
        .get(keyword)
        .and_then(Value::as_u64)
        .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
}

fn prefix_items(schema: &Value) -> Option<&Vec<Value>> {
    schema.get("prefixItems").and_then(Value::as_array)
}

/// `items`, unless absent or `false`.
fn open_items(schema: &Value) -> Option<&Value> {
    schema.get("items").filter(|items| **items != Value::Bool(false))
}

/// Compute `{min, max}` for an array fragment.
///
/// `max` is the tighter of `maxItems` and the closed-tuple length
/// (`prefixItems.len()` when no open `items` exists).
pub fn resolve_array_limits(schema: &Value) -> ArrayLimits {
    let min = count(schema, "minItems").unwrap_or(0);
    let tuple_limit = match (open_items(schema), prefix_items(schema)) {
        (None, Some(prefix)) => Some(prefix.len()),
        _ => None,
    };
    let max = match (count(schema, "maxItems"), tuple_limit) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    ArrayLimits { min, max }
}

/// Reject array fragments that cannot produce a child schema for every
/// index their bounds allow.
///
/// # Errors
///
/// Returns `SchemaError::InvalidArray` with the resolved bounds.
pub fn validate_array_schema(schema: &Value) -> Result<ArrayLimits, SchemaError> {
    let limits = resolve_array_limits(schema);
    let invalid = |reason: &str| SchemaError::InvalidArray {
        reason: reason.to_string(),
        min: limits.min,
        max: limits.max,
        schema: schema.clone(),
    };

    let prefix = prefix_items(schema);
    if schema.get("items") == Some(&Value::Bool(false)) && prefix.is_none() {
        return Err(invalid("items is false and no prefixItems are declared"));
    }
    if open_items(schema).is_none() {
        let Some(prefix) = prefix else {
            return Err(invalid("neither items nor prefixItems is declared"));
        };
        if count(schema, "maxItems").is_some_and(|max| max > prefix.len()) {
            return Err(invalid("closed tuple is shorter than maxItems"));
        }
        if limits.min > prefix.len() {
            return Err(invalid("closed tuple is shorter than minItems"));
        }
    }
    check_order(limits, invalid)
}

fn check_order(
    limits: ArrayLimits,
    invalid: impl Fn(&str) -> SchemaError,
) -> Result<ArrayLimits, SchemaError> {
    match limits.max {
        Some(max) if limits.min > max => Err(invalid("minItems exceeds the maximum item count")),
        _ => Ok(limits),
    }
}

/// The schema governing the item at `index`.
pub fn child_schema(schema: &Value, index: usize) -> Option<&Value> {
    match prefix_items(schema) {
        Some(prefix) if index < prefix.len() => prefix.get(index),
        _ => open_items(schema),
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    proptest! {
        #[test]
        fn limits_never_exceed_closed_tuple(len in 0usize..6, max in proptest::option::of(0usize..10)) {
            let mut schema = json!({"prefixItems": vec![json!({}); len]});
            if let Some(max) = max {
                schema["maxItems"] = json!(max);
            }
            let limits = resolve_array_limits(&schema);
            prop_assert!(limits.max.is_some_and(|m| m <= len));
        }
    }
}
