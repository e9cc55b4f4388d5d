//! # Render-Hint Stripping
//!
//! Component-injection keys (`FormTypeInput`, `formType`, ...) only mean
//! something to the rendering layer. They are removed before a schema is
//! handed to the validator.
//!
//! Removal walks schema positions only. A property literally named
//! `formType` under `properties`, or a `default` value that happens to
//! contain such a key, is data and stays intact.

use serde_json::{Map, Value};

/// Keywords whose value is a single subschema.
const SUBSCHEMA: &[&str] = &[
    "items",
    "additionalItems",
    "additionalProperties",
    "unevaluatedItems",
    "unevaluatedProperties",
    "contains",
    "propertyNames",
    "not",
    "if",
    "then",
    "else",
];

/// Keywords whose value maps names to subschemas.
const SUBSCHEMA_MAP: &[&str] = &[
    "properties",
    "patternProperties",
    "dependentSchemas",
    "$defs",
    "definitions",
];

/// Keywords whose value is a list of subschemas.
const SUBSCHEMA_LIST: &[&str] = &["allOf", "anyOf", "oneOf", "prefixItems"];

/// Return a copy of `schema` without the given hint keys.
pub fn strip_hints(schema: &Value, keys: &[String]) -> Value {
    if keys.is_empty() {
        return schema.clone();
    }
    strip(schema, keys)
}

fn strip(schema: &Value, keys: &[String]) -> Value {
    let Some(obj) = schema.as_object() else {
        return schema.clone();
    };
    let mut out = Map::with_capacity(obj.len());
    for (key, value) in obj {
        if keys.iter().any(|k| k == key) {
            continue;
        }
        let stripped = if SUBSCHEMA.contains(&key.as_str()) {
            strip(value, keys)
        } else if SUBSCHEMA_MAP.contains(&key.as_str()) {
            match value {
                Value::Object(map) => Value::Object(
                    map.iter()
                        .map(|(name, sub)| (name.clone(), strip(sub, keys)))
                        .collect(),
                ),
                other => other.clone(),
            }
        } else if SUBSCHEMA_LIST.contains(&key.as_str()) {
            match value {
                Value::Array(list) => Value::Array(list.iter().map(|s| strip(s, keys)).collect()),
                other => other.clone(),
            }
        } else {
            value.clone()
        };
        out.insert(key.clone(), stripped);
    }
    Value::Object(out)
}
