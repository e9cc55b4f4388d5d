//! # allOf Intersection
//!
//! Folds every `allOf` branch into its base schema so the node tree only
//! ever sees one flat fragment. The fold is an intersection: the merged
//! schema accepts exactly the values every operand accepts, wherever the
//! keyword allows that to be expressed in a single schema.
//!
//! ## Keyword Rules
//!
//! | Keyword | Rule |
//! |---------|------|
//! | `minimum`, `minLength`, `minItems`, ... | max of both |
//! | `maximum`, `maxLength`, `maxItems`, ... | min of both |
//! | `pattern` | lookahead conjunction `(?=A)(?=B)` |
//! | `enum` | intersection (empty is a conflict) |
//! | `const` | must be equal |
//! | `required` | union |
//! | `uniqueItems` | logical or |
//! | `multipleOf` | lcm for integers (overflow is a conflict) |
//! | `properties`, `patternProperties`, `$defs` | per-key recursive merge |
//! | `items`, `contains`, `propertyNames`, ... | recursive merge |
//! | `prefixItems` | pairwise recursive merge |
//! | `additionalProperties` | `false` wins, schemas merge |
//! | `type` | nullable-aware intersection |
//! | everything else | first wins (base, then branch) |

use serde_json::{Map, Number, Value};

use formtree_core::SchemaError;

const LOWER_BOUNDS: &[&str] = &[
    "minimum",
    "exclusiveMinimum",
    "minLength",
    "minItems",
    "minProperties",
    "minContains",
];

const UPPER_BOUNDS: &[&str] = &[
    "maximum",
    "exclusiveMaximum",
    "maxLength",
    "maxItems",
    "maxProperties",
    "maxContains",
];

const SCHEMA_VALUED: &[&str] = &[
    "items",
    "additionalItems",
    "contains",
    "propertyNames",
    "unevaluatedItems",
    "unevaluatedProperties",
    "not",
];

const SCHEMA_MAPS: &[&str] = &["properties", "patternProperties", "$defs", "definitions"];

/// Fold `allOf` into the surrounding schema, recursively.
///
/// Fragments without `allOf` are returned unchanged.
///
/// # Errors
///
/// Returns `SchemaError::AllOfConflict` for irreconcilable keyword values
/// and `SchemaError::IncompatibleType` for disjoint types.
pub fn merge_all_of(schema: &Value) -> Result<Value, SchemaError> {
    merge_all_of_with(schema, &|fragment| Ok(fragment.clone()))
}

/// Like [`merge_all_of`], running `prepare` on the schema and on every
/// branch before merging (used to inline `$ref`s).
pub(crate) fn merge_all_of_with(
    schema: &Value,
    prepare: &dyn Fn(&Value) -> Result<Value, SchemaError>,
) -> Result<Value, SchemaError> {
    let schema = prepare(schema)?;
    let Some(obj) = schema.as_object() else {
        return Ok(schema);
    };
    let Some(branches) = obj.get("allOf").and_then(Value::as_array) else {
        return Ok(schema);
    };
    let branches = branches.clone();
    let mut base = obj.clone();
    base.remove("allOf");
    let mut merged = Value::Object(base);
    for branch in &branches {
        let branch = merge_all_of_with(branch, prepare)?;
        merged = intersect(&merged, &branch)?;
    }
    Ok(merged)
}

/// Intersect two schema fragments.
///
/// A non-object branch (`true`, or anything malformed) adds no
/// constraints; a `false` branch makes the result `false`.
///
/// # Errors
///
/// See [`merge_all_of`].
pub fn intersect(base: &Value, branch: &Value) -> Result<Value, SchemaError> {
    match (base, branch) {
        (_, Value::Bool(false)) | (Value::Bool(false), _) => return Ok(Value::Bool(false)),
        (Value::Object(_), Value::Object(_)) => {}
        (Value::Object(_), _) => return Ok(base.clone()),
        (_, Value::Object(_)) => return Ok(branch.clone()),
        _ => return Ok(base.clone()),
    }
    let (Some(base_obj), Some(branch_obj)) = (base.as_object(), branch.as_object()) else {
        return Ok(base.clone());
    };

    let mut out = base_obj.clone();
    if let Some(merged_type) = merge_type(base_obj, branch_obj, branch)? {
        out.insert("type".to_string(), merged_type);
        // `nullable` is folded into `type` once both sides agree.
        if base_obj.contains_key("nullable") || branch_obj.contains_key("nullable") {
            out.remove("nullable");
        }
    }

    for (key, incoming) in branch_obj {
        let key = key.as_str();
        if key == "type" || key == "nullable" || key == "allOf" {
            continue;
        }
        let Some(existing) = base_obj.get(key) else {
            out.insert(key.to_string(), incoming.clone());
            continue;
        };
        let merged = if LOWER_BOUNDS.contains(&key) {
            pick_bound(existing, incoming, |a, b| a >= b)
        } else if UPPER_BOUNDS.contains(&key) {
            pick_bound(existing, incoming, |a, b| a <= b)
        } else if SCHEMA_VALUED.contains(&key) {
            intersect(existing, incoming)?
        } else if SCHEMA_MAPS.contains(&key) {
            merge_schema_map(existing, incoming)?
        } else {
            match key {
                "pattern" => merge_pattern(existing, incoming),
                "enum" => merge_enum(existing, incoming)?,
                "const" => merge_const(existing, incoming)?,
                "required" => merge_required(existing, incoming),
                "uniqueItems" => Value::Bool(
                    existing.as_bool().unwrap_or(false) || incoming.as_bool().unwrap_or(false),
                ),
                "multipleOf" => merge_multiple_of(existing, incoming)?,
                "prefixItems" => merge_prefix_items(existing, incoming)?,
                "additionalProperties" => merge_additional(existing, incoming)?,
                // title, description, examples, default, format, readOnly,
                // writeOnly, and anything unrecognized: first wins.
                _ => existing.clone(),
            }
        };
        out.insert(key.to_string(), merged);
    }

    Ok(Value::Object(out))
}

// ─── Type ────────────────────────────────────────────────────────────

fn type_set(obj: &Map<String, Value>) -> Option<Vec<String>> {
    let mut types: Vec<String> = match obj.get("type")? {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => return None,
    };
    if obj.get("nullable").and_then(Value::as_bool) == Some(true)
        && !types.iter().any(|t| t == "null")
    {
        types.push("null".to_string());
    }
    Some(types)
}

fn merge_type(
    base: &Map<String, Value>,
    branch: &Map<String, Value>,
    branch_schema: &Value,
) -> Result<Option<Value>, SchemaError> {
    let Some(branch_types) = type_set(branch) else {
        // Pure constraint addition.
        return Ok(None);
    };
    let Some(base_types) = type_set(base) else {
        return Ok(Some(type_value(branch_types)));
    };

    let mut merged: Vec<String> = Vec::new();
    for t in &base_types {
        let hit = if branch_types.contains(t) {
            Some(t.as_str())
        } else if (t == "number" && branch_types.iter().any(|b| b == "integer"))
            || (t == "integer" && branch_types.iter().any(|b| b == "number"))
        {
            Some("integer")
        } else {
            None
        };
        if let Some(hit) = hit {
            if !merged.iter().any(|m| m == hit) {
                merged.push(hit.to_string());
            }
        }
    }

    if merged.is_empty() {
        return Err(SchemaError::IncompatibleType {
            base: base.get("type").cloned().unwrap_or(Value::Null),
            branch: branch.get("type").cloned().unwrap_or(Value::Null),
            schema: branch_schema.clone(),
        });
    }
    Ok(Some(type_value(merged)))
}

fn type_value(mut types: Vec<String>) -> Value {
    if types.len() == 1 {
        Value::String(types.remove(0))
    } else {
        Value::Array(types.into_iter().map(Value::String).collect())
    }
}

// ─── Scalar keywords ─────────────────────────────────────────────────

fn pick_bound(existing: &Value, incoming: &Value, keep_existing: fn(f64, f64) -> bool) -> Value {
    match (existing.as_f64(), incoming.as_f64()) {
        (Some(a), Some(b)) => {
            if keep_existing(a, b) {
                existing.clone()
            } else {
                incoming.clone()
            }
        }
        (None, Some(_)) => incoming.clone(),
        _ => existing.clone(),
    }
}

fn merge_pattern(existing: &Value, incoming: &Value) -> Value {
    match (existing.as_str(), incoming.as_str()) {
        (Some(a), Some(b)) if a == b => existing.clone(),
        (Some(a), Some(b)) => Value::String(format!("(?={a})(?={b})")),
        (None, Some(_)) => incoming.clone(),
        _ => existing.clone(),
    }
}

fn merge_enum(existing: &Value, incoming: &Value) -> Result<Value, SchemaError> {
    let (Some(a), Some(b)) = (existing.as_array(), incoming.as_array()) else {
        return Ok(existing.clone());
    };
    let common: Vec<Value> = a.iter().filter(|v| b.contains(v)).cloned().collect();
    if common.is_empty() {
        return Err(SchemaError::AllOfConflict {
            keyword: "enum".to_string(),
            base: existing.clone(),
            branch: incoming.clone(),
        });
    }
    Ok(Value::Array(common))
}

fn merge_const(existing: &Value, incoming: &Value) -> Result<Value, SchemaError> {
    if existing == incoming {
        Ok(existing.clone())
    } else {
        Err(SchemaError::AllOfConflict {
            keyword: "const".to_string(),
            base: existing.clone(),
            branch: incoming.clone(),
        })
    }
}

fn merge_required(existing: &Value, incoming: &Value) -> Value {
    let mut out: Vec<Value> = existing.as_array().cloned().unwrap_or_default();
    for name in incoming.as_array().into_iter().flatten() {
        if !out.contains(name) {
            out.push(name.clone());
        }
    }
    Value::Array(out)
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

fn merge_multiple_of(existing: &Value, incoming: &Value) -> Result<Value, SchemaError> {
    match (existing.as_u64(), incoming.as_u64()) {
        (Some(a), Some(b)) if a > 0 && b > 0 => match (a / gcd(a, b)).checked_mul(b) {
            Some(lcm) => Ok(Value::Number(Number::from(lcm))),
            None => Err(SchemaError::AllOfConflict {
                keyword: "multipleOf".to_string(),
                base: existing.clone(),
                branch: incoming.clone(),
            }),
        },
        _ => Ok(existing.clone()),
    }
}

// ─── Nested schemas ──────────────────────────────────────────────────

fn merge_schema_map(existing: &Value, incoming: &Value) -> Result<Value, SchemaError> {
    let (Some(a), Some(b)) = (existing.as_object(), incoming.as_object()) else {
        return Ok(existing.clone());
    };
    let mut out = a.clone();
    for (name, schema) in b {
        let merged = match a.get(name) {
            Some(current) => intersect(current, schema)?,
            None => schema.clone(),
        };
        out.insert(name.clone(), merged);
    }
    Ok(Value::Object(out))
}

fn merge_prefix_items(existing: &Value, incoming: &Value) -> Result<Value, SchemaError> {
    let (Some(a), Some(b)) = (existing.as_array(), incoming.as_array()) else {
        return Ok(existing.clone());
    };
    let len = a.len().max(b.len());
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let merged = match (a.get(i), b.get(i)) {
            (Some(x), Some(y)) => intersect(x, y)?,
            (Some(x), None) => x.clone(),
            (None, Some(y)) => y.clone(),
            (None, None) => continue,
        };
        out.push(merged);
    }
    Ok(Value::Array(out))
}

fn merge_additional(existing: &Value, incoming: &Value) -> Result<Value, SchemaError> {
    match (existing, incoming) {
        (Value::Bool(false), _) | (_, Value::Bool(false)) => Ok(Value::Bool(false)),
        (Value::Bool(true), other) | (other, Value::Bool(true)) => Ok(other.clone()),
        _ => intersect(existing, incoming),
    }
}
