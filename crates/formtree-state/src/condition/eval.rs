//! Tree-walking evaluation over resolved dependency values.
//!
//! Values are `Option<Value>`: `None` is an absent (undefined) value and
//! is distinct from JSON `null` under strict equality.

use serde_json::Value;

use super::Expr;

/// JavaScript-style truthiness.
pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Structural equality with numeric comparison by value (`1 == 1.0`).
fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_eq(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| json_eq(v, w)))
        }
        _ => a == b,
    }
}

/// Strict equality; loose equality also equates `null` and undefined.
pub fn equals(a: Option<&Value>, b: Option<&Value>, strict: bool) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => json_eq(x, y),
        (None, Some(Value::Null)) | (Some(Value::Null), None) => !strict,
        _ => false,
    }
}

fn includes(collection: Option<&Value>, item: Option<&Value>) -> bool {
    match (collection, item) {
        (Some(Value::Array(items)), Some(item)) => items.iter().any(|v| json_eq(v, item)),
        (Some(Value::String(haystack)), Some(Value::String(needle))) => {
            haystack.contains(needle.as_str())
        }
        _ => false,
    }
}

impl Expr<usize> {
    /// Evaluate against dependency values (`values[i]` is dependency `i`).
    ///
    /// `&&` and `||` yield an operand, as in JavaScript.
    pub fn evaluate(&self, values: &[Option<Value>]) -> Option<Value> {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Path(index) => values.get(*index).cloned().flatten(),
            Self::List(items) => Some(Value::Array(
                items
                    .iter()
                    .map(|item| item.evaluate(values).unwrap_or(Value::Null))
                    .collect(),
            )),
            Self::Not(inner) => Some(Value::Bool(!truthy(inner.evaluate(values).as_ref()))),
            Self::And(left, right) => {
                let l = left.evaluate(values);
                if truthy(l.as_ref()) {
                    right.evaluate(values)
                } else {
                    l
                }
            }
            Self::Or(left, right) => {
                let l = left.evaluate(values);
                if truthy(l.as_ref()) {
                    l
                } else {
                    right.evaluate(values)
                }
            }
            Self::Equals {
                left,
                right,
                strict,
                negated,
            } => {
                let eq = equals(
                    left.evaluate(values).as_ref(),
                    right.evaluate(values).as_ref(),
                    *strict,
                );
                Some(Value::Bool(eq != *negated))
            }
            Self::Includes { collection, item } => Some(Value::Bool(includes(
                collection.evaluate(values).as_ref(),
                item.evaluate(values).as_ref(),
            ))),
        }
    }
}
