//! # Local Reference Resolution
//!
//! Inlines `$ref` pointers of the form `#` or `#/...` against the root
//! schema document. Sibling keywords next to a `$ref` add constraints, so
//! the target and the siblings are intersected with the allOf rules.
//!
//! Only document-local references are supported. Anything else (remote
//! URIs, relative file references, anchors) is `SchemaError::InvalidReference`.

use serde_json::Value;

use formtree_core::SchemaError;

use crate::composer::intersect;

/// Resolves local references against one root schema.
#[derive(Debug, Clone, Copy)]
pub struct RefResolver<'a> {
    root: &'a Value,
}

impl<'a> RefResolver<'a> {
    /// Create a resolver for `root`.
    pub fn new(root: &'a Value) -> Self {
        Self { root }
    }

    /// The root document.
    pub fn root(&self) -> &'a Value {
        self.root
    }

    /// Look up a reference target. `None` if it is not local or does not
    /// exist.
    pub fn lookup(&self, reference: &str) -> Option<&'a Value> {
        let pointer = reference.strip_prefix('#')?;
        if pointer.is_empty() {
            return Some(self.root);
        }
        if !pointer.starts_with('/') {
            return None;
        }
        self.root.pointer(pointer)
    }

    /// Inline the `$ref` at the top of `schema`, following chains.
    ///
    /// Nested `$ref`s inside `properties` or `items` are left alone; they
    /// are inlined when their own node is built.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::InvalidReference` for non-local, missing, or
    /// cyclic references, and allOf errors when siblings conflict with the
    /// target.
    pub fn inline(&self, schema: &Value) -> Result<Value, SchemaError> {
        let mut seen: Vec<String> = Vec::new();
        let mut current = schema.clone();
        loop {
            let Some(reference) = current.get("$ref").and_then(Value::as_str) else {
                return Ok(current);
            };
            let reference = reference.to_string();
            if seen.contains(&reference) {
                return Err(SchemaError::InvalidReference {
                    reference,
                    schema: schema.clone(),
                });
            }
            let target = self
                .lookup(&reference)
                .ok_or_else(|| SchemaError::InvalidReference {
                    reference: reference.clone(),
                    schema: current.clone(),
                })?;
            tracing::trace!(reference = %reference, "inlining local reference");

            let mut siblings = current.as_object().cloned().unwrap_or_default();
            siblings.remove("$ref");
            current = if siblings.is_empty() {
                target.clone()
            } else {
                // The target keeps priority for first-wins metadata.
                intersect(target, &Value::Object(siblings))?
            };
            seen.push(reference);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn root() -> Value {
        json!({
            "type": "object",
            "$defs": {
                "name": {"type": "string", "minLength": 1},
                "alias": {"$ref": "#/$defs/name"},
                "loop_a": {"$ref": "#/$defs/loop_b"},
                "loop_b": {"$ref": "#/$defs/loop_a"},
                "a/b": {"type": "number"}
            },
            "definitions": {"flag": {"type": "boolean"}}
        })
    }

    #[test]
    fn test_lookup_root_and_pointer() {
        let root = root();
        let resolver = RefResolver::new(&root);
        assert_eq!(resolver.lookup("#"), Some(&root));
        assert_eq!(
            resolver.lookup("#/definitions/flag"),
            Some(&json!({"type": "boolean"}))
        );
        assert_eq!(resolver.lookup("#/$defs/a~1b"), Some(&json!({"type": "number"})));
        assert!(resolver.lookup("https://example.com/x.json").is_none());
        assert!(resolver.lookup("#anchor").is_none());
    }

    #[test]
    fn test_inline_follows_chain() {
        let root = root();
        let resolver = RefResolver::new(&root);
        let inlined = resolver.inline(&json!({"$ref": "#/$defs/alias"})).unwrap();
        assert_eq!(inlined, json!({"type": "string", "minLength": 1}));
    }

    #[test]
    fn test_siblings_intersect() {
        let root = root();
        let resolver = RefResolver::new(&root);
        let inlined = resolver
            .inline(&json!({"$ref": "#/$defs/name", "minLength": 3, "title": "Name"}))
            .unwrap();
        assert_eq!(inlined["minLength"], json!(3));
        assert_eq!(inlined["title"], json!("Name"));
        assert_eq!(inlined["type"], json!("string"));
    }

    #[test]
    fn test_missing_and_cyclic_rejected() {
        let root = root();
        let resolver = RefResolver::new(&root);
        assert!(matches!(
            resolver.inline(&json!({"$ref": "#/$defs/none"})),
            Err(SchemaError::InvalidReference { .. })
        ));
        assert!(matches!(
            resolver.inline(&json!({"$ref": "#/$defs/loop_a"})),
            Err(SchemaError::InvalidReference { .. })
        ));
        assert!(matches!(
            resolver.inline(&json!({"$ref": "other.json#/x"})),
            Err(SchemaError::InvalidReference { .. })
        ));
    }

    #[test]
    fn test_no_ref_is_unchanged() {
        let root = root();
        let resolver = RefResolver::new(&root);
        let schema = json!({"type": "string"});
        assert_eq!(resolver.inline(&schema).unwrap(), schema);
    }
}
