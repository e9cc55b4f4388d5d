//! # oneOf / anyOf Branch Metadata
//!
//! An object schema with `oneOf` (or `anyOf`) branches is analyzed once
//! into a [`CompositionMeta`]:
//!
//! - **Union key set.** Property keys that some branch declares with a
//!   concrete `type` or `$ref` and that the base `properties` do not
//!   declare. These fields only exist while their branch is active.
//! - **Per-branch key sets.** The union keys each branch contributes.
//! - **Discriminants.** `const` / `enum` (or `not: {const|enum}`)
//!   constraints on branch properties. A branch is active when all of its
//!   discriminants match the current sibling values.
//! - **Field conditions.** For every field a branch lists in `required`,
//!   the branch's discriminants, so "is this field required right now"
//!   never rescans the schema.
//!
//! Which branch is active depends on the value, so exclusion is always
//! computed at read time through [`CompositionMeta::excluded_keys`].

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use formtree_core::canonical::literal;
use formtree_core::pointer::{escape, PARENT_TOKEN, SEPARATOR};

/// Which composition keyword drives branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositionKind {
    /// Exactly one branch applies; the first matching branch wins.
    OneOf,
    /// Any number of branches apply; all matching branches contribute.
    AnyOf,
}

impl CompositionKind {
    /// The schema keyword.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::OneOf => "oneOf",
            Self::AnyOf => "anyOf",
        }
    }
}

/// A constraint on one sibling field that selects a branch.
#[derive(Debug, Clone, PartialEq)]
pub struct Discriminant {
    /// Sibling property name.
    pub field: String,
    /// Accepted values (`const` is a one-element list).
    pub values: Vec<Value>,
    /// Declared through `not`: the field must hold none of `values`.
    pub inverse: bool,
}

impl Discriminant {
    /// Test the discriminant against the sibling's current value.
    ///
    /// An absent value is never "in" the accepted list, so it matches
    /// only inverse discriminants.
    pub fn matches(&self, value: Option<&Value>) -> bool {
        let hit = value.is_some_and(|v| self.values.contains(v));
        hit != self.inverse
    }

    /// Render as a condition expression relative to a sibling node.
    pub fn to_expression(&self) -> String {
        let path = format!("{PARENT_TOKEN}{SEPARATOR}{}", escape(&self.field));
        let positive = match self.values.as_slice() {
            [single] => format!("{path} === {}", literal(single)),
            many => format!("{}.includes({path})", literal(&Value::Array(many.to_vec()))),
        };
        if self.inverse {
            format!("!({positive})")
        } else {
            positive
        }
    }
}

/// Render a conjunction of discriminants; empty means "always".
fn conjunction_expression(condition: &[Discriminant]) -> String {
    match condition {
        [] => "true".to_string(),
        [single] => single.to_expression(),
        many => many
            .iter()
            .map(|d| format!("({})", d.to_expression()))
            .collect::<Vec<_>>()
            .join(" && "),
    }
}

/// One `oneOf` / `anyOf` alternative.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchMeta {
    /// Position in the composition array.
    pub index: usize,
    /// Union keys this branch contributes, in declaration order.
    pub keys: Vec<String>,
    /// Schemas for `keys`.
    pub properties: Map<String, Value>,
    /// All discriminants must match for the branch to be active.
    pub condition: Vec<Discriminant>,
    /// The branch's `required` list.
    pub required: Vec<String>,
}

impl BranchMeta {
    /// Whether the branch is active for the given sibling lookup.
    pub fn is_active(&self, lookup: &dyn Fn(&str) -> Option<Value>) -> bool {
        self.condition
            .iter()
            .all(|d| d.matches(lookup(&d.field).as_ref()))
    }
}

/// A field's requirement under one branch.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCondition {
    /// The branch that lists the field as required.
    pub branch: usize,
    /// That branch's discriminants (empty = unconditional).
    pub condition: Vec<Discriminant>,
}

/// How a field's required status resolves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RequiredStatus<'a> {
    /// No branch requires the field.
    Never,
    /// Some mentioning branch requires it unconditionally.
    Always,
    /// Required while any of these conditions holds.
    Conditional(&'a [FieldCondition]),
}

/// Branch analysis for one object schema.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionMeta {
    /// `oneOf` or `anyOf`.
    pub kind: CompositionKind,
    /// Analyzed branches, in declaration order.
    pub branches: Vec<BranchMeta>,
    /// Every branch-only key, in first-seen order.
    pub union_key_set: Vec<String>,
    /// Field name → conditions under which a branch requires it.
    pub field_conditions: BTreeMap<String, Vec<FieldCondition>>,
}

impl CompositionMeta {
    /// Analyze an object schema. Returns `None` without `oneOf`/`anyOf`.
    ///
    /// When both keywords are present, `oneOf` drives branching.
    pub fn from_schema(schema: &Value) -> Option<Self> {
        let obj = schema.as_object()?;
        let (kind, branches) = match (
            obj.get("oneOf").and_then(Value::as_array),
            obj.get("anyOf").and_then(Value::as_array),
        ) {
            (Some(one_of), any_of) => {
                if any_of.is_some() {
                    tracing::warn!("schema declares both oneOf and anyOf; branching follows oneOf");
                }
                (CompositionKind::OneOf, one_of)
            }
            (None, Some(any_of)) => (CompositionKind::AnyOf, any_of),
            (None, None) => return None,
        };

        let base_properties = obj.get("properties").and_then(Value::as_object);
        let mut union_key_set: Vec<String> = Vec::new();
        let mut field_conditions: BTreeMap<String, Vec<FieldCondition>> = BTreeMap::new();
        let mut analyzed = Vec::with_capacity(branches.len());

        for (index, branch) in branches.iter().enumerate() {
            let meta = analyze_branch(index, branch, base_properties);
            for key in &meta.keys {
                if !union_key_set.contains(key) {
                    union_key_set.push(key.clone());
                }
            }
            for field in &meta.required {
                field_conditions
                    .entry(field.clone())
                    .or_default()
                    .push(FieldCondition {
                        branch: index,
                        condition: meta.condition.clone(),
                    });
            }
            analyzed.push(meta);
        }

        Some(Self {
            kind,
            branches: analyzed,
            union_key_set,
            field_conditions,
        })
    }

    /// The schema a branch declares for a union key (first declaring
    /// branch wins).
    pub fn branch_property(&self, key: &str) -> Option<&Value> {
        self.branches.iter().find_map(|b| b.properties.get(key))
    }

    /// Indices of the branches active for the current sibling values.
    pub fn active_branches(&self, lookup: &dyn Fn(&str) -> Option<Value>) -> Vec<usize> {
        let mut active = self
            .branches
            .iter()
            .filter(|b| b.is_active(lookup))
            .map(|b| b.index);
        match self.kind {
            CompositionKind::OneOf => active.next().into_iter().collect(),
            CompositionKind::AnyOf => active.collect(),
        }
    }

    /// Union keys not contributed by any active branch.
    pub fn excluded_keys(&self, lookup: &dyn Fn(&str) -> Option<Value>) -> Vec<String> {
        let active = self.active_branches(lookup);
        self.union_key_set
            .iter()
            .filter(|key| {
                !active
                    .iter()
                    .any(|&i| self.branches[i].keys.iter().any(|k| k == *key))
            })
            .cloned()
            .collect()
    }

    /// How the branches make `field` required.
    pub fn required_status(&self, field: &str) -> RequiredStatus<'_> {
        match self.field_conditions.get(field) {
            None => RequiredStatus::Never,
            Some(conditions) if conditions.iter().any(|c| c.condition.is_empty()) => {
                RequiredStatus::Always
            }
            Some(conditions) => RequiredStatus::Conditional(conditions),
        }
    }

    /// Condition expression under which `field` is required, evaluated
    /// relative to the field's own node.
    ///
    /// Branch conditions are OR-ed together. Returns `None` when the field
    /// is never or always required.
    pub fn required_expression(&self, field: &str) -> Option<String> {
        let RequiredStatus::Conditional(conditions) = self.required_status(field) else {
            return None;
        };
        let parts: Vec<String> = conditions
            .iter()
            .map(|c| conjunction_expression(&c.condition))
            .collect();
        Some(match parts.as_slice() {
            [single] => single.clone(),
            many => many
                .iter()
                .map(|p| format!("({p})"))
                .collect::<Vec<_>>()
                .join(" || "),
        })
    }
}

fn declares_concrete_type(schema: &Value) -> bool {
    schema.get("type").is_some() || schema.get("$ref").is_some()
}

fn discriminant_of(field: &str, schema: &Value) -> Option<Discriminant> {
    let values_of = |s: &Value| -> Option<Vec<Value>> {
        if let Some(c) = s.get("const") {
            return Some(vec![c.clone()]);
        }
        s.get("enum").and_then(Value::as_array).cloned()
    };
    if let Some(values) = values_of(schema) {
        return Some(Discriminant {
            field: field.to_string(),
            values,
            inverse: false,
        });
    }
    let negated = schema.get("not")?;
    values_of(negated).map(|values| Discriminant {
        field: field.to_string(),
        values,
        inverse: true,
    })
}

fn analyze_branch(index: usize, branch: &Value, base: Option<&Map<String, Value>>) -> BranchMeta {
    let mut keys = Vec::new();
    let mut properties = Map::new();
    let mut condition = Vec::new();

    if let Some(props) = branch.get("properties").and_then(Value::as_object) {
        for (key, schema) in props {
            if let Some(d) = discriminant_of(key, schema) {
                condition.push(d);
            }
            let declared_in_base = base.is_some_and(|b| b.contains_key(key));
            if declares_concrete_type(schema) && !declared_in_base {
                keys.push(key.clone());
                properties.insert(key.clone(), schema.clone());
            }
        }
    }

    let required = branch
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();

    BranchMeta {
        index,
        keys,
        properties,
        condition,
        required,
    }
}
