//! Tree construction: schema dispatch, child building, and rule compilation.
//!
//! Normalized fragments, branch metadata, and parsed expressions are
//! cached in a [`BuildContext`] keyed by content, so structurally equal
//! fragments anywhere in the document share one analysis.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use serde_json::{Map, Value};

use formtree_core::{fragment_digest, pointer, ContentDigest, SchemaError};
use formtree_schema::{
    child_schema, is_nullable, validate_array_schema, CompositionMeta, Normalizer, RequiredStatus,
    SchemaType,
};

use super::node::{ChildEntry, ComputedRules, NodeGroup, NodeId, NodeKind, SchemaNode};
use super::value::parse_input;
use super::SchemaTree;
use crate::condition::{parse_expression, strip_terminators, Dependencies, Expr, Predicate, Rule};

/// Build-scoped caches.
#[derive(Debug)]
pub(crate) struct BuildContext {
    root_schema: Rc<Value>,
    resolve_references: bool,
    normalized: HashMap<ContentDigest, Rc<Value>>,
    compositions: HashMap<ContentDigest, Option<Rc<CompositionMeta>>>,
    expressions: HashMap<String, Option<Rc<Expr>>>,
    /// Item schemas currently being probed.
    probing: HashSet<ContentDigest>,
    /// Object schemas on the current build path since the last array.
    object_stack: Vec<ContentDigest>,
}

impl BuildContext {
    pub(crate) fn new(root_schema: Rc<Value>, resolve_references: bool) -> Self {
        Self {
            root_schema,
            resolve_references,
            normalized: HashMap::new(),
            compositions: HashMap::new(),
            expressions: HashMap::new(),
            probing: HashSet::new(),
            object_stack: Vec::new(),
        }
    }

    pub(crate) fn root_schema(&self) -> &Rc<Value> {
        &self.root_schema
    }

    fn normalized(&mut self, authored: &Value) -> Result<Rc<Value>, SchemaError> {
        let digest = fragment_digest(authored);
        if let Some(hit) = self.normalized.get(&digest) {
            tracing::trace!(digest = %digest, "normalized schema cache hit");
            return Ok(Rc::clone(hit));
        }
        let root = Rc::clone(&self.root_schema);
        let normalized = Rc::new(Normalizer::new(&root, self.resolve_references).normalize(authored)?);
        self.normalized.insert(digest, Rc::clone(&normalized));
        Ok(normalized)
    }

    fn composition(&mut self, schema: &Value) -> Option<Rc<CompositionMeta>> {
        let digest = fragment_digest(schema);
        if let Some(hit) = self.compositions.get(&digest) {
            tracing::debug!(digest = %digest, "composition metadata cache hit");
            return hit.clone();
        }
        let meta = CompositionMeta::from_schema(schema).map(Rc::new);
        self.compositions.insert(digest, meta.clone());
        meta
    }

    fn expression(&mut self, source: &str) -> Result<Option<Rc<Expr>>, formtree_core::ConditionError> {
        let source = strip_terminators(source);
        if let Some(hit) = self.expressions.get(source) {
            return Ok(hit.clone());
        }
        let parsed = parse_expression(source)?.map(Rc::new);
        self.expressions.insert(source.to_string(), parsed.clone());
        Ok(parsed)
    }
}

/// An object child in construction order.
enum Slot {
    Property(String, Value),
    Virtual(String, Value, Vec<String>),
}

/// Computed properties and the schema literal that forces each one.
const VISIBLE: (&str, bool) = ("visible", false);
const READ_ONLY: (&str, bool) = ("readOnly", true);
const DISABLED: (&str, bool) = ("disabled", true);

impl SchemaTree {
    fn alloc(&mut self, node: SchemaNode) -> NodeId {
        self.nodes.insert(node)
    }

    /// Build a node and its subtree from an authored fragment.
    pub(crate) fn build_node(
        &mut self,
        authored: &Value,
        value: Option<Value>,
        parent: Option<NodeId>,
        key: Option<String>,
    ) -> Result<NodeId, SchemaError> {
        let schema = self.ctx.normalized(authored)?;
        let ty = SchemaType::of(&schema)?;
        let kind = NodeKind::from(ty);
        let terminal = schema.get("terminal") == Some(&Value::Bool(true));
        let group = match kind {
            NodeKind::Object | NodeKind::Array if !terminal => NodeGroup::Branch,
            _ => NodeGroup::Terminal,
        };
        let path = match (parent.and_then(|p| self.node(p)), key.as_deref()) {
            (Some(p), Some(k)) => pointer::join(&p.path, k),
            _ => String::new(),
        };

        let mut node = SchemaNode::new(kind, group, path, key, Rc::clone(&schema), parent);
        node.integer = ty == SchemaType::Integer;
        node.nullable = is_nullable(&schema);
        let id = self.alloc(node);

        let initial = value.or_else(|| schema.get("default").cloned());
        match (kind, group) {
            (NodeKind::Object, NodeGroup::Branch) => {
                let digest = fragment_digest(&schema);
                if self.ctx.object_stack.contains(&digest) {
                    return Err(SchemaError::InvalidReference {
                        reference: format!("recursive object schema at '{}'", self.path_of(id)),
                        schema: (*schema).clone(),
                    });
                }
                self.ctx.object_stack.push(digest);
                let built = self.build_object_children(id, &schema, initial.clone());
                self.ctx.object_stack.pop();
                built?;
            }
            (NodeKind::Array, NodeGroup::Branch) => {
                self.build_array_children(id, &schema, initial.clone())?;
            }
            _ => {
                let (integer, nullable) = (ty == SchemaType::Integer, is_nullable(&schema));
                if let Some(node) = self.node_mut(id) {
                    node.value = parse_input(kind, integer, nullable, initial.clone());
                }
            }
        }
        self.compile_rules(id)?;
        if let Some(node) = self.node_mut(id) {
            node.default_value = initial;
        }
        Ok(id)
    }

    fn path_of(&self, id: NodeId) -> String {
        self.node(id).map(|n| n.path.clone()).unwrap_or_default()
    }

    fn build_object_children(
        &mut self,
        id: NodeId,
        schema: &Rc<Value>,
        initial: Option<Value>,
    ) -> Result<(), SchemaError> {
        let composition = self.ctx.composition(schema);
        if let Some(node) = self.node_mut(id) {
            node.composition = composition.clone();
        }
        let values = match initial {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };

        let mut properties: Vec<(String, Value)> = schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|p| p.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        if let Some(meta) = &composition {
            for key in &meta.union_key_set {
                if let Some(sub) = meta.branch_property(key) {
                    properties.push((key.clone(), sub.clone()));
                }
            }
        }

        for slot in order_slots(schema, properties)? {
            let (key, child) = match slot {
                Slot::Property(key, sub) => {
                    let child = self.build_node(&sub, values.get(&key).cloned(), Some(id), Some(key.clone()))?;
                    (key, child)
                }
                Slot::Virtual(name, definition, fields) => {
                    let child = self.build_virtual(id, &name, definition, fields)?;
                    (name, child)
                }
            };
            if let Some(node) = self.node_mut(id) {
                node.children.push(ChildEntry { key, node: child });
            }
        }
        Ok(())
    }

    fn build_virtual(
        &mut self,
        parent: NodeId,
        name: &str,
        definition: Value,
        fields: Vec<String>,
    ) -> Result<NodeId, SchemaError> {
        let path = pointer::join(&self.path_of(parent), name);
        let mut node = SchemaNode::new(
            NodeKind::Virtual,
            NodeGroup::Virtual,
            path,
            Some(name.to_string()),
            Rc::new(definition),
            Some(parent),
        );
        node.fields = fields;
        let id = self.alloc(node);
        self.compile_rules(id)?;
        Ok(id)
    }

    fn build_array_children(
        &mut self,
        id: NodeId,
        schema: &Rc<Value>,
        initial: Option<Value>,
    ) -> Result<(), SchemaError> {
        let limits = validate_array_schema(schema)?;
        if let Some(node) = self.node_mut(id) {
            node.limits = Some(limits);
        }

        let saved = std::mem::take(&mut self.ctx.object_stack);
        let built = self.probe_items(id, schema).and_then(|()| {
            let mut items = match initial {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            };
            if let Some(max) = limits.max.filter(|&max| items.len() > max) {
                tracing::debug!(len = items.len(), max, "initial array longer than maxItems; truncating");
                items.truncate(max);
            }
            for item in items {
                self.append_item(id, Some(item))?;
            }
            while self.child_count(id) < limits.min {
                self.append_item(id, None)?;
            }
            Ok(())
        });
        self.ctx.object_stack = saved;
        built
    }

    /// Build every distinct item schema once and throw the result away,
    /// so bad item schemas fail at construction even for empty arrays.
    fn probe_items(&mut self, id: NodeId, schema: &Value) -> Result<(), SchemaError> {
        let mut candidates: Vec<&Value> = schema
            .get("prefixItems")
            .and_then(Value::as_array)
            .map(|p| p.iter().collect())
            .unwrap_or_default();
        let tail = candidates.len();
        if let Some(items) = child_schema(schema, tail) {
            candidates.push(items);
        }

        for (index, candidate) in candidates.into_iter().enumerate() {
            let digest = fragment_digest(candidate);
            if !self.ctx.probing.insert(digest) {
                continue;
            }
            let checkpoint = self.nodes.checkpoint();
            let probed = self.build_node(candidate, None, Some(id), Some(index.to_string()));
            self.nodes.rollback(checkpoint);
            self.ctx.probing.remove(&digest);
            probed?;
        }
        Ok(())
    }

    /// Append one item to an array node. On failure the partial subtree
    /// is dropped.
    pub(crate) fn append_item(&mut self, id: NodeId, value: Option<Value>) -> Result<NodeId, SchemaError> {
        let Some(node) = self.node(id) else {
            return Err(SchemaError::MissingType {
                schema: Value::Null,
            });
        };
        let index = node.children.len();
        let schema = Rc::clone(&node.schema);
        let Some(item_schema) = child_schema(&schema, index).cloned() else {
            return Err(SchemaError::InvalidArray {
                reason: format!("no item schema for index {index}"),
                min: node.limits.map_or(0, |l| l.min),
                max: node.limits.and_then(|l| l.max),
                schema: (*schema).clone(),
            });
        };

        let checkpoint = self.nodes.checkpoint();
        let key = index.to_string();
        match self.build_node(&item_schema, value, Some(id), Some(key.clone())) {
            Ok(child) => {
                self.nodes.commit(checkpoint);
                if let Some(node) = self.node_mut(id) {
                    node.children.push(ChildEntry { key, node: child });
                }
                Ok(child)
            }
            Err(e) => {
                self.nodes.rollback(checkpoint);
                Err(e)
            }
        }
    }

    pub(crate) fn child_count(&self, id: NodeId) -> usize {
        self.node(id).map_or(0, |n| n.children.len())
    }

    // ─── Computed-property rules ────────────────────────────────────

    fn compile_rules(&mut self, id: NodeId) -> Result<(), SchemaError> {
        let Some(node) = self.node(id) else {
            return Ok(());
        };
        let schema = Rc::clone(&node.schema);
        let key = node.key.clone();
        let parent = node.parent.and_then(|p| self.node(p));
        let parent_required = parent
            .and_then(|p| p.schema.get("required"))
            .and_then(Value::as_array)
            .is_some_and(|r| key.as_deref().is_some_and(|k| r.iter().any(|v| v == k)));
        let composition = parent.and_then(|p| p.composition.clone());

        let mut deps = Dependencies::new();
        let mut rules = ComputedRules::default();

        // Branch-driven requirement also drives visibility.
        let mut branch_expression = None;
        if parent_required {
            rules.required = Some(Rule::Constant(true));
        } else if let (Some(meta), Some(k)) = (&composition, key.as_deref()) {
            match meta.required_status(k) {
                RequiredStatus::Never => {}
                RequiredStatus::Always => rules.required = Some(Rule::Constant(true)),
                RequiredStatus::Conditional(_) => {
                    if let Some(expr) = meta.required_expression(k) {
                        rules.required = self.compile(&schema, "required", &expr, &mut deps)?;
                        branch_expression = Some(expr);
                    }
                }
            }
        }

        rules.visible = match literal_rule(&schema, VISIBLE) {
            Some(constant) => Some(constant),
            None => {
                let own = expression_source(&schema, VISIBLE.0);
                let source = match (own, branch_expression) {
                    (Some(own), Some(branch)) => Some(format!("({}) && ({branch})", strip_terminators(&own))),
                    (own, branch) => own.or(branch),
                };
                match source {
                    Some(source) => self.compile(&schema, VISIBLE.0, &source, &mut deps)?,
                    None => None,
                }
            }
        };
        for (target, property) in [(&mut rules.read_only, READ_ONLY), (&mut rules.disabled, DISABLED)] {
            *target = match literal_rule(&schema, property) {
                Some(constant) => Some(constant),
                None => match expression_source(&schema, property.0) {
                    Some(source) => self.compile(&schema, property.0, &source, &mut deps)?,
                    None => None,
                },
            };
        }
        rules.watch = self.watch_paths(&schema, &mut deps)?;

        if let Some(node) = self.node_mut(id) {
            node.rules = rules;
            node.dependencies = deps;
        }
        Ok(())
    }

    fn compile(
        &mut self,
        schema: &Value,
        property: &str,
        source: &str,
        deps: &mut Dependencies,
    ) -> Result<Option<Rule>, SchemaError> {
        let parsed = self
            .ctx
            .expression(source)
            .map_err(|e| invalid_condition(schema, property, source, e.to_string()))?;
        Ok(parsed.map(|expr| Rule::Compiled(Predicate::bind(&expr, deps))))
    }

    fn watch_paths(&mut self, schema: &Value, deps: &mut Dependencies) -> Result<Vec<usize>, SchemaError> {
        let declared = schema
            .get("computed")
            .and_then(|c| c.get("watch"))
            .or_else(|| schema.get("watch"));
        let sources: Vec<String> = match declared {
            None => return Ok(Vec::new()),
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(list)) => list.iter().filter_map(Value::as_str).map(str::to_string).collect(),
            Some(other) => {
                return Err(invalid_condition(
                    schema,
                    "watch",
                    &other.to_string(),
                    "watch must be a path or a list of paths".to_string(),
                ))
            }
        };
        let mut indices = Vec::with_capacity(sources.len());
        for source in sources {
            let parsed = self
                .ctx
                .expression(&source)
                .map_err(|e| invalid_condition(schema, "watch", &source, e.to_string()))?;
            match parsed.as_deref() {
                Some(Expr::Path(path)) => indices.push(deps.index_of(path)),
                _ => {
                    return Err(invalid_condition(
                        schema,
                        "watch",
                        &source,
                        "watch entries must be single paths".to_string(),
                    ))
                }
            }
        }
        Ok(indices)
    }
}

fn invalid_condition(schema: &Value, property: &str, expression: &str, reason: String) -> SchemaError {
    SchemaError::InvalidCondition {
        property: property.to_string(),
        expression: expression.to_string(),
        reason,
        schema: schema.clone(),
    }
}

/// The forcing literal, from the top level or `computed`.
fn literal_rule(schema: &Value, (property, forcing): (&str, bool)) -> Option<Rule> {
    let top = schema.get(property);
    let computed = schema.get("computed").and_then(|c| c.get(property));
    let forced = [top, computed]
        .into_iter()
        .flatten()
        .any(|v| *v == Value::Bool(forcing));
    forced.then_some(Rule::Constant(forcing))
}

/// Expression source from `computed.<property>`, else a top-level string.
fn expression_source(schema: &Value, property: &str) -> Option<String> {
    schema
        .get("computed")
        .and_then(|c| c.get(property))
        .and_then(Value::as_str)
        .or_else(|| schema.get(property).and_then(Value::as_str))
        .map(str::to_string)
}

/// Interleave virtual fields into declared property order: each virtual
/// child goes just before its earliest-declared field.
fn order_slots(schema: &Value, properties: Vec<(String, Value)>) -> Result<Vec<Slot>, SchemaError> {
    let mut virtuals: Vec<(usize, String, Value, Vec<String>)> = Vec::new();
    if let Some(declared) = schema.get("virtual") {
        let Some(declared) = declared.as_object() else {
            return Err(SchemaError::VirtualField {
                name: String::new(),
                reason: "virtual must map names to definitions".to_string(),
                schema: schema.clone(),
            });
        };
        for (name, definition) in declared {
            let reject = |reason: String| SchemaError::VirtualField {
                name: name.clone(),
                reason,
                schema: schema.clone(),
            };
            if properties.iter().any(|(k, _)| k == name) {
                return Err(reject("name collides with a declared property".to_string()));
            }
            let fields: Vec<String> = definition
                .get("fields")
                .and_then(Value::as_array)
                .map(|f| f.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default();
            if fields.is_empty() {
                return Err(reject("fields must be a non-empty list of property names".to_string()));
            }
            let mut first = usize::MAX;
            for field in &fields {
                let position = properties
                    .iter()
                    .position(|(k, _)| k == field)
                    .ok_or_else(|| reject(format!("references unknown field '{field}'")))?;
                first = first.min(position);
            }
            virtuals.push((first, name.clone(), definition.clone(), fields));
        }
    }

    let mut slots = Vec::with_capacity(properties.len() + virtuals.len());
    for (position, (key, sub)) in properties.into_iter().enumerate() {
        for (_, name, definition, fields) in virtuals.iter().filter(|v| v.0 == position) {
            slots.push(Slot::Virtual(name.clone(), definition.clone(), fields.clone()));
        }
        slots.push(Slot::Property(key, sub));
    }
    Ok(slots)
}
