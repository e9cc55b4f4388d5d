//! # Schema Node Tree
//!
//! A [`SchemaTree`] owns every node of one schema-driven value in an
//! arena. Parent, child, and root links are generational [`NodeId`]
//! handles, so the tree has no reference cycles and nodes never outlive
//! it. Slots freed by array removals are reused.
//!
//! ## Lifecycle
//!
//! ```text
//! build ──▶ Ready ──(write)──▶ Updating ──(commit)──▶ Ready
//! ```
//!
//! Construction either yields a complete tree or a [`SchemaError`]; a
//! partial tree is never observable.
//!
//! ## Ticks
//!
//! Every public mutator runs as one tick. [`SchemaTree::batch`] widens the
//! tick to several writes. While a tick is open, events are queued per
//! node; at commit the tree:
//!
//! 1. re-evaluates computed properties and branch exclusion,
//! 2. re-validates if configured to and the root value changed,
//! 3. calls the `on_change` hook once if the root value changed,
//! 4. delivers one merged [`NodeEvent`](crate::event::NodeEvent) per node,
//! 5. delivers deferred redraw requests, each node at most once.
//!
//! Listeners run after the tree is back in [`TreePhase::Ready`].

mod arena;
mod array;
mod build;
mod computed;
mod find;
mod node;
mod validation;
mod value;

pub use node::{ChildEntry, ComputedState, NodeGroup, NodeId, NodeKind, SchemaNode};

use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use formtree_core::{ContentDigest, SchemaError, TreeOptions};
use formtree_schema::{strip_hints, ErrorTransformer, JsonSchemaError, SchemaValidator};

use crate::event::{merge_events, EventType, NodeEvent, RawEvent, Unsubscribe};
use arena::Arena;
use build::BuildContext;

/// Whether the tree is between ticks or inside one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreePhase {
    /// No tick is open.
    Ready,
    /// Writes are being applied; events are queued.
    Updating,
}

type ChangeHook = Box<dyn FnMut(&Value)>;

/// A schema-driven value tree.
pub struct SchemaTree {
    nodes: Arena,
    root: NodeId,
    ctx: BuildContext,
    options: TreeOptions,
    validator: Option<Rc<dyn SchemaValidator>>,
    validation_schema: Value,
    transformer: ErrorTransformer,
    global_errors: Vec<JsonSchemaError>,
    global_digest: Option<ContentDigest>,
    on_change: Option<ChangeHook>,
    phase: TreePhase,
    depth: usize,
    tick_start: Option<Value>,
    pending: Vec<(NodeId, RawEvent)>,
    redraws: Vec<NodeId>,
    value_dirty: bool,
}

impl std::fmt::Debug for SchemaTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaTree")
            .field("nodes", &self.len())
            .field("root", &self.root)
            .field("phase", &self.phase)
            .field("options", &self.options)
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

/// Builder for [`SchemaTree`].
pub struct SchemaTreeBuilder {
    schema: Value,
    default_value: Option<Value>,
    options: TreeOptions,
    validator: Option<Rc<dyn SchemaValidator>>,
    on_change: Option<ChangeHook>,
}

impl SchemaTreeBuilder {
    /// Initial value for the root.
    pub fn default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Tree options.
    pub fn options(mut self, options: TreeOptions) -> Self {
        self.options = options;
        self
    }

    /// The validator collaborator.
    pub fn validator(mut self, validator: impl SchemaValidator + 'static) -> Self {
        self.validator = Some(Rc::new(validator));
        self
    }

    /// Hook called with the root value after every committed change.
    pub fn on_change(mut self, hook: impl FnMut(&Value) + 'static) -> Self {
        self.on_change = Some(Box::new(hook));
        self
    }

    /// Construct the tree.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` for any structural problem in the schema;
    /// no tree is produced.
    pub fn build(self) -> Result<SchemaTree, SchemaError> {
        let schema = Rc::new(self.schema);
        let validation_schema = strip_hints(&schema, &self.options.stripped_hint_keys);
        let mut tree = SchemaTree {
            nodes: Arena::new(),
            root: NodeId::new(0, 0),
            ctx: BuildContext::new(Rc::clone(&schema), self.options.resolve_references),
            options: self.options,
            validator: self.validator,
            validation_schema,
            transformer: ErrorTransformer::new(),
            global_errors: Vec::new(),
            global_digest: None,
            on_change: self.on_change,
            phase: TreePhase::Ready,
            depth: 0,
            tick_start: None,
            pending: Vec::new(),
            redraws: Vec::new(),
            value_dirty: false,
        };

        let root_schema = Rc::clone(tree.ctx.root_schema());
        tree.root = tree.build_node(&root_schema, self.default_value, None, None)?;
        tree.recompute_computed();
        if tree.options.validation_mode.validates_on_change() {
            tree.run_validation();
        }
        tree.pending.clear();
        tree.redraws.clear();

        tracing::debug!(
            nodes = tree.len(),
            root = ?tree.node(tree.root).map(|n| n.kind),
            "schema tree built"
        );
        Ok(tree)
    }
}

impl SchemaTree {
    /// Start building a tree for `schema`.
    pub fn builder(schema: Value) -> SchemaTreeBuilder {
        SchemaTreeBuilder {
            schema,
            default_value: None,
            options: TreeOptions::default(),
            validator: None,
            on_change: None,
        }
    }

    /// Build a tree with default options and no validator.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` for any structural problem in the schema.
    pub fn new(schema: Value, default_value: Option<Value>) -> Result<Self, SchemaError> {
        let builder = Self::builder(schema);
        match default_value {
            Some(value) => builder.default_value(value).build(),
            None => builder.build(),
        }
    }

    // ─── Accessors ──────────────────────────────────────────────────

    /// The root node id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// A node by id. `None` for removed or foreign ids.
    pub fn node(&self, id: NodeId) -> Option<&SchemaNode> {
        self.nodes.get(id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut SchemaNode> {
        self.nodes.get_mut(id)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no live nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current phase.
    pub fn phase(&self) -> TreePhase {
        self.phase
    }

    /// Options the tree was built with.
    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    /// Errors attached to a node.
    pub fn errors(&self, id: NodeId) -> &[JsonSchemaError] {
        self.node(id).map_or(&[], |n| n.errors.as_slice())
    }

    /// Every error from the last validation pass.
    pub fn global_errors(&self) -> &[JsonSchemaError] {
        &self.global_errors
    }

    // ─── Subscriptions and requests ─────────────────────────────────

    /// Subscribe to a node's events.
    pub fn subscribe(&self, id: NodeId, listener: impl FnMut(&NodeEvent) + 'static) -> Option<Unsubscribe> {
        self.node(id).map(|n| n.bus.subscribe(listener))
    }

    /// Ask renderers to focus a node.
    pub fn request_focus(&mut self, id: NodeId, options: Option<Value>) {
        self.request(id, EventType::REQUEST_FOCUS, options);
    }

    /// Ask renderers to select a node's input contents.
    pub fn request_select(&mut self, id: NodeId, options: Option<Value>) {
        self.request(id, EventType::REQUEST_SELECT, options);
    }

    /// Ask renderers to re-read all of a node's state.
    pub fn refresh(&mut self, id: NodeId) {
        self.request(id, EventType::REFRESH, None);
    }

    /// Schedule a redraw. Repeated requests within one tick deliver once.
    pub fn request_redraw(&mut self, id: NodeId) {
        if self.node(id).is_none() {
            return;
        }
        self.begin();
        self.schedule_redraw(id);
        self.end();
    }

    fn request(&mut self, id: NodeId, kind: EventType, options: Option<Value>) {
        if self.node(id).is_none() {
            return;
        }
        self.begin();
        self.record(
            id,
            RawEvent {
                kind,
                payload: None,
                options,
            },
        );
        self.end();
    }

    // ─── Ticks ──────────────────────────────────────────────────────

    /// Apply several writes as one tick.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.begin();
        let result = f(self);
        self.end();
        result
    }

    fn begin(&mut self) {
        if self.depth == 0 {
            self.phase = TreePhase::Updating;
            self.tick_start = Some(self.value());
        }
        self.depth += 1;
    }

    fn end(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            self.commit();
        }
    }

    pub(crate) fn record(&mut self, id: NodeId, event: RawEvent) {
        self.pending.push((id, event));
    }

    /// Queue a redraw; a re-request moves the node to the back.
    pub(crate) fn schedule_redraw(&mut self, id: NodeId) {
        self.redraws.retain(|r| *r != id);
        self.redraws.push(id);
    }

    fn commit(&mut self) {
        let start = self.tick_start.take();
        if std::mem::take(&mut self.value_dirty) {
            self.recompute_computed();
            let root_changed = start.as_ref() != Some(&self.value());
            if root_changed && self.options.validation_mode.validates_on_change() {
                self.run_validation();
            }
        }
        self.phase = TreePhase::Ready;
        self.flush(start);
    }

    fn flush(&mut self, start: Option<Value>) {
        let current = self.value();
        if start.as_ref() != Some(&current) {
            if let Some(hook) = self.on_change.as_mut() {
                hook(&current);
            }
        }

        let mut order: Vec<NodeId> = Vec::new();
        let mut grouped: HashMap<NodeId, Vec<RawEvent>> = HashMap::new();
        for (id, event) in std::mem::take(&mut self.pending) {
            grouped
                .entry(id)
                .or_insert_with(|| {
                    order.push(id);
                    Vec::new()
                })
                .push(event);
        }
        for id in order {
            let Some(bus) = self.node(id).map(|n| n.bus.clone()) else {
                continue;
            };
            let Some(events) = grouped.remove(&id) else {
                continue;
            };
            if let Some(event) = merge_events(events) {
                tracing::trace!(node = %id, kind = ?event.kind, "delivering event");
                bus.publish(&event);
            }
        }

        for id in std::mem::take(&mut self.redraws) {
            if let Some(bus) = self.node(id).map(|n| n.bus.clone()) {
                bus.publish(&NodeEvent::new(EventType::REQUEST_REDRAW));
            }
        }
    }
}
