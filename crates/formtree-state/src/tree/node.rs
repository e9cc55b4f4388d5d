//! Node types stored in the tree arena.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use formtree_schema::{ArrayLimits, CompositionMeta, JsonSchemaError, SchemaType};

use crate::condition::{Dependencies, Rule};
use crate::event::EventBus;

/// Handle to a node in its tree's arena.
///
/// The generation tells a removed node's id apart from whatever later
/// occupies the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

impl NodeId {
    pub(crate) fn new(index: usize, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Arena slot.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Slot generation at allocation.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// The node variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// `type: object`.
    Object,
    /// `type: array`.
    Array,
    /// `type: string`.
    String,
    /// `type: number` or `type: integer`.
    Number,
    /// `type: boolean`.
    Boolean,
    /// `type: null`.
    Null,
    /// A synthetic aggregate over sibling fields.
    Virtual,
}

impl From<SchemaType> for NodeKind {
    fn from(ty: SchemaType) -> Self {
        match ty {
            SchemaType::Object => Self::Object,
            SchemaType::Array => Self::Array,
            SchemaType::String => Self::String,
            SchemaType::Number | SchemaType::Integer => Self::Number,
            SchemaType::Boolean => Self::Boolean,
            SchemaType::Null => Self::Null,
        }
    }
}

/// How a node holds its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeGroup {
    /// Has children; the value is derived from them.
    Branch,
    /// Stores its value directly (scalars, and `terminal: true` containers).
    Terminal,
    /// Derives its value from sibling fields.
    Virtual,
}

/// One entry in a container's ordered child list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    /// Property name, or the decimal index for array items.
    pub key: String,
    /// The child.
    pub node: NodeId,
}

/// Evaluated computed properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedState {
    /// Shown, after ancestor visibility and branch exclusion.
    pub visible: bool,
    /// Read-only, inherited from ancestors.
    pub read_only: bool,
    /// Disabled, inherited from ancestors.
    pub disabled: bool,
    /// Required by the parent schema or the active branch.
    pub required: bool,
    /// Values at the node's `watch` paths (`null` when absent).
    pub watch_values: Vec<Value>,
}

impl Default for ComputedState {
    fn default() -> Self {
        Self {
            visible: true,
            read_only: false,
            disabled: false,
            required: false,
            watch_values: Vec::new(),
        }
    }
}

/// Compiled computed-property rules. `None` means the identity default.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ComputedRules {
    pub visible: Option<Rule>,
    pub read_only: Option<Rule>,
    pub disabled: Option<Rule>,
    pub required: Option<Rule>,
    /// Dependency indices of `watch` paths.
    pub watch: Vec<usize>,
}

/// A node in the schema tree.
#[derive(Debug)]
pub struct SchemaNode {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind,
    pub(crate) group: NodeGroup,
    pub(crate) path: String,
    pub(crate) key: Option<String>,
    pub(crate) schema: Rc<Value>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<ChildEntry>,
    pub(crate) default_value: Option<Value>,
    /// Terminal storage. `None` is undefined.
    pub(crate) value: Option<Value>,
    pub(crate) integer: bool,
    pub(crate) nullable: bool,
    pub(crate) limits: Option<ArrayLimits>,
    pub(crate) composition: Option<Rc<CompositionMeta>>,
    /// Sibling keys aggregated by a virtual node.
    pub(crate) fields: Vec<String>,
    pub(crate) rules: ComputedRules,
    pub(crate) dependencies: Dependencies,
    pub(crate) computed: ComputedState,
    /// Branch keys excluded at the last commit.
    pub(crate) excluded: Vec<String>,
    pub(crate) errors: Vec<JsonSchemaError>,
    pub(crate) bus: EventBus,
}

impl SchemaNode {
    pub(crate) fn new(
        kind: NodeKind,
        group: NodeGroup,
        path: String,
        key: Option<String>,
        schema: Rc<Value>,
        parent: Option<NodeId>,
    ) -> Self {
        Self {
            id: NodeId::new(0, 0),
            kind,
            group,
            path,
            key,
            schema,
            parent,
            children: Vec::new(),
            default_value: None,
            value: None,
            integer: false,
            nullable: false,
            limits: None,
            composition: None,
            fields: Vec::new(),
            rules: ComputedRules::default(),
            dependencies: Dependencies::new(),
            computed: ComputedState::default(),
            excluded: Vec::new(),
            errors: Vec::new(),
            bus: EventBus::new(),
        }
    }

    /// Arena id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Node variant.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Value storage group.
    pub fn group(&self) -> NodeGroup {
        self.group
    }

    /// Pointer path from the root (`""` at the root).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Property key in the parent (`None` at the root).
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// The normalized schema fragment.
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Parent node.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Every child entry, including branch-excluded ones.
    pub fn child_entries(&self) -> &[ChildEntry] {
        &self.children
    }

    /// Initial value at construction.
    pub fn default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    /// Whether `null` is accepted in addition to the node type.
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Whether numbers are truncated to integers.
    pub fn is_integer(&self) -> bool {
        self.integer
    }

    /// Resolved item bounds of an array node.
    pub fn limits(&self) -> Option<ArrayLimits> {
        self.limits
    }

    /// Branch metadata of an object node with `oneOf` / `anyOf`.
    pub fn composition(&self) -> Option<&CompositionMeta> {
        self.composition.as_deref()
    }

    /// Sibling fields a virtual node aggregates.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Paths the computed properties read, in dependency-index order.
    pub fn dependency_paths(&self) -> &[String] {
        self.dependencies.paths()
    }

    /// Computed properties as of the last commit.
    pub fn computed(&self) -> &ComputedState {
        &self.computed
    }

    /// Shorthand for `computed().visible`.
    pub fn visible(&self) -> bool {
        self.computed.visible
    }

    /// Shorthand for `computed().read_only`.
    pub fn read_only(&self) -> bool {
        self.computed.read_only
    }

    /// Shorthand for `computed().disabled`.
    pub fn disabled(&self) -> bool {
        self.computed.disabled
    }

    /// Shorthand for `computed().required`.
    pub fn required(&self) -> bool {
        self.computed.required
    }

    /// Validation errors attached to this node.
    pub fn errors(&self) -> &[JsonSchemaError] {
        &self.errors
    }

    pub(crate) fn child(&self, key: &str) -> Option<NodeId> {
        self.children.iter().find(|c| c.key == key).map(|c| c.node)
    }
}
