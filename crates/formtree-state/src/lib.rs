//! # formtree-state — Reactive Schema Node Tree
//!
//! Turns a JSON Schema and an initial value into a live tree of typed
//! nodes that parse input, serialize the current value, evaluate computed
//! properties, and notify subscribers.
//!
//! ## Components
//!
//! - **Condition Compiler** (`condition`): parses `visible` / `readOnly` /
//!   `disabled` / `watch` expressions into a small AST and binds their
//!   path references to per-node dependency indices.
//!
//! - **Event Bus** (`event`): per-node bit-flag events. Events raised in
//!   one tick are merged into a single notification.
//!
//! - **Schema Node Tree** (`tree`): the arena of nodes, path navigation,
//!   value writes, array mutations, branch-dependent serialization, and
//!   distribution of validation errors to the nodes they describe.
//!
//! ## Threading
//!
//! A tree is single-threaded. Listeners and the change hook run
//! synchronously at the end of the tick that triggered them and must not
//! re-enter the tree.

pub mod condition;
pub mod event;
pub mod tree;

// ─── Condition re-exports ───────────────────────────────────────────

pub use condition::{parse_expression, Dependencies, Expr, Predicate, Rule};

// ─── Event re-exports ───────────────────────────────────────────────

pub use event::{merge_events, EventBus, EventPayload, EventType, NodeEvent, RawEvent, Unsubscribe};

// ─── Tree re-exports ────────────────────────────────────────────────

pub use tree::{
    ChildEntry, ComputedState, NodeGroup, NodeId, NodeKind, SchemaNode, SchemaTree,
    SchemaTreeBuilder, TreePhase,
};
