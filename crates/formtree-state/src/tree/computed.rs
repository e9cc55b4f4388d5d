//! Computed-property evaluation and branch exclusion.

use serde_json::Value;

use formtree_core::pointer;

use super::node::{ComputedState, NodeId};
use super::SchemaTree;
use crate::condition::Rule;
use crate::event::{EventPayload, EventType, RawEvent};

impl SchemaTree {
    /// Keys of an object node the active branch leaves out.
    pub(crate) fn excluded_keys(&self, id: NodeId) -> Vec<String> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        let Some(meta) = node.composition.as_deref() else {
            return Vec::new();
        };
        meta.excluded_keys(&|key: &str| node.child(key).and_then(|c| self.node_value(c)))
    }

    /// Live children: every child not excluded by the active branch.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        let excluded = self.excluded_keys(id);
        node.children
            .iter()
            .filter(|c| !excluded.contains(&c.key))
            .map(|c| c.node)
            .collect()
    }

    /// Live nodes, each parent ahead of its children.
    fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else { continue };
            order.push(id);
            stack.extend(node.children.iter().rev().map(|c| c.node));
        }
        order
    }

    fn dependency_values(&self, id: NodeId) -> Vec<Option<Value>> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        node.dependencies
            .paths()
            .iter()
            .map(|path| {
                let target = match pointer::segments(path) {
                    Some(segments) => self.find_segments(id, &segments),
                    None => Some(id),
                };
                target.and_then(|t| self.node_value(t))
            })
            .collect()
    }

    /// Re-evaluate every node's computed properties and branch exclusion,
    /// parents before children.
    pub(crate) fn recompute_computed(&mut self) {
        for id in self.preorder() {
            let Some(node) = self.node(id) else { continue };
            let values = self.dependency_values(id);
            let rules = &node.rules;

            let parent = node.parent.and_then(|p| self.node(p));
            let inherited = parent.map_or((true, false, false), |p| {
                (p.computed.visible, p.computed.read_only, p.computed.disabled)
            });
            let excluded_here = match (parent, node.key.as_deref()) {
                (Some(p), Some(key)) => p.excluded.iter().any(|k| k == key),
                _ => false,
            };

            let state = ComputedState {
                visible: Rule::resolve(rules.visible.as_ref(), &values, true) && inherited.0 && !excluded_here,
                read_only: Rule::resolve(rules.read_only.as_ref(), &values, false) || inherited.1,
                disabled: Rule::resolve(rules.disabled.as_ref(), &values, false) || inherited.2,
                required: Rule::resolve(rules.required.as_ref(), &values, false),
                watch_values: rules
                    .watch
                    .iter()
                    .map(|&i| values.get(i).cloned().flatten().unwrap_or(Value::Null))
                    .collect(),
            };
            let changed = state != node.computed;
            let excluded = self.excluded_keys(id);
            let branch_switched = excluded != node.excluded;

            if let Some(node) = self.node_mut(id) {
                if changed {
                    node.computed = state.clone();
                }
                if branch_switched {
                    tracing::debug!(path = %node.path, excluded = ?excluded, "active branch changed");
                    node.excluded = excluded;
                }
            }
            if changed {
                self.record(
                    id,
                    RawEvent {
                        kind: EventType::UPDATE_COMPUTED_PROPERTIES,
                        payload: Some(EventPayload::Computed(state)),
                        options: None,
                    },
                );
            }
            if branch_switched {
                self.children_changed(id);
            }
        }
    }
}
