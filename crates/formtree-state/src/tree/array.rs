//! Item-level array mutations.
//!
//! Requests that would leave an array outside its `{min, max}` bounds are
//! rejected without touching the tree.

use std::collections::BTreeSet;

use serde_json::Value;

use formtree_core::pointer;

use super::node::{NodeGroup, NodeId, NodeKind};
use super::SchemaTree;
use crate::event::{EventPayload, EventType, RawEvent};

impl SchemaTree {
    fn array_len(&self, id: NodeId) -> Option<usize> {
        let node = self.node(id)?;
        (node.kind == NodeKind::Array && node.group == NodeGroup::Branch).then_some(node.children.len())
    }

    /// Append an item. Returns the new child, or `None` when the node is
    /// not an array or already holds `maxItems` items.
    pub fn push(&mut self, id: NodeId, value: Option<Value>) -> Option<NodeId> {
        let len = self.array_len(id)?;
        let limits = self.node(id)?.limits?;
        if !limits.can_grow(len) {
            tracing::debug!(node = %id, len, max = ?limits.max, "push rejected: array is full");
            return None;
        }
        let mut appended = None;
        self.mutate(id, |tree| match tree.append_item(id, value) {
            Ok(child) => {
                appended = Some(child);
                tree.children_changed(id);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "array item could not be built");
                false
            }
        });
        appended
    }

    /// Remove the item at `index`. Later items shift down and are
    /// re-keyed. Returns `false` when out of range or at `minItems`.
    pub fn remove(&mut self, id: NodeId, index: usize) -> bool {
        let Some(len) = self.array_len(id) else {
            return false;
        };
        let Some(limits) = self.node(id).and_then(|n| n.limits) else {
            return false;
        };
        if index >= len || !limits.can_shrink(len) {
            tracing::debug!(node = %id, index, len, min = limits.min, "remove rejected");
            return false;
        }
        self.mutate(id, |tree| {
            tree.remove_child(id, index);
            tree.children_changed(id);
            true
        })
    }

    /// Shrink an array to `minItems`. Returns `false` when nothing was
    /// removed.
    pub fn clear(&mut self, id: NodeId) -> bool {
        let Some(len) = self.array_len(id) else {
            return false;
        };
        let Some(min) = self.node(id).and_then(|n| n.limits).map(|l| l.min) else {
            return false;
        };
        if len <= min {
            return false;
        }
        self.mutate(id, |tree| {
            for index in (min..len).rev() {
                tree.remove_child(id, index);
            }
            tree.children_changed(id);
            true
        })
    }

    fn remove_child(&mut self, id: NodeId, index: usize) {
        let Some(node) = self.node_mut(id) else { return };
        if index >= node.children.len() {
            return;
        }
        let removed = node.children.remove(index);
        let parent_path = node.path.clone();
        let shifted: Vec<NodeId> = node.children.iter().skip(index).map(|c| c.node).collect();
        for (offset, child) in shifted.into_iter().enumerate() {
            let key = (index + offset).to_string();
            if let Some(node) = self.node_mut(id) {
                node.children[index + offset].key = key.clone();
            }
            self.repath(child, &parent_path, &key);
        }
        self.drop_subtree(removed.node);
    }

    /// Give a node a new key and rewrite the paths of its subtree.
    fn repath(&mut self, id: NodeId, parent_path: &str, key: &str) {
        let path = pointer::join(parent_path, key);
        let children: Vec<(String, NodeId)> = match self.node_mut(id) {
            Some(node) => {
                node.key = Some(key.to_string());
                node.path = path.clone();
                node.children.iter().map(|c| (c.key.clone(), c.node)).collect()
            }
            None => return,
        };
        for (child_key, child) in children {
            self.repath(child, &path, &child_key);
        }
    }

    /// Free the arena slots of a subtree.
    pub(crate) fn drop_subtree(&mut self, id: NodeId) {
        let mut doomed = BTreeSet::new();
        self.collect_subtree(id, &mut doomed);
        for id in doomed {
            self.nodes.remove(id);
        }
        let nodes = &self.nodes;
        self.redraws.retain(|r| nodes.contains(*r));
    }

    /// Record a child-list change and schedule a redraw.
    pub(crate) fn children_changed(&mut self, id: NodeId) {
        let count = self.children(id).len();
        self.record(
            id,
            RawEvent {
                kind: EventType::UPDATE_CHILDREN,
                payload: Some(EventPayload::Children(count)),
                options: None,
            },
        );
        self.schedule_redraw(id);
    }
}
