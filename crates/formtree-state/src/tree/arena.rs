//! Generational node storage.
//!
//! Freed slots go on a free list and are handed out again. Each slot
//! carries a generation that is bumped on release, so a [`NodeId`] taken
//! before the release no longer resolves once the slot is reused.
//!
//! Speculative construction (item probes, partial array appends) opens a
//! checkpoint; rolling back releases every slot allocated since.

use super::node::{NodeId, SchemaNode};

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<SchemaNode>,
}

/// Allocations recorded since a checkpoint was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Checkpoint(usize);

#[derive(Debug, Default)]
pub(crate) struct Arena {
    slots: Vec<Slot>,
    free: Vec<usize>,
    live: usize,
    /// Ids allocated while at least one checkpoint is open.
    journal: Vec<NodeId>,
    open: usize,
}

impl Arena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Store a node, reusing a freed slot when one is available.
    pub(crate) fn insert(&mut self, mut node: SchemaNode) -> NodeId {
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                let id = NodeId::new(index, slot.generation);
                node.id = id;
                slot.node = Some(node);
                id
            }
            None => {
                let id = NodeId::new(self.slots.len(), 0);
                node.id = id;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                id
            }
        };
        self.live += 1;
        if self.open > 0 {
            self.journal.push(id);
        }
        id
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&SchemaNode> {
        self.slots
            .get(id.index())
            .filter(|s| s.generation == id.generation())
            .and_then(|s| s.node.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut SchemaNode> {
        self.slots
            .get_mut(id.index())
            .filter(|s| s.generation == id.generation())
            .and_then(|s| s.node.as_mut())
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Release a slot. Stale ids are ignored.
    pub(crate) fn remove(&mut self, id: NodeId) -> Option<SchemaNode> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation() {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        self.live -= 1;
        Some(node)
    }

    /// Live nodes.
    pub(crate) fn len(&self) -> usize {
        self.live
    }

    /// Allocated slots, live or free.
    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &SchemaNode> {
        self.slots.iter().filter_map(|s| s.node.as_ref())
    }

    pub(crate) fn checkpoint(&mut self) -> Checkpoint {
        self.open += 1;
        Checkpoint(self.journal.len())
    }

    /// Keep everything allocated since `checkpoint`.
    pub(crate) fn commit(&mut self, checkpoint: Checkpoint) {
        debug_assert!(checkpoint.0 <= self.journal.len());
        self.close();
    }

    /// Release everything allocated since `checkpoint`.
    pub(crate) fn rollback(&mut self, checkpoint: Checkpoint) {
        let start = checkpoint.0.min(self.journal.len());
        let allocated: Vec<NodeId> = self.journal.drain(start..).collect();
        for id in allocated.into_iter().rev() {
            self.remove(id);
        }
        self.close();
    }

    fn close(&mut self) {
        self.open = self.open.saturating_sub(1);
        if self.open == 0 {
            self.journal.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use serde_json::Value;

    use super::*;
    use crate::tree::node::{NodeGroup, NodeKind};

    fn leaf() -> SchemaNode {
        SchemaNode::new(NodeKind::String, NodeGroup::Terminal, String::new(), None, Rc::new(Value::Null), None)
    }

    #[test]
    fn test_released_slot_is_reused_with_new_generation() {
        let mut arena = Arena::new();
        let first = arena.insert(leaf());
        assert!(arena.remove(first).is_some());
        let second = arena.insert(leaf());
        assert_eq!(second.index(), first.index());
        assert_ne!(second.generation(), first.generation());
        assert!(arena.get(first).is_none());
        assert!(arena.get(second).is_some());
        assert_eq!(arena.slot_count(), 1);
    }

    #[test]
    fn test_stale_remove_is_ignored() {
        let mut arena = Arena::new();
        let first = arena.insert(leaf());
        arena.remove(first);
        let second = arena.insert(leaf());
        assert!(arena.remove(first).is_none());
        assert!(arena.contains(second));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_rollback_releases_checkpoint_allocations() {
        let mut arena = Arena::new();
        let kept = arena.insert(leaf());
        let outer = arena.checkpoint();
        let a = arena.insert(leaf());
        let inner = arena.checkpoint();
        let b = arena.insert(leaf());
        arena.commit(inner);
        arena.rollback(outer);
        assert!(arena.contains(kept));
        assert!(!arena.contains(a));
        assert!(!arena.contains(b));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_commit_keeps_allocations() {
        let mut arena = Arena::new();
        let checkpoint = arena.checkpoint();
        let id = arena.insert(leaf());
        arena.commit(checkpoint);
        assert!(arena.contains(id));
        assert_eq!(arena.iter().count(), 1);
    }
}
