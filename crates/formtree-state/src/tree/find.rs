//! Path navigation over the arena.

use formtree_core::pointer::{self, PathToken};

use super::node::{NodeGroup, NodeId};
use super::SchemaTree;

impl SchemaTree {
    /// Resolve `path` starting at `start`.
    ///
    /// `#` jumps to the root, `..` to the parent (failing at the root),
    /// `.` stays put, and any other segment selects a child by key. The
    /// walk fails on the first missing key, and stops at a terminal node
    /// even when segments remain. An empty path addresses `start`.
    pub fn find(&self, start: NodeId, path: &str) -> Option<NodeId> {
        match pointer::segments(path) {
            None => self.node(start).map(|n| n.id),
            Some(segments) => self.find_segments(start, &segments),
        }
    }

    /// Resolve an absolute or relative path from the root.
    pub fn find_from_root(&self, path: &str) -> Option<NodeId> {
        self.find(self.root, path)
    }

    /// Resolve pre-split, still-escaped segments.
    pub fn find_segments(&self, start: NodeId, segments: &[String]) -> Option<NodeId> {
        let mut current = self.node(start)?;
        for segment in segments {
            match PathToken::classify(segment) {
                PathToken::Root => current = self.node(self.root)?,
                PathToken::Parent => current = self.node(current.parent?)?,
                PathToken::Current => {}
                PathToken::Key(raw) => {
                    let key = pointer::unescape(raw);
                    current = self.node(current.child(&key)?)?;
                    if current.group == NodeGroup::Terminal {
                        return Some(current.id);
                    }
                }
            }
        }
        Some(current.id)
    }

    /// The deepest node along an absolute data path. Used to attach
    /// errors whose target does not exist as a node.
    pub(crate) fn deepest_along(&self, path: &str) -> NodeId {
        let mut current = self.root;
        for segment in pointer::segments(path).unwrap_or_default() {
            let key = pointer::unescape(&segment);
            let Some(node) = self.node(current) else { break };
            if node.group == NodeGroup::Terminal {
                break;
            }
            match node.child(&key) {
                Some(child) => current = child,
                None => break,
            }
        }
        current
    }
}
