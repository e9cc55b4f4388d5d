//! Input parsing, serialization, and value writes.

use std::collections::BTreeSet;

use serde_json::{Map, Number, Value};

use super::node::{NodeGroup, NodeId, NodeKind};
use super::SchemaTree;
use crate::condition::truthy;
use crate::event::{EventPayload, EventType, RawEvent};

/// Coerce raw input to a node's storage form. `None` is undefined.
pub(crate) fn parse_input(kind: NodeKind, integer: bool, nullable: bool, input: Option<Value>) -> Option<Value> {
    if nullable && input == Some(Value::Null) {
        return input;
    }
    match kind {
        NodeKind::String => match input? {
            Value::String(s) => Some(Value::String(s.trim().to_string())),
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
        NodeKind::Number => {
            let number = match input? {
                Value::Number(n) => n,
                Value::String(s) => parse_number(s.trim())?,
                _ => return None,
            };
            if integer {
                truncate(&number).map(Value::Number)
            } else {
                Some(Value::Number(number))
            }
        }
        NodeKind::Boolean => match input? {
            Value::Bool(b) => Some(Value::Bool(b)),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Some(Value::Bool(true)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Some(Value::Bool(false)),
            other => Some(Value::Bool(truthy(Some(&other)))),
        },
        NodeKind::Null => input.map(|_| Value::Null),
        NodeKind::Object => match input? {
            Value::Object(map) => Some(Value::Object(map)),
            _ => Some(Value::Object(Map::new())),
        },
        NodeKind::Array => match input? {
            Value::Array(items) => Some(Value::Array(items)),
            _ => Some(Value::Array(Vec::new())),
        },
        NodeKind::Virtual => input,
    }
}

fn parse_number(text: &str) -> Option<Number> {
    if text.is_empty() {
        return None;
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(Number::from(i));
    }
    text.parse::<f64>().ok().and_then(Number::from_f64)
}

fn truncate(number: &Number) -> Option<Number> {
    if number.is_i64() || number.is_u64() {
        return Some(number.clone());
    }
    let f = number.as_f64()?.trunc();
    if f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(Number::from(f as i64))
    } else {
        Number::from_f64(f)
    }
}

impl SchemaTree {
    /// Serialize a node. `None` is undefined.
    ///
    /// Object nodes omit virtual children, undefined children, and keys
    /// the active composition branch excludes. The exclusion is decided
    /// from current sibling values on every read.
    pub fn node_value(&self, id: NodeId) -> Option<Value> {
        let node = self.node(id)?;
        match (node.kind, node.group) {
            (_, NodeGroup::Terminal) => node.value.clone(),
            (NodeKind::Object, _) => {
                let excluded = self.excluded_keys(id);
                let mut map = Map::new();
                for entry in &node.children {
                    if excluded.contains(&entry.key) {
                        continue;
                    }
                    let Some(child) = self.node(entry.node) else {
                        continue;
                    };
                    if child.group == NodeGroup::Virtual {
                        continue;
                    }
                    if let Some(value) = self.node_value(entry.node) {
                        map.insert(entry.key.clone(), value);
                    }
                }
                Some(Value::Object(map))
            }
            (NodeKind::Array, _) => Some(Value::Array(
                node.children
                    .iter()
                    .map(|c| self.node_value(c.node).unwrap_or(Value::Null))
                    .collect(),
            )),
            (NodeKind::Virtual, _) => {
                let parent = node.parent.and_then(|p| self.node(p))?;
                Some(Value::Array(
                    node.fields
                        .iter()
                        .map(|f| parent.child(f).and_then(|c| self.node_value(c)).unwrap_or(Value::Null))
                        .collect(),
                ))
            }
            _ => node.value.clone(),
        }
    }

    /// The root value (`null` for an undefined root).
    pub fn value(&self) -> Value {
        self.node_value(self.root).unwrap_or(Value::Null)
    }

    /// Write `input` to a node. Returns `false` when the write is
    /// rejected (unknown node, or an array longer than `maxItems`).
    pub fn set_value(&mut self, id: NodeId, input: Value) -> bool {
        self.mutate(id, |tree| tree.write(id, Some(input)))
    }

    /// Write undefined to a node.
    pub fn unset_value(&mut self, id: NodeId) -> bool {
        self.mutate(id, |tree| tree.write(id, None))
    }

    pub(crate) fn write(&mut self, id: NodeId, input: Option<Value>) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        match (node.kind, node.group) {
            (kind, NodeGroup::Terminal) => {
                let parsed = parse_input(kind, node.integer, node.nullable, input);
                if let Some(node) = self.node_mut(id) {
                    if node.value != parsed {
                        tracing::trace!(path = %node.path, "value committed");
                        node.value = parsed;
                    }
                }
                true
            }
            (NodeKind::Object, _) => {
                let map = match input {
                    Some(Value::Object(map)) => map,
                    _ => Map::new(),
                };
                // Keys of an inactive branch keep their values unless the
                // input names them.
                let excluded = self.excluded_keys(id);
                let targets: Vec<(String, NodeId)> = node
                    .children
                    .iter()
                    .filter(|c| self.node(c.node).is_some_and(|n| n.group != NodeGroup::Virtual))
                    .filter(|c| map.contains_key(&c.key) || !excluded.contains(&c.key))
                    .map(|c| (c.key.clone(), c.node))
                    .collect();
                for (key, child) in targets {
                    self.write(child, map.get(&key).cloned());
                }
                true
            }
            (NodeKind::Array, _) => {
                let items = match input {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                };
                self.write_array(id, items)
            }
            (NodeKind::Virtual, _) => {
                let Some(parent) = node.parent.and_then(|p| self.node(p)) else {
                    return false;
                };
                let items = match input {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                };
                let targets: Vec<NodeId> = node.fields.iter().filter_map(|f| parent.child(f)).collect();
                for (index, field) in targets.into_iter().enumerate() {
                    self.write(field, items.get(index).cloned());
                }
                true
            }
            _ => false,
        }
    }

    fn write_array(&mut self, id: NodeId, items: Vec<Value>) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        let limits = node.limits;
        if let Some(max) = limits.and_then(|l| l.max).filter(|&max| items.len() > max) {
            tracing::debug!(path = %node.path, len = items.len(), max, "array write rejected: longer than maxItems");
            return false;
        }
        let min = limits.map_or(0, |l| l.min);
        let existing: Vec<NodeId> = node.children.iter().map(|c| c.node).collect();
        let before = existing.len();

        let mut items = items.into_iter();
        let mut kept = 0;
        for child in existing.iter().copied() {
            match items.next() {
                Some(item) => {
                    self.write(child, Some(item));
                    kept += 1;
                }
                None => break,
            }
        }
        let keep = kept.max(min.min(before));
        for child in existing.iter().skip(keep) {
            self.drop_subtree(*child);
        }
        if let Some(node) = self.node_mut(id) {
            node.children.truncate(keep);
        }
        for child in existing.iter().take(keep).skip(kept) {
            self.write(*child, None);
        }
        for item in items {
            if let Err(e) = self.append_item(id, Some(item)) {
                tracing::warn!(error = %e, "array item could not be built");
            }
        }
        while self.child_count(id) < min {
            if let Err(e) = self.append_item(id, None) {
                tracing::warn!(error = %e, "array item could not be built");
                break;
            }
        }

        let after = self.child_count(id);
        if after != before {
            self.children_changed(id);
        }
        true
    }

    /// Run `f` as one tick and record `CHANGE` for every node whose
    /// serialized value it altered.
    pub(crate) fn mutate(&mut self, target: NodeId, f: impl FnOnce(&mut Self) -> bool) -> bool {
        if self.node(target).is_none() {
            return false;
        }
        self.begin();
        let before: Vec<(NodeId, Option<Value>)> = self
            .affected(target)
            .into_iter()
            .map(|id| (id, self.node_value(id)))
            .collect();
        let accepted = f(self);
        for (id, previous) in before {
            if self.node(id).is_none() {
                continue;
            }
            let current = self.node_value(id);
            if current != previous {
                self.value_dirty = true;
                self.record(
                    id,
                    RawEvent {
                        kind: EventType::CHANGE,
                        payload: Some(EventPayload::Change { previous, current }),
                        options: None,
                    },
                );
            }
        }
        self.end();
        accepted
    }

    /// Nodes whose value a write to `target` can alter: its subtree, its
    /// ancestors, the fields of a virtual target, and virtual siblings
    /// aggregating any of those.
    fn affected(&self, target: NodeId) -> BTreeSet<NodeId> {
        let mut set = BTreeSet::new();
        self.collect_subtree(target, &mut set);

        if let Some(node) = self.node(target) {
            if node.group == NodeGroup::Virtual {
                if let Some(parent) = node.parent.and_then(|p| self.node(p)) {
                    for field in node.fields.iter().filter_map(|f| parent.child(f)) {
                        self.collect_subtree(field, &mut set);
                    }
                }
            }
        }

        let mut cursor = Some(target);
        while let Some(id) = cursor {
            let Some(node) = self.node(id) else { break };
            set.insert(id);
            if let (Some(parent), Some(key)) = (node.parent.and_then(|p| self.node(p)), node.key.as_deref()) {
                for entry in &parent.children {
                    let aggregates = self
                        .node(entry.node)
                        .is_some_and(|n| n.group == NodeGroup::Virtual && n.fields.iter().any(|f| f == key));
                    if aggregates {
                        set.insert(entry.node);
                    }
                }
            }
            cursor = node.parent;
        }
        set
    }

    pub(crate) fn collect_subtree(&self, id: NodeId, out: &mut BTreeSet<NodeId>) {
        let Some(node) = self.node(id) else { return };
        out.insert(id);
        for entry in &node.children {
            self.collect_subtree(entry.node, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_parsing() {
        assert_eq!(parse_input(NodeKind::String, false, false, Some(json!("  hi "))), Some(json!("hi")));
        assert_eq!(parse_input(NodeKind::String, false, false, Some(json!(12))), Some(json!("12")));
        assert_eq!(parse_input(NodeKind::String, false, false, Some(json!({}))), None);
        assert_eq!(parse_input(NodeKind::String, false, false, None), None);
    }

    #[test]
    fn test_number_parsing() {
        assert_eq!(parse_input(NodeKind::Number, true, false, Some(json!(3.9))), Some(json!(3)));
        assert_eq!(parse_input(NodeKind::Number, true, false, Some(json!(-3.9))), Some(json!(-3)));
        assert_eq!(parse_input(NodeKind::Number, false, false, Some(json!(3.5))), Some(json!(3.5)));
        assert_eq!(parse_input(NodeKind::Number, false, false, Some(json!(" 42 "))), Some(json!(42)));
        assert_eq!(parse_input(NodeKind::Number, false, false, Some(json!("1.25"))), Some(json!(1.25)));
        assert_eq!(parse_input(NodeKind::Number, false, false, Some(json!("abc"))), None);
        assert_eq!(parse_input(NodeKind::Number, false, false, Some(json!(""))), None);
        assert_eq!(parse_input(NodeKind::Number, false, false, Some(json!(true))), None);
    }

    #[test]
    fn test_boolean_parsing() {
        assert_eq!(parse_input(NodeKind::Boolean, false, false, Some(json!("TRUE"))), Some(json!(true)));
        assert_eq!(parse_input(NodeKind::Boolean, false, false, Some(json!("False"))), Some(json!(false)));
        assert_eq!(parse_input(NodeKind::Boolean, false, false, Some(json!("yes"))), Some(json!(true)));
        assert_eq!(parse_input(NodeKind::Boolean, false, false, Some(json!(0))), Some(json!(false)));
        assert_eq!(parse_input(NodeKind::Boolean, false, false, None), None);
    }

    #[test]
    fn test_container_parsing() {
        assert_eq!(parse_input(NodeKind::Array, false, false, Some(json!("x"))), Some(json!([])));
        assert_eq!(parse_input(NodeKind::Array, false, false, Some(json!([1]))), Some(json!([1])));
        assert_eq!(parse_input(NodeKind::Object, false, false, Some(json!([1]))), Some(json!({})));
    }

    #[test]
    fn test_nullable_keeps_null() {
        assert_eq!(parse_input(NodeKind::String, false, true, Some(json!(null))), Some(json!(null)));
        assert_eq!(parse_input(NodeKind::String, false, false, Some(json!(null))), None);
        assert_eq!(parse_input(NodeKind::Null, false, false, Some(json!(5))), Some(json!(null)));
    }
}
