//! Validation runs and per-node error distribution.

use std::collections::BTreeMap;

use formtree_schema::{compile_error, errors_digest, filter_errors, JsonSchemaError};

use super::node::NodeId;
use super::SchemaTree;
use crate::event::{EventPayload, EventType, RawEvent};

impl SchemaTree {
    /// Validate the current value and hand each node its errors.
    ///
    /// A validator that cannot compile the schema yields one synthetic
    /// `compile` error on the root instead of failing.
    pub(crate) fn run_validation(&mut self) {
        let Some(validator) = self.validator.clone() else {
            tracing::debug!("no validator configured; skipping validation");
            return;
        };
        let value = self.value();
        let raw = match validator.validate(&value, &self.validation_schema) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "validator unavailable; reporting a node-wide error");
                vec![compile_error(&e)]
            }
        };
        let errors = self.transformer.transform(&raw, self.options.assign_error_keys);
        let errors = filter_errors(errors, &self.validation_schema);
        let digest = errors_digest(&errors);
        if self.global_digest == Some(digest) {
            tracing::trace!(count = errors.len(), "validation result unchanged");
            return;
        }
        tracing::debug!(count = errors.len(), digest = %digest, "validation result changed");
        self.global_digest = Some(digest);

        let mut by_node: BTreeMap<NodeId, Vec<JsonSchemaError>> = BTreeMap::new();
        for error in &errors {
            let target = self.deepest_along(&error.data_path);
            by_node.entry(target).or_default().push(error.clone());
        }
        for node in self.nodes.iter() {
            if !node.errors.is_empty() {
                by_node.entry(node.id).or_default();
            }
        }
        self.global_errors = errors;

        for (id, next) in by_node {
            let Some(node) = self.node_mut(id) else { continue };
            if errors_digest(&node.errors) == errors_digest(&next) {
                continue;
            }
            node.errors = next.clone();
            self.record(
                id,
                RawEvent {
                    kind: EventType::UPDATE_ERROR,
                    payload: Some(EventPayload::Errors(next)),
                    options: None,
                },
            );
        }
    }

    /// Run validation now, as its own tick.
    pub fn validate(&mut self) {
        self.begin();
        self.run_validation();
        self.end();
    }
}
