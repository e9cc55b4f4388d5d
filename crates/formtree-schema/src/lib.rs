//! # formtree-schema — Schema Composition & Validation
//!
//! Everything that reads a JSON Schema without holding a value:
//!
//! ## Composition (`composer`)
//!
//! - [`Normalizer`] inlines local `$ref`s and folds `allOf` into one flat
//!   fragment with tightest-constraint intersection rules.
//! - [`CompositionMeta`] analyzes `oneOf` / `anyOf` branches into key sets,
//!   discriminants, and the field → condition map that drives
//!   branch-dependent visibility and required status.
//! - [`SchemaType`] resolves the node variant a fragment dispatches to.
//!
//! ## Arrays (`array`)
//!
//! Item-count bounds, construction-time shape checks, and per-index child
//! schema selection.
//!
//! ## Validation (`validate`, `pipeline`, `hints`)
//!
//! The [`SchemaValidator`] collaborator returns raw error records; the
//! pipeline normalizes, filters, and digests them. Render hints are
//! stripped from the schema before it reaches the validator.
//!
//! ## Crate Policy
//!
//! - Depends only on `formtree-core` internally.
//! - Schema fragments are never mutated in place; every operation returns
//!   a new `Value`.

pub mod array;
pub mod composer;
pub mod hints;
pub mod pipeline;
pub mod reference;
pub mod validate;

pub use array::{child_schema, resolve_array_limits, validate_array_schema, ArrayLimits};
pub use composer::{
    intersect, is_nullable, merge_all_of, CompositionKind, CompositionMeta, Discriminant,
    FieldCondition, Normalizer, RequiredStatus, SchemaType,
};
pub use hints::strip_hints;
pub use pipeline::{compile_error, errors_digest, filter_errors, ErrorTransformer, JsonSchemaError};
pub use reference::RefResolver;
pub use validate::{JsonSchemaValidator, RawError, SchemaValidationError, SchemaValidator};
