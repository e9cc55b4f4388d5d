//! # formtree-core — Foundational Types
//!
//! The leaf of the formtree crate DAG. Defines the primitives the schema
//! and state crates share:
//!
//! 1. **Pointer paths** (`pointer`). Segment splitting, `~0`/`~1`
//!    escaping, and the `#` / `..` / `.` navigation tokens.
//!
//! 2. **`CanonicalJson` newtype** (`canonical`). Byte-stable JSON text for
//!    expression literals, cache keys, and digests.
//!
//! 3. **Content digests** (`digest`). SHA-256 over canonical JSON; schema
//!    fragments are identified by content, not address.
//!
//! 4. **Error taxonomy** (`error`). Structural schema errors abort
//!    construction and carry the offending fragment.
//!
//! 5. **Configuration** (`config`). `TreeOptions` from YAML/JSON plus
//!    environment overrides.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `formtree-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod config;
pub mod digest;
pub mod error;
pub mod pointer;

// Re-export primary types for ergonomic imports.
pub use canonical::CanonicalJson;
pub use config::{TreeOptions, ValidationMode};
pub use digest::{fragment_digest, sha256_digest, sha256_hex, ContentDigest};
pub use error::{CanonicalizationError, ConditionError, ConfigError, FormTreeError, SchemaError};
pub use pointer::PathToken;
