//! Field mapping engine.
//!
//! Turns a source record into a target payload, one [`MappingRule`] at a
//! time:
//!
//! 1. [`resolve`] reads the source value, extracts sub-keys, applies the
//!    substitution table, resolves foreign keys and sanitizes text.
//! 2. [`validate`] applies length bounds, null defaults, type coercion and
//!    dropdown matching.
//! 3. [`payload`] places valid values into flat or type-specific fields.
//!
//! Expected data-quality problems never raise: an unusable field is left
//! out of the payload.
//!
//! [`MappingRule`]: cmdbsync_core::MappingRule

pub mod payload;
pub mod resolve;
pub mod validate;

pub use payload::{build_payload, Payload};
pub use resolve::{resolve_value, source_value, substitute, ResolveMode};
pub use validate::{coerce, validate_value, FieldOutcome};
