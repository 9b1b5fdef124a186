//! # Vellum Schema
//!
//! Schema model and migrations for the Vellum content repository.
//!
//! This crate provides:
//! - Versioned, immutable schema specifications
//! - Structural validation
//! - Partial updates producing new schema versions
//! - An append-only migration action log with lazy-resolution helpers
//! - Published-view derivation

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod published;
mod schema;
mod spec;
mod update;
mod validate;

pub use error::{SchemaError, SchemaResult};
pub use schema::Schema;
pub use spec::{
    ComponentTypeSpec, EntityTypeSpec, FieldSpec, FieldType, IndexSpec, IndexType, MigrationAction,
    MigrationBatch, PatternSpec, SchemaSpecification, SchemaSpecificationUpdate, TypeKind,
};
pub use update::SchemaUpdateResult;
