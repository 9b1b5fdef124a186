//! # Vellum Core
//!
//! Entity lifecycle engine and client surface of the Vellum content
//! repository.
//!
//! This crate provides:
//! - The field value model, content paths and rich text trees
//! - Content traversal and index-data collection
//! - Field normalization and publish validation against the schema
//! - Lazy migration of stored field values across schema versions
//! - The versioned draft/published entity lifecycle
//! - Unique-index value reconciliation
//! - The append-only sync event log and ordered replay
//! - Named advisory locks
//!
//! All storage goes through the `DatabaseAdapter` port from
//! [`vellum_adapter`]; see `vellum_sqlite` and `vellum_postgres` for the
//! backends.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collect;
mod engine;
mod entity;
mod event;
mod lock;
mod migrate;
mod normalize;
mod path;
mod reconcile;
mod repository;
mod richtext;
mod session;
mod traverse;
mod value;

pub use collect::{collect_index_data, EntityIndexData, TypedReference};
pub use engine::WriteOrigin;
pub use entity::{
    ChangelogEvent, CreateEntityRequest, Entity, EntityEffect, EntityLookup, EntityOutcome,
    EntityPage, EntitySample, GetEntitiesRequest, PublishEntityRequest, SampleEntitiesRequest,
    UniqueValueConflict, UpdateEntityRequest, UpsertEntityRequest,
};
pub use event::{EntityWritePayload, PublishedEntityRef, SyncEvent, SyncEventPayload};
pub use lock::{with_advisory_lock, LockOptions};
pub use migrate::migrate_entity_fields;
pub use normalize::{normalize_entity_fields, validate_for_publish};
pub use path::{ContentPath, PathSegment};
pub use reconcile::{reconcile_unique_values, UniqueValueSet};
pub use repository::Repository;
pub use richtext::{RichText, RichTextNode};
pub use session::{AuthKeyResolver, PassthroughAuthKeys, Session};
pub use traverse::{traverse_component, traverse_entity, ContentNode, ContentTraversal};
pub use value::{ComponentValue, EntityReference, FieldMap, FieldValue, Location};

pub use vellum_adapter::{DatabaseAdapter, EntityStatus, RepoError, RepoResult};
pub use vellum_schema::{Schema, SchemaSpecification, SchemaSpecificationUpdate};
