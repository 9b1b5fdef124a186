//! Client-facing entity types: read views, operation requests and
//! operation outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vellum_adapter::EntityStatus;

use crate::value::FieldMap;

/// A read view of an entity at one version.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Stable public id.
    pub id: Uuid,
    /// Entity type name under the current schema.
    pub entity_type: String,
    /// Unique name.
    pub name: String,
    /// Separately unique published name, while published.
    pub published_name: Option<String>,
    /// Lifecycle status.
    pub status: EntityStatus,
    /// True until first publish.
    pub never_published: bool,
    /// Set when a schema change requires revalidation.
    pub dirty: bool,
    /// The version number this view shows.
    pub version: i32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// Field values, migrated to the current schema.
    pub fields: FieldMap,
}

/// What an entity mutation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityEffect {
    /// A new entity was created as a draft.
    Created,
    /// A new entity was created and published in one step.
    CreatedAndPublished,
    /// A new version was stored.
    Updated,
    /// A new version was stored and published in one step.
    UpdatedAndPublished,
    /// The published pointer was set.
    Published,
    /// The published pointer was cleared.
    Unpublished,
    /// The entity was archived.
    Archived,
    /// The entity was unarchived.
    Unarchived,
    /// The operation changed nothing.
    None,
}

/// A unique-index value that could not be claimed for the entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UniqueValueConflict {
    /// Index name from the schema.
    pub index_name: String,
    /// The conflicting value.
    pub value: String,
}

/// Outcome of a single-entity mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityOutcome {
    /// The entity after the mutation.
    pub entity: Entity,
    /// What the mutation did.
    pub effect: EntityEffect,
    /// Unique-index values left unclaimed; when non-empty the entity was
    /// saved but marked dirty.
    pub conflicts: Vec<UniqueValueConflict>,
}

/// Request to create an entity.
#[derive(Debug, Clone, Default)]
pub struct CreateEntityRequest {
    /// Entity type name.
    pub entity_type: String,
    /// Initial field values.
    pub fields: FieldMap,
    /// Explicit name; derived from the type's name field when absent.
    pub name: Option<String>,
    /// Authorization key guarding the entity.
    pub auth_key: Option<String>,
    /// Publish the first version in the same transaction.
    pub publish: bool,
}

/// Request to update an entity.
#[derive(Debug, Clone, Default)]
pub struct UpdateEntityRequest {
    /// Entity to update.
    pub id: Uuid,
    /// Replacement field values.
    pub fields: FieldMap,
    /// Explicit rename; re-derived from the name field when absent and
    /// that field changed.
    pub name: Option<String>,
    /// Authorization key, checked against the entity's stored key.
    pub auth_key: Option<String>,
    /// Publish the new version in the same transaction.
    pub publish: bool,
}

/// Request to create-or-update an entity keyed by a unique-index value.
///
/// When the `(index, value)` pair already has an owner, that entity is
/// updated; otherwise a new entity is created.
#[derive(Debug, Clone, Default)]
pub struct UpsertEntityRequest {
    /// Unique index to match on.
    pub index_name: String,
    /// The indexed value that identifies the entity.
    pub value: String,
    /// Entity type name, used when creating.
    pub entity_type: String,
    /// Field values.
    pub fields: FieldMap,
    /// Explicit name for the create path.
    pub name: Option<String>,
    /// Authorization key.
    pub auth_key: Option<String>,
    /// Publish in the same transaction.
    pub publish: bool,
}

/// Ways to look up a single entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityLookup {
    /// By public id, returning the latest version.
    Id(Uuid),
    /// By public id at a specific version number.
    IdVersion {
        /// Public id.
        id: Uuid,
        /// Version number.
        version: i32,
    },
    /// By a unique-index value, returning the owning entity's latest
    /// version.
    UniqueValue {
        /// Index name from the schema.
        index_name: String,
        /// Indexed value.
        value: String,
    },
}

/// Request for a filtered, paged entity listing.
#[derive(Debug, Clone, Default)]
pub struct GetEntitiesRequest {
    /// Restrict to these entity types; empty means all.
    pub entity_types: Vec<String>,
    /// Restrict to these statuses; empty means all non-archived.
    pub statuses: Vec<EntityStatus>,
    /// Full-text filter against the latest view.
    pub text: Option<String>,
    /// Page size; capped by the repository.
    pub limit: usize,
    /// Opaque cursor from a previous page.
    pub after: Option<String>,
    /// Authorization key for key-guarded entities.
    pub auth_key: Option<String>,
}

/// One page of entities.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityPage {
    /// Entities in stable storage order.
    pub entities: Vec<Entity>,
    /// Total number of matching entities, independent of paging.
    pub total: i64,
    /// Cursor for the next page; `None` on the last page.
    pub next: Option<String>,
}

/// Request for a seeded random sample of entities.
#[derive(Debug, Clone, Default)]
pub struct SampleEntitiesRequest {
    /// Restrict to these entity types; empty means all.
    pub entity_types: Vec<String>,
    /// Restrict to these statuses; empty means all non-archived.
    pub statuses: Vec<EntityStatus>,
    /// Sample size.
    pub count: usize,
    /// Sampling seed; the same seed over the same data yields the same
    /// sample.
    pub seed: u64,
    /// Authorization key for key-guarded entities.
    pub auth_key: Option<String>,
}

/// A seeded sample of entities with a stable total count.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySample {
    /// Sampled entities.
    pub entities: Vec<Entity>,
    /// Total number of matching entities.
    pub total: i64,
}

/// One entity in a publish request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishEntityRequest {
    /// Entity to publish.
    pub id: Uuid,
    /// Version to publish; the latest version when absent.
    pub version: Option<i32>,
}

/// A changelog event as surfaced to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangelogEvent {
    /// Event id; also the replication cursor.
    pub id: i64,
    /// Event type discriminator.
    pub event_type: String,
    /// Subject that caused the event.
    pub created_by: Uuid,
    /// Event timestamp.
    pub created_at: DateTime<Utc>,
}
