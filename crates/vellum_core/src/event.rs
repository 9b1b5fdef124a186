//! Sync/replication event wire model.
//!
//! Events are appended to an ordered log by every mutation; a second
//! instance replays them in id order to reconstruct identical state.
//! The wire shape is `{ id, type, createdAt, createdBy, ...payload }`
//! with the payload flattened next to the envelope fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vellum_adapter::{EventRow, NewEventRow, RepoError, RepoResult};
use vellum_schema::SchemaSpecification;

use crate::value::FieldMap;

/// One replayable mutation event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
    /// Ordered event id; the replication cursor.
    pub id: i64,
    /// Subject that caused the event.
    pub created_by: Uuid,
    /// Event timestamp.
    pub created_at: DateTime<Utc>,
    /// Type-specific payload, flattened into the envelope.
    #[serde(flatten)]
    pub payload: SyncEventPayload,
}

/// The type-specific part of a sync event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SyncEventPayload {
    /// A new schema version was written.
    #[serde(rename_all = "camelCase")]
    UpdateSchema {
        /// The complete new specification.
        specification: SchemaSpecification,
    },
    /// An entity was created as a draft.
    CreateEntity(EntityWritePayload),
    /// An entity was created and published in one step.
    CreateAndPublishEntity(EntityWritePayload),
    /// A new entity version was stored.
    UpdateEntity(EntityWritePayload),
    /// A new entity version was stored and published in one step.
    UpdateAndPublishEntity(EntityWritePayload),
    /// Published pointers were set.
    #[serde(rename_all = "camelCase")]
    PublishEntities {
        /// The published entities and versions.
        entities: Vec<PublishedEntityRef>,
    },
    /// Published pointers were cleared.
    #[serde(rename_all = "camelCase")]
    UnpublishEntities {
        /// The unpublished entities.
        entity_ids: Vec<Uuid>,
    },
    /// An entity was archived.
    #[serde(rename_all = "camelCase")]
    ArchiveEntity {
        /// The archived entity.
        entity_id: Uuid,
    },
    /// An entity was unarchived.
    #[serde(rename_all = "camelCase")]
    UnarchiveEntity {
        /// The unarchived entity.
        entity_id: Uuid,
    },
}

/// Payload shared by the create/update event kinds.
///
/// Carries the final state chosen by the source instance (including the
/// possibly suffix-randomized name) so replay is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityWritePayload {
    /// Public entity id.
    pub entity_id: Uuid,
    /// Entity type name at event time.
    pub entity_type: String,
    /// Final unique name.
    pub name: String,
    /// Final published name, for the publishing kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_name: Option<String>,
    /// Authorization key as supplied.
    #[serde(default)]
    pub auth_key: String,
    /// The version number this event wrote.
    pub version: i32,
    /// Schema version the fields are encoded against.
    pub schema_version: u32,
    /// The stored field values.
    pub fields: FieldMap,
}

/// One entity inside a publish event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedEntityRef {
    /// Public entity id.
    pub entity_id: Uuid,
    /// The published version number.
    pub version: i32,
    /// The published name chosen by the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_name: Option<String>,
}

impl SyncEventPayload {
    /// The wire discriminator for this payload kind.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::UpdateSchema { .. } => "updateSchema",
            Self::CreateEntity(_) => "createEntity",
            Self::CreateAndPublishEntity(_) => "createAndPublishEntity",
            Self::UpdateEntity(_) => "updateEntity",
            Self::UpdateAndPublishEntity(_) => "updateAndPublishEntity",
            Self::PublishEntities { .. } => "publishEntities",
            Self::UnpublishEntities { .. } => "unpublishEntities",
            Self::ArchiveEntity { .. } => "archiveEntity",
            Self::UnarchiveEntity { .. } => "unarchiveEntity",
        }
    }

    /// Serializes the payload (including its `type` tag) for storage.
    pub fn to_stored_json(&self) -> RepoResult<String> {
        serde_json::to_string(self)
            .map_err(|e| RepoError::generic(format!("failed to encode event payload: {e}")))
    }
}

impl SyncEvent {
    /// Rebuilds an event from its stored row.
    pub fn from_row(row: &EventRow) -> RepoResult<Self> {
        let payload: SyncEventPayload = serde_json::from_str(&row.payload_json)
            .map_err(|e| RepoError::generic(format!("corrupt event payload {}: {e}", row.id)))?;
        Ok(Self {
            id: row.id,
            created_by: row.created_by,
            created_at: row.created_at,
            payload,
        })
    }

    /// Builds the storage row for this event.
    ///
    /// The event id is carried as an explicit override; live appends use
    /// [`NewEventRow::id`] `None` instead and let the backend assign it.
    pub fn to_row(&self) -> RepoResult<NewEventRow> {
        Ok(NewEventRow {
            id: Some(self.id),
            event_type: self.payload.event_type().to_owned(),
            created_by: self.created_by,
            created_at: self.created_at,
            payload_json: self.payload.to_stored_json()?,
        })
    }
}
