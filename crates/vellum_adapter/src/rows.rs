//! Logical row types shared by the engine and all backends.
//!
//! These mirror the logical tables (`entities`, `entity_versions`,
//! `unique_index_values`, `events`, `subjects`, `schema_versions`,
//! `advisory_locks`); each backend realizes them with its own physical
//! column types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RepoError, RepoResult};

/// Lifecycle status of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityStatus {
    /// Never published; latest version only.
    Draft,
    /// Published version equals the latest version.
    Published,
    /// Published, but the latest version is newer than the published one.
    Modified,
    /// Previously published, currently unpublished.
    Withdrawn,
    /// Archived; hidden from normal queries.
    Archived,
}

impl EntityStatus {
    /// Storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Modified => "modified",
            Self::Withdrawn => "withdrawn",
            Self::Archived => "archived",
        }
    }

    /// Parses the storage representation.
    pub fn parse(value: &str) -> RepoResult<Self> {
        match value {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "modified" => Ok(Self::Modified),
            "withdrawn" => Ok(Self::Withdrawn),
            "archived" => Ok(Self::Archived),
            other => Err(RepoError::generic(format!("invalid entity status: {other}"))),
        }
    }
}

/// A row in the logical `entities` table.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRow {
    /// Storage-internal numeric id (also the pagination cursor source).
    pub internal_id: i64,
    /// Stable public id.
    pub id: Uuid,
    /// Entity type name.
    pub entity_type: String,
    /// Unique name among non-deleted entities.
    pub name: String,
    /// Separately unique name in the published view.
    pub published_name: Option<String>,
    /// Authorization key as supplied by the caller.
    pub auth_key: String,
    /// Resolved form of the authorization key.
    pub resolved_auth_key: String,
    /// Current lifecycle status.
    pub status: EntityStatus,
    /// True until the entity is published for the first time.
    pub never_published: bool,
    /// Set when a schema change requires revalidation of this entity.
    pub dirty: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// Pointer to the latest entity version row. Only null for the short
    /// window between entity insert and first version insert inside the
    /// creating transaction.
    pub latest_version_id: Option<i64>,
    /// Pointer to the published entity version row.
    pub published_version_id: Option<i64>,
}

/// Resolution of a public entity id, as needed for reference checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRefRow {
    /// Stable public id.
    pub id: Uuid,
    /// Storage-internal numeric id.
    pub internal_id: i64,
    /// Stored entity type name.
    pub entity_type: String,
}

/// Input for inserting an `entities` row. Status starts as draft.
#[derive(Debug, Clone)]
pub struct NewEntityRow {
    /// Stable public id.
    pub id: Uuid,
    /// Entity type name.
    pub entity_type: String,
    /// Requested unique name.
    pub name: String,
    /// Authorization key.
    pub auth_key: String,
    /// Resolved authorization key.
    pub resolved_auth_key: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A row in the logical `entity_versions` table. Immutable once written.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityVersionRow {
    /// Version row id.
    pub id: i64,
    /// Owning entity's internal id.
    pub entity_internal_id: i64,
    /// Monotonic version number, starting at 1.
    pub version: i32,
    /// Schema version the fields were encoded against.
    pub schema_version: u32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Creating subject.
    pub created_by: Uuid,
    /// Raw field values as JSON.
    pub fields_json: String,
}

/// Input for inserting an `entity_versions` row.
#[derive(Debug, Clone)]
pub struct NewEntityVersionRow {
    /// Owning entity's internal id.
    pub entity_internal_id: i64,
    /// Version number.
    pub version: i32,
    /// Schema version the fields are encoded against.
    pub schema_version: u32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Creating subject.
    pub created_by: Uuid,
    /// Raw field values as JSON.
    pub fields_json: String,
}

/// A row in the logical `unique_index_values` table.
#[derive(Debug, Clone, PartialEq)]
pub struct UniqueValueRow {
    /// Row id.
    pub id: i64,
    /// Index name from the schema.
    pub index_name: String,
    /// Indexed value.
    pub value: String,
    /// Owning entity's internal id.
    pub entity_internal_id: i64,
    /// Value is present in the current latest version.
    pub latest: bool,
    /// Value is present in the current published version.
    pub published: bool,
}

/// Input for inserting a `unique_index_values` row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUniqueValueRow {
    /// Index name from the schema.
    pub index_name: String,
    /// Indexed value.
    pub value: String,
    /// Owning entity's internal id.
    pub entity_internal_id: i64,
    /// Present in the latest version.
    pub latest: bool,
    /// Present in the published version.
    pub published: bool,
}

/// A row in the append-only logical `events` table.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    /// Auto-incrementing id; the replication cursor.
    pub id: i64,
    /// Event type discriminator (e.g. `createEntity`).
    pub event_type: String,
    /// Subject that caused the event.
    pub created_by: Uuid,
    /// Event timestamp.
    pub created_at: DateTime<Utc>,
    /// Type-specific payload as JSON.
    pub payload_json: String,
}

/// Input for appending an `events` row.
#[derive(Debug, Clone)]
pub struct NewEventRow {
    /// Explicit id override, used only when replaying sync events; `None`
    /// lets the backend auto-assign the next id.
    pub id: Option<i64>,
    /// Event type discriminator.
    pub event_type: String,
    /// Subject that caused the event.
    pub created_by: Uuid,
    /// Event timestamp.
    pub created_at: DateTime<Utc>,
    /// Type-specific payload as JSON.
    pub payload_json: String,
}

/// A row in the logical `schema_versions` table.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaVersionRow {
    /// Schema version number.
    pub version: u32,
    /// The full schema specification as JSON.
    pub spec_json: String,
    /// When this version was written.
    pub updated_at: DateTime<Utc>,
}

/// Filter for entity queries. Empty vectors mean "no filter".
#[derive(Debug, Clone, Default)]
pub struct EntityQueryFilter {
    /// Restrict to these entity types.
    pub entity_types: Vec<String>,
    /// Restrict to these statuses.
    pub statuses: Vec<EntityStatus>,
    /// Full-text filter against the latest view.
    pub text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        for status in [
            EntityStatus::Draft,
            EntityStatus::Published,
            EntityStatus::Modified,
            EntityStatus::Withdrawn,
            EntityStatus::Archived,
        ] {
            assert_eq!(EntityStatus::parse(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn status_parse_rejects_unknown() {
        assert!(EntityStatus::parse("deleted").is_err());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&EntityStatus::Withdrawn).unwrap();
        assert_eq!(json, "\"withdrawn\"");
    }
}
