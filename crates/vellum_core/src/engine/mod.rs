//! The entity lifecycle engine.
//!
//! Transaction-scoped mutation functions: each takes an open adapter
//! transaction, the current schema pair, and a [`WriteOrigin`], performs
//! every row write of one logical operation, and appends exactly one
//! event (or none for no-op transitions). The repository facade wraps
//! them in transactions and sessions.

pub(crate) mod archive;
pub(crate) mod name;
pub(crate) mod publish;
pub(crate) mod write;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;
use vellum_adapter::{
    AdapterQueries, EntityRow, EntityVersionRow, NewEventRow, RepoError, RepoResult,
};
use vellum_schema::Schema;

use crate::collect::{collect_index_data, EntityIndexData};
use crate::entity::Entity;
use crate::event::SyncEventPayload;
use crate::migrate::migrate_entity_fields;
use crate::value::{FieldMap, FieldValue};

/// Who and when is writing, and whether this is a sync replay.
///
/// Replays carry the original subject, timestamp and event id, and
/// disable name randomization so the target converges on the source's
/// exact state.
#[derive(Debug, Clone, Copy)]
pub struct WriteOrigin {
    /// Subject performing the write.
    pub created_by: Uuid,
    /// Timestamp recorded on every row this write touches.
    pub now: DateTime<Utc>,
    /// Explicit event id, set only during replay.
    pub event_id: Option<i64>,
    /// True while replaying sync events.
    pub replay: bool,
}

impl WriteOrigin {
    /// A live write by `created_by` at the current time.
    pub fn live(created_by: Uuid) -> Self {
        Self {
            created_by,
            now: Utc::now(),
            event_id: None,
            replay: false,
        }
    }

    /// A replayed write using the original event's envelope.
    pub fn replay(created_by: Uuid, now: DateTime<Utc>, event_id: i64) -> Self {
        Self {
            created_by,
            now,
            event_id: Some(event_id),
            replay: true,
        }
    }
}

pub(crate) fn parse_fields(json: &str) -> RepoResult<FieldMap> {
    serde_json::from_str(json)
        .map_err(|e| RepoError::generic(format!("corrupt stored field values: {e}")))
}

pub(crate) fn encode_fields(fields: &FieldMap) -> RepoResult<String> {
    serde_json::to_string(fields)
        .map_err(|e| RepoError::generic(format!("failed to encode field values: {e}")))
}

/// Builds the client view of an entity at one version, migrating the
/// stored fields to the current schema.
pub(crate) fn entity_view(
    schema: &Schema,
    row: &EntityRow,
    version: &EntityVersionRow,
) -> RepoResult<Entity> {
    let fields = parse_fields(&version.fields_json)?;
    let (entity_type, fields) =
        migrate_entity_fields(schema, version.schema_version, &row.entity_type, fields)?;
    Ok(Entity {
        id: row.id,
        entity_type,
        name: row.name.clone(),
        published_name: row.published_name.clone(),
        status: row.status,
        never_published: row.never_published,
        dirty: row.dirty,
        version: version.version,
        created_at: row.created_at,
        updated_at: row.updated_at,
        fields,
    })
}

/// Loads the latest version row of an entity.
pub(crate) fn latest_version<Q: AdapterQueries + ?Sized>(
    txn: &mut Q,
    row: &EntityRow,
) -> RepoResult<EntityVersionRow> {
    let version_id = row
        .latest_version_id
        .ok_or_else(|| RepoError::generic(format!("entity {} has no latest version", row.id)))?;
    txn.version_by_id(version_id)
}

/// Recomputes and stores all latest-view derived rows (full text,
/// outgoing references, embedded component types) for an entity.
///
/// Fails with `BadRequest` when the content references entities that do
/// not exist or whose type a restricted reference field does not allow.
pub(crate) fn write_latest_derived<Q: AdapterQueries + ?Sized>(
    txn: &mut Q,
    schema: &Schema,
    entity_type: &str,
    internal_id: i64,
    fields: &FieldMap,
) -> RepoResult<EntityIndexData> {
    let type_spec = schema
        .entity_type(entity_type)
        .ok_or_else(|| RepoError::bad_request(format!("Unknown entity type {entity_type}")))?;
    let data = collect_index_data(schema, type_spec, fields);

    let reference_ids = if data.references.is_empty() {
        Vec::new()
    } else {
        let resolved = txn.entity_refs(&data.references)?;
        if resolved.len() != data.references.len() {
            let found: BTreeSet<Uuid> = resolved.iter().map(|row| row.id).collect();
            let missing: Vec<String> = data
                .references
                .iter()
                .filter(|id| !found.contains(id))
                .map(ToString::to_string)
                .collect();
            return Err(RepoError::bad_request(format!(
                "Unknown referenced entities: {}",
                missing.join(", ")
            )));
        }
        let types_by_id: BTreeMap<Uuid, &str> = resolved
            .iter()
            .map(|row| (row.id, row.entity_type.as_str()))
            .collect();
        for typed in &data.typed_references {
            let Some(target_type) = types_by_id.get(&typed.id) else {
                continue;
            };
            if !typed.allowed_types.iter().any(|t| t == target_type) {
                return Err(RepoError::bad_request(format!(
                    "Field {} cannot reference {} entity {}",
                    typed.field, target_type, typed.id
                )));
            }
        }
        resolved.into_iter().map(|row| row.internal_id).collect()
    };

    txn.references_set_latest(internal_id, &reference_ids)?;
    txn.fts_set_latest(internal_id, &data.full_text)?;
    let component_types: Vec<String> = data.component_types.iter().cloned().collect();
    txn.component_types_set_latest(internal_id, &component_types)?;
    Ok(data)
}

/// Collects index data for the published view of an entity's fields.
///
/// Runs under the published schema, so admin-only types and fields do
/// not contribute.
pub(crate) fn published_index_data(
    published_schema: &Schema,
    entity_type: &str,
    fields: &FieldMap,
) -> RepoResult<EntityIndexData> {
    let type_spec = published_schema.entity_type(entity_type).ok_or_else(|| {
        RepoError::bad_request(format!("Entity type {entity_type} cannot be published"))
    })?;
    Ok(collect_index_data(published_schema, type_spec, fields))
}

/// Derives an entity name from the type's name field, if configured and
/// holding a non-empty string.
pub(crate) fn derive_name(schema: &Schema, entity_type: &str, fields: &FieldMap) -> Option<String> {
    let type_spec = schema.entity_type(entity_type)?;
    let name_field = type_spec.name_field.as_deref()?;
    match fields.get(name_field) {
        Some(FieldValue::String(name)) if !name.is_empty() => Some(name.clone()),
        _ => None,
    }
}

/// Appends one event for this write, linking the version rows it
/// affected. During replay the original event id is carried over.
pub(crate) fn append_event<Q: AdapterQueries + ?Sized>(
    txn: &mut Q,
    origin: &WriteOrigin,
    payload: &SyncEventPayload,
    version_ids: &[i64],
) -> RepoResult<i64> {
    let row = NewEventRow {
        id: origin.event_id,
        event_type: payload.event_type().to_owned(),
        created_by: origin.created_by,
        created_at: origin.now,
        payload_json: payload.to_stored_json()?,
    };
    txn.event_insert(&row, version_ids)
}
