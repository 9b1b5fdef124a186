//! Create and update operations.

use std::sync::Arc;

use uuid::Uuid;
use vellum_adapter::{
    AdapterQueries, EntityStatus, NewEntityRow, NewEntityVersionRow, RepoError, RepoResult,
};
use vellum_schema::Schema;

use crate::engine::name::{insert_with_unique_name, rename_with_unique_name};
use crate::engine::{
    append_event, derive_name, encode_fields, entity_view, latest_version, parse_fields,
    published_index_data, write_latest_derived, WriteOrigin,
};
use crate::entity::{Entity, EntityEffect, EntityOutcome};
use crate::event::{EntityWritePayload, SyncEventPayload};
use crate::normalize::{normalize_entity_fields, validate_for_publish};
use crate::reconcile::reconcile_unique_values;
use crate::session::{check_auth_key, AuthKeyResolver};
use crate::value::FieldMap;

/// Input to [`create_entity`]. The optional id and published name are
/// only set during replay.
#[derive(Debug, Clone)]
pub(crate) struct CreateSpec {
    pub id: Option<Uuid>,
    pub entity_type: String,
    pub fields: FieldMap,
    pub name: Option<String>,
    pub published_name: Option<String>,
    pub auth_key: Option<String>,
    pub publish: bool,
}

/// Input to [`update_entity`].
#[derive(Debug, Clone)]
pub(crate) struct UpdateSpec {
    pub id: Uuid,
    pub fields: FieldMap,
    pub name: Option<String>,
    pub published_name: Option<String>,
    pub auth_key: Option<String>,
    pub publish: bool,
}

/// Creates an entity with its first version inside the transaction.
pub(crate) fn create_entity<Q: AdapterQueries + ?Sized>(
    txn: &mut Q,
    schema: &Schema,
    published_schema: &Schema,
    resolver: &Arc<dyn AuthKeyResolver>,
    origin: &WriteOrigin,
    spec: CreateSpec,
) -> RepoResult<EntityOutcome> {
    let fields = normalize_entity_fields(schema, &spec.entity_type, &spec.fields)?;
    if spec.publish {
        validate_for_publish(published_schema, &spec.entity_type, &fields)?;
    }

    let requested_name = spec
        .name
        .or_else(|| derive_name(schema, &spec.entity_type, &fields))
        .unwrap_or_else(|| spec.entity_type.clone());
    let auth_key = spec.auth_key.unwrap_or_default();
    let resolved_auth_key = if auth_key.is_empty() {
        String::new()
    } else {
        resolver.resolve(&auth_key)?
    };

    let id = spec.id.unwrap_or_else(Uuid::new_v4);
    let (internal_id, name) = insert_with_unique_name(
        txn,
        NewEntityRow {
            id,
            entity_type: spec.entity_type.clone(),
            name: requested_name,
            auth_key: auth_key.clone(),
            resolved_auth_key,
            created_at: origin.now,
        },
        origin.replay,
    )?;

    let version_id = txn.version_insert(&NewEntityVersionRow {
        entity_internal_id: internal_id,
        version: 1,
        schema_version: schema.version(),
        created_at: origin.now,
        created_by: origin.created_by,
        fields_json: encode_fields(&fields)?,
    })?;

    let status = if spec.publish {
        EntityStatus::Published
    } else {
        EntityStatus::Draft
    };
    txn.entity_update_latest(internal_id, version_id, status, false, origin.now)?;

    let data = write_latest_derived(txn, schema, &spec.entity_type, internal_id, &fields)?;
    let (published_values, published_name) = if spec.publish {
        let published_data = published_index_data(published_schema, &spec.entity_type, &fields)?;
        txn.fts_set_published(internal_id, Some(&published_data.full_text))?;
        let base = spec.published_name.clone().unwrap_or_else(|| name.clone());
        let published_name = super::name::set_published_with_unique_name(
            txn,
            internal_id,
            version_id,
            &base,
            status,
            origin.now,
            origin.replay,
        )?;
        (Some(published_data.unique_values), Some(published_name))
    } else {
        (None, None)
    };

    let conflicts = reconcile_unique_values(
        txn,
        internal_id,
        Some(&data.unique_values),
        published_values.as_ref(),
    )?;
    if !conflicts.is_empty() {
        txn.entity_update_latest(internal_id, version_id, status, true, origin.now)?;
    }

    let payload = EntityWritePayload {
        entity_id: id,
        entity_type: spec.entity_type,
        name,
        published_name,
        auth_key,
        version: 1,
        schema_version: schema.version(),
        fields,
    };
    let payload = if spec.publish {
        SyncEventPayload::CreateAndPublishEntity(payload)
    } else {
        SyncEventPayload::CreateEntity(payload)
    };
    append_event(txn, origin, &payload, &[version_id])?;

    let effect = if spec.publish {
        EntityEffect::CreatedAndPublished
    } else {
        EntityEffect::Created
    };
    let entity = reload(txn, schema, id, version_id)?;
    Ok(EntityOutcome {
        entity,
        effect,
        conflicts,
    })
}

/// Stores a new version of an existing entity inside the transaction.
pub(crate) fn update_entity<Q: AdapterQueries + ?Sized>(
    txn: &mut Q,
    schema: &Schema,
    published_schema: &Schema,
    resolver: &Arc<dyn AuthKeyResolver>,
    origin: &WriteOrigin,
    spec: UpdateSpec,
) -> RepoResult<EntityOutcome> {
    let row = txn
        .entity_by_id(spec.id)?
        .ok_or_else(|| RepoError::not_found("Entity not found"))?;
    if row.status == EntityStatus::Archived {
        return Err(RepoError::bad_request("Entity is archived"));
    }
    if !origin.replay {
        check_auth_key(resolver, &row.resolved_auth_key, spec.auth_key.as_deref())?;
    }

    let fields = normalize_entity_fields(schema, &row.entity_type, &spec.fields)?;
    if spec.publish {
        validate_for_publish(published_schema, &row.entity_type, &fields)?;
    }

    let previous = latest_version(txn, &row)?;
    let name = resolve_updated_name(txn, schema, origin, &row, &previous, &spec, &fields)?;

    let version_id = txn.version_insert(&NewEntityVersionRow {
        entity_internal_id: row.internal_id,
        version: previous.version + 1,
        schema_version: schema.version(),
        created_at: origin.now,
        created_by: origin.created_by,
        fields_json: encode_fields(&fields)?,
    })?;

    let status = if spec.publish {
        EntityStatus::Published
    } else {
        match row.status {
            EntityStatus::Published | EntityStatus::Modified => EntityStatus::Modified,
            other => other,
        }
    };
    txn.entity_update_latest(row.internal_id, version_id, status, false, origin.now)?;

    let data = write_latest_derived(txn, schema, &row.entity_type, row.internal_id, &fields)?;
    let (published_values, published_name) = if spec.publish {
        let published_data = published_index_data(published_schema, &row.entity_type, &fields)?;
        txn.fts_set_published(row.internal_id, Some(&published_data.full_text))?;
        let base = spec
            .published_name
            .clone()
            .or_else(|| row.published_name.clone())
            .unwrap_or_else(|| name.clone());
        let published_name = super::name::set_published_with_unique_name(
            txn,
            row.internal_id,
            version_id,
            &base,
            status,
            origin.now,
            origin.replay,
        )?;
        (Some(published_data.unique_values), Some(published_name))
    } else {
        (None, None)
    };

    let conflicts = reconcile_unique_values(
        txn,
        row.internal_id,
        Some(&data.unique_values),
        published_values.as_ref(),
    )?;
    if !conflicts.is_empty() {
        txn.entity_update_latest(row.internal_id, version_id, status, true, origin.now)?;
    }

    let payload = EntityWritePayload {
        entity_id: row.id,
        entity_type: row.entity_type.clone(),
        name,
        published_name,
        auth_key: row.auth_key.clone(),
        version: previous.version + 1,
        schema_version: schema.version(),
        fields,
    };
    let payload = if spec.publish {
        SyncEventPayload::UpdateAndPublishEntity(payload)
    } else {
        SyncEventPayload::UpdateEntity(payload)
    };
    append_event(txn, origin, &payload, &[version_id])?;

    let effect = if spec.publish {
        EntityEffect::UpdatedAndPublished
    } else {
        EntityEffect::Updated
    };
    let entity = reload(txn, schema, row.id, version_id)?;
    Ok(EntityOutcome {
        entity,
        effect,
        conflicts,
    })
}

/// Decides the entity name after an update and applies a rename if it
/// changed.
///
/// An explicit name wins. Without one, the name is re-derived from the
/// type's name field only when that derivation changed between the
/// previous and the new fields, so suffix-randomized and hand-picked
/// names survive unrelated edits.
fn resolve_updated_name<Q: AdapterQueries + ?Sized>(
    txn: &mut Q,
    schema: &Schema,
    origin: &WriteOrigin,
    row: &vellum_adapter::EntityRow,
    previous: &vellum_adapter::EntityVersionRow,
    spec: &UpdateSpec,
    fields: &FieldMap,
) -> RepoResult<String> {
    let target = match &spec.name {
        Some(name) => Some(name.clone()),
        None => {
            let (_, previous_fields) = crate::migrate::migrate_entity_fields(
                schema,
                previous.schema_version,
                &row.entity_type,
                parse_fields(&previous.fields_json)?,
            )?;
            let old_derived = derive_name(schema, &row.entity_type, &previous_fields);
            let new_derived = derive_name(schema, &row.entity_type, fields);
            match (old_derived, new_derived) {
                (old, Some(new)) if old.as_deref() != Some(&new) => Some(new),
                _ => None,
            }
        }
    };
    match target {
        Some(name) if name != row.name => {
            rename_with_unique_name(txn, row.internal_id, &name, origin.replay)
        }
        _ => Ok(row.name.clone()),
    }
}

fn reload<Q: AdapterQueries + ?Sized>(
    txn: &mut Q,
    schema: &Schema,
    id: Uuid,
    version_id: i64,
) -> RepoResult<Entity> {
    let row = txn
        .entity_by_id(id)?
        .ok_or_else(|| RepoError::generic(format!("entity {id} missing after write")))?;
    let version = txn.version_by_id(version_id)?;
    entity_view(schema, &row, &version)
}
