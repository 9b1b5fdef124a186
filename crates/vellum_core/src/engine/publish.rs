//! Publish and unpublish transitions.
//!
//! Both are pointer-only: no new version row is ever written here. The
//! published pointer, published name, status, published-view unique
//! values and published full text move together in one transaction.

use std::collections::BTreeMap;

use vellum_adapter::{AdapterQueries, EntityStatus, RepoError, RepoResult};
use vellum_schema::Schema;

use crate::engine::name::set_published_with_unique_name;
use crate::engine::{
    entity_view, latest_version, parse_fields, published_index_data, WriteOrigin,
};
use crate::entity::{EntityEffect, EntityOutcome, PublishEntityRequest};
use crate::event::PublishedEntityRef;
use crate::migrate::migrate_entity_fields;
use crate::normalize::validate_for_publish;
use crate::reconcile::reconcile_unique_values;

/// Repoints one entity's published pointer inside the transaction.
///
/// Returns the outcome plus, when the pointer actually moved, the event
/// contribution (the published ref and the affected version row id).
pub(crate) fn publish_one<Q: AdapterQueries + ?Sized>(
    txn: &mut Q,
    schema: &Schema,
    published_schema: &Schema,
    origin: &WriteOrigin,
    request: &PublishEntityRequest,
    published_name_override: Option<&str>,
) -> RepoResult<(EntityOutcome, Option<(PublishedEntityRef, i64)>)> {
    let row = txn
        .entity_by_id(request.id)?
        .ok_or_else(|| RepoError::not_found("Entity not found"))?;
    if row.status == EntityStatus::Archived {
        return Err(RepoError::bad_request("Entity is archived"));
    }

    let target = match request.version {
        Some(version) => txn
            .version_by_number(row.internal_id, version)?
            .ok_or_else(|| RepoError::not_found("Entity version not found"))?,
        None => latest_version(txn, &row)?,
    };

    if row.published_version_id == Some(target.id) {
        let latest = latest_version(txn, &row)?;
        return Ok((
            EntityOutcome {
                entity: entity_view(schema, &row, &latest)?,
                effect: EntityEffect::None,
                conflicts: Vec::new(),
            },
            None,
        ));
    }

    let (entity_type, fields) = migrate_entity_fields(
        schema,
        target.schema_version,
        &row.entity_type,
        parse_fields(&target.fields_json)?,
    )?;
    validate_for_publish(published_schema, &entity_type, &fields)?;
    let published_data = published_index_data(published_schema, &entity_type, &fields)?;

    let status = if row.latest_version_id == Some(target.id) {
        EntityStatus::Published
    } else {
        EntityStatus::Modified
    };
    let base = published_name_override
        .map(ToOwned::to_owned)
        .or_else(|| row.published_name.clone())
        .unwrap_or_else(|| row.name.clone());
    let published_name = set_published_with_unique_name(
        txn,
        row.internal_id,
        target.id,
        &base,
        status,
        origin.now,
        origin.replay,
    )?;

    txn.fts_set_published(row.internal_id, Some(&published_data.full_text))?;
    let conflicts = reconcile_unique_values(
        txn,
        row.internal_id,
        None,
        Some(&published_data.unique_values),
    )?;
    if !conflicts.is_empty() {
        if let Some(latest_id) = row.latest_version_id {
            txn.entity_update_latest(row.internal_id, latest_id, status, true, origin.now)?;
        }
    }

    let refreshed = txn
        .entity_by_id(request.id)?
        .ok_or_else(|| RepoError::generic("entity missing after publish"))?;
    let latest = latest_version(txn, &refreshed)?;
    Ok((
        EntityOutcome {
            entity: entity_view(schema, &refreshed, &latest)?,
            effect: EntityEffect::Published,
            conflicts,
        },
        Some((
            PublishedEntityRef {
                entity_id: row.id,
                version: target.version,
                published_name: Some(published_name),
            },
            target.id,
        )),
    ))
}

/// Clears one entity's published pointer inside the transaction.
///
/// Returns the outcome plus, when something was actually unpublished,
/// the entity's public id for the event payload.
pub(crate) fn unpublish_one<Q: AdapterQueries + ?Sized>(
    txn: &mut Q,
    schema: &Schema,
    origin: &WriteOrigin,
    id: uuid::Uuid,
) -> RepoResult<(EntityOutcome, Option<uuid::Uuid>)> {
    let row = txn
        .entity_by_id(id)?
        .ok_or_else(|| RepoError::not_found("Entity not found"))?;
    if !matches!(
        row.status,
        EntityStatus::Published | EntityStatus::Modified
    ) {
        return Err(RepoError::bad_request("Entity is not published"));
    }

    let status = if row.never_published {
        EntityStatus::Draft
    } else {
        EntityStatus::Withdrawn
    };
    txn.entity_update_published(row.internal_id, None, None, status, origin.now)?;
    txn.fts_set_published(row.internal_id, None)?;
    let conflicts =
        reconcile_unique_values(txn, row.internal_id, None, Some(&BTreeMap::new()))?;

    let refreshed = txn
        .entity_by_id(id)?
        .ok_or_else(|| RepoError::generic("entity missing after unpublish"))?;
    let latest = latest_version(txn, &refreshed)?;
    Ok((
        EntityOutcome {
            entity: entity_view(schema, &refreshed, &latest)?,
            effect: EntityEffect::Unpublished,
            conflicts,
        },
        Some(row.id),
    ))
}
