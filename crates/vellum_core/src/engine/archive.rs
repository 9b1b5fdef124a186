//! Archive and unarchive transitions. Status-only, never a new version.

use uuid::Uuid;
use vellum_adapter::{AdapterQueries, EntityStatus, RepoError, RepoResult};
use vellum_schema::Schema;

use crate::engine::{append_event, entity_view, latest_version, WriteOrigin};
use crate::entity::{EntityEffect, EntityOutcome};
use crate::event::SyncEventPayload;

/// Archives an entity. Idempotent: archiving an archived entity is a
/// no-op with effect `None` and no event.
pub(crate) fn archive_entity<Q: AdapterQueries + ?Sized>(
    txn: &mut Q,
    schema: &Schema,
    origin: &WriteOrigin,
    id: Uuid,
) -> RepoResult<EntityOutcome> {
    let row = txn
        .entity_by_id(id)?
        .ok_or_else(|| RepoError::not_found("Entity not found"))?;
    match row.status {
        EntityStatus::Archived => {
            let latest = latest_version(txn, &row)?;
            return Ok(EntityOutcome {
                entity: entity_view(schema, &row, &latest)?,
                effect: EntityEffect::None,
                conflicts: Vec::new(),
            });
        }
        EntityStatus::Published | EntityStatus::Modified => {
            return Err(RepoError::bad_request("Entity is published"));
        }
        EntityStatus::Draft | EntityStatus::Withdrawn => {}
    }

    txn.entity_update_status(row.internal_id, EntityStatus::Archived, origin.now)?;
    append_event(
        txn,
        origin,
        &SyncEventPayload::ArchiveEntity { entity_id: id },
        &[],
    )?;

    let refreshed = txn
        .entity_by_id(id)?
        .ok_or_else(|| RepoError::generic("entity missing after archive"))?;
    let latest = latest_version(txn, &refreshed)?;
    Ok(EntityOutcome {
        entity: entity_view(schema, &refreshed, &latest)?,
        effect: EntityEffect::Archived,
        conflicts: Vec::new(),
    })
}

/// Unarchives an entity. A previously published entity returns to
/// withdrawn, never straight to draft.
pub(crate) fn unarchive_entity<Q: AdapterQueries + ?Sized>(
    txn: &mut Q,
    schema: &Schema,
    origin: &WriteOrigin,
    id: Uuid,
) -> RepoResult<EntityOutcome> {
    let row = txn
        .entity_by_id(id)?
        .ok_or_else(|| RepoError::not_found("Entity not found"))?;
    if row.status != EntityStatus::Archived {
        return Err(RepoError::bad_request("Entity is not archived"));
    }

    let status = if row.never_published {
        EntityStatus::Draft
    } else {
        EntityStatus::Withdrawn
    };
    txn.entity_update_status(row.internal_id, status, origin.now)?;
    append_event(
        txn,
        origin,
        &SyncEventPayload::UnarchiveEntity { entity_id: id },
        &[],
    )?;

    let refreshed = txn
        .entity_by_id(id)?
        .ok_or_else(|| RepoError::generic("entity missing after unarchive"))?;
    let latest = latest_version(txn, &refreshed)?;
    Ok(EntityOutcome {
        entity: entity_view(schema, &refreshed, &latest)?,
        effect: EntityEffect::Unarchived,
        conflicts: Vec::new(),
    })
}
