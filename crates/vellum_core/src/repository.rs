//! The repository client facade.
//!
//! One long-lived `Repository` instance per process owns the database
//! adapter, the authorization-key resolver and the schema cache, and
//! exposes the full client operation surface. Every mutation runs inside
//! exactly one adapter transaction and appends its sync event there, so
//! partial application is never observable.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, warn};
use uuid::Uuid;
use vellum_adapter::{
    decode_cursor, encode_cursor, with_transaction, AdapterQueries, DatabaseAdapter,
    EntityQueryFilter, EntityStatus, RepoError, RepoResult, SchemaVersionRow,
};
use vellum_schema::{MigrationAction, Schema, SchemaSpecification, SchemaSpecificationUpdate, TypeKind};

use crate::engine::archive::{archive_entity, unarchive_entity};
use crate::engine::publish::{publish_one, unpublish_one};
use crate::engine::write::{create_entity, update_entity, CreateSpec, UpdateSpec};
use crate::engine::{append_event, entity_view, latest_version, WriteOrigin};
use crate::entity::{
    ChangelogEvent, CreateEntityRequest, Entity, EntityLookup, EntityOutcome, EntityPage,
    EntitySample, GetEntitiesRequest, PublishEntityRequest, SampleEntitiesRequest,
    UpdateEntityRequest, UpsertEntityRequest,
};
use crate::event::{SyncEvent, SyncEventPayload};
use crate::lock::{with_advisory_lock, LockOptions};
use crate::session::{check_auth_key, AuthKeyResolver, PassthroughAuthKeys, Session};

/// Advisory lock name serializing schema updates across processes.
const SCHEMA_LOCK: &str = "vellum.schema-update";

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 500;

/// The current schema and its derived published view, cached by version.
#[derive(Debug)]
pub(crate) struct SchemaPair {
    pub schema: Schema,
    pub published: Schema,
}

/// The client surface over one database adapter.
pub struct Repository {
    adapter: Arc<dyn DatabaseAdapter>,
    resolver: Arc<dyn AuthKeyResolver>,
    schema_cache: RwLock<Option<Arc<SchemaPair>>>,
}

impl Repository {
    /// Creates a repository over an adapter with passthrough
    /// authorization keys.
    pub fn new(adapter: Arc<dyn DatabaseAdapter>) -> Self {
        Self {
            adapter,
            resolver: Arc::new(PassthroughAuthKeys),
            schema_cache: RwLock::new(None),
        }
    }

    /// Replaces the authorization-key resolver.
    pub fn with_auth_key_resolver(mut self, resolver: Arc<dyn AuthKeyResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    // --- sessions ---

    /// Creates a session for an external principal, upserting its
    /// subject row.
    pub fn create_session(
        &self,
        provider: &str,
        identifier: &str,
        readonly: bool,
    ) -> RepoResult<Session> {
        let subject_id = self.adapter.queries()?.subject_ensure(
            provider,
            identifier,
            Uuid::new_v4(),
            Utc::now(),
        )?;
        Ok(Session {
            subject_id,
            readonly,
        })
    }

    // --- schema ---

    /// Returns the current schema specification.
    pub fn get_schema_specification(&self) -> RepoResult<SchemaSpecification> {
        Ok(self.schema_pair()?.schema.spec().clone())
    }

    /// Applies a schema update, producing a new schema version.
    ///
    /// Serialized across processes with an advisory lock. A no-op update
    /// returns the current specification without bumping the version or
    /// appending an event. Deleting an entity type is rejected while
    /// entities of that type exist.
    pub fn update_schema_specification(
        &self,
        session: &Session,
        update: &SchemaSpecificationUpdate,
    ) -> RepoResult<SchemaSpecification> {
        session.require_writable("update schema")?;
        let origin = WriteOrigin::live(session.subject_id);
        let spec = with_advisory_lock(
            self.adapter.as_ref(),
            SCHEMA_LOCK,
            LockOptions::default(),
            || {
                with_transaction(self.adapter.as_ref(), |txn| {
                    let row = txn.schema_latest()?;
                    let pair = self.schema_pair_from_row(row)?;
                    let result = pair
                        .schema
                        .apply_update(update)
                        .map_err(|e| RepoError::bad_request(e.to_string()))?;
                    if !result.changed {
                        debug!("schema update changed nothing");
                        return Ok(pair.schema.spec().clone());
                    }

                    for action in &result.actions {
                        if let MigrationAction::DeleteType {
                            kind: TypeKind::Entity,
                            name,
                        } = action
                        {
                            let filter = EntityQueryFilter {
                                entity_types: vec![name.clone()],
                                ..EntityQueryFilter::default()
                            };
                            if txn.entity_count(&filter)? > 0 {
                                return Err(RepoError::bad_request(format!(
                                    "Entity type {name} still has entities"
                                )));
                            }
                        }
                    }
                    apply_schema_impact(txn, &result.actions)?;

                    let spec = result.schema.spec().clone();
                    let spec_json = serde_json::to_string(&spec).map_err(|e| {
                        RepoError::generic(format!("failed to encode schema: {e}"))
                    })?;
                    txn.schema_insert(spec.version, &spec_json, origin.now)?;
                    append_event(
                        txn,
                        &origin,
                        &SyncEventPayload::UpdateSchema {
                            specification: spec.clone(),
                        },
                        &[],
                    )?;
                    Ok(spec)
                })
            },
        )?;
        self.invalidate_schema_cache();
        Ok(spec)
    }

    // --- entity mutations ---

    /// Creates an entity; publishes it in the same transaction when
    /// requested.
    pub fn create_entity(
        &self,
        session: &Session,
        request: CreateEntityRequest,
    ) -> RepoResult<EntityOutcome> {
        session.require_writable("create entity")?;
        let pair = self.schema_pair()?;
        let origin = WriteOrigin::live(session.subject_id);
        with_transaction(self.adapter.as_ref(), |txn| {
            create_entity(
                txn,
                &pair.schema,
                &pair.published,
                &self.resolver,
                &origin,
                CreateSpec {
                    id: None,
                    entity_type: request.entity_type,
                    fields: request.fields,
                    name: request.name,
                    published_name: None,
                    auth_key: request.auth_key,
                    publish: request.publish,
                },
            )
        })
    }

    /// Stores a new version of an entity.
    pub fn update_entity(
        &self,
        session: &Session,
        request: UpdateEntityRequest,
    ) -> RepoResult<EntityOutcome> {
        session.require_writable("update entity")?;
        let pair = self.schema_pair()?;
        let origin = WriteOrigin::live(session.subject_id);
        with_transaction(self.adapter.as_ref(), |txn| {
            update_entity(
                txn,
                &pair.schema,
                &pair.published,
                &self.resolver,
                &origin,
                UpdateSpec {
                    id: request.id,
                    fields: request.fields,
                    name: request.name,
                    published_name: None,
                    auth_key: request.auth_key,
                    publish: request.publish,
                },
            )
        })
    }

    /// Updates the entity owning a unique-index value, or creates a new
    /// one when the value has no owner.
    pub fn upsert_entity(
        &self,
        session: &Session,
        request: UpsertEntityRequest,
    ) -> RepoResult<EntityOutcome> {
        session.require_writable("upsert entity")?;
        let pair = self.schema_pair()?;
        let origin = WriteOrigin::live(session.subject_id);
        with_transaction(self.adapter.as_ref(), |txn| {
            match txn.unique_value_lookup(&request.index_name, &request.value)? {
                Some(owner) => {
                    let row = txn
                        .entity_by_internal_id(owner.entity_internal_id)?
                        .ok_or_else(|| RepoError::generic("unique value owner missing"))?;
                    update_entity(
                        txn,
                        &pair.schema,
                        &pair.published,
                        &self.resolver,
                        &origin,
                        UpdateSpec {
                            id: row.id,
                            fields: request.fields,
                            name: None,
                            published_name: None,
                            auth_key: request.auth_key,
                            publish: request.publish,
                        },
                    )
                }
                None => create_entity(
                    txn,
                    &pair.schema,
                    &pair.published,
                    &self.resolver,
                    &origin,
                    CreateSpec {
                        id: None,
                        entity_type: request.entity_type,
                        fields: request.fields,
                        name: request.name,
                        published_name: None,
                        auth_key: request.auth_key,
                        publish: request.publish,
                    },
                ),
            }
        })
    }

    /// Repoints published pointers; one event covers the whole batch.
    pub fn publish_entities(
        &self,
        session: &Session,
        requests: &[PublishEntityRequest],
    ) -> RepoResult<Vec<EntityOutcome>> {
        session.require_writable("publish entities")?;
        let pair = self.schema_pair()?;
        let origin = WriteOrigin::live(session.subject_id);
        with_transaction(self.adapter.as_ref(), |txn| {
            let mut outcomes = Vec::with_capacity(requests.len());
            let mut refs = Vec::new();
            let mut version_ids = Vec::new();
            for request in requests {
                let (outcome, contribution) =
                    publish_one(txn, &pair.schema, &pair.published, &origin, request, None)?;
                if let Some((published_ref, version_id)) = contribution {
                    refs.push(published_ref);
                    version_ids.push(version_id);
                }
                outcomes.push(outcome);
            }
            if !refs.is_empty() {
                append_event(
                    txn,
                    &origin,
                    &SyncEventPayload::PublishEntities { entities: refs },
                    &version_ids,
                )?;
            }
            Ok(outcomes)
        })
    }

    /// Clears published pointers; one event covers the whole batch.
    pub fn unpublish_entities(
        &self,
        session: &Session,
        ids: &[Uuid],
    ) -> RepoResult<Vec<EntityOutcome>> {
        session.require_writable("unpublish entities")?;
        let pair = self.schema_pair()?;
        let origin = WriteOrigin::live(session.subject_id);
        with_transaction(self.adapter.as_ref(), |txn| {
            let mut outcomes = Vec::with_capacity(ids.len());
            let mut entity_ids = Vec::new();
            for id in ids {
                let (outcome, unpublished) = unpublish_one(txn, &pair.schema, &origin, *id)?;
                if let Some(id) = unpublished {
                    entity_ids.push(id);
                }
                outcomes.push(outcome);
            }
            if !entity_ids.is_empty() {
                append_event(
                    txn,
                    &origin,
                    &SyncEventPayload::UnpublishEntities { entity_ids },
                    &[],
                )?;
            }
            Ok(outcomes)
        })
    }

    /// Archives an entity.
    pub fn archive_entity(&self, session: &Session, id: Uuid) -> RepoResult<EntityOutcome> {
        session.require_writable("archive entity")?;
        let pair = self.schema_pair()?;
        let origin = WriteOrigin::live(session.subject_id);
        with_transaction(self.adapter.as_ref(), |txn| {
            archive_entity(txn, &pair.schema, &origin, id)
        })
    }

    /// Unarchives an entity.
    pub fn unarchive_entity(&self, session: &Session, id: Uuid) -> RepoResult<EntityOutcome> {
        session.require_writable("unarchive entity")?;
        let pair = self.schema_pair()?;
        let origin = WriteOrigin::live(session.subject_id);
        with_transaction(self.adapter.as_ref(), |txn| {
            unarchive_entity(txn, &pair.schema, &origin, id)
        })
    }

    // --- entity reads ---

    /// Looks up a single entity.
    pub fn get_entity(&self, lookup: &EntityLookup, auth_key: Option<&str>) -> RepoResult<Entity> {
        let pair = self.schema_pair()?;
        let mut queries = self.adapter.queries()?;
        let queries = &mut *queries;

        let (row, version) = match lookup {
            EntityLookup::Id(id) => {
                let row = queries
                    .entity_by_id(*id)?
                    .ok_or_else(|| RepoError::not_found("Entity not found"))?;
                let version = latest_version(queries, &row)?;
                (row, version)
            }
            EntityLookup::IdVersion { id, version } => {
                let row = queries
                    .entity_by_id(*id)?
                    .ok_or_else(|| RepoError::not_found("Entity not found"))?;
                let version = queries
                    .version_by_number(row.internal_id, *version)?
                    .ok_or_else(|| RepoError::not_found("Entity version not found"))?;
                (row, version)
            }
            EntityLookup::UniqueValue { index_name, value } => {
                let owner = queries
                    .unique_value_lookup(index_name, value)?
                    .ok_or_else(|| RepoError::not_found("Entity not found"))?;
                let row = queries
                    .entity_by_internal_id(owner.entity_internal_id)?
                    .ok_or_else(|| RepoError::generic("unique value owner missing"))?;
                let version = latest_version(queries, &row)?;
                (row, version)
            }
        };
        check_auth_key(&self.resolver, &row.resolved_auth_key, auth_key)?;
        entity_view(&pair.schema, &row, &version)
    }

    /// Returns a filtered, paged entity listing with a stable total.
    pub fn get_entities(&self, request: GetEntitiesRequest) -> RepoResult<EntityPage> {
        let pair = self.schema_pair()?;
        let mut queries = self.adapter.queries()?;
        let queries = &mut *queries;

        let filter = EntityQueryFilter {
            entity_types: request.entity_types,
            statuses: expand_statuses(request.statuses),
            text: request.text,
        };
        let total = queries.entity_count(&filter)?;
        let after = request.after.as_deref().map(decode_cursor).transpose()?;
        let limit = clamp_limit(request.limit);

        let mut rows = queries.entity_page(&filter, after, limit + 1)?;
        let has_more = rows.len() > limit;
        rows.truncate(limit);
        let next = if has_more {
            rows.last().map(|row| encode_cursor(row.internal_id))
        } else {
            None
        };

        let supplied = self.resolve_supplied_key(request.auth_key.as_deref())?;
        let mut entities = Vec::with_capacity(rows.len());
        for row in rows {
            if !key_visible(&row.resolved_auth_key, supplied.as_deref()) {
                continue;
            }
            let version = latest_version(queries, &row)?;
            entities.push(entity_view(&pair.schema, &row, &version)?);
        }
        Ok(EntityPage {
            entities,
            total,
            next,
        })
    }

    /// Returns a seeded random sample with a stable total count.
    ///
    /// The same seed over unchanged data yields the same sample.
    pub fn sample_entities(&self, request: SampleEntitiesRequest) -> RepoResult<EntitySample> {
        let pair = self.schema_pair()?;
        let mut queries = self.adapter.queries()?;
        let queries = &mut *queries;

        let filter = EntityQueryFilter {
            entity_types: request.entity_types,
            statuses: expand_statuses(request.statuses),
            text: None,
        };
        let total = queries.entity_count(&filter)?;
        let amount = request.count.min(total.max(0) as usize);
        if amount == 0 {
            return Ok(EntitySample {
                entities: Vec::new(),
                total,
            });
        }

        let mut rng = StdRng::seed_from_u64(request.seed);
        let mut offsets = rand::seq::index::sample(&mut rng, total as usize, amount).into_vec();
        offsets.sort_unstable();

        let supplied = self.resolve_supplied_key(request.auth_key.as_deref())?;
        let mut entities = Vec::with_capacity(amount);
        for offset in offsets {
            let Some(row) = queries.entity_at_offset(&filter, offset as i64)? else {
                // Data changed between count and fetch.
                continue;
            };
            if !key_visible(&row.resolved_auth_key, supplied.as_deref()) {
                continue;
            }
            let version = latest_version(queries, &row)?;
            entities.push(entity_view(&pair.schema, &row, &version)?);
        }
        Ok(EntitySample { entities, total })
    }

    // --- changelog and sync ---

    /// Returns changelog events in id order, optionally restricted to
    /// one entity.
    pub fn get_changelog_events(
        &self,
        entity_id: Option<Uuid>,
        after_id: i64,
        limit: usize,
    ) -> RepoResult<Vec<ChangelogEvent>> {
        let mut queries = self.adapter.queries()?;
        let entity_internal_id = match entity_id {
            Some(id) => Some(
                queries
                    .entity_by_id(id)?
                    .ok_or_else(|| RepoError::not_found("Entity not found"))?
                    .internal_id,
            ),
            None => None,
        };
        let rows = queries.events_page(entity_internal_id, after_id, clamp_limit(limit))?;
        Ok(rows
            .into_iter()
            .map(|row| ChangelogEvent {
                id: row.id,
                event_type: row.event_type,
                created_by: row.created_by,
                created_at: row.created_at,
            })
            .collect())
    }

    /// The id of the newest sync event, or 0 for an empty log.
    pub fn sync_head(&self) -> RepoResult<i64> {
        self.adapter.queries()?.event_head()
    }

    /// Returns sync events in id order after the given cursor.
    pub fn get_sync_events(&self, after_id: i64, limit: usize) -> RepoResult<Vec<SyncEvent>> {
        let rows = self
            .adapter
            .queries()?
            .events_page(None, after_id, clamp_limit(limit))?;
        rows.iter().map(SyncEvent::from_row).collect()
    }

    /// Re-executes one sync event from another instance.
    ///
    /// Fails with `Conflict` when `expected_head` does not match this
    /// instance's current head, giving strict ordered replay. The event
    /// is applied with its original id, subject and timestamps.
    pub fn apply_sync_event(&self, expected_head: i64, event: &SyncEvent) -> RepoResult<()> {
        let result = with_transaction(self.adapter.as_ref(), |txn| {
            let head = txn.event_head()?;
            if head != expected_head {
                return Err(RepoError::conflict(format!(
                    "sync head mismatch: expected {expected_head}, found {head}"
                )));
            }
            txn.subject_ensure_id(event.created_by, event.created_at)?;
            let origin = WriteOrigin::replay(event.created_by, event.created_at, event.id);
            self.replay_payload(txn, &origin, event)
        });
        if result.is_ok() && matches!(event.payload, SyncEventPayload::UpdateSchema { .. }) {
            self.invalidate_schema_cache();
        }
        result
    }

    /// Runs `f` while holding a named advisory lock.
    pub fn with_advisory_lock<T>(
        &self,
        name: &str,
        options: LockOptions,
        f: impl FnOnce() -> RepoResult<T>,
    ) -> RepoResult<T> {
        with_advisory_lock(self.adapter.as_ref(), name, options, f)
    }

    // --- internals ---

    fn replay_payload<Q: AdapterQueries + ?Sized>(
        &self,
        txn: &mut Q,
        origin: &WriteOrigin,
        event: &SyncEvent,
    ) -> RepoResult<()> {
        match &event.payload {
            SyncEventPayload::UpdateSchema { specification } => {
                let schema = Schema::new(specification.clone()).map_err(|e| {
                    RepoError::generic(format!("invalid replicated schema: {e}"))
                })?;
                let actions: Vec<MigrationAction> = schema
                    .spec()
                    .migrations
                    .iter()
                    .filter(|batch| batch.version == specification.version)
                    .flat_map(|batch| batch.actions.clone())
                    .collect();
                apply_schema_impact(txn, &actions)?;
                let spec_json = serde_json::to_string(specification)
                    .map_err(|e| RepoError::generic(format!("failed to encode schema: {e}")))?;
                txn.schema_insert(specification.version, &spec_json, origin.now)?;
                append_event(txn, origin, &event.payload, &[])?;
                Ok(())
            }
            SyncEventPayload::CreateEntity(payload)
            | SyncEventPayload::CreateAndPublishEntity(payload) => {
                let pair = self.schema_pair_in(txn)?;
                let publish = matches!(
                    event.payload,
                    SyncEventPayload::CreateAndPublishEntity(_)
                );
                create_entity(
                    txn,
                    &pair.schema,
                    &pair.published,
                    &self.resolver,
                    origin,
                    CreateSpec {
                        id: Some(payload.entity_id),
                        entity_type: payload.entity_type.clone(),
                        fields: payload.fields.clone(),
                        name: Some(payload.name.clone()),
                        published_name: payload.published_name.clone(),
                        auth_key: Some(payload.auth_key.clone()),
                        publish,
                    },
                )?;
                Ok(())
            }
            SyncEventPayload::UpdateEntity(payload)
            | SyncEventPayload::UpdateAndPublishEntity(payload) => {
                let pair = self.schema_pair_in(txn)?;
                let publish = matches!(
                    event.payload,
                    SyncEventPayload::UpdateAndPublishEntity(_)
                );
                update_entity(
                    txn,
                    &pair.schema,
                    &pair.published,
                    &self.resolver,
                    origin,
                    UpdateSpec {
                        id: payload.entity_id,
                        fields: payload.fields.clone(),
                        name: Some(payload.name.clone()),
                        published_name: payload.published_name.clone(),
                        auth_key: None,
                        publish,
                    },
                )?;
                Ok(())
            }
            SyncEventPayload::PublishEntities { entities } => {
                let pair = self.schema_pair_in(txn)?;
                let mut version_ids = Vec::new();
                for published_ref in entities {
                    let request = PublishEntityRequest {
                        id: published_ref.entity_id,
                        version: Some(published_ref.version),
                    };
                    let (_, contribution) = publish_one(
                        txn,
                        &pair.schema,
                        &pair.published,
                        origin,
                        &request,
                        published_ref.published_name.as_deref(),
                    )?;
                    if let Some((_, version_id)) = contribution {
                        version_ids.push(version_id);
                    }
                }
                append_event(txn, origin, &event.payload, &version_ids)?;
                Ok(())
            }
            SyncEventPayload::UnpublishEntities { entity_ids } => {
                let pair = self.schema_pair_in(txn)?;
                for id in entity_ids {
                    unpublish_one(txn, &pair.schema, origin, *id)?;
                }
                append_event(txn, origin, &event.payload, &[])?;
                Ok(())
            }
            SyncEventPayload::ArchiveEntity { entity_id } => {
                let pair = self.schema_pair_in(txn)?;
                archive_entity(txn, &pair.schema, origin, *entity_id)?;
                Ok(())
            }
            SyncEventPayload::UnarchiveEntity { entity_id } => {
                let pair = self.schema_pair_in(txn)?;
                unarchive_entity(txn, &pair.schema, origin, *entity_id)?;
                Ok(())
            }
        }
    }

    fn schema_pair(&self) -> RepoResult<Arc<SchemaPair>> {
        let row = self.adapter.queries()?.schema_latest()?;
        self.schema_pair_from_row(row)
    }

    fn schema_pair_in<Q: AdapterQueries + ?Sized>(
        &self,
        queries: &mut Q,
    ) -> RepoResult<Arc<SchemaPair>> {
        let row = queries.schema_latest()?;
        self.schema_pair_from_row(row)
    }

    fn schema_pair_from_row(&self, row: Option<SchemaVersionRow>) -> RepoResult<Arc<SchemaPair>> {
        let version = row.as_ref().map(|r| r.version).unwrap_or(0);
        if let Some(cached) = self.schema_cache.read().as_ref() {
            if cached.schema.version() == version {
                return Ok(Arc::clone(cached));
            }
        }

        let spec = match row {
            Some(row) => serde_json::from_str(&row.spec_json)
                .map_err(|e| RepoError::generic(format!("corrupt stored schema: {e}")))?,
            None => SchemaSpecification::empty(),
        };
        let schema = Schema::new(spec)
            .map_err(|e| RepoError::generic(format!("stored schema is invalid: {e}")))?;
        let published = schema
            .to_published()
            .map_err(|e| RepoError::generic(format!("published schema derivation failed: {e}")))?;
        let pair = Arc::new(SchemaPair { schema, published });
        *self.schema_cache.write() = Some(Arc::clone(&pair));
        Ok(pair)
    }

    fn invalidate_schema_cache(&self) {
        *self.schema_cache.write() = None;
    }

    fn resolve_supplied_key(&self, auth_key: Option<&str>) -> RepoResult<Option<String>> {
        auth_key
            .map(|key| self.resolver.resolve(key))
            .transpose()
            .map_err(|err| {
                warn!(%err, "auth key resolution failed");
                err
            })
    }
}

fn expand_statuses(statuses: Vec<EntityStatus>) -> Vec<EntityStatus> {
    if statuses.is_empty() {
        // Archived entities are hidden from normal queries.
        vec![
            EntityStatus::Draft,
            EntityStatus::Published,
            EntityStatus::Modified,
            EntityStatus::Withdrawn,
        ]
    } else {
        statuses
    }
}

fn clamp_limit(limit: usize) -> usize {
    if limit == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        limit.min(MAX_PAGE_SIZE)
    }
}

fn key_visible(stored_resolved: &str, supplied_resolved: Option<&str>) -> bool {
    stored_resolved.is_empty() || supplied_resolved == Some(stored_resolved)
}

/// Applies the storage-side impact of schema migration actions: entity
/// type renames are rewritten eagerly, everything else marks the
/// affected entities dirty for later revalidation.
fn apply_schema_impact<Q: AdapterQueries + ?Sized>(
    txn: &mut Q,
    actions: &[MigrationAction],
) -> RepoResult<()> {
    for action in actions {
        match action {
            MigrationAction::RenameType {
                kind: TypeKind::Entity,
                name,
                new_name,
            } => {
                let renamed = txn.entities_rename_type(name, new_name)?;
                debug!(from = %name, to = %new_name, renamed, "entity type renamed");
            }
            MigrationAction::DeleteType {
                kind: TypeKind::Entity,
                ..
            } => {
                // Rejected earlier unless no entities of the type remain.
            }
            MigrationAction::RenameField {
                kind: TypeKind::Entity,
                type_name,
                ..
            }
            | MigrationAction::DeleteField {
                kind: TypeKind::Entity,
                type_name,
                ..
            } => {
                txn.entities_mark_dirty_by_type(std::slice::from_ref(type_name))?;
            }
            MigrationAction::RenameType {
                kind: TypeKind::Component,
                name,
                ..
            }
            | MigrationAction::DeleteType {
                kind: TypeKind::Component,
                name,
            } => {
                txn.entities_mark_dirty_by_component_type(std::slice::from_ref(name))?;
            }
            MigrationAction::RenameField {
                kind: TypeKind::Component,
                type_name,
                ..
            }
            | MigrationAction::DeleteField {
                kind: TypeKind::Component,
                type_name,
                ..
            } => {
                txn.entities_mark_dirty_by_component_type(std::slice::from_ref(type_name))?;
            }
        }
    }
    Ok(())
}
