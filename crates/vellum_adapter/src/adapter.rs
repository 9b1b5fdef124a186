//! The database adapter port.
//!
//! A single trait family exposes every storage operation the engine needs,
//! keyed by logical table concepts. Two reference backends implement it:
//! an embedded single-writer sqlite engine and a concurrent postgres
//! engine. All operations return the shared tagged error taxonomy and
//! never panic on expected failures.

use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

use crate::error::RepoResult;
use crate::rows::{
    EntityQueryFilter, EntityRefRow, EntityRow, EntityStatus, EntityVersionRow, EventRow,
    NewEntityRow,
    NewEntityVersionRow, NewEventRow, NewUniqueValueRow, SchemaVersionRow, UniqueValueRow,
};

/// Storage operations available both inside and outside a transaction.
///
/// Writes issued outside [`DatabaseAdapter::begin`] run in autocommit
/// mode; the engine only uses that for advisory-lock rows and short
/// independent reads.
pub trait AdapterQueries {
    // --- entities ---

    /// Inserts an entity row (status draft, never published, clean).
    ///
    /// Returns the internal id. Fails with `Conflict` on an id or name
    /// collision.
    fn entity_insert(&mut self, row: &NewEntityRow) -> RepoResult<i64>;

    /// Loads an entity by public id.
    fn entity_by_id(&mut self, id: Uuid) -> RepoResult<Option<EntityRow>>;

    /// Loads an entity by internal id (unique-index lookups resolve
    /// through this).
    fn entity_by_internal_id(&mut self, internal_id: i64) -> RepoResult<Option<EntityRow>>;

    /// Renames an entity. Fails with `Conflict` on a name collision.
    fn entity_rename(&mut self, internal_id: i64, name: &str) -> RepoResult<()>;

    /// Repoints the latest-version pointer and updates status/dirty.
    fn entity_update_latest(
        &mut self,
        internal_id: i64,
        latest_version_id: i64,
        status: EntityStatus,
        dirty: bool,
        updated_at: DateTime<Utc>,
    ) -> RepoResult<()>;

    /// Updates only the status (archive/unarchive and friends).
    fn entity_update_status(
        &mut self,
        internal_id: i64,
        status: EntityStatus,
        updated_at: DateTime<Utc>,
    ) -> RepoResult<()>;

    /// Repoints the published-version pointer.
    ///
    /// A `Some` pointer clears `never_published`; the published name is
    /// set or cleared alongside. Fails with `Conflict` on a published-name
    /// collision.
    fn entity_update_published(
        &mut self,
        internal_id: i64,
        published_version_id: Option<i64>,
        published_name: Option<&str>,
        status: EntityStatus,
        updated_at: DateTime<Utc>,
    ) -> RepoResult<()>;

    /// Counts entities matching the filter.
    fn entity_count(&mut self, filter: &EntityQueryFilter) -> RepoResult<i64>;

    /// Returns up to `limit` entities in internal-id order, strictly after
    /// the given internal id.
    fn entity_page(
        &mut self,
        filter: &EntityQueryFilter,
        after_internal_id: Option<i64>,
        limit: usize,
    ) -> RepoResult<Vec<EntityRow>>;

    /// Returns the entity at the given offset in internal-id order.
    fn entity_at_offset(
        &mut self,
        filter: &EntityQueryFilter,
        offset: i64,
    ) -> RepoResult<Option<EntityRow>>;

    /// Resolves public ids to internal ids and stored types. Missing ids
    /// are simply absent from the result.
    fn entity_refs(&mut self, ids: &[Uuid]) -> RepoResult<Vec<EntityRefRow>>;

    /// Rewrites the stored type name of all entities of a type
    /// (rename-type migration). Returns the affected count.
    fn entities_rename_type(&mut self, old_type: &str, new_type: &str) -> RepoResult<u64>;

    /// Marks all entities of the given types as needing revalidation.
    fn entities_mark_dirty_by_type(&mut self, entity_types: &[String]) -> RepoResult<u64>;

    /// Marks all entities whose latest version embeds one of the given
    /// component types as needing revalidation.
    fn entities_mark_dirty_by_component_type(
        &mut self,
        component_types: &[String],
    ) -> RepoResult<u64>;

    // --- entity versions ---

    /// Inserts a version row, returning its id.
    fn version_insert(&mut self, row: &NewEntityVersionRow) -> RepoResult<i64>;

    /// Loads a version row by id. Fails with `NotFound` if missing.
    fn version_by_id(&mut self, version_id: i64) -> RepoResult<EntityVersionRow>;

    /// Loads a version row by entity and version number.
    fn version_by_number(
        &mut self,
        entity_internal_id: i64,
        version: i32,
    ) -> RepoResult<Option<EntityVersionRow>>;

    // --- unique index values ---

    /// Returns all unique-index values owned by the entity.
    fn unique_values_for_entity(
        &mut self,
        entity_internal_id: i64,
    ) -> RepoResult<Vec<UniqueValueRow>>;

    /// Looks up the owner of an `(index, value)` pair.
    fn unique_value_lookup(
        &mut self,
        index_name: &str,
        value: &str,
    ) -> RepoResult<Option<UniqueValueRow>>;

    /// Inserts unique-index value rows as one batch.
    ///
    /// Fails with `Conflict` if any `(index, value)` pair is already owned
    /// by another entity; the caller retries value-by-value to localize
    /// the conflicting subset.
    fn unique_values_insert(&mut self, rows: &[NewUniqueValueRow]) -> RepoResult<()>;

    /// Updates the latest/published flags of one value row.
    fn unique_value_update_flags(
        &mut self,
        id: i64,
        latest: bool,
        published: bool,
    ) -> RepoResult<()>;

    /// Deletes value rows by id.
    fn unique_values_delete(&mut self, ids: &[i64]) -> RepoResult<()>;

    // --- full text ---

    /// Replaces the latest-view full-text row for the entity.
    fn fts_set_latest(&mut self, entity_internal_id: i64, content: &str) -> RepoResult<()>;

    /// Replaces (or with `None` clears) the published-view full-text row.
    fn fts_set_published(
        &mut self,
        entity_internal_id: i64,
        content: Option<&str>,
    ) -> RepoResult<()>;

    // --- latest-view derived rows ---

    /// Replaces the outgoing-reference rows of the latest version.
    fn references_set_latest(
        &mut self,
        entity_internal_id: i64,
        to_internal_ids: &[i64],
    ) -> RepoResult<()>;

    /// Replaces the component-types-used rows of the latest version.
    fn component_types_set_latest(
        &mut self,
        entity_internal_id: i64,
        component_types: &[String],
    ) -> RepoResult<()>;

    // --- events ---

    /// Appends an event, optionally linking the entity version rows it
    /// affected. Returns the event id.
    fn event_insert(&mut self, row: &NewEventRow, version_ids: &[i64]) -> RepoResult<i64>;

    /// Returns the id of the newest event, or 0 when the log is empty.
    fn event_head(&mut self) -> RepoResult<i64>;

    /// Returns up to `limit` events in id order with id strictly greater
    /// than `after_id`, optionally restricted to events touching one
    /// entity.
    fn events_page(
        &mut self,
        entity_internal_id: Option<i64>,
        after_id: i64,
        limit: usize,
    ) -> RepoResult<Vec<EventRow>>;

    // --- subjects ---

    /// Returns the subject id for `(provider, identifier)`, inserting a
    /// row with the supplied id if none exists.
    fn subject_ensure(
        &mut self,
        provider: &str,
        identifier: &str,
        id: Uuid,
        created_at: DateTime<Utc>,
    ) -> RepoResult<Uuid>;

    /// Ensures a subject row with the given id exists (sync replay uses
    /// the original principal ids).
    fn subject_ensure_id(&mut self, id: Uuid, created_at: DateTime<Utc>) -> RepoResult<()>;

    // --- schema versions ---

    /// Returns the newest schema version row, if any.
    fn schema_latest(&mut self) -> RepoResult<Option<SchemaVersionRow>>;

    /// Inserts a schema version row. Fails with `Conflict` if the version
    /// already exists (concurrent schema update).
    fn schema_insert(
        &mut self,
        version: u32,
        spec_json: &str,
        updated_at: DateTime<Utc>,
    ) -> RepoResult<()>;

    // --- advisory locks ---

    /// Attempts to acquire a named lock with the given holder handle.
    ///
    /// An expired lease is taken over. Returns `false` while another
    /// holder's lease is still valid.
    fn lock_acquire(
        &mut self,
        name: &str,
        handle: i64,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> RepoResult<bool>;

    /// Extends the lease of a held lock. Fails with `NotFound` if the
    /// lock is not held with this handle.
    fn lock_renew(
        &mut self,
        name: &str,
        handle: i64,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> RepoResult<()>;

    /// Releases a held lock. Fails with `NotFound` if the lock is not
    /// held with this handle.
    fn lock_release(&mut self, name: &str, handle: i64) -> RepoResult<()>;
}

/// An open transaction. All queries issued through it are atomic:
/// either `commit` makes them all visible, or they are rolled back.
///
/// Dropping a transaction without committing rolls it back.
pub trait AdapterTransaction: AdapterQueries {
    /// Commits the transaction.
    fn commit(self: Box<Self>) -> RepoResult<()>;

    /// Rolls the transaction back explicitly.
    fn rollback(self: Box<Self>) -> RepoResult<()>;
}

/// A database backend implementing the logical storage model.
pub trait DatabaseAdapter: Send + Sync {
    /// Begins a transaction spanning all writes of one operation.
    fn begin(&self) -> RepoResult<Box<dyn AdapterTransaction + '_>>;

    /// Opens an autocommit session for independent, short-lived queries.
    fn queries(&self) -> RepoResult<Box<dyn AdapterQueries + '_>>;
}

/// Runs `f` inside a transaction, committing on success and rolling back
/// on error. The error from `f` wins over a rollback failure.
pub fn with_transaction<T>(
    adapter: &dyn DatabaseAdapter,
    f: impl FnOnce(&mut dyn AdapterTransaction) -> RepoResult<T>,
) -> RepoResult<T> {
    let mut txn = adapter.begin()?;
    match f(&mut *txn) {
        Ok(value) => {
            txn.commit()?;
            Ok(value)
        }
        Err(err) => {
            let _ = txn.rollback();
            Err(err)
        }
    }
}
