//! The `AdapterQueries` implementation over one locked connection.
//!
//! The same struct backs autocommit sessions and transactions; the
//! adapter decides which trait object it hands out. Sqlite allows a
//! single writer, so both hold the connection mutex for their lifetime.

use chrono::{DateTime, Utc};
use parking_lot::MutexGuard;
use rusqlite::Connection;
use std::time::Duration;
use uuid::Uuid;
use vellum_adapter::{
    query_many, query_none_or_one, query_one, query_run, AdapterQueries, AdapterTransaction,
    Dialect, EntityQueryFilter, EntityRefRow, EntityRow, EntityStatus, EntityVersionRow, EventRow,
    NewEntityRow, NewEntityVersionRow, NewEventRow, NewUniqueValueRow, PerformanceHook,
    QueryBuilder, RepoError, RepoResult, SchemaVersionRow, SqlValue, UniqueValueRow,
};

use crate::executor::{format_datetime, SqliteExecutor, SqliteRow};

const ENTITY_COLUMNS: &str = "internal_id, uuid, entity_type, name, published_name, auth_key, \
     resolved_auth_key, status, never_published, dirty, created_at, updated_at, \
     latest_version_id, published_version_id";

/// A connection session; a transaction when `txn` is set.
pub(crate) struct SqliteSession<'a> {
    guard: MutexGuard<'a, Connection>,
    hook: Option<PerformanceHook>,
    txn: bool,
    finished: bool,
}

impl<'a> SqliteSession<'a> {
    pub(crate) fn autocommit(
        guard: MutexGuard<'a, Connection>,
        hook: Option<PerformanceHook>,
    ) -> Self {
        Self {
            guard,
            hook,
            txn: false,
            finished: false,
        }
    }

    pub(crate) fn transaction(
        guard: MutexGuard<'a, Connection>,
        hook: Option<PerformanceHook>,
    ) -> RepoResult<Self> {
        guard
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| RepoError::generic(format!("failed to begin transaction: {e}")))?;
        Ok(Self {
            guard,
            hook,
            txn: true,
            finished: false,
        })
    }

    fn exec(&mut self) -> SqliteExecutor<'_> {
        SqliteExecutor::new(&self.guard, self.hook.clone())
    }

    fn qb(&self) -> QueryBuilder {
        QueryBuilder::new(Dialect::Sqlite)
    }
}

impl Drop for SqliteSession<'_> {
    fn drop(&mut self) {
        if self.txn && !self.finished {
            let _ = self.guard.execute_batch("ROLLBACK");
        }
    }
}

impl AdapterTransaction for SqliteSession<'_> {
    fn commit(mut self: Box<Self>) -> RepoResult<()> {
        self.finished = true;
        self.guard
            .execute_batch("COMMIT")
            .map_err(|e| RepoError::generic(format!("commit failed: {e}")))
    }

    fn rollback(mut self: Box<Self>) -> RepoResult<()> {
        self.finished = true;
        self.guard
            .execute_batch("ROLLBACK")
            .map_err(|e| RepoError::generic(format!("rollback failed: {e}")))
    }
}

fn entity_from_row(row: &SqliteRow) -> RepoResult<EntityRow> {
    Ok(EntityRow {
        internal_id: row.i64(0)?,
        id: row.uuid(1)?,
        entity_type: row.text(2)?.to_owned(),
        name: row.text(3)?.to_owned(),
        published_name: row.opt_text(4)?.map(ToOwned::to_owned),
        auth_key: row.text(5)?.to_owned(),
        resolved_auth_key: row.text(6)?.to_owned(),
        status: EntityStatus::parse(row.text(7)?)?,
        never_published: row.bool(8)?,
        dirty: row.bool(9)?,
        created_at: row.datetime(10)?,
        updated_at: row.datetime(11)?,
        latest_version_id: row.opt_i64(12)?,
        published_version_id: row.opt_i64(13)?,
    })
}

fn version_from_row(row: &SqliteRow) -> RepoResult<EntityVersionRow> {
    Ok(EntityVersionRow {
        id: row.i64(0)?,
        entity_internal_id: row.i64(1)?,
        version: row.i64(2)? as i32,
        schema_version: row.i64(3)? as u32,
        created_at: row.datetime(4)?,
        created_by: row.uuid(5)?,
        fields_json: row.text(6)?.to_owned(),
    })
}

fn unique_value_from_row(row: &SqliteRow) -> RepoResult<UniqueValueRow> {
    Ok(UniqueValueRow {
        id: row.i64(0)?,
        index_name: row.text(1)?.to_owned(),
        value: row.text(2)?.to_owned(),
        entity_internal_id: row.i64(3)?,
        latest: row.bool(4)?,
        published: row.bool(5)?,
    })
}

fn event_from_row(row: &SqliteRow) -> RepoResult<EventRow> {
    Ok(EventRow {
        id: row.i64(0)?,
        event_type: row.text(1)?.to_owned(),
        created_by: row.uuid(2)?,
        created_at: row.datetime(3)?,
        payload_json: row.text(4)?.to_owned(),
    })
}

/// Escapes LIKE metacharacters and wraps the needle in wildcards.
fn like_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn apply_filter(qb: &mut QueryBuilder, filter: &EntityQueryFilter) {
    qb.push("WHERE 1 = 1");
    if !filter.entity_types.is_empty() {
        qb.push("AND entity_type IN")
            .bind_list(filter.entity_types.iter().map(String::as_str));
    }
    if !filter.statuses.is_empty() {
        qb.push("AND status IN")
            .bind_list(filter.statuses.iter().map(|s| s.as_str()));
    }
    if let Some(text) = &filter.text {
        qb.push("AND internal_id IN (SELECT entity_internal_id FROM entities_latest_fts WHERE content LIKE")
            .bind(like_pattern(text));
        qb.push("ESCAPE '\\')");
    }
}

fn expect_one_row(affected: u64, what: &str) -> RepoResult<()> {
    if affected == 1 {
        Ok(())
    } else {
        Err(RepoError::generic(format!(
            "{what}: expected to touch one row, touched {affected}"
        )))
    }
}

impl AdapterQueries for SqliteSession<'_> {
    fn entity_insert(&mut self, row: &NewEntityRow) -> RepoResult<i64> {
        let mut qb = self.qb();
        qb.push(
            "INSERT INTO entities (uuid, entity_type, name, auth_key, resolved_auth_key, \
             status, never_published, dirty, created_at, updated_at) VALUES",
        )
        .bind_list([
            SqlValue::from(row.id.to_string()),
            SqlValue::from(row.entity_type.as_str()),
            SqlValue::from(row.name.as_str()),
            SqlValue::from(row.auth_key.as_str()),
            SqlValue::from(row.resolved_auth_key.as_str()),
            SqlValue::from("draft"),
            SqlValue::from(true),
            SqlValue::from(false),
            SqlValue::from(format_datetime(row.created_at)),
            SqlValue::from(format_datetime(row.created_at)),
        ])
        .push("RETURNING internal_id");
        let row = query_one(&mut self.exec(), &qb.finish())?;
        row.i64(0)
    }

    fn entity_by_id(&mut self, id: Uuid) -> RepoResult<Option<EntityRow>> {
        let mut qb = self.qb();
        qb.push(&format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE uuid ="))
            .bind(id.to_string());
        query_none_or_one(&mut self.exec(), &qb.finish())?
            .map(|row| entity_from_row(&row))
            .transpose()
    }

    fn entity_by_internal_id(&mut self, internal_id: i64) -> RepoResult<Option<EntityRow>> {
        let mut qb = self.qb();
        qb.push(&format!(
            "SELECT {ENTITY_COLUMNS} FROM entities WHERE internal_id ="
        ))
        .bind(internal_id);
        query_none_or_one(&mut self.exec(), &qb.finish())?
            .map(|row| entity_from_row(&row))
            .transpose()
    }

    fn entity_rename(&mut self, internal_id: i64, name: &str) -> RepoResult<()> {
        let mut qb = self.qb();
        qb.push("UPDATE entities SET name =").bind(name);
        qb.push("WHERE internal_id =").bind(internal_id);
        let affected = query_run(&mut self.exec(), &qb.finish())?;
        expect_one_row(affected, "entity rename")
    }

    fn entity_update_latest(
        &mut self,
        internal_id: i64,
        latest_version_id: i64,
        status: EntityStatus,
        dirty: bool,
        updated_at: DateTime<Utc>,
    ) -> RepoResult<()> {
        let mut qb = self.qb();
        qb.push("UPDATE entities SET latest_version_id =")
            .bind(latest_version_id);
        qb.push(", status =").bind(status.as_str());
        qb.push(", dirty =").bind(dirty);
        qb.push(", updated_at =").bind(format_datetime(updated_at));
        qb.push("WHERE internal_id =").bind(internal_id);
        let affected = query_run(&mut self.exec(), &qb.finish())?;
        expect_one_row(affected, "entity latest-pointer update")
    }

    fn entity_update_status(
        &mut self,
        internal_id: i64,
        status: EntityStatus,
        updated_at: DateTime<Utc>,
    ) -> RepoResult<()> {
        let mut qb = self.qb();
        qb.push("UPDATE entities SET status =").bind(status.as_str());
        qb.push(", updated_at =").bind(format_datetime(updated_at));
        qb.push("WHERE internal_id =").bind(internal_id);
        let affected = query_run(&mut self.exec(), &qb.finish())?;
        expect_one_row(affected, "entity status update")
    }

    fn entity_update_published(
        &mut self,
        internal_id: i64,
        published_version_id: Option<i64>,
        published_name: Option<&str>,
        status: EntityStatus,
        updated_at: DateTime<Utc>,
    ) -> RepoResult<()> {
        let mut qb = self.qb();
        qb.push("UPDATE entities SET published_version_id =")
            .bind(published_version_id);
        qb.push(", published_name =").bind(published_name);
        qb.push(", status =").bind(status.as_str());
        qb.push(", updated_at =").bind(format_datetime(updated_at));
        if published_version_id.is_some() {
            qb.push(", never_published = 0");
        }
        qb.push("WHERE internal_id =").bind(internal_id);
        let affected = query_run(&mut self.exec(), &qb.finish())?;
        expect_one_row(affected, "entity published-pointer update")
    }

    fn entity_count(&mut self, filter: &EntityQueryFilter) -> RepoResult<i64> {
        let mut qb = self.qb();
        qb.push("SELECT COUNT(*) FROM entities");
        apply_filter(&mut qb, filter);
        let row = query_one(&mut self.exec(), &qb.finish())?;
        row.i64(0)
    }

    fn entity_page(
        &mut self,
        filter: &EntityQueryFilter,
        after_internal_id: Option<i64>,
        limit: usize,
    ) -> RepoResult<Vec<EntityRow>> {
        let mut qb = self.qb();
        qb.push(&format!("SELECT {ENTITY_COLUMNS} FROM entities"));
        apply_filter(&mut qb, filter);
        if let Some(after) = after_internal_id {
            qb.push("AND internal_id >").bind(after);
        }
        qb.push("ORDER BY internal_id LIMIT").bind(limit as i64);
        let rows = query_many(&mut self.exec(), &qb.finish())?;
        rows.iter().map(entity_from_row).collect()
    }

    fn entity_at_offset(
        &mut self,
        filter: &EntityQueryFilter,
        offset: i64,
    ) -> RepoResult<Option<EntityRow>> {
        let mut qb = self.qb();
        qb.push(&format!("SELECT {ENTITY_COLUMNS} FROM entities"));
        apply_filter(&mut qb, filter);
        qb.push("ORDER BY internal_id LIMIT 1 OFFSET").bind(offset);
        query_none_or_one(&mut self.exec(), &qb.finish())?
            .map(|row| entity_from_row(&row))
            .transpose()
    }

    fn entity_refs(&mut self, ids: &[Uuid]) -> RepoResult<Vec<EntityRefRow>> {
        let mut qb = self.qb();
        qb.push("SELECT uuid, internal_id, entity_type FROM entities WHERE uuid IN")
            .bind_list(ids.iter().map(Uuid::to_string));
        let rows = query_many(&mut self.exec(), &qb.finish())?;
        rows.iter()
            .map(|row| {
                Ok(EntityRefRow {
                    id: row.uuid(0)?,
                    internal_id: row.i64(1)?,
                    entity_type: row.text(2)?.to_owned(),
                })
            })
            .collect()
    }

    fn entities_rename_type(&mut self, old_type: &str, new_type: &str) -> RepoResult<u64> {
        let mut qb = self.qb();
        qb.push("UPDATE entities SET entity_type =").bind(new_type);
        qb.push("WHERE entity_type =").bind(old_type);
        query_run(&mut self.exec(), &qb.finish())
    }

    fn entities_mark_dirty_by_type(&mut self, entity_types: &[String]) -> RepoResult<u64> {
        let mut qb = self.qb();
        qb.push("UPDATE entities SET dirty = 1 WHERE entity_type IN")
            .bind_list(entity_types.iter().map(String::as_str));
        query_run(&mut self.exec(), &qb.finish())
    }

    fn entities_mark_dirty_by_component_type(
        &mut self,
        component_types: &[String],
    ) -> RepoResult<u64> {
        let mut qb = self.qb();
        qb.push(
            "UPDATE entities SET dirty = 1 WHERE internal_id IN \
             (SELECT entity_internal_id FROM entity_component_types WHERE component_type IN",
        )
        .bind_list(component_types.iter().map(String::as_str));
        qb.push(")");
        query_run(&mut self.exec(), &qb.finish())
    }

    fn version_insert(&mut self, row: &NewEntityVersionRow) -> RepoResult<i64> {
        let mut qb = self.qb();
        qb.push(
            "INSERT INTO entity_versions (entity_internal_id, version, schema_version, \
             created_at, created_by, fields_json) VALUES",
        )
        .bind_list([
            SqlValue::from(row.entity_internal_id),
            SqlValue::from(row.version),
            SqlValue::from(row.schema_version),
            SqlValue::from(format_datetime(row.created_at)),
            SqlValue::from(row.created_by.to_string()),
            SqlValue::from(row.fields_json.as_str()),
        ])
        .push("RETURNING id");
        let row = query_one(&mut self.exec(), &qb.finish())?;
        row.i64(0)
    }

    fn version_by_id(&mut self, version_id: i64) -> RepoResult<EntityVersionRow> {
        let mut qb = self.qb();
        qb.push(
            "SELECT id, entity_internal_id, version, schema_version, created_at, created_by, \
             fields_json FROM entity_versions WHERE id =",
        )
        .bind(version_id);
        match query_none_or_one(&mut self.exec(), &qb.finish())? {
            Some(row) => version_from_row(&row),
            None => Err(RepoError::not_found("Entity version not found")),
        }
    }

    fn version_by_number(
        &mut self,
        entity_internal_id: i64,
        version: i32,
    ) -> RepoResult<Option<EntityVersionRow>> {
        let mut qb = self.qb();
        qb.push(
            "SELECT id, entity_internal_id, version, schema_version, created_at, created_by, \
             fields_json FROM entity_versions WHERE entity_internal_id =",
        )
        .bind(entity_internal_id);
        qb.push("AND version =").bind(version);
        query_none_or_one(&mut self.exec(), &qb.finish())?
            .map(|row| version_from_row(&row))
            .transpose()
    }

    fn unique_values_for_entity(
        &mut self,
        entity_internal_id: i64,
    ) -> RepoResult<Vec<UniqueValueRow>> {
        let mut qb = self.qb();
        qb.push(
            "SELECT id, index_name, value, entity_internal_id, latest, published \
             FROM unique_index_values WHERE entity_internal_id =",
        )
        .bind(entity_internal_id);
        let rows = query_many(&mut self.exec(), &qb.finish())?;
        rows.iter().map(unique_value_from_row).collect()
    }

    fn unique_value_lookup(
        &mut self,
        index_name: &str,
        value: &str,
    ) -> RepoResult<Option<UniqueValueRow>> {
        let mut qb = self.qb();
        qb.push(
            "SELECT id, index_name, value, entity_internal_id, latest, published \
             FROM unique_index_values WHERE index_name =",
        )
        .bind(index_name);
        qb.push("AND value =").bind(value);
        query_none_or_one(&mut self.exec(), &qb.finish())?
            .map(|row| unique_value_from_row(&row))
            .transpose()
    }

    fn unique_values_insert(&mut self, rows: &[NewUniqueValueRow]) -> RepoResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut qb = self.qb();
        qb.push(
            "INSERT INTO unique_index_values (index_name, value, entity_internal_id, \
             latest, published) VALUES",
        );
        for (i, row) in rows.iter().enumerate() {
            if i > 0 {
                qb.push(",");
            }
            qb.bind_list([
                SqlValue::from(row.index_name.as_str()),
                SqlValue::from(row.value.as_str()),
                SqlValue::from(row.entity_internal_id),
                SqlValue::from(row.latest),
                SqlValue::from(row.published),
            ]);
        }
        query_run(&mut self.exec(), &qb.finish())?;
        Ok(())
    }

    fn unique_value_update_flags(&mut self, id: i64, latest: bool, published: bool) -> RepoResult<()> {
        let mut qb = self.qb();
        qb.push("UPDATE unique_index_values SET latest =").bind(latest);
        qb.push(", published =").bind(published);
        qb.push("WHERE id =").bind(id);
        let affected = query_run(&mut self.exec(), &qb.finish())?;
        expect_one_row(affected, "unique value flag update")
    }

    fn unique_values_delete(&mut self, ids: &[i64]) -> RepoResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut qb = self.qb();
        qb.push("DELETE FROM unique_index_values WHERE id IN")
            .bind_list(ids.iter().copied());
        query_run(&mut self.exec(), &qb.finish())?;
        Ok(())
    }

    fn fts_set_latest(&mut self, entity_internal_id: i64, content: &str) -> RepoResult<()> {
        let mut qb = self.qb();
        qb.push("INSERT INTO entities_latest_fts (entity_internal_id, content) VALUES")
            .bind_list([SqlValue::from(entity_internal_id), SqlValue::from(content)])
            .push("ON CONFLICT (entity_internal_id) DO UPDATE SET content = excluded.content");
        query_run(&mut self.exec(), &qb.finish())?;
        Ok(())
    }

    fn fts_set_published(
        &mut self,
        entity_internal_id: i64,
        content: Option<&str>,
    ) -> RepoResult<()> {
        let mut qb = self.qb();
        match content {
            Some(content) => {
                qb.push("INSERT INTO entities_published_fts (entity_internal_id, content) VALUES")
                    .bind_list([SqlValue::from(entity_internal_id), SqlValue::from(content)])
                    .push(
                        "ON CONFLICT (entity_internal_id) DO UPDATE SET content = excluded.content",
                    );
            }
            None => {
                qb.push("DELETE FROM entities_published_fts WHERE entity_internal_id =")
                    .bind(entity_internal_id);
            }
        }
        query_run(&mut self.exec(), &qb.finish())?;
        Ok(())
    }

    fn references_set_latest(
        &mut self,
        entity_internal_id: i64,
        to_internal_ids: &[i64],
    ) -> RepoResult<()> {
        let mut qb = self.qb();
        qb.push("DELETE FROM entity_latest_references WHERE from_internal_id =")
            .bind(entity_internal_id);
        query_run(&mut self.exec(), &qb.finish())?;
        for to in to_internal_ids {
            let mut qb = self.qb();
            qb.push(
                "INSERT OR IGNORE INTO entity_latest_references (from_internal_id, to_internal_id) VALUES",
            )
            .bind_list([SqlValue::from(entity_internal_id), SqlValue::from(*to)]);
            query_run(&mut self.exec(), &qb.finish())?;
        }
        Ok(())
    }

    fn component_types_set_latest(
        &mut self,
        entity_internal_id: i64,
        component_types: &[String],
    ) -> RepoResult<()> {
        let mut qb = self.qb();
        qb.push("DELETE FROM entity_component_types WHERE entity_internal_id =")
            .bind(entity_internal_id);
        query_run(&mut self.exec(), &qb.finish())?;
        for component_type in component_types {
            let mut qb = self.qb();
            qb.push(
                "INSERT OR IGNORE INTO entity_component_types (entity_internal_id, component_type) VALUES",
            )
            .bind_list([
                SqlValue::from(entity_internal_id),
                SqlValue::from(component_type.as_str()),
            ]);
            query_run(&mut self.exec(), &qb.finish())?;
        }
        Ok(())
    }

    fn event_insert(&mut self, row: &NewEventRow, version_ids: &[i64]) -> RepoResult<i64> {
        let mut qb = self.qb();
        match row.id {
            Some(id) => {
                qb.push(
                    "INSERT INTO events (id, event_type, created_by, created_at, payload_json) VALUES",
                )
                .bind_list([
                    SqlValue::from(id),
                    SqlValue::from(row.event_type.as_str()),
                    SqlValue::from(row.created_by.to_string()),
                    SqlValue::from(format_datetime(row.created_at)),
                    SqlValue::from(row.payload_json.as_str()),
                ]);
            }
            None => {
                qb.push(
                    "INSERT INTO events (event_type, created_by, created_at, payload_json) VALUES",
                )
                .bind_list([
                    SqlValue::from(row.event_type.as_str()),
                    SqlValue::from(row.created_by.to_string()),
                    SqlValue::from(format_datetime(row.created_at)),
                    SqlValue::from(row.payload_json.as_str()),
                ]);
            }
        }
        qb.push("RETURNING id");
        let inserted = query_one(&mut self.exec(), &qb.finish())?;
        let event_id = inserted.i64(0)?;

        for version_id in version_ids {
            let mut qb = self.qb();
            qb.push("INSERT OR IGNORE INTO event_entity_versions (event_id, version_id) VALUES")
                .bind_list([SqlValue::from(event_id), SqlValue::from(*version_id)]);
            query_run(&mut self.exec(), &qb.finish())?;
        }
        Ok(event_id)
    }

    fn event_head(&mut self) -> RepoResult<i64> {
        let mut qb = self.qb();
        qb.push("SELECT COALESCE(MAX(id), 0) FROM events");
        let row = query_one(&mut self.exec(), &qb.finish())?;
        row.i64(0)
    }

    fn events_page(
        &mut self,
        entity_internal_id: Option<i64>,
        after_id: i64,
        limit: usize,
    ) -> RepoResult<Vec<EventRow>> {
        let mut qb = self.qb();
        match entity_internal_id {
            Some(internal_id) => {
                qb.push(
                    "SELECT DISTINCT e.id, e.event_type, e.created_by, e.created_at, e.payload_json \
                     FROM events e \
                     JOIN event_entity_versions ev ON ev.event_id = e.id \
                     JOIN entity_versions v ON v.id = ev.version_id \
                     WHERE v.entity_internal_id =",
                )
                .bind(internal_id);
                qb.push("AND e.id >").bind(after_id);
            }
            None => {
                qb.push(
                    "SELECT e.id, e.event_type, e.created_by, e.created_at, e.payload_json \
                     FROM events e WHERE e.id >",
                )
                .bind(after_id);
            }
        }
        qb.push("ORDER BY e.id LIMIT").bind(limit as i64);
        let rows = query_many(&mut self.exec(), &qb.finish())?;
        rows.iter().map(event_from_row).collect()
    }

    fn subject_ensure(
        &mut self,
        provider: &str,
        identifier: &str,
        id: Uuid,
        created_at: DateTime<Utc>,
    ) -> RepoResult<Uuid> {
        let mut qb = self.qb();
        qb.push("SELECT id FROM subjects WHERE provider =").bind(provider);
        qb.push("AND identifier =").bind(identifier);
        if let Some(row) = query_none_or_one(&mut self.exec(), &qb.finish())? {
            return row.uuid(0);
        }
        let mut qb = self.qb();
        qb.push("INSERT INTO subjects (id, provider, identifier, created_at) VALUES")
            .bind_list([
                SqlValue::from(id.to_string()),
                SqlValue::from(provider),
                SqlValue::from(identifier),
                SqlValue::from(format_datetime(created_at)),
            ]);
        query_run(&mut self.exec(), &qb.finish())?;
        Ok(id)
    }

    fn subject_ensure_id(&mut self, id: Uuid, created_at: DateTime<Utc>) -> RepoResult<()> {
        let mut qb = self.qb();
        qb.push("INSERT OR IGNORE INTO subjects (id, provider, identifier, created_at) VALUES")
            .bind_list([
                SqlValue::from(id.to_string()),
                SqlValue::from("sync"),
                SqlValue::from(id.to_string()),
                SqlValue::from(format_datetime(created_at)),
            ]);
        query_run(&mut self.exec(), &qb.finish())?;
        Ok(())
    }

    fn schema_latest(&mut self) -> RepoResult<Option<SchemaVersionRow>> {
        let mut qb = self.qb();
        qb.push("SELECT version, spec_json, updated_at FROM schema_versions ORDER BY version DESC LIMIT 1");
        query_none_or_one(&mut self.exec(), &qb.finish())?
            .map(|row| {
                Ok(SchemaVersionRow {
                    version: row.i64(0)? as u32,
                    spec_json: row.text(1)?.to_owned(),
                    updated_at: row.datetime(2)?,
                })
            })
            .transpose()
    }

    fn schema_insert(
        &mut self,
        version: u32,
        spec_json: &str,
        updated_at: DateTime<Utc>,
    ) -> RepoResult<()> {
        let mut qb = self.qb();
        qb.push("INSERT INTO schema_versions (version, spec_json, updated_at) VALUES")
            .bind_list([
                SqlValue::from(version),
                SqlValue::from(spec_json),
                SqlValue::from(format_datetime(updated_at)),
            ]);
        query_run(&mut self.exec(), &qb.finish())?;
        Ok(())
    }

    fn lock_acquire(
        &mut self,
        name: &str,
        handle: i64,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> RepoResult<bool> {
        let expires_at = lease_end(now, lease)?;
        let mut qb = self.qb();
        qb.push("DELETE FROM advisory_locks WHERE name =").bind(name);
        qb.push("AND expires_at <=").bind(format_datetime(now));
        query_run(&mut self.exec(), &qb.finish())?;

        let mut qb = self.qb();
        qb.push("INSERT INTO advisory_locks (name, handle, expires_at) VALUES")
            .bind_list([
                SqlValue::from(name),
                SqlValue::from(handle),
                SqlValue::from(format_datetime(expires_at)),
            ])
            .push("ON CONFLICT (name) DO NOTHING");
        Ok(query_run(&mut self.exec(), &qb.finish())? == 1)
    }

    fn lock_renew(
        &mut self,
        name: &str,
        handle: i64,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> RepoResult<()> {
        let expires_at = lease_end(now, lease)?;
        let mut qb = self.qb();
        qb.push("UPDATE advisory_locks SET expires_at =")
            .bind(format_datetime(expires_at));
        qb.push("WHERE name =").bind(name);
        qb.push("AND handle =").bind(handle);
        if query_run(&mut self.exec(), &qb.finish())? == 1 {
            Ok(())
        } else {
            Err(RepoError::not_found(format!("Advisory lock {name} is not held")))
        }
    }

    fn lock_release(&mut self, name: &str, handle: i64) -> RepoResult<()> {
        let mut qb = self.qb();
        qb.push("DELETE FROM advisory_locks WHERE name =").bind(name);
        qb.push("AND handle =").bind(handle);
        if query_run(&mut self.exec(), &qb.finish())? == 1 {
            Ok(())
        } else {
            Err(RepoError::not_found(format!("Advisory lock {name} is not held")))
        }
    }
}

fn lease_end(now: DateTime<Utc>, lease: Duration) -> RepoResult<DateTime<Utc>> {
    let lease = chrono::Duration::from_std(lease)
        .map_err(|e| RepoError::generic(format!("invalid lock lease: {e}")))?;
    now.checked_add_signed(lease)
        .ok_or_else(|| RepoError::generic("lock lease overflows the timestamp range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_patterns_escape_metacharacters() {
        assert_eq!(like_pattern("hello"), "%hello%");
        assert_eq!(like_pattern("50%_done"), "%50\\%\\_done%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
