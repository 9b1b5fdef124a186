//! Query execution against a rusqlite connection.
//!
//! Translates [`SqlValue`] parameters to sqlite types, classifies driver
//! errors into the shared taxonomy, and reports query durations to an
//! optional performance hook.

use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, ErrorCode};
use tracing::error;
use uuid::Uuid;
use vellum_adapter::{
    PerformanceHook, Query, RepoError, RepoResult, SqlExecutor, SqlValue, UniqueConstraint,
};

/// One fetched row as owned sqlite values, indexed by column position.
pub(crate) struct SqliteRow(Vec<Value>);

impl SqliteRow {
    fn cell(&self, index: usize) -> RepoResult<&Value> {
        self.0
            .get(index)
            .ok_or_else(|| RepoError::generic(format!("missing column {index} in sqlite row")))
    }

    pub(crate) fn i64(&self, index: usize) -> RepoResult<i64> {
        match self.cell(index)? {
            Value::Integer(v) => Ok(*v),
            other => Err(type_mismatch(index, "integer", other)),
        }
    }

    pub(crate) fn opt_i64(&self, index: usize) -> RepoResult<Option<i64>> {
        match self.cell(index)? {
            Value::Null => Ok(None),
            Value::Integer(v) => Ok(Some(*v)),
            other => Err(type_mismatch(index, "integer or null", other)),
        }
    }

    pub(crate) fn text(&self, index: usize) -> RepoResult<&str> {
        match self.cell(index)? {
            Value::Text(v) => Ok(v),
            other => Err(type_mismatch(index, "text", other)),
        }
    }

    pub(crate) fn opt_text(&self, index: usize) -> RepoResult<Option<&str>> {
        match self.cell(index)? {
            Value::Null => Ok(None),
            Value::Text(v) => Ok(Some(v)),
            other => Err(type_mismatch(index, "text or null", other)),
        }
    }

    pub(crate) fn bool(&self, index: usize) -> RepoResult<bool> {
        Ok(self.i64(index)? != 0)
    }

    pub(crate) fn uuid(&self, index: usize) -> RepoResult<Uuid> {
        Uuid::parse_str(self.text(index)?)
            .map_err(|e| RepoError::generic(format!("invalid stored uuid: {e}")))
    }

    pub(crate) fn datetime(&self, index: usize) -> RepoResult<DateTime<Utc>> {
        parse_datetime(self.text(index)?)
    }
}

fn type_mismatch(index: usize, expected: &str, got: &Value) -> RepoError {
    RepoError::generic(format!(
        "sqlite column {index}: expected {expected}, got {got:?}"
    ))
}

/// Storage encoding of a timestamp.
pub(crate) fn format_datetime(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_datetime(text: &str) -> RepoResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepoError::generic(format!("invalid stored timestamp {text:?}: {e}")))
}

/// Executes built queries against one connection.
pub(crate) struct SqliteExecutor<'a> {
    conn: &'a Connection,
    hook: Option<PerformanceHook>,
}

impl<'a> SqliteExecutor<'a> {
    pub(crate) fn new(conn: &'a Connection, hook: Option<PerformanceHook>) -> Self {
        Self { conn, hook }
    }

    fn run<T>(
        &mut self,
        query: &Query,
        f: impl FnOnce(&Connection, &[Value]) -> rusqlite::Result<T>,
    ) -> RepoResult<T> {
        let params: Vec<Value> = query.params.iter().map(to_sqlite_value).collect();
        let start = Instant::now();
        let result = f(self.conn, &params);
        if let Some(hook) = &self.hook {
            hook(&query.sql, start.elapsed());
        }
        result.map_err(classify)
    }
}

impl SqlExecutor for SqliteExecutor<'_> {
    type Row = SqliteRow;

    fn fetch(&mut self, query: &Query) -> RepoResult<Vec<SqliteRow>> {
        self.run(query, |conn, params| {
            let mut stmt = conn.prepare_cached(&query.sql)?;
            let columns = stmt.column_count();
            let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
                let mut cells = Vec::with_capacity(columns);
                for i in 0..columns {
                    cells.push(row.get::<_, Value>(i)?);
                }
                Ok(SqliteRow(cells))
            })?;
            rows.collect()
        })
    }

    fn execute(&mut self, query: &Query) -> RepoResult<u64> {
        self.run(query, |conn, params| {
            let mut stmt = conn.prepare_cached(&query.sql)?;
            stmt.execute(rusqlite::params_from_iter(params))
                .map(|n| n as u64)
        })
    }
}

fn to_sqlite_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Int(v) => Value::Integer(*v),
        SqlValue::Float(v) => Value::Real(*v),
        SqlValue::Text(v) => Value::Text(v.clone()),
        SqlValue::Bool(v) => Value::Integer(i64::from(*v)),
        SqlValue::Timestamp(v) => Value::Text(format_datetime(*v)),
        SqlValue::Uuid(v) => Value::Text(v.to_string()),
    }
}

/// Maps a rusqlite error into the shared taxonomy. Unique-constraint
/// violations are recognized by the column names in the driver message;
/// everything else is logged and downgraded to `Generic`.
fn classify(err: rusqlite::Error) -> RepoError {
    if let rusqlite::Error::SqliteFailure(code, Some(message)) = &err {
        if code.code == ErrorCode::ConstraintViolation {
            if let Some(constraint) = constraint_from_message(message) {
                return constraint.into_error();
            }
        }
    }
    error!(%err, "sqlite query failed");
    RepoError::generic(format!("sqlite error: {err}"))
}

fn constraint_from_message(message: &str) -> Option<UniqueConstraint> {
    if message.contains("entities.uuid") {
        Some(UniqueConstraint::EntityId)
    } else if message.contains("entities.published_name") {
        Some(UniqueConstraint::EntityPublishedName)
    } else if message.contains("entities.name") {
        Some(UniqueConstraint::EntityName)
    } else if message.contains("unique_index_values.index_name") {
        Some(UniqueConstraint::UniqueIndexValue)
    } else if message.contains("schema_versions.version") {
        Some(UniqueConstraint::SchemaVersion)
    } else if message.contains("advisory_locks.name") {
        Some(UniqueConstraint::AdvisoryLockName)
    } else {
        None
    }
}
