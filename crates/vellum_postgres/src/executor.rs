//! Query execution against a postgres client.
//!
//! Inside a transaction every statement is bracketed by a savepoint, so a
//! classified conflict (name collision, unique-index value) leaves the
//! transaction usable and the engine's retry loops work the same way they
//! do on sqlite.

use std::time::Instant;

use bytes::BytesMut;
use chrono::{DateTime, Utc};
use postgres::error::SqlState;
use postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use postgres::{Client, Row};
use tracing::error;
use uuid::Uuid;
use vellum_adapter::{
    PerformanceHook, Query, RepoError, RepoResult, SqlExecutor, SqlValue, UniqueConstraint,
};

const SAVEPOINT: &str = "vellum_stmt";

/// Owned parameter value bound through the native driver types.
#[derive(Debug)]
enum PgValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
}

impl From<&SqlValue> for PgValue {
    fn from(value: &SqlValue) -> Self {
        match value {
            SqlValue::Null => Self::Null,
            SqlValue::Int(v) => Self::Int(*v),
            SqlValue::Float(v) => Self::Float(*v),
            SqlValue::Text(v) => Self::Text(v.clone()),
            SqlValue::Bool(v) => Self::Bool(*v),
            SqlValue::Timestamp(v) => Self::Timestamp(*v),
            SqlValue::Uuid(v) => Self::Uuid(*v),
        }
    }
}

impl ToSql for PgValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            Self::Null => Ok(IsNull::Yes),
            Self::Int(v) => v.to_sql(ty, out),
            Self::Float(v) => v.to_sql(ty, out),
            Self::Text(v) => v.to_sql(ty, out),
            Self::Bool(v) => v.to_sql(ty, out),
            Self::Timestamp(v) => v.to_sql(ty, out),
            Self::Uuid(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Typed column access with taxonomy errors instead of panics.
pub(crate) fn col<'a, T: postgres::types::FromSql<'a>>(
    row: &'a Row,
    index: usize,
) -> RepoResult<T> {
    row.try_get(index)
        .map_err(|e| RepoError::generic(format!("postgres column {index}: {e}")))
}

/// Executes built queries against one client.
pub(crate) struct PgExecutor<'a> {
    client: &'a mut Client,
    hook: Option<PerformanceHook>,
    savepoints: bool,
}

impl<'a> PgExecutor<'a> {
    pub(crate) fn new(
        client: &'a mut Client,
        hook: Option<PerformanceHook>,
        savepoints: bool,
    ) -> Self {
        Self {
            client,
            hook,
            savepoints,
        }
    }

    fn run<T>(
        &mut self,
        query: &Query,
        f: impl FnOnce(&mut Client, &[&(dyn ToSql + Sync)]) -> Result<T, postgres::Error>,
    ) -> RepoResult<T> {
        let params: Vec<PgValue> = query.params.iter().map(PgValue::from).collect();
        let refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        if self.savepoints {
            self.client
                .batch_execute(&format!("SAVEPOINT {SAVEPOINT}"))
                .map_err(classify)?;
        }
        let start = Instant::now();
        let result = f(self.client, &refs);
        if let Some(hook) = &self.hook {
            hook(&query.sql, start.elapsed());
        }
        match result {
            Ok(value) => {
                if self.savepoints {
                    self.client
                        .batch_execute(&format!("RELEASE SAVEPOINT {SAVEPOINT}"))
                        .map_err(classify)?;
                }
                Ok(value)
            }
            Err(err) => {
                if self.savepoints {
                    let _ = self
                        .client
                        .batch_execute(&format!("ROLLBACK TO SAVEPOINT {SAVEPOINT}"));
                }
                Err(classify(err))
            }
        }
    }
}

impl SqlExecutor for PgExecutor<'_> {
    type Row = Row;

    fn fetch(&mut self, query: &Query) -> RepoResult<Vec<Row>> {
        self.run(query, |client, params| client.query(&query.sql, params))
    }

    fn execute(&mut self, query: &Query) -> RepoResult<u64> {
        self.run(query, |client, params| client.execute(&query.sql, params))
    }
}

/// Maps a driver error into the shared taxonomy. Unique violations are
/// recognized by constraint name; everything else is logged and
/// downgraded to `Generic`.
fn classify(err: postgres::Error) -> RepoError {
    if let Some(db) = err.as_db_error() {
        if db.code() == &SqlState::UNIQUE_VIOLATION {
            if let Some(constraint) = db.constraint().and_then(constraint_by_name) {
                return constraint.into_error();
            }
        }
    }
    error!(%err, "postgres query failed");
    RepoError::generic(format!("postgres error: {err}"))
}

fn constraint_by_name(name: &str) -> Option<UniqueConstraint> {
    match name {
        "entities_uuid_key" => Some(UniqueConstraint::EntityId),
        "entities_name_key" => Some(UniqueConstraint::EntityName),
        "entities_published_name_key" => Some(UniqueConstraint::EntityPublishedName),
        "unique_index_values_pair_key" => Some(UniqueConstraint::UniqueIndexValue),
        "schema_versions_version_key" => Some(UniqueConstraint::SchemaVersion),
        "advisory_locks_pkey" => Some(UniqueConstraint::AdvisoryLockName),
        _ => None,
    }
}
