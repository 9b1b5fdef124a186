//! Query execution helpers enforcing row-count contracts.
//!
//! Every adapter query goes through one of the five helpers in this module
//! so that row-count invariants are enforced uniformly: a violated contract
//! becomes a `Generic` error naming the query, never a panic or a silent
//! wrong answer.

use crate::error::{RepoError, RepoResult};
use crate::sql::Query;
use std::sync::Arc;
use std::time::Duration;

/// Callback reporting the duration of every executed query.
///
/// The first argument is the SQL text. Installed on a backend at
/// construction time; `None` disables reporting.
pub type PerformanceHook = Arc<dyn Fn(&str, Duration) + Send + Sync>;

/// A backend-supplied executor for built [`Query`]s.
///
/// Implementors translate [`crate::sql::SqlValue`] parameters to their
/// driver's types, run the query, and classify driver errors into the
/// shared taxonomy (unique-constraint violations become `Conflict`,
/// everything else is downgraded to `Generic` after logging).
pub trait SqlExecutor {
    /// The backend's owned row type.
    type Row;

    /// Runs a query that returns rows.
    fn fetch(&mut self, query: &Query) -> RepoResult<Vec<Self::Row>>;

    /// Runs a statement that returns no rows, yielding the affected count.
    fn execute(&mut self, query: &Query) -> RepoResult<u64>;
}

fn contract_violation(query: &Query, expected: &str, got: usize) -> RepoError {
    RepoError::generic(format!(
        "query row-count contract violated: expected {expected}, got {got} ({})",
        query.sql
    ))
}

/// Runs a statement and requires that it touched no result rows.
pub fn query_none<E: SqlExecutor>(executor: &mut E, query: &Query) -> RepoResult<()> {
    let rows = executor.fetch(query)?;
    if rows.is_empty() {
        Ok(())
    } else {
        Err(contract_violation(query, "no rows", rows.len()))
    }
}

/// Runs a statement, returning the number of affected rows.
pub fn query_run<E: SqlExecutor>(executor: &mut E, query: &Query) -> RepoResult<u64> {
    executor.execute(query)
}

/// Runs a query expected to return zero or one row.
pub fn query_none_or_one<E: SqlExecutor>(
    executor: &mut E,
    query: &Query,
) -> RepoResult<Option<E::Row>> {
    let mut rows = executor.fetch(query)?;
    match rows.len() {
        0 => Ok(None),
        1 => Ok(Some(rows.remove(0))),
        n => Err(contract_violation(query, "zero or one row", n)),
    }
}

/// Runs a query expected to return exactly one row.
pub fn query_one<E: SqlExecutor>(executor: &mut E, query: &Query) -> RepoResult<E::Row> {
    let mut rows = executor.fetch(query)?;
    match rows.len() {
        1 => Ok(rows.remove(0)),
        n => Err(contract_violation(query, "exactly one row", n)),
    }
}

/// Runs a query returning any number of rows.
pub fn query_many<E: SqlExecutor>(executor: &mut E, query: &Query) -> RepoResult<Vec<E::Row>> {
    executor.fetch(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{Dialect, QueryBuilder};

    /// Executor returning a canned number of unit rows.
    struct FakeExecutor {
        rows: usize,
    }

    impl SqlExecutor for FakeExecutor {
        type Row = ();

        fn fetch(&mut self, _query: &Query) -> RepoResult<Vec<()>> {
            Ok(vec![(); self.rows])
        }

        fn execute(&mut self, _query: &Query) -> RepoResult<u64> {
            Ok(self.rows as u64)
        }
    }

    fn query() -> Query {
        let mut qb = QueryBuilder::new(Dialect::Sqlite);
        qb.push("SELECT 1");
        qb.finish()
    }

    #[test]
    fn none_accepts_zero_rows() {
        assert!(query_none(&mut FakeExecutor { rows: 0 }, &query()).is_ok());
        assert!(query_none(&mut FakeExecutor { rows: 1 }, &query()).is_err());
    }

    #[test]
    fn one_requires_exactly_one() {
        assert!(query_one(&mut FakeExecutor { rows: 0 }, &query()).is_err());
        assert!(query_one(&mut FakeExecutor { rows: 1 }, &query()).is_ok());
        assert!(query_one(&mut FakeExecutor { rows: 2 }, &query()).is_err());
    }

    #[test]
    fn none_or_one_rejects_two() {
        assert_eq!(
            query_none_or_one(&mut FakeExecutor { rows: 0 }, &query()).unwrap(),
            None
        );
        assert!(query_none_or_one(&mut FakeExecutor { rows: 1 }, &query())
            .unwrap()
            .is_some());
        assert!(query_none_or_one(&mut FakeExecutor { rows: 2 }, &query()).is_err());
    }

    #[test]
    fn contract_violation_is_generic() {
        let err = query_one(&mut FakeExecutor { rows: 3 }, &query()).unwrap_err();
        assert!(matches!(err, RepoError::Generic(_)));
    }

    #[test]
    fn many_returns_all() {
        let rows = query_many(&mut FakeExecutor { rows: 5 }, &query()).unwrap();
        assert_eq!(rows.len(), 5);
    }
}
