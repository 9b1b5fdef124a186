//! Repository fixtures.
//!
//! Provides convenience constructors for repositories over an in-memory
//! sqlite adapter, with a writable session ready to use.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use vellum_core::{Repository, Session};
use vellum_schema::SchemaSpecificationUpdate;
use vellum_sqlite::SqliteAdapter;

use crate::schemas;

/// Routes engine tracing to the test writer, honoring `RUST_LOG`.
///
/// Every fixture constructor calls this; only the first call in a test
/// binary installs the subscriber.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// A repository over a fresh in-memory database, plus a writable session.
pub struct TestRepository {
    /// The repository instance.
    pub repository: Repository,
    /// A writable session for the `test`/`tester` subject.
    pub session: Session,
}

impl TestRepository {
    /// Creates a repository with no schema installed.
    pub fn empty() -> Self {
        init_test_logging();
        let adapter = SqliteAdapter::open_in_memory().expect("failed to open in-memory database");
        let repository = Repository::new(Arc::new(adapter));
        let session = repository
            .create_session("test", "tester", false)
            .expect("failed to create test session");
        Self {
            repository,
            session,
        }
    }

    /// Creates a repository and installs the given schema.
    pub fn with_schema(update: &SchemaSpecificationUpdate) -> Self {
        let repo = Self::empty();
        repo.repository
            .update_schema_specification(&repo.session, update)
            .expect("failed to install test schema");
        repo
    }

    /// Creates a repository with the [`schemas::title_only_update`] schema.
    pub fn title_only() -> Self {
        Self::with_schema(&schemas::title_only_update())
    }

    /// Creates a repository with the [`schemas::publishing_update`] schema.
    pub fn publishing() -> Self {
        Self::with_schema(&schemas::publishing_update())
    }

    /// Creates a readonly session for a separate subject.
    pub fn readonly_session(&self) -> Session {
        self.repository
            .create_session("test", "reader", true)
            .expect("failed to create readonly session")
    }
}

impl std::ops::Deref for TestRepository {
    type Target = Repository;

    fn deref(&self) -> &Self::Target {
        &self.repository
    }
}

/// Runs a test against a repository with the publishing schema.
///
/// # Example
///
/// ```rust,ignore
/// use vellum_testkit::with_repository;
///
/// #[test]
/// fn my_test() {
///     with_repository(|repo| {
///         // ... test operations
///     });
/// }
/// ```
pub fn with_repository<F, R>(f: F) -> R
where
    F: FnOnce(&TestRepository) -> R,
{
    let repo = TestRepository::publishing();
    f(&repo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_init_is_idempotent() {
        init_test_logging();
        init_test_logging();
    }
}
