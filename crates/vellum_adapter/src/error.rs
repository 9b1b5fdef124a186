//! Error taxonomy shared by the engine and all database backends.

use thiserror::Error;

/// Result type used across the repository engine and adapters.
pub type RepoResult<T> = Result<T, RepoError>;

/// The closed error taxonomy exposed to callers.
///
/// Every layer returns one of these five kinds; expected failures never
/// cross component boundaries as panics or driver-specific types. Unexpected
/// driver errors are downgraded to [`RepoError::Generic`] by the backend
/// that observed them (after logging the original), so callers only ever
/// have to match on this closed set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepoError {
    /// Malformed input, invalid state transition, or readonly-session misuse.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing entity, version, index value, or lock.
    #[error("not found: {0}")]
    NotFound(String),

    /// Name or unique-index collision, concurrent schema update, or a
    /// concurrently held advisory lock.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Authorization-key mismatch.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// Everything unexpected, including storage failures and row-count
    /// contract violations.
    #[error("{0}")]
    Generic(String),
}

impl RepoError {
    /// Creates a `BadRequest` error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Creates a `NotFound` error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Creates a `Conflict` error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Creates a `NotAuthorized` error.
    pub fn not_authorized(message: impl Into<String>) -> Self {
        Self::NotAuthorized(message.into())
    }

    /// Creates a `Generic` error.
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic(message.into())
    }

    /// Returns true if this is a `Conflict` error.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns true if this is a `NotFound` error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if this is a `BadRequest` error.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::BadRequest(_))
    }
}

/// Named unique constraints a backend classifier can recognize.
///
/// Backends translate driver-level unique-violation errors into one of
/// these so the engine can react (name-suffix retry, per-value index
/// conflict localization) without parsing driver messages itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueConstraint {
    /// `entities.uuid` collision.
    EntityId,
    /// `entities.name` collision.
    EntityName,
    /// `entities.published_name` collision.
    EntityPublishedName,
    /// `(index_name, value)` collision in `unique_index_values`.
    UniqueIndexValue,
    /// `schema_versions.version` collision (concurrent schema update).
    SchemaVersion,
    /// `advisory_locks.name` collision (lock currently held).
    AdvisoryLockName,
}

impl UniqueConstraint {
    /// Conflict message the engine surfaces for this constraint.
    pub fn conflict_message(self) -> &'static str {
        match self {
            Self::EntityId => "entity id already exists",
            Self::EntityName => "entity name already exists",
            Self::EntityPublishedName => "published entity name already exists",
            Self::UniqueIndexValue => "unique index value already exists",
            Self::SchemaVersion => "schema was concurrently updated",
            Self::AdvisoryLockName => "advisory lock is held",
        }
    }

    /// Converts this constraint violation into the conflict error the
    /// engine expects.
    pub fn into_error(self) -> RepoError {
        RepoError::conflict(self.conflict_message())
    }
}
