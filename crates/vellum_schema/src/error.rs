//! Schema error type.

use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors produced while validating or updating a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The specification violates a structural rule. Carries the first
    /// violation found.
    #[error("invalid schema: {0}")]
    Validation(String),

    /// A migration action cannot be applied to the current schema.
    #[error("invalid migration: {0}")]
    Migration(String),
}

impl SchemaError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a migration error.
    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration(message.into())
    }
}
