//! # Vellum Database Adapter
//!
//! The port between the Vellum engine and its SQL backends.
//!
//! This crate provides:
//! - The shared error taxonomy returned by every layer
//! - The `DatabaseAdapter` trait family defining all storage operations
//! - Logical row types for the storage model
//! - A minimal dialect-aware SQL builder
//! - Row-count-enforcing query execution helpers
//! - Opaque pagination cursor encoding

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod cursor;
mod error;
mod execute;
mod rows;
mod sql;

pub use adapter::{with_transaction, AdapterQueries, AdapterTransaction, DatabaseAdapter};
pub use cursor::{decode_cursor, encode_cursor};
pub use error::{RepoError, RepoResult, UniqueConstraint};
pub use execute::{
    query_many, query_none, query_none_or_one, query_one, query_run, PerformanceHook, SqlExecutor,
};
pub use rows::{
    EntityQueryFilter, EntityRefRow, EntityRow, EntityStatus, EntityVersionRow, EventRow,
    NewEntityRow,
    NewEntityVersionRow, NewEventRow, NewUniqueValueRow, SchemaVersionRow, UniqueValueRow,
};
pub use sql::{Dialect, Query, QueryBuilder, SqlValue};
