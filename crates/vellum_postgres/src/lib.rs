//! # Vellum Postgres
//!
//! Postgres backend for the Vellum content repository.
//!
//! Implements the `DatabaseAdapter` port from `vellum_adapter` over an
//! r2d2 connection pool with native uuid, timestamptz and boolean types.
//! Inside a transaction every statement runs under a savepoint, so
//! classified conflicts leave the transaction usable for the engine's
//! name-suffix and unique-value retry loops.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod executor;
mod queries;
mod schema;

pub use adapter::PostgresAdapter;
