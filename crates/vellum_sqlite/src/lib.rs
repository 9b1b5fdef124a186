//! # Vellum Sqlite
//!
//! Embedded sqlite backend for the Vellum content repository.
//!
//! Implements the `DatabaseAdapter` port from `vellum_adapter` over a
//! single rusqlite connection: text timestamps and uuids, 0/1 booleans,
//! LIKE-based full text, and unique constraints named so that driver
//! errors classify into the shared taxonomy.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod executor;
mod queries;
mod schema;

pub use adapter::SqliteAdapter;
