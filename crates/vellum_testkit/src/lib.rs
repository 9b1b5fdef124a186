//! # Vellum Testkit
//!
//! Test utilities for Vellum.
//!
//! This crate provides:
//! - Repository fixtures over an in-memory sqlite adapter
//! - Ready-made schema specifications for common test shapes
//! - Field value builders for entity content
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vellum_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_repository() {
//!     let repo = TestRepository::title_only();
//!     let outcome = repo
//!         .create_entity(&repo.session, title_only_entity("Hello"))
//!         .unwrap();
//!     // ... assertions
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod content;
pub mod fixtures;
pub mod schemas;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::content::*;
    pub use crate::fixtures::*;
    pub use crate::schemas::*;
}

pub use content::*;
pub use fixtures::*;
pub use schemas::*;
