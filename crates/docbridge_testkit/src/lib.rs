//! # docbridge Testkit
//!
//! Test utilities for docbridge.
//!
//! This crate provides:
//! - Temporary vaults with raw file access that bypasses the vault lock
//! - A document builder for front matter fixtures
//! - Property-based generators for remote forests and titles
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docbridge_testkit::prelude::*;
//!
//! #[test]
//! fn pending_document() {
//!     let vault = TestVault::new();
//!     vault.write_doc(&DocBuilder::new("from-local/X.md").pending().body("# X\n").build());
//!     assert!(vault.read("from-local/X.md").is_pending());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
