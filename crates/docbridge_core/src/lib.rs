//! # docbridge Core
//!
//! Vault model and the engine pieces that only need the local side.
//!
//! This crate provides:
//! - Documents with typed, lossless front matter
//! - Remote node model shared with the sync engine
//! - Content fingerprints and the change-detection state store
//! - The vault directory: layout, lock, scanning, atomic writes, archive
//! - Change detection, hierarchy planning and conflict resolution
//! - The persisted cycle ledger
//!
//! ## Key Invariants
//!
//! - Every document replacement is atomic (temp file, fsync, rename)
//! - Archive records are write-once
//! - One engine instance per vault (advisory lock)
//! - Documents are never deleted; a pulled document only moves when its
//!   node switches between leaf and container

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
pub mod conflict;
pub mod detector;
mod document;
mod error;
mod fingerprint;
pub mod hierarchy;
pub mod ledger;
mod node;
mod persist;
pub mod state_store;
mod time;
mod vault;

pub use config::VaultConfig;
pub use conflict::Resolution;
pub use detector::{ChangeDetector, DetectedChange, DetectionReport};
pub use document::{
    file_stem, is_index_path, join, parent_dir, ChangeReason, Document, Metadata, NodeType,
    ObjectType, PushResult, SyncDirection, SyncStatus,
};
pub use error::{CoreError, CoreResult};
pub use fingerprint::{fingerprint, Fingerprint};
pub use hierarchy::{
    build_plan, build_plan_with_claims, sanitize_name, HierarchyError, HierarchyPlan, PathClaims,
    PlanEntry, Router, SourceRouter,
};
pub use ledger::{CycleLedger, LedgerError, LedgerStore};
pub use node::{Node, NodeId, NodeKind, Properties, PropertyValue};
pub use state_store::{StateEntry, StateMap, StateStore};
pub use time::Timestamp;
pub use vault::{Scope, VaultDir};
