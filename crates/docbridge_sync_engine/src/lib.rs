//! # docbridge Sync Engine
//!
//! Keeps a vault of Markdown documents and a remote page store consistent.
//!
//! This crate provides:
//! - The remote store trait, pagination helpers and an in-memory store
//! - An HTTP adapter for a Notion-compatible page/block API
//! - The pull phase (hierarchy materialization with conflict merge)
//! - The push phase (safe-mode record updates and page creation)
//! - The sync state machine with retry, cancellation and a cycle deadline
//!
//! ## Architecture
//!
//! Every cycle is **pull-then-push**:
//! 1. List remote pages and databases, plan the local tree, write changed
//!    documents, merging instead of overwriting when local work would be
//!    lost
//! 2. Detect local edits and mark them pending
//! 3. Push pending documents: update synchronization records in place,
//!    create new nodes for unlinked documents, never touch original pages
//!
//! ## Key Invariants
//!
//! - Pull always happens before push
//! - A failed phase does not stop the other
//! - Original remote pages receive no mutating calls
//! - One failing document never aborts its phase

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod guard;
mod http;
mod pull;
mod push;
mod remote;
mod report;
mod state;
mod wire;

pub use config::{RemoteConfig, RetryConfig, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpRemote, HttpResponse, Method};
pub use remote::{
    collect_pages, list_all_blocks, list_all_nodes, record_path, CreateNode, CreateParent,
    MemoryRemote, NodeFilter, Page, RemoteCall, RemoteStore, LOCAL_PATH_PROPERTY,
};
pub use report::{DocumentFailure, PullReport, PushReport};
pub use state::{SyncCycleResult, SyncEngine, SyncState, SyncStats};
