//! Change-detection state.
//!
//! One entry per tracked document, keyed by vault-relative path. The store
//! fails open: a missing or unreadable file loads as an empty map, which
//! forces the detector into a full rescan.

use crate::document::{Document, SyncStatus};
use crate::error::CoreResult;
use crate::fingerprint::Fingerprint;
use crate::node::NodeId;
use crate::persist;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

/// State file name at the vault root.
pub const STATE_FILE: &str = ".change_detection_state.json";

/// Last-seen facts about one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    /// Body fingerprint.
    pub fingerprint: Fingerprint,
    /// File modification time when last scanned.
    pub modified: Timestamp,
    /// Remote id from the front matter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<NodeId>,
    /// Sync status from the front matter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_status: Option<SyncStatus>,
    /// Last sync time from the front matter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<Timestamp>,
    /// Title from the front matter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl StateEntry {
    /// Snapshots a document.
    pub fn capture(doc: &Document, fingerprint: Fingerprint, modified: Timestamp) -> Self {
        Self {
            fingerprint,
            modified,
            remote_id: doc.metadata.remote_id.clone(),
            sync_status: doc.metadata.sync_status,
            synced_at: doc.metadata.synced_at,
            title: doc.metadata.title.clone(),
        }
    }
}

/// Tracked entries keyed by vault-relative path.
pub type StateMap = BTreeMap<String, StateEntry>;

#[derive(Serialize, Deserialize)]
struct StateFile {
    version: u32,
    saved_at: Timestamp,
    entries: StateMap,
}

const STATE_VERSION: u32 = 1;

/// Persistent store for [`StateMap`].
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Creates a store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the map, returning an empty one if the file is missing or
    /// unreadable.
    pub fn load(&self) -> StateMap {
        match persist::read_json::<StateFile>(&self.path) {
            Ok(Some(file)) if file.version == STATE_VERSION => file.entries,
            Ok(Some(file)) => {
                warn!(
                    path = %self.path.display(),
                    version = file.version,
                    "unknown state version, starting from empty state"
                );
                StateMap::new()
            }
            Ok(None) => StateMap::new(),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "state file unreadable, starting from empty state"
                );
                StateMap::new()
            }
        }
    }

    /// Saves the map atomically.
    pub fn save(&self, entries: &StateMap) -> CoreResult<()> {
        let file = StateFile {
            version: STATE_VERSION,
            saved_at: Timestamp::now(),
            entries: entries.clone(),
        };
        persist::write_json(&self.path, &file)
    }

    /// Deletes the state file. Returns true if one existed.
    pub fn reset(&self) -> CoreResult<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
