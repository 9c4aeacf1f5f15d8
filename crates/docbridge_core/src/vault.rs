//! Vault directory management.
//!
//! This module handles the file system layout of a vault:
//!
//! ```text
//! <vault>/
//! ├─ from-remote/                  # Pulled remote content (change-detected)
//! ├─ from-local/                   # Locally authored documents
//! ├─ collaboration/                # Pulled roots marked as shared work
//! ├─ archive/                      # Write-once archive records
//! ├─ .docbridge.lock               # Advisory lock, one engine per vault
//! ├─ .change_detection_state.json  # Change-detection state
//! └─ .sync_state.json              # Cycle ledger
//! ```
//!
//! Subtree names come from [`VaultConfig`]. Document paths handed in and out
//! of this module are vault-relative and `/`-separated.

use crate::config::VaultConfig;
use crate::document::{self, Document};
use crate::error::{CoreError, CoreResult};
use crate::ledger::{LedgerStore, LEDGER_FILE};
use crate::node::NodeId;
use crate::persist;
use crate::state_store::{StateStore, STATE_FILE};
use crate::time::Timestamp;
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Lock file name at the vault root.
const LOCK_FILE: &str = ".docbridge.lock";

/// Marker that excludes a path from scans.
const BACKUP_MARKER: &str = "_backup_";

/// Which part of the vault a scan covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Only the pulled subtree.
    Pulled,
    /// The whole vault.
    All,
}

/// An open vault holding the exclusive lock.
///
/// Only one `VaultDir` can exist per directory at a time; the lock is
/// released when the value is dropped.
#[derive(Debug)]
pub struct VaultDir {
    config: VaultConfig,
    _lock_file: File,
}

impl VaultDir {
    /// Opens a vault, creating the layout if configured to.
    ///
    /// # Errors
    ///
    /// - `InvalidLayout` if the root is missing and `create_if_missing` is
    ///   false, or the root is not a directory
    /// - `VaultLocked` if another process holds the lock
    pub fn open(config: VaultConfig) -> CoreResult<Self> {
        let root = config.root.clone();
        if !root.exists() {
            if config.create_if_missing {
                fs::create_dir_all(&root)?;
            } else {
                return Err(CoreError::invalid_layout(format!(
                    "vault directory does not exist: {}",
                    root.display()
                )));
            }
        }
        if !root.is_dir() {
            return Err(CoreError::invalid_layout(format!(
                "vault path is not a directory: {}",
                root.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(root.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::VaultLocked);
        }

        if config.create_if_missing {
            for dir in config.layout() {
                fs::create_dir_all(root.join(dir))?;
            }
        }

        debug!(root = %root.display(), "vault opened");
        Ok(Self {
            config,
            _lock_file: lock_file,
        })
    }

    /// Vault root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Vault configuration.
    #[must_use]
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Change-detection state store for this vault.
    #[must_use]
    pub fn state_store(&self) -> StateStore {
        StateStore::new(self.root().join(STATE_FILE))
    }

    /// Cycle ledger store for this vault.
    #[must_use]
    pub fn ledger_store(&self) -> LedgerStore {
        LedgerStore::new(self.root().join(LEDGER_FILE))
    }

    /// Resolves a vault-relative path, rejecting anything that escapes the
    /// root.
    pub fn abs_path(&self, rel: &str) -> CoreResult<PathBuf> {
        let rel_path = Path::new(rel);
        let escapes = rel.is_empty()
            || rel_path
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(CoreError::invalid_path(rel));
        }
        Ok(self.root().join(rel_path))
    }

    /// Returns true if `rel` is excluded from scans: hidden components,
    /// components named like the archive directory, or backup copies.
    ///
    /// Only whole components match the archive name, so a pulled page such
    /// as `Archived_Ideas` is still scanned.
    #[must_use]
    pub fn is_excluded(&self, rel: &str) -> bool {
        if rel.contains(BACKUP_MARKER) {
            return true;
        }
        rel.split('/').any(|component| {
            component.starts_with('.') || component.eq_ignore_ascii_case(&self.config.archive_dir)
        })
    }

    /// Returns true if `rel` lies in the pulled subtree.
    #[must_use]
    pub fn is_pulled(&self, rel: &str) -> bool {
        rel.split('/').next() == Some(self.config.pulled_dir.as_str()) && rel.contains('/')
    }

    /// Lists `.md` documents in scope, sorted, skipping excluded paths.
    pub fn scan(&self, scope: Scope) -> CoreResult<Vec<String>> {
        let base = match scope {
            Scope::Pulled => self.root().join(&self.config.pulled_dir),
            Scope::All => self.root().to_path_buf(),
        };
        if !base.is_dir() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        let walker = WalkDir::new(&base)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable vault entry");
                    continue;
                }
            };
            if !entry.file_type().is_file()
                || entry.path().extension().and_then(|e| e.to_str()) != Some("md")
            {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(self.root()) else {
                continue;
            };
            let rel = document::to_slash(rel);
            if !self.is_excluded(&rel) {
                paths.push(rel);
            }
        }
        Ok(paths)
    }

    /// Returns true if a document exists at `rel`.
    #[must_use]
    pub fn exists(&self, rel: &str) -> bool {
        self.abs_path(rel).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Reads and parses a document.
    pub fn read_document(&self, rel: &str) -> CoreResult<Document> {
        let text = fs::read_to_string(self.abs_path(rel)?)?;
        Document::parse(rel, &text)
    }

    /// Writes a document atomically, creating parent directories.
    pub fn write_document(&self, doc: &Document) -> CoreResult<()> {
        let path = self.abs_path(&doc.path)?;
        persist::write_atomic(&path, doc.render()?.as_bytes())
    }

    /// Writes `doc` at its path, then removes the file at `from`.
    ///
    /// The old location's directory is removed if the move left it empty.
    pub fn move_document(&self, from: &str, doc: &Document) -> CoreResult<()> {
        self.write_document(doc)?;
        if from == doc.path {
            return Ok(());
        }
        self.remove_document(from)?;
        info!(from, to = %doc.path, "document moved");
        Ok(())
    }

    /// Removes a document left behind by a move, then its directory if
    /// that is now empty.
    pub fn remove_document(&self, rel: &str) -> CoreResult<()> {
        let old = self.abs_path(rel)?;
        match fs::remove_file(&old) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if let Some(dir) = old.parent().filter(|d| *d != self.root()) {
            // Fails while anything else is still inside.
            let _ = fs::remove_dir(dir);
        }
        Ok(())
    }

    /// Modification time of a document.
    pub fn modified(&self, rel: &str) -> CoreResult<Timestamp> {
        let meta = fs::metadata(self.abs_path(rel)?)?;
        Ok(Timestamp::from_system_time(meta.modified()?))
    }

    /// Maps remote ids to the path of the first document carrying them.
    ///
    /// Unreadable documents are skipped with a warning.
    pub fn identity_index(&self) -> CoreResult<HashMap<NodeId, String>> {
        let mut index = HashMap::new();
        for rel in self.scan(Scope::All)? {
            match self.read_document(&rel) {
                Ok(doc) => {
                    if let Some(id) = doc.metadata.remote_id {
                        index.entry(id).or_insert(rel);
                    }
                }
                Err(e) => warn!(path = %rel, error = %e, "skipping unreadable document"),
            }
        }
        Ok(index)
    }

    /// Writes an archive record of `doc` and returns its relative path.
    ///
    /// Records are created with create-new semantics and carry the full
    /// prior metadata plus `backup_type`, `backup_created` and
    /// `original_path`.
    pub fn archive_document(
        &self,
        doc: &Document,
        backup_type: &str,
        at: Timestamp,
    ) -> CoreResult<String> {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let name = format!(
            "{}_local_backup_{}_{}.md",
            doc.stem(),
            at.compact(),
            &suffix[..8]
        );
        let rel = document::join(&self.config.archive_dir, &name);

        let mut metadata = doc.metadata.clone();
        metadata.backup_type = Some(backup_type.to_string());
        metadata.backup_created = Some(at);
        metadata.original_path = Some(doc.path.clone());
        let record = Document::new(rel.clone(), metadata, doc.body.clone());

        persist::write_new(&self.abs_path(&rel)?, record.render()?.as_bytes())?;
        info!(original = %doc.path, archive = %rel, "archive record written");
        Ok(rel)
    }

    /// Deletes archive records whose mtime is older than `max_age`.
    pub fn cleanup_archive(&self, max_age: Duration, now: Timestamp) -> CoreResult<usize> {
        let archive = self.root().join(&self.config.archive_dir);
        if !archive.is_dir() {
            return Ok(0);
        }
        let cutoff = now.saturating_sub(max_age);
        let mut removed = 0;

        for entry in WalkDir::new(&archive).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file()
                || entry.path().extension().and_then(|e| e.to_str()) != Some("md")
            {
                continue;
            }
            let modified = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .map(Timestamp::from_system_time);
            if matches!(modified, Some(m) if m < cutoff) {
                match fs::remove_file(entry.path()) {
                    Ok(()) => {
                        removed += 1;
                        debug!(path = %entry.path().display(), "archive record removed");
                    }
                    Err(e) => {
                        warn!(path = %entry.path().display(), error = %e, "failed to remove archive record");
                    }
                }
            }
        }
        info!(removed, "archive cleanup finished");
        Ok(removed)
    }
}
