//! Change detection.
//!
//! The detector compares every document in the pulled subtree against the
//! change-detection state and classifies it, in order of precedence:
//!
//! 1. `new_file`: no state entry
//! 2. `content_changed`: the fingerprint differs
//! 3. `modified_after_sync`: the mtime moved since the last scan, is past
//!    `synced_at` plus the grace window, and the document is not already
//!    pending
//!
//! Every scanned document's state entry is refreshed, whether or not it
//! changed, so a second pass with no edits in between reports nothing.
//! Documents that cannot be read are skipped and keep their old entry.

use crate::document::{ChangeReason, Document};
use crate::error::CoreResult;
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::state_store::{StateEntry, StateMap, StateStore};
use crate::time::Timestamp;
use crate::vault::{Scope, VaultDir};
use std::time::Duration;
use tracing::{debug, info, warn};

/// A document flagged by the detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedChange {
    /// Vault-relative path.
    pub path: String,
    /// Why it was flagged.
    pub reason: ChangeReason,
}

/// Outcome of a detection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionReport {
    /// Flagged documents in scan order.
    pub changes: Vec<DetectedChange>,
    /// Documents examined.
    pub scanned: usize,
    /// Documents skipped because they could not be read.
    pub skipped: usize,
    /// Documents rewritten as pending.
    pub marked: usize,
}

impl DetectionReport {
    /// Number of flagged documents.
    #[must_use]
    pub fn changed(&self) -> usize {
        self.changes.len()
    }
}

/// Classifies a document against its previous state entry.
#[must_use]
pub fn classify(
    doc: &Document,
    entry: Option<&StateEntry>,
    current: &Fingerprint,
    modified: Timestamp,
    grace: Duration,
) -> Option<ChangeReason> {
    let Some(entry) = entry else {
        return Some(ChangeReason::NewFile);
    };
    if &entry.fingerprint != current {
        return Some(ChangeReason::ContentChanged);
    }
    if doc.is_pending() || modified <= entry.modified {
        return None;
    }
    let touched_after_sync = match doc.metadata.synced_at {
        Some(synced_at) => modified > synced_at.saturating_add(grace),
        None => true,
    };
    touched_after_sync.then_some(ChangeReason::ModifiedAfterSync)
}

/// Change detector bound to an open vault.
pub struct ChangeDetector<'a> {
    vault: &'a VaultDir,
    store: StateStore,
}

impl<'a> ChangeDetector<'a> {
    /// Creates a detector for `vault`.
    pub fn new(vault: &'a VaultDir) -> Self {
        Self {
            vault,
            store: vault.state_store(),
        }
    }

    /// Classifies documents and refreshes state without touching documents.
    pub fn detect(&self) -> CoreResult<DetectionReport> {
        self.run(false)
    }

    /// Classifies documents, marks changed ones pending and saves state.
    pub fn process(&self) -> CoreResult<DetectionReport> {
        self.run(true)
    }

    fn run(&self, mark: bool) -> CoreResult<DetectionReport> {
        let grace = self.vault.config().modified_grace;
        let mut state = self.store.load();
        let mut report = DetectionReport::default();

        for rel in self.vault.scan(Scope::Pulled)? {
            let (mut doc, modified) = match self.load(&rel) {
                Ok(loaded) => loaded,
                Err(e) => {
                    warn!(path = %rel, error = %e, "skipping unreadable document");
                    report.skipped += 1;
                    continue;
                }
            };
            report.scanned += 1;

            let current = fingerprint(&doc.body);
            let reason = classify(&doc, state.get(&rel), &current, modified, grace);
            let mut recorded_mtime = modified;

            if let Some(reason) = reason {
                debug!(path = %rel, reason = reason.as_str(), "change detected");
                if mark {
                    doc.mark_pending(reason, Timestamp::now(), modified);
                    match self.vault.write_document(&doc) {
                        Ok(()) => {
                            report.marked += 1;
                            recorded_mtime = self.vault.modified(&rel).unwrap_or(modified);
                        }
                        Err(e) => {
                            warn!(path = %rel, error = %e, "failed to mark document pending");
                        }
                    }
                }
                report.changes.push(DetectedChange {
                    path: rel.clone(),
                    reason,
                });
            }

            state.insert(rel, StateEntry::capture(&doc, current, recorded_mtime));
        }

        self.store.save(&state)?;
        info!(
            scanned = report.scanned,
            changed = report.changed(),
            marked = report.marked,
            "change detection finished"
        );
        Ok(report)
    }

    fn load(&self, rel: &str) -> CoreResult<(Document, Timestamp)> {
        let doc = self.vault.read_document(rel)?;
        let modified = self.vault.modified(rel)?;
        Ok((doc, modified))
    }

    /// Refreshes the state entries of specific documents.
    ///
    /// Used after the engine itself rewrites documents, so its own writes
    /// are not reported as local edits. Paths that no longer exist lose
    /// their entry.
    pub fn refresh<S: AsRef<str>>(&self, paths: &[S]) -> CoreResult<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut state = self.store.load();
        for rel in paths {
            let rel = rel.as_ref();
            if !self.vault.exists(rel) {
                state.remove(rel);
                continue;
            }
            match self.load(rel) {
                Ok((doc, modified)) => {
                    let fp = fingerprint(&doc.body);
                    state.insert(rel.to_string(), StateEntry::capture(&doc, fp, modified));
                }
                Err(e) => warn!(path = %rel, error = %e, "cannot refresh state entry"),
            }
        }
        self.store.save(&state)
    }

    /// Number of pending documents anywhere in the vault.
    pub fn pending_count(&self) -> CoreResult<usize> {
        let mut count = 0;
        for rel in self.vault.scan(Scope::All)? {
            if matches!(self.vault.read_document(&rel), Ok(doc) if doc.is_pending()) {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Current state entries.
    #[must_use]
    pub fn state(&self) -> StateMap {
        self.store.load()
    }

    /// Clears the change-detection state. Returns true if state existed.
    pub fn reset(&self) -> CoreResult<bool> {
        let existed = self.store.reset()?;
        info!(existed, "change-detection state reset");
        Ok(existed)
    }
}
