//! Pull-side conflict detection and resolution.
//!
//! A conflict exists when the document about to be overwritten carries the
//! local-author marker and was updated locally after the node's last remote
//! edit. Resolution never loses data: the local version is archived first,
//! then the live document becomes the remote content followed by the local
//! body under a separator heading.

use crate::document::Document;
use crate::error::CoreResult;
use crate::time::Timestamp;
use crate::vault::VaultDir;
use tracing::{debug, info};

/// Separator between remote content and preserved local content.
pub const LOCAL_ADDITIONS_SEPARATOR: &str = "\n\n---\n\n## Local additions\n\n";

/// Value of `merge_strategy` on merged documents.
pub const MERGE_STRATEGY: &str = "remote_primary_with_local_additions";

/// Value of `backup_type` on conflict archive records.
pub const CONFLICT_BACKUP_TYPE: &str = "conflict_resolution";

/// What happened when a document was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No prior document, or no conflict: written as-is.
    Overwrite,
    /// The prior version was archived and merged.
    Merged {
        /// Archive record path.
        archive_path: String,
    },
}

/// Returns true if writing over `existing` would lose local work.
///
/// A node without a last-edit time cannot be shown to be newer, so any
/// recorded local update counts as a conflict.
#[must_use]
pub fn is_conflict(existing: &Document, node_last_edited: Option<Timestamp>, local_author: &str) -> bool {
    if !existing.is_authored_by(local_author) {
        return false;
    }
    match (existing.metadata.updated_at, node_last_edited) {
        (Some(local), Some(remote)) => local > remote,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Builds the merged document from the incoming remote version and the
/// prior local version.
#[must_use]
pub fn merge(incoming: &Document, existing: &Document, archive_path: &str, at: Timestamp) -> Document {
    let body = format!(
        "{}{}{}",
        incoming.body.trim_end(),
        LOCAL_ADDITIONS_SEPARATOR,
        existing.body
    );
    let mut metadata = incoming.metadata.clone();
    metadata.conflict_resolved = Some(true);
    metadata.conflict_resolved_at = Some(at);
    metadata.local_backup = Some(archive_path.to_string());
    metadata.merge_strategy = Some(MERGE_STRATEGY.to_string());
    Document::new(incoming.path.clone(), metadata, body)
}

/// Writes `incoming` over whatever is at its path, merging if needed.
///
/// If the archive record cannot be written, the error is returned and the
/// live document is left untouched.
pub fn apply(
    vault: &VaultDir,
    incoming: &Document,
    existing: Option<&Document>,
    node_last_edited: Option<Timestamp>,
) -> CoreResult<Resolution> {
    let local_author = &vault.config().local_author;
    let Some(existing) = existing.filter(|e| is_conflict(e, node_last_edited, local_author)) else {
        vault.write_document(incoming)?;
        debug!(path = %incoming.path, "document written");
        return Ok(Resolution::Overwrite);
    };

    let now = Timestamp::now();
    let archive_path = vault.archive_document(existing, CONFLICT_BACKUP_TYPE, now)?;
    let merged = merge(incoming, existing, &archive_path, now);
    vault.write_document(&merged)?;
    info!(path = %incoming.path, archive = %archive_path, "conflict resolved by merge");
    Ok(Resolution::Merged { archive_path })
}
