//! Per-phase outcome reports.

use docbridge_core::DetectionReport;

/// A document or node that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFailure {
    /// Vault path or node id.
    pub subject: String,
    /// Error message.
    pub message: String,
}

impl DocumentFailure {
    pub(crate) fn new(subject: impl Into<String>, error: &impl std::fmt::Display) -> Self {
        Self {
            subject: subject.into(),
            message: error.to_string(),
        }
    }
}

/// Outcome of a pull phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullReport {
    /// Pages and databases listed on the remote side.
    pub listed: usize,
    /// Documents written without conflict.
    pub written: usize,
    /// Documents written through a conflict merge.
    pub merged: usize,
    /// Nodes skipped because the local copy is current.
    pub unchanged: usize,
    /// Documents relocated after their node switched between leaf and
    /// container. A relocated document is also counted as written or
    /// merged when its content changed.
    pub moved: usize,
    /// Nodes unreachable from any root.
    pub unreachable: usize,
    /// Nodes that failed.
    pub failures: Vec<DocumentFailure>,
}

impl PullReport {
    /// Documents written, merged or not.
    pub fn materialized(&self) -> usize {
        self.written + self.merged
    }
}

/// Outcome of a push phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    /// Change detection pass run before collecting candidates.
    pub detection: DetectionReport,
    /// Documents selected for push.
    pub candidates: usize,
    /// Synchronization records updated in place.
    pub updated: usize,
    /// Child pages created under a resolved parent.
    pub created_children: usize,
    /// Synchronization records created.
    pub created_records: usize,
    /// Documents linked to original pages, left untouched remotely.
    pub skipped_original: usize,
    /// Documents marked synced after the phase degraded.
    pub degraded: usize,
    /// Documents whose push failed; they end synced with a failed result.
    pub failures: Vec<DocumentFailure>,
}

impl PushReport {
    /// Documents that ended synced.
    pub fn pushed(&self) -> usize {
        self.updated + self.created_children + self.created_records + self.skipped_original + self.degraded
    }
}
