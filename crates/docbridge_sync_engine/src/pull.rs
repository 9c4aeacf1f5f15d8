//! Pull phase: materialize remote pages into the vault.

use crate::error::SyncResult;
use crate::guard::CycleGuard;
use crate::remote::{collect_pages, NodeFilter, RemoteStore};
use crate::report::{DocumentFailure, PullReport};
use docbridge_codec::{blocks_to_body, Block};
use docbridge_core::conflict::{self, Resolution};
use docbridge_core::hierarchy::slot_of;
use docbridge_core::{
    build_plan_with_claims, ChangeDetector, Document, Metadata, Node, NodeId, ObjectType, PathClaims,
    PlanEntry, SourceRouter, SyncDirection, SyncStatus, Timestamp, VaultDir,
};
use std::collections::HashMap;
use tracing::{debug, info, warn};

enum Outcome {
    Unchanged,
    Moved { path: String, from: String },
    Written { path: String, moved_from: Option<String> },
    Merged { path: String, moved_from: Option<String> },
}

pub(crate) struct PullPhase<'a, R: RemoteStore + ?Sized> {
    pub(crate) vault: &'a VaultDir,
    pub(crate) remote: &'a R,
    pub(crate) guard: &'a CycleGuard<'a>,
}

impl<R: RemoteStore + ?Sized> PullPhase<'_, R> {
    pub(crate) fn run(&self) -> SyncResult<PullReport> {
        let pages = collect_pages(|cursor| {
            self.guard
                .call("list_nodes", || self.remote.list_nodes(NodeFilter::Pages, cursor))
        })?;
        let databases = collect_pages(|cursor| {
            self.guard
                .call("list_databases", || self.remote.list_nodes(NodeFilter::Databases, cursor))
        })?;
        let nodes: Vec<Node> = pages
            .into_iter()
            .chain(databases)
            .filter(|n| !n.is_sync_record())
            .collect();

        let mut report = PullReport {
            listed: nodes.len(),
            ..PullReport::default()
        };

        let index = self.vault.identity_index()?;
        let router = SourceRouter::from_config(self.vault.config());
        let plan = build_plan_with_claims(&nodes, &router, &PathClaims::from_index(&index));
        for error in &plan.errors {
            warn!(error = %error, "node left out of the local tree");
        }
        report.unreachable = plan.errors.len();

        let mut touched = Vec::new();
        let mut interrupted = None;

        for entry in &plan.entries {
            if let Err(e) = self.guard.check() {
                interrupted = Some(e);
                break;
            }
            match self.pull_entry(entry, &index) {
                Ok(Outcome::Unchanged) => report.unchanged += 1,
                Ok(Outcome::Moved { path, from }) => {
                    report.moved += 1;
                    touched.extend([path, from]);
                }
                Ok(Outcome::Written { path, moved_from }) => {
                    report.written += 1;
                    report.moved += usize::from(moved_from.is_some());
                    touched.push(path);
                    touched.extend(moved_from);
                }
                Ok(Outcome::Merged { path, moved_from }) => {
                    report.merged += 1;
                    report.moved += usize::from(moved_from.is_some());
                    touched.push(path);
                    touched.extend(moved_from);
                }
                Err(e) if e.is_interrupt() => {
                    interrupted = Some(e);
                    break;
                }
                Err(e) => {
                    warn!(id = %entry.node.id, title = %entry.node.title, error = %e, "failed to pull node");
                    report.failures.push(DocumentFailure::new(entry.node.id.to_string(), &e));
                }
            }
        }

        ChangeDetector::new(self.vault).refresh(&touched)?;
        if let Some(e) = interrupted {
            return Err(e);
        }

        info!(
            listed = report.listed,
            written = report.written,
            merged = report.merged,
            moved = report.moved,
            unchanged = report.unchanged,
            failed = report.failures.len(),
            "pull finished"
        );
        Ok(report)
    }

    fn pull_entry(&self, entry: &PlanEntry<'_>, index: &HashMap<NodeId, String>) -> SyncResult<Outcome> {
        let node = entry.node;
        let (path, moved_from) = target_path(entry, index.get(&node.id).map(String::as_str));
        let source = moved_from.as_deref().unwrap_or(&path);
        let existing = if self.vault.exists(source) {
            Some(self.vault.read_document(source)?)
        } else {
            None
        };

        if let Some(doc) = existing.as_ref().filter(|doc| is_current(doc, node)) {
            let Some(from) = moved_from else {
                debug!(path = %path, "node unchanged");
                return Ok(Outcome::Unchanged);
            };
            self.vault.move_document(&from, &relocate(doc, entry, path.clone()))?;
            return Ok(Outcome::Moved { path, from });
        }

        let blocks = if node.is_database() {
            Vec::new()
        } else {
            collect_pages(|cursor| {
                self.guard
                    .call("list_children", || self.remote.list_children(&node.id, cursor))
            })?
        };
        let incoming = materialize(entry, path, &blocks, existing.as_ref(), Timestamp::now());

        let resolution = conflict::apply(self.vault, &incoming, existing.as_ref(), node.last_edited)?;
        if let Some(from) = &moved_from {
            self.vault.remove_document(from)?;
            info!(from = %from, to = %incoming.path, "document moved");
        }
        let path = incoming.path;
        Ok(match resolution {
            Resolution::Overwrite => Outcome::Written { path, moved_from },
            Resolution::Merged { .. } => Outcome::Merged { path, moved_from },
        })
    }
}

/// Path to write for a planned node, and the path it moves from.
///
/// A document stays where it is, unless the node switched between leaf and
/// container in the same slot.
fn target_path(entry: &PlanEntry<'_>, held: Option<&str>) -> (String, Option<String>) {
    match held {
        Some(held) if held != entry.path && slot_of(held) == slot_of(&entry.path) => {
            (entry.path.clone(), Some(held.to_string()))
        }
        Some(held) => (held.to_string(), None),
        None => (entry.path.clone(), None),
    }
}

/// Copy of a current document carrying its new place in the tree.
fn relocate(doc: &Document, entry: &PlanEntry<'_>, path: String) -> Document {
    let mut metadata = doc.metadata.clone();
    metadata.node_type = Some(entry.node_type);
    metadata.children_count = Some(entry.children_count);
    metadata.level = Some(entry.level);
    metadata.parent_id = entry.node.parent.clone();
    Document::new(path, metadata, doc.body.clone())
}

/// Returns true if `doc` already reflects the node's last remote edit.
fn is_current(doc: &Document, node: &Node) -> bool {
    doc.metadata.remote_id.as_ref() == Some(&node.id)
        && node.last_edited.is_some()
        && doc.metadata.updated == node.last_edited
}

/// Builds the document for a planned node.
///
/// Unknown metadata keys and the author marker of a prior version carry
/// over; sync and hierarchy fields are rewritten.
pub(crate) fn materialize(
    entry: &PlanEntry<'_>,
    path: String,
    blocks: &[Block],
    existing: Option<&Document>,
    now: Timestamp,
) -> Document {
    let node = entry.node;
    let mut metadata = Metadata::default();
    if let Some(prior) = existing {
        metadata.extra = prior.metadata.extra.clone();
        metadata.created_by = prior.metadata.created_by.clone();
        metadata.created_locally = prior.metadata.created_locally;
    }
    metadata.title = Some(if node.is_database() {
        format!("Database: {}", node.title)
    } else {
        node.title.clone()
    });
    metadata.remote_id = Some(node.id.clone());
    metadata.created = node.created;
    metadata.updated = node.last_edited;
    metadata.sync_status = Some(SyncStatus::Synced);
    metadata.sync_direction = Some(SyncDirection::FromRemote);
    metadata.synced_at = Some(now);
    metadata.parent_id = node.parent.clone();
    metadata.children_count = Some(entry.children_count);
    metadata.node_type = Some(entry.node_type);
    metadata.level = Some(entry.level);
    if node.is_database() {
        metadata.object_type = Some(ObjectType::DatabaseMain);
        metadata.database_name = Some(node.title.clone());
        let about = node
            .description
            .clone()
            .unwrap_or_else(|| format!("Main page of the database '{}'.", node.title));
        return Document::new(path, metadata, format!("# {}\n\n{about}\n", node.title));
    }

    let rendered = blocks_to_body(blocks);
    let body = if rendered.is_empty() {
        format!("# {}\n", node.title)
    } else {
        format!("# {}\n\n{rendered}", node.title)
    };
    Document::new(path, metadata, body)
}
