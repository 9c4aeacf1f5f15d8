//! Push phase: send local edits upstream.
//!
//! Safe mode applies throughout: a document linked to an ordinary remote
//! page (one the engine did not create as a synchronization record) never
//! causes a mutating call against that page. Database documents are
//! treated the same way.

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::guard::CycleGuard;
use crate::remote::{CreateNode, CreateParent, RemoteStore, LOCAL_PATH_PROPERTY};
use crate::report::{DocumentFailure, PushReport};
use docbridge_codec::body_to_blocks;
use docbridge_core::{
    file_stem, join, parent_dir, ChangeDetector, Document, NodeId, Properties, PropertyValue,
    PushResult, Scope, SyncDirection, Timestamp, VaultDir,
};
use tracing::{debug, info, warn};

/// How a candidate reaches the remote side.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    /// Update a synchronization record in place.
    ExistingRecord(NodeId),
    /// Linked to an original page; left alone.
    Original(NodeId),
    /// Needs a new remote node.
    New,
}

/// Returns true if `doc` should be considered for push.
pub(crate) fn is_candidate(doc: &Document, local_author: &str) -> bool {
    doc.is_pending()
        || (doc.is_authored_by(local_author)
            && doc.metadata.remote_id.is_none()
            && doc.metadata.pushed_at.is_none())
}

pub(crate) struct PushPhase<'a, R: RemoteStore + ?Sized> {
    pub(crate) vault: &'a VaultDir,
    pub(crate) remote: &'a R,
    pub(crate) config: &'a SyncConfig,
    pub(crate) guard: &'a CycleGuard<'a>,
}

impl<R: RemoteStore + ?Sized> PushPhase<'_, R> {
    pub(crate) fn run(&self) -> SyncResult<PushReport> {
        let detector = ChangeDetector::new(self.vault);
        let mut report = PushReport {
            detection: detector.process()?,
            ..PushReport::default()
        };

        let candidates = self.candidates()?;
        report.candidates = candidates.len();

        let mut touched = Vec::new();
        let mut consecutive_failures = 0;
        let mut degraded = false;
        let mut interrupted = None;

        for mut doc in candidates {
            if let Err(e) = self.guard.check() {
                interrupted = Some(e);
                break;
            }

            let outcome = if degraded {
                Ok(PushResult::Degraded)
            } else {
                self.push_document(&mut doc)
            };

            match outcome {
                Ok(result) => {
                    consecutive_failures = 0;
                    doc.mark_pushed(result, Timestamp::now());
                    if let Err(e) = self.vault.write_document(&doc) {
                        warn!(path = %doc.path, error = %e, "failed to record push result");
                        report.failures.push(DocumentFailure::new(doc.path.clone(), &e));
                        continue;
                    }
                    debug!(path = %doc.path, result = ?result, "document pushed");
                    tally(&mut report, result);
                    touched.push(doc.path);
                }
                Err(e) if e.is_interrupt() => {
                    interrupted = Some(e);
                    break;
                }
                Err(e) => {
                    warn!(path = %doc.path, error = %e, "failed to push document");
                    report.failures.push(DocumentFailure::new(doc.path.clone(), &e));
                    consecutive_failures += 1;
                    if consecutive_failures >= self.config.max_consecutive_failures {
                        warn!(
                            failures = consecutive_failures,
                            "push degraded; remaining documents are marked synced without remote effect"
                        );
                        degraded = true;
                    }
                    doc.mark_pushed(PushResult::Failed, Timestamp::now());
                    match self.vault.write_document(&doc) {
                        Ok(()) => touched.push(doc.path),
                        Err(e) => warn!(path = %doc.path, error = %e, "failed to record push result"),
                    }
                }
            }
        }

        detector.refresh(&touched)?;
        if let Some(e) = interrupted {
            return Err(e);
        }

        info!(
            candidates = report.candidates,
            updated = report.updated,
            created_children = report.created_children,
            created_records = report.created_records,
            skipped_original = report.skipped_original,
            degraded = report.degraded,
            failed = report.failures.len(),
            "push finished"
        );
        Ok(report)
    }

    /// Candidates, container indexes and shallow paths first so new parents
    /// exist before their children are created.
    fn candidates(&self) -> SyncResult<Vec<Document>> {
        let author = &self.vault.config().local_author;
        let mut docs = Vec::new();
        for rel in self.vault.scan(Scope::All)? {
            match self.vault.read_document(&rel) {
                Ok(doc) if is_candidate(&doc, author) => docs.push(doc),
                Ok(_) => {}
                Err(e) => warn!(path = %rel, error = %e, "skipping unreadable document"),
            }
        }
        docs.sort_by_key(|doc| (doc.path.matches('/').count(), !doc.is_index()));
        Ok(docs)
    }

    fn classify(&self, doc: &Document) -> SyncResult<Target> {
        if let Some(id) = doc.metadata.remote_id.clone() {
            if doc.is_database() {
                return Ok(Target::Original(id));
            }
            let node = self.guard.call("get_node", || self.remote.get_node(&id))?;
            match node {
                Some(node) if node.is_sync_record() => return Ok(Target::ExistingRecord(node.id)),
                Some(node) => return Ok(Target::Original(node.id)),
                None => debug!(path = %doc.path, id = %id, "linked node is gone"),
            }
        }

        let found = self
            .guard
            .call("find_record", || self.remote.find_record(&doc.path))?;
        Ok(match found {
            Some(record) => {
                debug!(path = %doc.path, id = %record.id, "found a record for this path");
                Target::ExistingRecord(record.id)
            }
            None => Target::New,
        })
    }

    fn push_document(&self, doc: &mut Document) -> SyncResult<PushResult> {
        match self.classify(doc)? {
            Target::ExistingRecord(id) => {
                let properties = self.record_properties(doc);
                let blocks = body_to_blocks(doc.content_without_title());
                self.guard
                    .call("update_properties", || self.remote.update_properties(&id, &properties))?;
                self.guard
                    .call("replace_blocks", || self.remote.replace_blocks(&id, &blocks))?;
                doc.metadata.remote_id = Some(id);
                Ok(PushResult::Updated)
            }
            Target::Original(id) => {
                info!(path = %doc.path, id = %id, "linked to an original page, leaving it untouched");
                Ok(PushResult::SkippedOriginal)
            }
            Target::New => self.create(doc),
        }
    }

    fn create(&self, doc: &mut Document) -> SyncResult<PushResult> {
        let title = doc.title();
        let blocks = body_to_blocks(doc.content_without_title());

        if let Some(parent) = self.resolve_parent(doc) {
            let request = CreateNode {
                parent: CreateParent::Page(parent.clone()),
                title: title.clone(),
                blocks: blocks.clone(),
                properties: Properties::new(),
            };
            match self.guard.call("create_node", || self.remote.create_node(&request)) {
                Ok(node) => {
                    let meta = &mut doc.metadata;
                    meta.remote_id = Some(node.id);
                    meta.sync_direction = Some(SyncDirection::FromRemote);
                    meta.parent_id = Some(parent);
                    meta.created_locally = Some(true);
                    return Ok(PushResult::CreatedChild);
                }
                Err(e) if e.is_interrupt() => return Err(e),
                Err(e) => {
                    warn!(path = %doc.path, parent = %parent, error = %e, "child page creation failed, using a synchronization record");
                }
            }
        }

        let request = CreateNode {
            parent: CreateParent::Records,
            title,
            blocks,
            properties: self.record_properties(doc),
        };
        let node = self
            .guard
            .call("create_node", || self.remote.create_node(&request))?;
        doc.metadata.remote_id = Some(node.id);
        doc.metadata.sync_direction = Some(SyncDirection::FromRemote);
        Ok(PushResult::CreatedRecord)
    }

    /// Remote id of the folder's index document. An index document looks
    /// one folder up.
    fn resolve_parent(&self, doc: &Document) -> Option<NodeId> {
        let mut dir = parent_dir(&doc.path);
        if doc.is_index() {
            dir = parent_dir(dir);
        }
        if dir.is_empty() {
            return None;
        }
        let index_path = join(dir, &format!("_{}.md", file_stem(dir)));
        if index_path == doc.path || !self.vault.exists(&index_path) {
            return None;
        }
        match self.vault.read_document(&index_path) {
            // Database rows cannot be created through a page parent.
            Ok(index) if index.is_database() => None,
            Ok(index) => index.metadata.remote_id,
            Err(e) => {
                warn!(path = %index_path, error = %e, "cannot read folder index");
                None
            }
        }
    }

    fn record_properties(&self, doc: &Document) -> Properties {
        let source = doc
            .metadata
            .created_by
            .clone()
            .unwrap_or_else(|| self.config.record_source.clone());
        let mut props = Properties::new();
        props.insert(
            self.config.record_title_property.clone(),
            PropertyValue::Title(doc.title()),
        );
        props.insert("Source".into(), PropertyValue::Select(source));
        props.insert("Folder".into(), PropertyValue::Text(parent_dir(&doc.path).to_string()));
        props.insert(LOCAL_PATH_PROPERTY.into(), PropertyValue::Text(doc.path.clone()));
        props.insert("Sync Status".into(), PropertyValue::Select("Synced".into()));
        props.insert("Last Updated".into(), PropertyValue::Date(Timestamp::now()));
        props
    }
}

fn tally(report: &mut PushReport, result: PushResult) {
    match result {
        PushResult::Updated => report.updated += 1,
        PushResult::CreatedChild => report.created_children += 1,
        PushResult::CreatedRecord => report.created_records += 1,
        PushResult::SkippedOriginal => report.skipped_original += 1,
        PushResult::Degraded => report.degraded += 1,
        PushResult::Failed => {}
    }
}
