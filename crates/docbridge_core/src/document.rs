//! Local documents and their metadata.
//!
//! A document is a Markdown file with a YAML preamble. The preamble maps to
//! [`Metadata`]; keys this crate does not know about are kept in
//! [`Metadata::extra`] and written back untouched.

use crate::error::CoreResult;
use crate::node::NodeId;
use crate::time::{self, Timestamp};
use docbridge_codec::frontmatter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Synchronization status of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Local and remote agree as far as the engine knows.
    Synced,
    /// A local change is waiting to be pushed.
    Pending,
}

/// Direction of the last synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Content came from (or is now owned by) the remote store.
    #[serde(alias = "from_notion")]
    FromRemote,
    /// Content is travelling to the remote store.
    #[serde(alias = "to_notion")]
    ToRemote,
}

/// Shape of a pulled node in the local tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Index document of a node that has children.
    ContainerIndex,
    /// Document of a node without children.
    Leaf,
}

/// Remote object a document stands for, when it is not an ordinary page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    /// Index document of a remote database.
    DatabaseMain,
}

/// Why the change detector flagged a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeReason {
    /// No state entry existed.
    NewFile,
    /// The fingerprint changed.
    ContentChanged,
    /// The file was touched after its last sync.
    ModifiedAfterSync,
}

impl ChangeReason {
    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeReason::NewFile => "new_file",
            ChangeReason::ContentChanged => "content_changed",
            ChangeReason::ModifiedAfterSync => "modified_after_sync",
        }
    }
}

/// Outcome of the last push for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushResult {
    /// An existing synchronization record was updated.
    Updated,
    /// A child page was created under the folder's index node.
    CreatedChild,
    /// A new synchronization record was created.
    CreatedRecord,
    /// The target is an original node and was left alone.
    SkippedOriginal,
    /// The push phase had degraded; nothing was sent.
    Degraded,
    /// Every remote call for the document failed; it will not be retried.
    Failed,
}

/// Front matter of a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "notion_id")]
    pub remote_id: Option<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "time::lenient")]
    pub created: Option<Timestamp>,
    /// Remote last-edit time at the last pull.
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "time::lenient")]
    pub updated: Option<Timestamp>,
    /// Last local update time.
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "time::lenient")]
    pub updated_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_status: Option<SyncStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_direction: Option<SyncDirection>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "time::lenient")]
    pub synced_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "time::lenient")]
    pub last_synced_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_reason: Option<ChangeReason>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "time::lenient")]
    pub change_detected_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_sync: Option<bool>,
    /// Author marker; equal to the configured local author for local work.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "notion_type")]
    pub object_type: Option<ObjectType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "time::lenient")]
    pub pushed_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_locally: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_result: Option<PushResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict_resolved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "time::lenient")]
    pub conflict_resolved_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_backup: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "time::lenient")]
    pub backup_created: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_path: Option<String>,
    /// Keys not listed above, preserved verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// A local document addressed by its vault-relative path.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Vault-relative path with `/` separators.
    pub path: String,
    /// Parsed front matter.
    pub metadata: Metadata,
    /// Markdown body.
    pub body: String,
}

impl Document {
    /// Creates a document.
    pub fn new(path: impl Into<String>, metadata: Metadata, body: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            metadata,
            body: body.into(),
        }
    }

    /// Parses raw file text.
    pub fn parse(path: impl Into<String>, text: &str) -> CoreResult<Self> {
        let (metadata, body) = frontmatter::parse::<Metadata>(text)?;
        Ok(Self {
            path: path.into(),
            metadata,
            body,
        })
    }

    /// Renders the document to file text.
    pub fn render(&self) -> CoreResult<String> {
        Ok(frontmatter::render(&self.metadata, &self.body)?)
    }

    /// File name without the `.md` extension.
    #[must_use]
    pub fn stem(&self) -> &str {
        file_stem(&self.path)
    }

    /// Title from metadata, falling back to the file stem.
    #[must_use]
    pub fn title(&self) -> String {
        match &self.metadata.title {
            Some(title) if !title.trim().is_empty() => title.clone(),
            _ => self.stem().trim_start_matches('_').to_string(),
        }
    }

    /// Body with a leading `# <title>` heading removed.
    ///
    /// Pulled documents carry their title as the first heading; the remote
    /// store keeps the title as a property instead.
    #[must_use]
    pub fn content_without_title(&self) -> &str {
        let title = self.title();
        let trimmed = self.body.trim_start();
        let mut lines = trimmed.splitn(2, '\n');
        match lines.next() {
            Some(first) if first.trim() == format!("# {title}") => {
                lines.next().unwrap_or("").trim_start_matches(['\r', '\n'])
            }
            _ => &self.body,
        }
    }

    /// Returns true if the document is waiting to be pushed.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.metadata.sync_status == Some(SyncStatus::Pending)
    }

    /// Returns true if the document carries the given author marker.
    #[must_use]
    pub fn is_authored_by(&self, author: &str) -> bool {
        self.metadata.created_by.as_deref() == Some(author)
    }

    /// Returns true if this is a folder index document (`<dir>/_<dir>.md`).
    #[must_use]
    pub fn is_index(&self) -> bool {
        is_index_path(&self.path)
    }

    /// Returns true if the document stands for a remote database.
    #[must_use]
    pub fn is_database(&self) -> bool {
        self.metadata.object_type == Some(ObjectType::DatabaseMain)
    }

    /// Flags the document for push.
    pub fn mark_pending(&mut self, reason: ChangeReason, detected_at: Timestamp, modified: Timestamp) {
        let meta = &mut self.metadata;
        if let Some(synced_at) = meta.synced_at {
            meta.last_synced_at = Some(synced_at);
        }
        meta.sync_status = Some(SyncStatus::Pending);
        meta.sync_direction = Some(SyncDirection::ToRemote);
        meta.change_reason = Some(reason);
        meta.change_detected_at = Some(detected_at);
        meta.needs_sync = Some(true);
        meta.updated_at = Some(modified);
    }

    /// Records a completed push.
    pub fn mark_pushed(&mut self, result: PushResult, at: Timestamp) {
        let meta = &mut self.metadata;
        meta.sync_status = Some(SyncStatus::Synced);
        meta.synced_at = Some(at);
        meta.pushed_at = Some(at);
        meta.needs_sync = Some(false);
        meta.push_result = Some(result);
    }
}

/// File name of a `/`-separated path without the `.md` extension.
#[must_use]
pub fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.strip_suffix(".md").unwrap_or(name)
}

/// Directory part of a `/`-separated path, empty at the vault root.
#[must_use]
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Returns true if `path` is `<...>/<dir>/_<dir>.md`.
#[must_use]
pub fn is_index_path(path: &str) -> bool {
    let dir = parent_dir(path);
    let dir_name = file_stem(dir);
    !dir_name.is_empty() && file_stem(path) == format!("_{dir_name}")
}

/// Joins `/`-separated path segments, skipping empty ones.
#[must_use]
pub fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{base}/{name}")
    }
}

/// Converts a relative filesystem path to the `/`-separated form.
#[must_use]
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "---\ntitle: Plan\nremote_id: ab-cd\nsync_status: synced\nsync_direction: from_notion\nupdated: 2024-01-01T10:00:00Z\ncustom_key: keep me\ntags:\n- a\n- b\n---\n\n# Plan\n\nBody text\n";

    #[test]
    fn parse_known_and_unknown_keys() {
        let doc = Document::parse("from-remote/Plan.md", SAMPLE).unwrap();
        let meta = &doc.metadata;
        assert_eq!(meta.title.as_deref(), Some("Plan"));
        assert_eq!(meta.remote_id, Some(NodeId::new("abcd")));
        assert_eq!(meta.sync_status, Some(SyncStatus::Synced));
        assert_eq!(meta.sync_direction, Some(SyncDirection::FromRemote));
        assert!(meta.updated.is_some());
        assert_eq!(
            meta.extra.get("custom_key"),
            Some(&serde_yaml::Value::String("keep me".into()))
        );
        assert!(meta.extra.contains_key("tags"));
        assert_eq!(doc.body, "# Plan\n\nBody text\n");
    }

    #[test]
    fn database_keys() {
        let doc = Document::parse(
            "from-remote/Tasks/_Tasks.md",
            "---\nnotion_id: db1\nnotion_type: database_main\ndatabase_name: Tasks\n---\n\n# Tasks\n",
        )
        .unwrap();
        assert!(doc.is_database());
        assert_eq!(doc.metadata.database_name.as_deref(), Some("Tasks"));
        assert!(doc.render().unwrap().contains("object_type: database_main"));
    }

    #[test]
    fn unknown_keys_survive_rewrite() {
        let doc = Document::parse("a.md", SAMPLE).unwrap();
        let text = doc.render().unwrap();
        assert!(text.contains("custom_key: keep me"));
        assert!(text.contains("remote_id: abcd"));
        let again = Document::parse("a.md", &text).unwrap();
        assert_eq!(again, doc);
    }

    #[test]
    fn bad_dates_are_dropped_not_fatal() {
        let doc = Document::parse("a.md", "---\nupdated_at: someday\n---\nx").unwrap();
        assert!(doc.metadata.updated_at.is_none());
    }

    #[test]
    fn no_front_matter() {
        let doc = Document::parse("notes/Idea.md", "just text").unwrap();
        assert_eq!(doc.metadata, Metadata::default());
        assert_eq!(doc.title(), "Idea");
    }

    #[test]
    fn mark_pending_copies_synced_at() {
        let mut doc = Document::parse("a.md", SAMPLE).unwrap();
        let synced = Timestamp::parse("2024-01-02T00:00:00Z").unwrap();
        doc.metadata.synced_at = Some(synced);
        let now = Timestamp::now();
        doc.mark_pending(ChangeReason::ContentChanged, now, now);

        assert!(doc.is_pending());
        assert_eq!(doc.metadata.last_synced_at, Some(synced));
        assert_eq!(doc.metadata.sync_direction, Some(SyncDirection::ToRemote));
        assert_eq!(doc.metadata.needs_sync, Some(true));
        assert_eq!(doc.metadata.change_reason, Some(ChangeReason::ContentChanged));
        assert_eq!(doc.metadata.updated_at, Some(now));
    }

    #[test]
    fn strips_title_heading() {
        let doc = Document::parse("a.md", SAMPLE).unwrap();
        assert_eq!(doc.content_without_title(), "Body text\n");

        let other = Document::new("b.md", Metadata::default(), "# Other\n\ntext");
        assert_eq!(other.content_without_title(), "# Other\n\ntext");
    }

    #[test]
    fn path_helpers() {
        assert_eq!(file_stem("a/b/_b.md"), "_b");
        assert_eq!(parent_dir("a/b/_b.md"), "a/b");
        assert_eq!(parent_dir("top.md"), "");
        assert!(is_index_path("from-remote/Proj/_Proj.md"));
        assert!(!is_index_path("from-remote/Proj/Task.md"));
        assert!(!is_index_path("_root.md"));
        assert_eq!(join("", "x.md"), "x.md");
        assert_eq!(join("a", "x.md"), "a/x.md");
    }
}
