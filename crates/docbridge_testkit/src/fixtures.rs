//! Test fixtures and vault helpers.
//!
//! A [`TestVault`] owns a temporary directory. Raw reads and writes go
//! straight to the filesystem so tests can inspect a vault while an engine
//! holds its lock.

use docbridge_core::{
    Document, Metadata, NodeId, SyncStatus, Timestamp, VaultConfig, VaultDir,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::TempDir;

/// A vault in a temporary directory.
pub struct TestVault {
    config: VaultConfig,
    _temp_dir: TempDir,
}

impl TestVault {
    /// Creates an empty vault with the default layout names.
    pub fn new() -> Self {
        Self::with_config(|config| config)
    }

    /// Creates an empty vault, adjusting the default configuration.
    pub fn with_config(adjust: impl FnOnce(VaultConfig) -> VaultConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = adjust(VaultConfig::new(temp_dir.path()));
        Self {
            config,
            _temp_dir: temp_dir,
        }
    }

    /// Vault root.
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// A copy of the vault configuration.
    pub fn config(&self) -> VaultConfig {
        self.config.clone()
    }

    /// Opens the vault, taking its lock.
    pub fn open(&self) -> VaultDir {
        VaultDir::open(self.config()).expect("Failed to open vault")
    }

    /// Absolute path of a vault-relative path.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    /// Writes raw file text, creating parent directories.
    pub fn write(&self, rel: &str, text: &str) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create directory");
        }
        fs::write(path, text).expect("Failed to write file");
    }

    /// Writes a document at its own path.
    pub fn write_doc(&self, doc: &Document) {
        self.write(&doc.path, &doc.render().expect("Failed to render document"));
    }

    /// Reads raw file text.
    pub fn read_raw(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).expect("Failed to read file")
    }

    /// Reads and parses a document.
    pub fn read(&self, rel: &str) -> Document {
        Document::parse(rel, &self.read_raw(rel)).expect("Failed to parse document")
    }

    /// Returns true if a file exists.
    pub fn exists(&self, rel: &str) -> bool {
        self.path(rel).is_file()
    }

    /// Sorted relative paths of the Markdown files under `dir`.
    pub fn files_in(&self, dir: &str) -> Vec<String> {
        let base = self.path(dir);
        let mut out = Vec::new();
        let mut stack = vec![base];
        while let Some(current) = stack.pop() {
            let Ok(entries) = fs::read_dir(&current) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if path.extension().and_then(|e| e.to_str()) == Some("md") {
                    let rel = path
                        .strip_prefix(self.root())
                        .expect("path inside vault")
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                        .join("/");
                    out.push(rel);
                }
            }
        }
        out.sort();
        out
    }

    /// Sets a file's modification time.
    pub fn set_modified(&self, rel: &str, at: SystemTime) {
        let file = fs::OpenOptions::new()
            .write(true)
            .open(self.path(rel))
            .expect("Failed to open file");
        file.set_modified(at).expect("Failed to set mtime");
    }
}

impl Default for TestVault {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds documents with front matter for fixtures.
#[derive(Debug, Clone)]
pub struct DocBuilder {
    path: String,
    metadata: Metadata,
    body: String,
}

impl DocBuilder {
    /// Starts a document at `path` with no front matter and an empty body.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            metadata: Metadata::default(),
            body: String::new(),
        }
    }

    /// Sets the title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.metadata.title = Some(title.into());
        self
    }

    /// Links the document to a remote node.
    pub fn remote_id(mut self, id: impl Into<NodeId>) -> Self {
        self.metadata.remote_id = Some(id.into());
        self
    }

    /// Marks the document pending.
    pub fn pending(mut self) -> Self {
        self.metadata.sync_status = Some(SyncStatus::Pending);
        self.metadata.needs_sync = Some(true);
        self
    }

    /// Marks the document synced at `at`.
    pub fn synced(mut self, at: Timestamp) -> Self {
        self.metadata.sync_status = Some(SyncStatus::Synced);
        self.metadata.synced_at = Some(at);
        self
    }

    /// Sets the author marker.
    pub fn created_by(mut self, author: impl Into<String>) -> Self {
        self.metadata.created_by = Some(author.into());
        self
    }

    /// Sets the local update time.
    pub fn updated_at(mut self, at: Timestamp) -> Self {
        self.metadata.updated_at = Some(at);
        self
    }

    /// Sets the remote edit time seen at the last pull.
    pub fn updated(mut self, at: Timestamp) -> Self {
        self.metadata.updated = Some(at);
        self
    }

    /// Sets the body.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Finishes the document.
    pub fn build(self) -> Document {
        Document::new(self.path, self.metadata, self.body)
    }
}

/// Parses a timestamp literal.
pub fn ts(text: &str) -> Timestamp {
    Timestamp::parse(text).expect("Invalid timestamp literal")
}
