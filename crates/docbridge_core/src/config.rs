//! Vault configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for opening a vault.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Vault root directory.
    pub root: PathBuf,

    /// Whether to create the root and layout directories if missing.
    pub create_if_missing: bool,

    /// Subtree receiving pulled remote content.
    pub pulled_dir: String,

    /// Subtree for locally authored documents.
    pub local_dir: String,

    /// Subtree for pulled roots marked as shared work.
    pub collaboration_dir: String,

    /// Subtree for archive records.
    pub archive_dir: String,

    /// Author marker identifying locally authored documents.
    pub local_author: String,

    /// Slack between a recorded sync time and the file's mtime before the
    /// file counts as modified after sync.
    pub modified_grace: Duration,
}

impl VaultConfig {
    /// Creates a configuration with default layout names.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            create_if_missing: true,
            pulled_dir: "from-remote".to_string(),
            local_dir: "from-local".to_string(),
            collaboration_dir: "collaboration".to_string(),
            archive_dir: "archive".to_string(),
            local_author: "local".to_string(),
            modified_grace: Duration::from_secs(2),
        }
    }

    /// Sets whether to create missing directories.
    #[must_use]
    pub fn with_create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the pulled subtree name.
    #[must_use]
    pub fn with_pulled_dir(mut self, name: impl Into<String>) -> Self {
        self.pulled_dir = name.into();
        self
    }

    /// Sets the local subtree name.
    #[must_use]
    pub fn with_local_dir(mut self, name: impl Into<String>) -> Self {
        self.local_dir = name.into();
        self
    }

    /// Sets the collaboration subtree name.
    #[must_use]
    pub fn with_collaboration_dir(mut self, name: impl Into<String>) -> Self {
        self.collaboration_dir = name.into();
        self
    }

    /// Sets the archive subtree name.
    #[must_use]
    pub fn with_archive_dir(mut self, name: impl Into<String>) -> Self {
        self.archive_dir = name.into();
        self
    }

    /// Sets the local author marker.
    #[must_use]
    pub fn with_local_author(mut self, author: impl Into<String>) -> Self {
        self.local_author = author.into();
        self
    }

    /// Sets the modification grace window.
    #[must_use]
    pub fn with_modified_grace(mut self, grace: Duration) -> Self {
        self.modified_grace = grace;
        self
    }

    /// All layout subtrees, in creation order.
    #[must_use]
    pub fn layout(&self) -> [&str; 4] {
        [
            &self.pulled_dir,
            &self.local_dir,
            &self.collaboration_dir,
            &self.archive_dir,
        ]
    }
}
