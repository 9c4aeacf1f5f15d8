//! Error types for docbridge core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in vault and engine-support operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Front matter or body codec error.
    #[error("codec error: {0}")]
    Codec(#[from] docbridge_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON (state/ledger) serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Another engine instance holds the vault lock.
    #[error("vault locked: another process has exclusive access")]
    VaultLocked,

    /// The vault root is missing or not a directory.
    #[error("invalid vault layout: {message}")]
    InvalidLayout {
        /// Description of the problem.
        message: String,
    },

    /// A document path escapes the vault or is otherwise unusable.
    #[error("invalid document path: {path}")]
    InvalidPath {
        /// The rejected path.
        path: String,
    },

    /// An archive record with the same name already exists.
    #[error("archive record already exists: {path}")]
    ArchiveExists {
        /// Path of the existing record.
        path: String,
    },
}

impl CoreError {
    /// Creates an invalid layout error.
    pub fn invalid_layout(message: impl Into<String>) -> Self {
        Self::InvalidLayout {
            message: message.into(),
        }
    }

    /// Creates an invalid path error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath { path: path.into() }
    }
}
