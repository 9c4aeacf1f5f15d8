//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The remote store rejected or failed a request.
    #[error("remote error: {message}")]
    Remote {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The remote rejected the API token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The remote returned a payload that could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Vault error.
    #[error("vault error: {0}")]
    Core(#[from] docbridge_core::CoreError),

    /// Renderer or front matter error.
    #[error("codec error: {0}")]
    Codec(#[from] docbridge_codec::CodecError),

    /// Required access configuration is missing.
    #[error("missing credential: {name}")]
    MissingCredential {
        /// Name of the missing setting.
        name: String,
    },

    /// Sync was cancelled.
    #[error("sync cancelled")]
    Cancelled,

    /// The cycle deadline passed.
    #[error("sync cycle timed out")]
    Timeout,

    /// Invalid state transition.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },

    /// No synchronization record collection is configured or reachable.
    #[error("synchronization records unavailable")]
    RecordsUnavailable,
}

impl SyncError {
    /// Creates a retryable remote error.
    pub fn remote_retryable(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable remote error.
    pub fn remote_fatal(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a missing credential error.
    pub fn missing_credential(name: impl Into<String>) -> Self {
        Self::MissingCredential { name: name.into() }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Remote { retryable: true, .. })
    }

    /// Returns true if this error stops the whole cycle rather than one
    /// document.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, SyncError::Cancelled | SyncError::Timeout)
    }
}
