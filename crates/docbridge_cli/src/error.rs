//! CLI error type.

use docbridge_core::CoreError;
use docbridge_sync_engine::SyncError;
use thiserror::Error;

/// Result alias for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors that end a CLI command with a non-zero exit status.
#[derive(Debug, Error)]
pub enum CliError {
    /// Engine or remote failure.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Vault failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The HTTP client could not be built.
    #[error("http client: {0}")]
    Http(#[from] reqwest::Error),

    /// Runtime or output failure.
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    /// Status could not be encoded.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// A cycle finished with a failed phase.
    #[error("sync cycle failed: {0}")]
    CycleFailed(String),

    /// Unknown output format.
    #[error("unknown output format '{0}' (expected text or json)")]
    Format(String),
}
