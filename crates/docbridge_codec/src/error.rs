//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while splitting, parsing or rendering documents.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The front matter block was opened but never closed.
    #[error("unterminated front matter: {message}")]
    UnterminatedFrontMatter {
        /// Description of where parsing stopped.
        message: String,
    },

    /// The front matter could not be decoded into metadata.
    #[error("invalid front matter: {message}")]
    InvalidFrontMatter {
        /// Description of the decoding error.
        message: String,
    },

    /// Metadata could not be encoded as YAML.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// Heading level outside the supported range.
    #[error("unsupported heading level: {level}")]
    UnsupportedHeadingLevel {
        /// The rejected level.
        level: u8,
    },
}

impl CodecError {
    /// Create an unterminated front matter error.
    pub fn unterminated(message: impl Into<String>) -> Self {
        Self::UnterminatedFrontMatter {
            message: message.into(),
        }
    }

    /// Create an invalid front matter error.
    pub fn invalid_front_matter(message: impl Into<String>) -> Self {
        Self::InvalidFrontMatter {
            message: message.into(),
        }
    }

    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }
}
