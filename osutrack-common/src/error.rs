//! Common error types for osutrack

use thiserror::Error;

/// Common result type for osutrack operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the decoders, pipelines and query layer
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or truncated binary/text input
    #[error("Format error at offset {offset}: {message}")]
    Format { offset: u64, message: String },

    /// A required file or directory is absent
    #[error("Missing resource: {0}")]
    MissingResource(String),

    /// The external difficulty calculator failed for one item
    #[error("Enrichment error: {0}")]
    Enrichment(String),

    /// Batch write or query failure (wraps sqlx::Error)
    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Structured (JSON) serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Build a format error at the given stream offset
    pub fn format(offset: usize, message: impl Into<String>) -> Self {
        Error::Format {
            offset: offset as u64,
            message: message.into(),
        }
    }

    /// Prefix the message of a format error, keeping its offset
    pub fn with_context(self, context: impl std::fmt::Display) -> Self {
        match self {
            Error::Format { offset, message } => Error::Format {
                offset,
                message: format!("{context}: {message}"),
            },
            other => other,
        }
    }
}
