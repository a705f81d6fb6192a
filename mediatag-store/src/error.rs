//! Error types for mediatag-store.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from persistence and file hashing.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A table file exists but is not valid JSON for its record type.
    #[error("corrupt table at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// JSON serialization error (write path).
    #[error("table JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `update` or `remove` named a row the table does not hold.
    #[error("no row {key} in table '{table}'")]
    MissingRow { table: &'static str, key: String },

    /// The backend refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
