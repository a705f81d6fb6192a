use std::path::PathBuf;

use mediatag_core::{ConfigError, CoreError, MediaId, QueryError, TagId};
use mediatag_store::StoreError;
use thiserror::Error;

/// Error surface for the sync engine, the mutation API and the socket protocol.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Opening or loading the store failed during startup.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The in-memory change was applied but writing it through failed.
    #[error("persistence failed, memory and storage may disagree: {0}")]
    Persistence(#[source] StoreError),

    #[error("{0}")]
    Directory(CoreError),

    #[error("{0}")]
    Query(#[from] QueryError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // --- validation -------------------------------------------------------
    #[error("tag name must not be empty")]
    EmptyTagName,

    #[error("tag '{0}' already exists")]
    DuplicateTag(String),

    #[error("no tag with id {0}")]
    UnknownTagId(TagId),

    #[error("no tag named '{0}'")]
    UnknownTagName(String),

    #[error("no media with id {0}")]
    UnknownMedia(MediaId),

    #[error("tag {tag_id} is already linked to media {media_id}")]
    AlreadyLinked { tag_id: TagId, media_id: MediaId },

    #[error("tag {tag_id} is not linked to media {media_id}")]
    NotLinked { tag_id: TagId, media_id: MediaId },

    #[error("media already tracked at '{0}'")]
    DuplicateMediaPath(String),

    #[error("directory '{0}' is not tracked")]
    DirectoryNotFound(String),

    // --- runtime ----------------------------------------------------------
    #[error("filesystem watch could not be re-armed: {0}")]
    WatchDisarmed(String),

    #[error("daemon protocol error: {0}")]
    Protocol(String),

    #[error("daemon is not running (socket missing: {socket})")]
    DaemonNotRunning { socket: PathBuf },
}

impl DaemonError {
    /// Caller mistakes that leave all state untouched.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyTagName
                | Self::DuplicateTag(_)
                | Self::UnknownTagId(_)
                | Self::UnknownTagName(_)
                | Self::UnknownMedia(_)
                | Self::AlreadyLinked { .. }
                | Self::NotLinked { .. }
                | Self::DuplicateMediaPath(_)
                | Self::DirectoryNotFound(_)
                | Self::Directory(_)
                | Self::Query(_)
        )
    }
}

impl From<CoreError> for DaemonError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound { path } => Self::DirectoryNotFound(path),
            other => Self::Directory(other),
        }
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
