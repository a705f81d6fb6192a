//! Error types for mediatag-core.

use std::path::PathBuf;

use thiserror::Error;

/// Failures of the in-memory structures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A path segment did not resolve to a tracked directory.
    #[error("directory not found: '{path}'")]
    NotFound { path: String },

    /// A directory with the same long or short name already exists under the parent.
    #[error("directory '{name}' already exists under '{parent}'")]
    DirectoryExists { parent: String, name: String },

    /// The tracked root itself cannot be renamed, moved or removed.
    #[error("the tracked root cannot be modified")]
    RootImmutable,

    /// A directory cannot be moved below itself.
    #[error("cannot move '{from}' into its own subtree '{to}'")]
    MoveIntoSelf { from: String, to: String },
}

/// Failures of the tag query language.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Unbalanced parentheses, dangling operator, missing operand, empty query.
    #[error("query syntax error: {0}")]
    Syntax(String),

    /// A tag name in the query does not exist.
    #[error("unknown tag '{0}' in query")]
    UnknownTag(String),
}

/// Failures while loading `config.yaml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error with the file path and serde_yaml's line context.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// YAML serialization error (write path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A value parsed but is out of range.
    #[error("invalid config value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
