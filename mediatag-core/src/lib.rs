//! mediatag core library: in-memory indices, the directory mirror, the
//! query language and the path rules.
//!
//! Public API surface:
//! - [`types`]: ids, records, summaries handed to collaborators
//! - [`slots`]: id-stable slot storage with hole reuse
//! - [`tag_index`] / [`media_index`]: the two record collections
//! - [`mirror`]: [`DirectoryMirror`], the tracked directory tree
//! - [`query`]: tag set expressions (`a + (b - c)`)
//! - [`ignore`] / [`mapping`]: `ignorefile` and `mediamap` rules
//! - [`config`]: `config.yaml`

pub mod config;
pub mod error;
pub mod ignore;
pub mod mapping;
pub mod media_index;
pub mod mirror;
pub mod query;
pub mod slots;
pub mod sub_path;
pub mod tag_index;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, CoreError, QueryError};
pub use ignore::{IgnoreList, PathFilter};
pub use mapping::{FilenameMap, TagMapper};
pub use media_index::MediaIndex;
pub use mirror::DirectoryMirror;
pub use query::{QueryEngine, QueryResult};
pub use slots::SlotStore;
pub use tag_index::TagIndex;
pub use types::{Media, MediaId, MediaInfo, MediaSummary, Tag, TagId, TagLink, TagSummary};
