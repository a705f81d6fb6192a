//! Record types and the per-table repository interface.
//!
//! One generic trait serves all three tables; each record type names its
//! table and its key.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use mediatag_core::{MediaId, MediaInfo, Tag, TagId, TagLink};

use crate::error::StoreError;

/// A row type stored in one table.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    type Key: Ord + Copy + Debug + Send + Sync + 'static;

    /// Table name; the JSON backend stores it as `<TABLE>.json`.
    const TABLE: &'static str;

    fn key(&self) -> Self::Key;
}

/// CRUD over one table. Implementations synchronise internally so a shared
/// reference is enough.
pub trait Repository<R: Record>: Send + Sync {
    fn insert(&self, record: &R) -> Result<(), StoreError>;
    fn insert_batch(&self, records: &[R]) -> Result<(), StoreError>;
    fn update(&self, record: &R) -> Result<(), StoreError>;
    fn update_batch(&self, records: &[R]) -> Result<(), StoreError>;
    fn remove(&self, key: R::Key) -> Result<(), StoreError>;
    fn remove_batch(&self, keys: &[R::Key]) -> Result<(), StoreError>;
    fn get_all(&self) -> Result<Vec<R>, StoreError>;
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Persisted tag row. `count` is the number of linked media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub id: TagId,
    pub count: usize,
    pub name: String,
}

impl From<&Tag> for TagRecord {
    fn from(tag: &Tag) -> Self {
        Self {
            id: tag.id,
            count: tag.media_ids.len(),
            name: tag.name.clone(),
        }
    }
}

impl Record for TagRecord {
    type Key = TagId;
    const TABLE: &'static str = "tags";

    fn key(&self) -> TagId {
        self.id
    }
}

/// Media rows are the media identity itself.
impl Record for MediaInfo {
    type Key = MediaId;
    const TABLE: &'static str = "media";

    fn key(&self) -> MediaId {
        self.id
    }
}

/// Link rows have no identity beyond the pair they join.
impl Record for TagLink {
    type Key = (TagId, MediaId);
    const TABLE: &'static str = "tag_links";

    fn key(&self) -> (TagId, MediaId) {
        (self.tag_id, self.media_id)
    }
}
