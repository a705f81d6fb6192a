//! Domain types for the tag and media collections.
//!
//! Ids are dense slot indices; cross references between records are always
//! by id, never by reference. `sub_path` values are relative to the tracked
//! root, `/`-separated, without leading or trailing separator (`""` is the
//! root itself).

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sub_path;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Identifier of a tag; equal to its slot in the [`crate::TagIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(pub u32);

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u32> for TagId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Identifier of a media file; equal to its slot in the [`crate::MediaIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(pub u32);

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u32> for MediaId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A tag and the media it is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    /// Mirrors exactly the media whose `tag_ids` contain `id`.
    pub media_ids: BTreeSet<MediaId>,
}

impl Tag {
    pub fn new(id: TagId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            media_ids: BTreeSet::new(),
        }
    }

    pub fn summary(&self) -> TagSummary {
        TagSummary {
            id: self.id,
            name: self.name.clone(),
            media_count: self.media_ids.len(),
        }
    }
}

/// Identity of a media file without its tag relationships.
///
/// This is what the store persists and what discovery produces before an id
/// has been assigned (`id` is ignored by `MediaIndex::insert_new`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub id: MediaId,
    pub sub_path: String,
    pub long_name: String,
    #[serde(default)]
    pub short_name: String,
    /// Hex SHA-256 of the file bytes; empty when hashing failed.
    #[serde(default)]
    pub hash: String,
}

impl MediaInfo {
    pub fn new(
        sub_path: impl Into<String>,
        long_name: impl Into<String>,
        short_name: impl Into<String>,
        hash: impl Into<String>,
    ) -> Self {
        Self {
            id: MediaId(0),
            sub_path: sub_path.into(),
            long_name: long_name.into(),
            short_name: short_name.into(),
            hash: hash.into(),
        }
    }

    /// `sub_path/long_name`, the primary lookup key.
    pub fn sub_path_name(&self) -> String {
        sub_path::join(&self.sub_path, &self.long_name)
    }

    /// `sub_path/short_name`, present only when the file has a short alias.
    pub fn sub_path_short_name(&self) -> Option<String> {
        if self.short_name.is_empty() {
            None
        } else {
            Some(sub_path::join(&self.sub_path, &self.short_name))
        }
    }

    pub fn summary(&self) -> MediaSummary {
        MediaSummary {
            id: self.id,
            sub_path: self.sub_path.clone(),
            name: self.long_name.clone(),
            hash: self.hash.clone(),
        }
    }
}

/// A tracked media file and the tags attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    pub info: MediaInfo,
    /// Mirrors exactly the tags whose `media_ids` contain `info.id`.
    pub tag_ids: BTreeSet<TagId>,
}

impl Media {
    pub fn new(info: MediaInfo) -> Self {
        Self {
            info,
            tag_ids: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> MediaId {
        self.info.id
    }

    pub fn is_untagged(&self) -> bool {
        self.tag_ids.is_empty()
    }
}

/// One persisted tag-media relationship. Link rows carry no stable id of
/// their own; they are folded into the relationship sets at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagLink {
    pub tag_id: TagId,
    pub media_id: MediaId,
}

// ---------------------------------------------------------------------------
// Summaries handed to collaborators
// ---------------------------------------------------------------------------

/// Tag as seen by a UI or IPC client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSummary {
    pub id: TagId,
    pub name: String,
    pub media_count: usize,
}

/// Media as seen by a UI or IPC client. `name` is always the long name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSummary {
    pub id: MediaId,
    pub sub_path: String,
    pub name: String,
    pub hash: String,
}

impl MediaSummary {
    pub fn sub_path_name(&self) -> String {
        sub_path::join(&self.sub_path, &self.name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_display() {
        assert_eq!(TagId::from(7).to_string(), "7");
        assert_eq!(MediaId(3).to_string(), "3");
    }

    #[test]
    fn sub_path_keys_at_root_and_nested() {
        let root = MediaInfo::new("", "a.png", "", "");
        assert_eq!(root.sub_path_name(), "a.png");
        assert_eq!(root.sub_path_short_name(), None);

        let nested = MediaInfo::new("photos/2020", "holiday picture.jpeg", "HOLIDA~1.JPE", "");
        assert_eq!(nested.sub_path_name(), "photos/2020/holiday picture.jpeg");
        assert_eq!(
            nested.sub_path_short_name().as_deref(),
            Some("photos/2020/HOLIDA~1.JPE")
        );
    }

    #[test]
    fn ids_serialize_transparently() {
        let link = TagLink {
            tag_id: TagId(2),
            media_id: MediaId(9),
        };
        let json = serde_yaml::to_string(&link).expect("serialize");
        assert!(json.contains("tag_id: 2"));
        assert!(json.contains("media_id: 9"));
    }
}
