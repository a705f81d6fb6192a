//! Media collection with path lookup by either name alias.
//!
//! Both `sub_path/long_name` and, when present, `sub_path/short_name` key
//! into the same record. Path uniqueness is enforced by the daemon before
//! insertion, as with tag names.

use std::collections::HashMap;

use crate::slots::SlotStore;
use crate::types::{Media, MediaId, MediaInfo, TagId};

#[derive(Debug, Default, Clone)]
pub struct MediaIndex {
    media: SlotStore<Media>,
    by_long: HashMap<String, MediaId>,
    by_short: HashMap<String, MediaId>,
}

impl MediaIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `info` under a fresh id; `info.id` is overwritten.
    pub fn insert_new(&mut self, mut info: MediaInfo) -> MediaId {
        let id = MediaId(self.media.insert_with(|id| {
            info.id = MediaId(id);
            Media::new(info)
        }));
        self.index_keys(id);
        id
    }

    /// Hydrate a persisted record under its stored `info.id`.
    pub fn insert_loaded(&mut self, info: MediaInfo) {
        let id = info.id;
        if let Some(displaced) = self.media.insert_at(id.0, Media::new(info)) {
            self.drop_keys(&displaced.info);
        }
        self.index_keys(id);
    }

    pub fn remove(&mut self, id: MediaId) -> Option<Media> {
        let media = self.media.remove(id.0)?;
        self.drop_keys(&media.info);
        Some(media)
    }

    /// Change the file's names within its directory. Returns the previous
    /// record identity.
    pub fn rename(&mut self, id: MediaId, long_name: &str, short_name: &str) -> Option<MediaInfo> {
        self.rekey(id, |info| {
            info.long_name = long_name.to_string();
            info.short_name = short_name.to_string();
        })
    }

    /// Move the file to another directory, keeping its names.
    pub fn move_to(&mut self, id: MediaId, sub_path: &str) -> Option<MediaInfo> {
        self.rekey(id, |info| info.sub_path = sub_path.to_string())
    }

    /// Replace the record identity wholesale (used for resolved moves where
    /// both location and names may differ).
    pub fn relocate(&mut self, id: MediaId, sub_path: &str, long_name: &str, short_name: &str) -> Option<MediaInfo> {
        self.rekey(id, |info| {
            info.sub_path = sub_path.to_string();
            info.long_name = long_name.to_string();
            info.short_name = short_name.to_string();
        })
    }

    pub fn update_hash(&mut self, id: MediaId, hash: &str) -> bool {
        match self.media.get_mut(id.0) {
            Some(media) => {
                media.info.hash = hash.to_string();
                true
            }
            None => false,
        }
    }

    pub fn link(&mut self, id: MediaId, tag_id: TagId) -> bool {
        match self.media.get_mut(id.0) {
            Some(media) => media.tag_ids.insert(tag_id),
            None => false,
        }
    }

    pub fn unlink(&mut self, id: MediaId, tag_id: TagId) -> bool {
        match self.media.get_mut(id.0) {
            Some(media) => media.tag_ids.remove(&tag_id),
            None => false,
        }
    }

    pub fn exists(&self, id: MediaId) -> bool {
        self.media.contains(id.0)
    }

    /// `sub_path_name` may use either the long or the short name.
    pub fn exists_by_path(&self, sub_path_name: &str) -> bool {
        self.id_by_path(sub_path_name).is_some()
    }

    pub fn id_by_path(&self, sub_path_name: &str) -> Option<MediaId> {
        self.by_long
            .get(sub_path_name)
            .or_else(|| self.by_short.get(sub_path_name))
            .copied()
    }

    pub fn get(&self, id: MediaId) -> Option<&Media> {
        self.media.get(id.0)
    }

    pub fn get_by_path(&self, sub_path_name: &str) -> Option<&Media> {
        self.id_by_path(sub_path_name).and_then(|id| self.media.get(id.0))
    }

    pub fn get_all(&self) -> impl Iterator<Item = &Media> {
        self.media.iter().map(|(_, media)| media)
    }

    pub fn untagged(&self) -> impl Iterator<Item = &Media> {
        self.get_all().filter(|media| media.is_untagged())
    }

    pub fn len(&self) -> usize {
        self.media.len()
    }

    pub fn is_empty(&self) -> bool {
        self.media.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.media.capacity()
    }

    pub fn is_free(&self, id: MediaId) -> bool {
        self.media.is_free(id.0)
    }

    // -----------------------------------------------------------------------

    fn rekey(&mut self, id: MediaId, change: impl FnOnce(&mut MediaInfo)) -> Option<MediaInfo> {
        let media = self.media.get_mut(id.0)?;
        let old = media.info.clone();
        change(&mut media.info);
        self.drop_keys(&old);
        self.index_keys(id);
        Some(old)
    }

    fn index_keys(&mut self, id: MediaId) {
        let Some(media) = self.media.get(id.0) else {
            return;
        };
        self.by_long.insert(media.info.sub_path_name(), id);
        if let Some(short) = media.info.sub_path_short_name() {
            self.by_short.insert(short, id);
        }
    }

    fn drop_keys(&mut self, info: &MediaInfo) {
        self.by_long.remove(&info.sub_path_name());
        if let Some(short) = info.sub_path_short_name() {
            self.by_short.remove(&short);
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn info(sub_path: &str, long: &str, short: &str) -> MediaInfo {
        MediaInfo::new(sub_path, long, short, "h")
    }

    #[test]
    fn lookup_by_either_alias() {
        let mut index = MediaIndex::new();
        let id = index.insert_new(info("docs", "Long Picture.jpeg", "LONGPI~1.JPE"));

        assert_eq!(index.id_by_path("docs/Long Picture.jpeg"), Some(id));
        assert_eq!(index.id_by_path("docs/LONGPI~1.JPE"), Some(id));
        assert!(!index.exists_by_path("Long Picture.jpeg"));
        assert_eq!(index.get(id).map(|m| m.info.id), Some(id));
    }

    #[test]
    fn move_and_rename_rekey_lookups() {
        let mut index = MediaIndex::new();
        let id = index.insert_new(info("a", "x.png", "X~1.PNG"));

        let old = index.move_to(id, "b").expect("live media");
        assert_eq!(old.sub_path, "a");
        assert!(!index.exists_by_path("a/x.png"));
        assert!(!index.exists_by_path("a/X~1.PNG"));
        assert_eq!(index.id_by_path("b/x.png"), Some(id));

        index.rename(id, "y.png", "").expect("live media");
        assert!(!index.exists_by_path("b/X~1.PNG"));
        assert_eq!(index.id_by_path("b/y.png"), Some(id));
    }

    #[test]
    fn remove_frees_keys_and_id() {
        let mut index = MediaIndex::new();
        let first = index.insert_new(info("", "1.png", ""));
        index.insert_new(info("", "2.png", ""));

        assert!(index.remove(first).is_some());
        assert!(!index.exists_by_path("1.png"));
        assert!(index.is_free(first));
        assert_eq!(index.insert_new(info("", "3.png", "")), first);
    }

    #[test]
    fn untagged_tracks_links() {
        let mut index = MediaIndex::new();
        let a = index.insert_new(info("", "a.png", ""));
        let b = index.insert_new(info("", "b.png", ""));
        assert!(index.link(a, TagId(0)));

        let untagged: Vec<_> = index.untagged().map(Media::id).collect();
        assert_eq!(untagged, vec![b]);

        assert!(index.unlink(a, TagId(0)));
        assert_eq!(index.untagged().count(), 2);
    }

    #[test]
    fn loaded_records_keep_their_ids() {
        let mut index = MediaIndex::new();
        let mut record = info("p", "q.png", "");
        record.id = MediaId(3);
        index.insert_loaded(record);

        assert_eq!(index.id_by_path("p/q.png"), Some(MediaId(3)));
        assert_eq!(index.capacity(), 4);
        assert_eq!(index.len(), 1);
        assert!(index.update_hash(MediaId(3), "fresh"));
        assert_eq!(index.get(MediaId(3)).map(|m| m.info.hash.as_str()), Some("fresh"));
    }
}
