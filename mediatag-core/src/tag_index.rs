//! Tag collection with name lookup.
//!
//! Name uniqueness is the caller's contract: the daemon checks
//! `exists_by_name` under the same lock before inserting or renaming.
//! `link`/`unlink` touch only this side of the relationship; the daemon
//! updates the [`crate::MediaIndex`] side while holding both locks.

use std::collections::HashMap;

use crate::slots::SlotStore;
use crate::types::{MediaId, Tag, TagId, TagSummary};

#[derive(Debug, Default, Clone)]
pub struct TagIndex {
    tags: SlotStore<Tag>,
    by_name: HashMap<String, TagId>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_new(&mut self, name: &str) -> TagId {
        let id = TagId(self.tags.insert_with(|id| Tag::new(TagId(id), name)));
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Hydrate a persisted tag under its stored id.
    pub fn insert_loaded(&mut self, id: TagId, name: &str) {
        if let Some(displaced) = self.tags.insert_at(id.0, Tag::new(id, name)) {
            self.by_name.remove(&displaced.name);
        }
        self.by_name.insert(name.to_string(), id);
    }

    pub fn remove(&mut self, id: TagId) -> Option<Tag> {
        let tag = self.tags.remove(id.0)?;
        self.by_name.remove(&tag.name);
        Some(tag)
    }

    /// Returns the previous name, or `None` when `id` is not live.
    pub fn rename(&mut self, id: TagId, new_name: &str) -> Option<String> {
        let tag = self.tags.get_mut(id.0)?;
        let old = std::mem::replace(&mut tag.name, new_name.to_string());
        self.by_name.remove(&old);
        self.by_name.insert(new_name.to_string(), id);
        Some(old)
    }

    /// Add `media_id` to the tag's set. `false` if the tag is unknown or the
    /// link already existed.
    pub fn link(&mut self, id: TagId, media_id: MediaId) -> bool {
        match self.tags.get_mut(id.0) {
            Some(tag) => tag.media_ids.insert(media_id),
            None => false,
        }
    }

    pub fn unlink(&mut self, id: TagId, media_id: MediaId) -> bool {
        match self.tags.get_mut(id.0) {
            Some(tag) => tag.media_ids.remove(&media_id),
            None => false,
        }
    }

    pub fn exists(&self, id: TagId) -> bool {
        self.tags.contains(id.0)
    }

    pub fn exists_by_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn get(&self, id: TagId) -> Option<&Tag> {
        self.tags.get(id.0)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Tag> {
        self.by_name.get(name).and_then(|id| self.tags.get(id.0))
    }

    pub fn get_all(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter().map(|(_, tag)| tag)
    }

    pub fn summaries(&self) -> Vec<TagSummary> {
        self.get_all().map(Tag::summary).collect()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.tags.capacity()
    }

    pub fn is_free(&self, id: TagId) -> bool {
        self.tags.is_free(id.0)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
