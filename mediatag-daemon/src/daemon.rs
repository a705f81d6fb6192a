//! The owner of all tracked state and the only place that mutates it.
//!
//! Lock order is tags, then media, then mirror. Every entry point takes the
//! subset it needs in that order and holds it across the store write, so a
//! reader never observes memory that is ahead of a half-applied batch.
//!
//! Validation failures leave memory and storage untouched and are logged at
//! `warn`. A store failure after the in-memory change is logged at `error`;
//! the notifications for the change are still delivered before the
//! [`DaemonError::Persistence`] is returned.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use mediatag_core::{
    sub_path, DirectoryMirror, MediaId, MediaIndex, MediaInfo, MediaSummary, PathFilter, QueryEngine,
    TagId, TagIndex, TagLink, TagMapper, TagSummary,
};
use mediatag_store::{hash_file_or_empty, Persistence, StoreError, TagRecord};

use crate::error::DaemonError;
use crate::notification::{Notification, Notifier};

// ---------------------------------------------------------------------------
// Results handed to clients
// ---------------------------------------------------------------------------

/// Media selected by a tag or query, with the tags that selected them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaQueryResult {
    pub media: Vec<MediaSummary>,
    pub tag_ids: BTreeSet<TagId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub root: PathBuf,
    pub tags: usize,
    pub media: usize,
    pub untagged: usize,
    pub directories: usize,
}

// ---------------------------------------------------------------------------
// Daemon
// ---------------------------------------------------------------------------

pub struct Daemon {
    pub(crate) root: PathBuf,
    pub(crate) tags: RwLock<TagIndex>,
    pub(crate) media: RwLock<MediaIndex>,
    pub(crate) mirror: Mutex<DirectoryMirror>,
    pub(crate) store: Persistence,
    pub(crate) filter: Box<dyn PathFilter>,
    pub(crate) mapper: Box<dyn TagMapper>,
    pub(crate) notifier: Notifier,
}

impl Daemon {
    /// An empty daemon over `root`. Call [`crate::init::initialize`] to load
    /// the store and reconcile it with the disk.
    pub fn new(
        root: impl Into<PathBuf>,
        store: Persistence,
        filter: Box<dyn PathFilter>,
        mapper: Box<dyn TagMapper>,
        notifier: Notifier,
    ) -> Self {
        Self {
            root: root.into(),
            tags: RwLock::new(TagIndex::new()),
            media: RwLock::new(MediaIndex::new()),
            mirror: Mutex::new(DirectoryMirror::new()),
            store,
            filter,
            mapper,
            notifier,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn filter(&self) -> &dyn PathFilter {
        self.filter.as_ref()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Absolute location of a `/`-separated path below the root.
    pub fn abs_path(&self, sub_path_name: &str) -> PathBuf {
        sub_path::segments(sub_path_name).fold(self.root.clone(), |path, segment| path.join(segment))
    }

    // -----------------------------------------------------------------------
    // Tags
    // -----------------------------------------------------------------------

    pub fn add_tag(&self, name: &str) -> Result<TagId, DaemonError> {
        if name.trim().is_empty() {
            return rejected("add_tag", DaemonError::EmptyTagName);
        }
        let mut tags = write(&self.tags);
        if tags.exists_by_name(name) {
            return rejected("add_tag", DaemonError::DuplicateTag(name.to_string()));
        }
        let id = tags.insert_new(name);
        let summary = TagSummary {
            id,
            name: name.to_string(),
            media_count: 0,
        };

        let written = self.store.tags.insert(&tag_record(&summary));
        self.notifier.emit(Notification::TagInserted { tag: summary });
        persisted("add_tag", written)?;
        tracing::info!(tag_id = %id, name, "tag added");
        Ok(id)
    }

    pub fn rename_tag(&self, id: TagId, new_name: &str) -> Result<(), DaemonError> {
        if new_name.trim().is_empty() {
            return rejected("rename_tag", DaemonError::EmptyTagName);
        }
        let mut tags = write(&self.tags);
        let Some(tag) = tags.get(id) else {
            return rejected("rename_tag", DaemonError::UnknownTagId(id));
        };
        if tag.name == new_name {
            return Ok(());
        }
        if tags.exists_by_name(new_name) {
            return rejected("rename_tag", DaemonError::DuplicateTag(new_name.to_string()));
        }
        let record = TagRecord {
            id,
            count: tag.media_ids.len(),
            name: new_name.to_string(),
        };
        tags.rename(id, new_name);

        let written = self.store.tags.update(&record);
        self.notifier.emit(Notification::TagRenamed {
            tag_id: id,
            name: new_name.to_string(),
        });
        persisted("rename_tag", written)?;
        tracing::info!(tag_id = %id, name = new_name, "tag renamed");
        Ok(())
    }

    /// Delete a tag and every link to it. Media left without tags are
    /// reported as untagged.
    pub fn remove_tag(&self, id: TagId) -> Result<(), DaemonError> {
        let mut tags = write(&self.tags);
        let mut media = write(&self.media);
        let Some(tag) = tags.remove(id) else {
            return rejected("remove_tag", DaemonError::UnknownTagId(id));
        };

        let mut untagged = Vec::new();
        for media_id in &tag.media_ids {
            media.unlink(*media_id, id);
            if let Some(entry) = media.get(*media_id).filter(|m| m.is_untagged()) {
                untagged.push(entry.info.summary());
            }
        }
        let keys: Vec<(TagId, MediaId)> = tag.media_ids.iter().map(|media_id| (id, *media_id)).collect();

        let written = self
            .store
            .links
            .remove_batch(&keys)
            .and_then(|()| self.store.tags.remove(id));
        for summary in untagged {
            self.notifier.emit(Notification::MediaUntagged { media: summary });
        }
        self.notifier.emit(Notification::TagRemoved { tag_id: id });
        persisted("remove_tag", written)?;
        tracing::info!(tag_id = %id, name = %tag.name, links = keys.len(), "tag removed");
        Ok(())
    }

    pub fn get_all_tags(&self) -> Vec<TagSummary> {
        read(&self.tags).summaries()
    }

    // -----------------------------------------------------------------------
    // Links
    // -----------------------------------------------------------------------

    pub fn form_link(&self, tag_id: TagId, media_id: MediaId) -> Result<(), DaemonError> {
        let mut tags = write(&self.tags);
        let mut media = write(&self.media);
        let Some(tag) = tags.get(tag_id) else {
            return rejected("form_link", DaemonError::UnknownTagId(tag_id));
        };
        if !media.exists(media_id) {
            return rejected("form_link", DaemonError::UnknownMedia(media_id));
        }
        if tag.media_ids.contains(&media_id) {
            return rejected("form_link", DaemonError::AlreadyLinked { tag_id, media_id });
        }
        let mut summary = tag.summary();
        summary.media_count += 1;
        tags.link(tag_id, media_id);
        media.link(media_id, tag_id);

        let written = self
            .store
            .links
            .insert(&TagLink { tag_id, media_id })
            .and_then(|()| self.store.tags.update(&tag_record(&summary)));
        self.notifier.emit(Notification::LinkFormed { tag: summary, media_id });
        persisted("form_link", written)?;
        tracing::debug!(tag_id = %tag_id, media_id = %media_id, "link formed");
        Ok(())
    }

    pub fn form_link_by_name(&self, tag_name: &str, media_id: MediaId) -> Result<(), DaemonError> {
        let tag_id = read(&self.tags).get_by_name(tag_name).map(|tag| tag.id);
        match tag_id {
            Some(tag_id) => self.form_link(tag_id, media_id),
            None => rejected("form_link", DaemonError::UnknownTagName(tag_name.to_string())),
        }
    }

    pub fn destroy_link(&self, tag_id: TagId, media_id: MediaId) -> Result<(), DaemonError> {
        let mut tags = write(&self.tags);
        let mut media = write(&self.media);
        let Some(tag) = tags.get(tag_id) else {
            return rejected("destroy_link", DaemonError::UnknownTagId(tag_id));
        };
        if !media.exists(media_id) {
            return rejected("destroy_link", DaemonError::UnknownMedia(media_id));
        }
        if !tag.media_ids.contains(&media_id) {
            return rejected("destroy_link", DaemonError::NotLinked { tag_id, media_id });
        }
        let mut summary = tag.summary();
        summary.media_count -= 1;
        tags.unlink(tag_id, media_id);
        media.unlink(media_id, tag_id);
        let untagged = media
            .get(media_id)
            .filter(|m| m.is_untagged())
            .map(|m| m.info.summary());

        let written = self
            .store
            .links
            .remove((tag_id, media_id))
            .and_then(|()| self.store.tags.update(&tag_record(&summary)));
        self.notifier.emit(Notification::LinkDestroyed { tag_id, media_id });
        if let Some(media) = untagged {
            self.notifier.emit(Notification::MediaUntagged { media });
        }
        persisted("destroy_link", written)?;
        tracing::debug!(tag_id = %tag_id, media_id = %media_id, "link destroyed");
        Ok(())
    }

    /// Attach the tags that the filename map assigns to each media's path.
    ///
    /// Mapped names that are not existing tags are skipped with a warning.
    /// Returns the number of links formed.
    pub fn apply_mapped_tags(&self, media_ids: &[MediaId]) -> Result<usize, DaemonError> {
        let mut tags = write(&self.tags);
        let mut media = write(&self.media);

        let mut links = Vec::new();
        let mut touched = BTreeSet::new();
        for &media_id in media_ids {
            let Some(path) = media.get(media_id).map(|m| m.info.sub_path_name()) else {
                continue;
            };
            for name in self.mapper.mapped_tags_for(&path) {
                let Some(tag_id) = tags.get_by_name(&name).map(|tag| tag.id) else {
                    tracing::warn!(tag = %name, path = %path, "mapped tag does not exist, skipping");
                    continue;
                };
                if tags.link(tag_id, media_id) {
                    media.link(media_id, tag_id);
                    links.push(TagLink { tag_id, media_id });
                    touched.insert(tag_id);
                }
            }
        }
        if links.is_empty() {
            return Ok(0);
        }

        let records: Vec<TagRecord> = touched
            .iter()
            .filter_map(|id| tags.get(*id))
            .map(TagRecord::from)
            .collect();
        let written = self
            .store
            .links
            .insert_batch(&links)
            .and_then(|()| self.store.tags.update_batch(&records));
        for link in &links {
            if let Some(tag) = tags.get(link.tag_id) {
                self.notifier.emit(Notification::LinkFormed {
                    tag: tag.summary(),
                    media_id: link.media_id,
                });
            }
        }
        persisted("apply_mapped_tags", written)?;
        tracing::debug!(links = links.len(), "mapped tags applied");
        Ok(links.len())
    }

    // -----------------------------------------------------------------------
    // Media
    // -----------------------------------------------------------------------

    /// Track a file in an already tracked directory. The file is hashed
    /// unless `hash` is given.
    pub fn add_media(
        &self,
        sub_path: &str,
        long_name: &str,
        short_name: &str,
        hash: Option<String>,
    ) -> Result<MediaId, DaemonError> {
        let hash = hash.unwrap_or_else(|| hash_file_or_empty(&self.abs_path(&sub_path::join(sub_path, long_name))));
        let mut media = write(&self.media);
        let mut mirror = lock(&self.mirror);
        let info = match self.insert_media_locked(&mut media, &mut mirror, MediaInfo::new(sub_path, long_name, short_name, hash)) {
            Ok(info) => info,
            Err(err) => return rejected("add_media", err),
        };

        let written = self.store.media.insert(&info);
        self.notifier.emit(Notification::MediaInserted { media: info.summary() });
        persisted("add_media", written)?;
        tracing::debug!(media_id = %info.id, path = %info.sub_path_name(), "media added");
        Ok(info.id)
    }

    /// Track many files at once. Entries whose directory is unknown or whose
    /// path is already tracked are skipped with a warning.
    pub fn add_media_batch(&self, infos: Vec<MediaInfo>) -> Result<Vec<MediaId>, DaemonError> {
        let mut media = write(&self.media);
        let mut mirror = lock(&self.mirror);
        let mut added = Vec::with_capacity(infos.len());
        for info in infos {
            let path = info.sub_path_name();
            match self.insert_media_locked(&mut media, &mut mirror, info) {
                Ok(info) => added.push(info),
                Err(err) => tracing::warn!(path = %path, error = %err, "skipping media"),
            }
        }
        if added.is_empty() {
            return Ok(Vec::new());
        }

        let written = self.store.media.insert_batch(&added);
        for info in &added {
            self.notifier.emit(Notification::MediaInserted { media: info.summary() });
        }
        persisted("add_media_batch", written)?;
        tracing::debug!(count = added.len(), "media batch added");
        Ok(added.iter().map(|info| info.id).collect())
    }

    pub fn rename_media(&self, id: MediaId, long_name: &str, short_name: &str) -> Result<(), DaemonError> {
        let sub_path = match read(&self.media).get(id) {
            Some(m) => m.info.sub_path.clone(),
            None => return rejected("rename_media", DaemonError::UnknownMedia(id)),
        };
        self.relocate_media(id, &sub_path, long_name, short_name)
    }

    pub fn move_media(&self, id: MediaId, new_sub_path: &str) -> Result<(), DaemonError> {
        let (long, short) = match read(&self.media).get(id) {
            Some(m) => (m.info.long_name.clone(), m.info.short_name.clone()),
            None => return rejected("move_media", DaemonError::UnknownMedia(id)),
        };
        self.relocate_media(id, new_sub_path, &long, &short)
    }

    /// Give a media file a new directory and names while keeping its id and
    /// links. Emits `MediaMoved` and/or `MediaRenamed` for what changed.
    pub fn relocate_media(
        &self,
        id: MediaId,
        new_sub_path: &str,
        long_name: &str,
        short_name: &str,
    ) -> Result<(), DaemonError> {
        let mut media = write(&self.media);
        let mut mirror = lock(&self.mirror);
        let Some(current) = media.get(id).map(|m| m.info.clone()) else {
            return rejected("relocate_media", DaemonError::UnknownMedia(id));
        };
        let dir = match mirror.resolve_canonical_path(new_sub_path) {
            Ok(dir) => dir,
            Err(err) => return rejected("relocate_media", err.into()),
        };
        let info = MediaInfo {
            id,
            sub_path: dir,
            long_name: long_name.to_string(),
            short_name: short_name.to_string(),
            hash: current.hash.clone(),
        };
        let moved = info.sub_path != current.sub_path;
        let renamed = info.long_name != current.long_name;
        if !moved && !renamed && info.short_name == current.short_name {
            return Ok(());
        }
        if let Err(err) = ensure_path_free(&media, &info, Some(id)) {
            return rejected("relocate_media", err);
        }

        if moved {
            if let Err(err) = mirror.remove_media(&current.sub_path, id) {
                tracing::debug!(error = %err, "previous directory no longer tracked");
            }
            mirror.add_media(&info.sub_path, id)?;
        }
        media.relocate(id, &info.sub_path, &info.long_name, &info.short_name);

        let written = self.store.media.update(&info);
        if renamed {
            self.notifier.emit(Notification::MediaRenamed {
                media_id: id,
                name: info.long_name.clone(),
            });
        }
        if moved {
            self.notifier.emit(Notification::MediaMoved {
                media_id: id,
                path: info.sub_path_name(),
            });
        }
        persisted("relocate_media", written)?;
        tracing::debug!(media_id = %id, from = %current.sub_path_name(), to = %info.sub_path_name(), "media relocated");
        Ok(())
    }

    /// Record new content for a tracked file.
    pub fn update_media_hash(&self, id: MediaId, hash: &str) -> Result<(), DaemonError> {
        let mut media = write(&self.media);
        let Some(mut info) = media.get(id).map(|m| m.info.clone()) else {
            return rejected("update_media_hash", DaemonError::UnknownMedia(id));
        };
        if info.hash == hash {
            return Ok(());
        }
        media.update_hash(id, hash);
        info.hash = hash.to_string();
        persisted("update_media_hash", self.store.media.update(&info))
    }

    pub fn remove_media(&self, id: MediaId) -> Result<(), DaemonError> {
        if self.remove_media_batch(&[id])? == 0 {
            return rejected("remove_media", DaemonError::UnknownMedia(id));
        }
        Ok(())
    }

    /// Stop tracking media, destroying their links. Unknown ids are skipped.
    /// Returns how many were removed.
    pub fn remove_media_batch(&self, ids: &[MediaId]) -> Result<usize, DaemonError> {
        let mut tags = write(&self.tags);
        let mut media = write(&self.media);
        let mut mirror = lock(&self.mirror);
        self.remove_media_locked(&mut tags, &mut media, &mut mirror, ids)
    }

    pub fn get_media(&self, id: MediaId) -> Option<MediaInfo> {
        read(&self.media).get(id).map(|m| m.info.clone())
    }

    /// Look a file up by `sub_path/name`, where either part may use short
    /// aliases.
    pub fn media_by_path(&self, sub_path_name: &str) -> Option<MediaInfo> {
        let (dir, name) = sub_path::split(sub_path_name);
        let media = read(&self.media);
        let canonical = lock(&self.mirror).resolve_canonical_path(dir).ok()?;
        media
            .get_by_path(&sub_path::join(&canonical, name))
            .map(|m| m.info.clone())
    }

    pub fn get_all_media(&self) -> Vec<MediaSummary> {
        read(&self.media).get_all().map(|m| m.info.summary()).collect()
    }

    pub fn get_untagged_media(&self) -> Vec<MediaSummary> {
        read(&self.media).untagged().map(|m| m.info.summary()).collect()
    }

    pub fn get_media_by_tag(&self, tag_id: TagId) -> Result<MediaQueryResult, DaemonError> {
        let tags = read(&self.tags);
        let media = read(&self.media);
        let Some(tag) = tags.get(tag_id) else {
            return rejected("get_media_by_tag", DaemonError::UnknownTagId(tag_id));
        };
        Ok(MediaQueryResult {
            media: summaries(&media, &tag.media_ids),
            tag_ids: BTreeSet::from([tag_id]),
        })
    }

    /// Evaluate a tag expression. Ids that are no longer tracked are dropped
    /// from the result.
    pub fn get_media_by_query(&self, query: &str) -> Result<MediaQueryResult, DaemonError> {
        let tags = read(&self.tags);
        let media = read(&self.media);
        let result = match QueryEngine::run(query, &tags) {
            Ok(result) => result,
            Err(err) => return rejected("get_media_by_query", err.into()),
        };
        Ok(MediaQueryResult {
            media: summaries(&media, &result.media_ids),
            tag_ids: result.tag_ids,
        })
    }

    pub fn get_tags_for_media(&self, media_id: MediaId) -> Result<Vec<TagSummary>, DaemonError> {
        let tags = read(&self.tags);
        let media = read(&self.media);
        let Some(entry) = media.get(media_id) else {
            return rejected("get_tags_for_media", DaemonError::UnknownMedia(media_id));
        };
        Ok(entry
            .tag_ids
            .iter()
            .filter_map(|id| tags.get(*id))
            .map(|tag| tag.summary())
            .collect())
    }

    // -----------------------------------------------------------------------
    // Directories
    // -----------------------------------------------------------------------

    /// Returns the canonical path of the new directory.
    pub fn add_directory(&self, parent: &str, long_name: &str, short_name: &str) -> Result<String, DaemonError> {
        match lock(&self.mirror).add_directory(parent, long_name, short_name) {
            Ok(path) => {
                tracing::debug!(path = %path, "directory added");
                Ok(path)
            }
            Err(err) => rejected("add_directory", err.into()),
        }
    }

    /// Rename a directory in place; media below it follow.
    pub fn rename_directory(&self, path: &str, new_long: &str, new_short: &str) -> Result<String, DaemonError> {
        self.rebase_directory("rename_directory", path, |mirror, old| {
            mirror.rename_directory(old, new_long, new_short)
        })
    }

    /// Move a directory under a new parent; media below it follow.
    pub fn move_directory(&self, path: &str, new_parent: &str) -> Result<String, DaemonError> {
        self.rebase_directory("move_directory", path, |mirror, old| mirror.move_directory(old, new_parent))
    }

    /// Stop tracking a directory and every media file below it.
    pub fn remove_directory(&self, path: &str) -> Result<usize, DaemonError> {
        let mut tags = write(&self.tags);
        let mut media = write(&self.media);
        let mut mirror = lock(&self.mirror);
        let removed = mirror
            .resolve_canonical_path(path)
            .and_then(|canonical| mirror.remove_directory(&canonical));
        let node = match removed {
            Ok(node) => node,
            Err(err) => return rejected("remove_directory", err.into()),
        };
        let ids: Vec<MediaId> = node.collect_media_ids().into_iter().collect();
        let count = self.remove_media_locked(&mut tags, &mut media, &mut mirror, &ids)?;
        tracing::debug!(path, media = count, "directory removed");
        Ok(count)
    }

    pub fn resolve_directory(&self, path: &str) -> Option<String> {
        lock(&self.mirror).resolve_canonical_path(path).ok()
    }

    pub fn directory_exists(&self, path: &str) -> bool {
        lock(&self.mirror).exists(path)
    }

    pub fn directories(&self) -> Vec<String> {
        lock(&self.mirror).directories()
    }

    pub fn status(&self) -> DaemonStatus {
        let tags = read(&self.tags);
        let media = read(&self.media);
        let directories = lock(&self.mirror).directories().len();
        DaemonStatus {
            root: self.root.clone(),
            tags: tags.len(),
            media: media.len(),
            untagged: media.untagged().count(),
            directories,
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn insert_media_locked(
        &self,
        media: &mut MediaIndex,
        mirror: &mut DirectoryMirror,
        mut info: MediaInfo,
    ) -> Result<MediaInfo, DaemonError> {
        info.sub_path = mirror.resolve_canonical_path(&info.sub_path)?;
        ensure_path_free(media, &info, None)?;
        info.id = media.insert_new(info.clone());
        mirror.add_media(&info.sub_path, info.id)?;
        Ok(info)
    }

    fn remove_media_locked(
        &self,
        tags: &mut TagIndex,
        media: &mut MediaIndex,
        mirror: &mut DirectoryMirror,
        ids: &[MediaId],
    ) -> Result<usize, DaemonError> {
        let mut removed = Vec::new();
        let mut links = Vec::new();
        let mut touched = BTreeSet::new();
        for &id in ids {
            let Some(entry) = media.remove(id) else { continue };
            for &tag_id in &entry.tag_ids {
                tags.unlink(tag_id, id);
                links.push((tag_id, id));
                touched.insert(tag_id);
            }
            // Already gone when the whole directory was detached.
            let _ = mirror.remove_media(&entry.info.sub_path, id);
            removed.push(id);
        }
        if removed.is_empty() {
            return Ok(0);
        }

        let records: Vec<TagRecord> = touched
            .iter()
            .filter_map(|id| tags.get(*id))
            .map(TagRecord::from)
            .collect();
        let written = self
            .store
            .links
            .remove_batch(&links)
            .and_then(|()| self.store.media.remove_batch(&removed))
            .and_then(|()| self.store.tags.update_batch(&records));
        for &(tag_id, media_id) in &links {
            self.notifier.emit(Notification::LinkDestroyed { tag_id, media_id });
        }
        for &media_id in &removed {
            self.notifier.emit(Notification::MediaRemoved { media_id });
        }
        persisted("remove_media", written)?;
        tracing::debug!(count = removed.len(), links = links.len(), "media removed");
        Ok(removed.len())
    }

    fn rebase_directory<F>(&self, op: &'static str, path: &str, change: F) -> Result<String, DaemonError>
    where
        F: FnOnce(&mut DirectoryMirror, &str) -> Result<String, mediatag_core::CoreError>,
    {
        let mut media = write(&self.media);
        let mut mirror = lock(&self.mirror);
        let changed = mirror.resolve_canonical_path(path).and_then(|old| {
            let ids = mirror.collect_media_ids_recursive(&old)?;
            let new = change(&mut mirror, &old)?;
            Ok((old, new, ids))
        });
        let (old, new, ids) = match changed {
            Ok(changed) => changed,
            Err(err) => return rejected(op, err.into()),
        };
        if old == new {
            return Ok(new);
        }

        let mut updated = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(mut info) = media.get(id).map(|m| m.info.clone()) else { continue };
            let Some(sub_path) = sub_path::replace_prefix(&info.sub_path, &old, &new) else { continue };
            media.move_to(id, &sub_path);
            info.sub_path = sub_path;
            updated.push(info);
        }

        let written = if updated.is_empty() {
            Ok(())
        } else {
            self.store.media.update_batch(&updated)
        };
        for info in &updated {
            self.notifier.emit(Notification::MediaMoved {
                media_id: info.id,
                path: info.sub_path_name(),
            });
        }
        persisted(op, written)?;
        tracing::debug!(from = %old, to = %new, media = updated.len(), "directory rebased");
        Ok(new)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `info`'s paths must not name a tracked record other than `owner`.
fn ensure_path_free(media: &MediaIndex, info: &MediaInfo, owner: Option<MediaId>) -> Result<(), DaemonError> {
    let keys = std::iter::once(info.sub_path_name()).chain(info.sub_path_short_name());
    for key in keys {
        if media.id_by_path(&key).is_some_and(|other| Some(other) != owner) {
            return Err(DaemonError::DuplicateMediaPath(key));
        }
    }
    Ok(())
}

fn summaries(media: &MediaIndex, ids: &BTreeSet<MediaId>) -> Vec<MediaSummary> {
    ids.iter()
        .filter_map(|id| media.get(*id))
        .map(|m| m.info.summary())
        .collect()
}

fn tag_record(summary: &TagSummary) -> TagRecord {
    TagRecord {
        id: summary.id,
        count: summary.media_count,
        name: summary.name.clone(),
    }
}

fn rejected<T>(op: &'static str, err: DaemonError) -> Result<T, DaemonError> {
    tracing::warn!(op, error = %err, "request rejected");
    Err(err)
}

fn persisted(op: &'static str, written: Result<(), StoreError>) -> Result<(), DaemonError> {
    written.map_err(|source| {
        tracing::error!(op, error = %source, "store write failed, data may be inconsistent with storage");
        DaemonError::Persistence(source)
    })
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use mediatag_core::{FilenameMap, IgnoreList};
    use mediatag_store::FaultSwitch;
    use tokio::sync::broadcast::Receiver;

    fn daemon_with(store: Persistence, mapper: FilenameMap) -> Daemon {
        Daemon::new(
            "/library",
            store,
            Box::new(IgnoreList::default()),
            Box::new(mapper),
            Notifier::new(256),
        )
    }

    fn daemon() -> Daemon {
        daemon_with(Persistence::in_memory(), FilenameMap::default())
    }

    fn drain(rx: &mut Receiver<Notification>) -> Vec<Notification> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    fn add(daemon: &Daemon, dir: &str, name: &str) -> MediaId {
        daemon
            .add_media(dir, name, "", Some(format!("hash-{name}")))
            .expect("add media")
    }

    #[test]
    fn tag_names_are_unique() {
        let daemon = daemon();
        let id = daemon.add_tag("cat").expect("add");
        assert!(matches!(daemon.add_tag("cat"), Err(DaemonError::DuplicateTag(_))));
        assert!(matches!(daemon.add_tag("  "), Err(DaemonError::EmptyTagName)));

        daemon.add_tag("dog").expect("add");
        assert!(matches!(daemon.rename_tag(id, "dog"), Err(DaemonError::DuplicateTag(_))));
        daemon.rename_tag(id, "kitten").expect("rename");

        let names: Vec<String> = daemon.get_all_tags().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["kitten".to_string(), "dog".to_string()]);
        assert_eq!(daemon.store.tags.get_all().expect("rows")[0].name, "kitten");
    }

    #[test]
    fn links_are_validated_and_symmetric() {
        let daemon = daemon();
        let tag = daemon.add_tag("cat").expect("tag");
        let media = add(&daemon, "", "a.png");

        assert!(matches!(daemon.form_link(TagId(9), media), Err(DaemonError::UnknownTagId(_))));
        assert!(matches!(daemon.form_link(tag, MediaId(9)), Err(DaemonError::UnknownMedia(_))));
        daemon.form_link(tag, media).expect("link");
        assert!(matches!(daemon.form_link(tag, media), Err(DaemonError::AlreadyLinked { .. })));

        assert_eq!(daemon.get_tags_for_media(media).expect("tags")[0].id, tag);
        assert!(daemon.get_untagged_media().is_empty());
        assert_eq!(daemon.store.tags.get_all().expect("rows")[0].count, 1);

        daemon.destroy_link(tag, media).expect("unlink");
        assert!(matches!(daemon.destroy_link(tag, media), Err(DaemonError::NotLinked { .. })));
        assert_eq!(daemon.get_untagged_media().len(), 1);
        assert!(daemon.store.links.get_all().expect("rows").is_empty());
    }

    #[test]
    fn link_by_unknown_name_is_rejected() {
        let daemon = daemon();
        let media = add(&daemon, "", "a.png");
        assert!(matches!(
            daemon.form_link_by_name("ghost", media),
            Err(DaemonError::UnknownTagName(_))
        ));
        daemon.add_tag("ghost").expect("tag");
        daemon.form_link_by_name("ghost", media).expect("link");
    }

    #[test]
    fn removing_a_tag_reports_newly_untagged_media() {
        let daemon = daemon();
        let cat = daemon.add_tag("cat").expect("tag");
        let dog = daemon.add_tag("dog").expect("tag");
        let only_cat = add(&daemon, "", "a.png");
        let both = add(&daemon, "", "b.png");
        daemon.form_link(cat, only_cat).expect("link");
        daemon.form_link(cat, both).expect("link");
        daemon.form_link(dog, both).expect("link");

        let mut rx = daemon.notifier().subscribe();
        daemon.remove_tag(cat).expect("remove");

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], Notification::MediaUntagged { media } if media.id == only_cat));
        assert_eq!(events[1], Notification::TagRemoved { tag_id: cat });
        assert_eq!(daemon.store.links.get_all().expect("rows").len(), 1);
        assert_eq!(daemon.get_tags_for_media(both).expect("tags").len(), 1);
    }

    #[test]
    fn duplicate_media_path_is_rejected() {
        let daemon = daemon();
        let first = add(&daemon, "", "a.png");
        assert_eq!(first, MediaId(0));
        assert!(matches!(
            daemon.add_media("", "a.png", "", Some("x".into())),
            Err(DaemonError::DuplicateMediaPath(_))
        ));
        let batch = vec![MediaInfo::new("", "a.png", "", "y")];
        assert!(daemon.add_media_batch(batch).expect("batch").is_empty());
        assert_eq!(daemon.get_all_media().len(), 1);
        assert!(matches!(
            daemon.add_media("nowhere", "a.png", "", Some("x".into())),
            Err(DaemonError::DirectoryNotFound(_))
        ));
    }

    #[test]
    fn rename_media_keeps_id_and_links() {
        let daemon = daemon();
        let tag = daemon.add_tag("cat").expect("tag");
        let media = add(&daemon, "", "a.png");
        add(&daemon, "", "taken.png");
        daemon.form_link(tag, media).expect("link");

        let mut rx = daemon.notifier().subscribe();
        daemon.rename_media(media, "b.png", "").expect("rename");
        assert_eq!(
            drain(&mut rx),
            vec![Notification::MediaRenamed { media_id: media, name: "b.png".into() }]
        );
        assert_eq!(daemon.media_by_path("b.png").map(|m| m.id), Some(media));
        assert!(daemon.media_by_path("a.png").is_none());
        assert_eq!(daemon.get_tags_for_media(media).expect("tags")[0].id, tag);

        assert!(matches!(
            daemon.rename_media(media, "taken.png", ""),
            Err(DaemonError::DuplicateMediaPath(_))
        ));
        assert!(matches!(daemon.rename_media(MediaId(9), "c.png", ""), Err(DaemonError::UnknownMedia(_))));
    }

    #[test]
    fn move_media_changes_directory_only() {
        let daemon = daemon();
        daemon.add_directory("", "album", "").expect("dir");
        let media = add(&daemon, "", "a.png");

        let mut rx = daemon.notifier().subscribe();
        daemon.move_media(media, "album").expect("move");
        assert_eq!(
            drain(&mut rx),
            vec![Notification::MediaMoved { media_id: media, path: "album/a.png".into() }]
        );
        assert_eq!(daemon.media_by_path("album/a.png").map(|m| m.id), Some(media));
        assert_eq!(daemon.store.media.get_all().expect("rows")[0].sub_path, "album");
        assert_eq!(
            lock(&daemon.mirror).collect_media_ids_recursive("album").expect("ids"),
            BTreeSet::from([media])
        );

        assert!(matches!(daemon.move_media(media, "nowhere"), Err(DaemonError::DirectoryNotFound(_))));
    }

    #[test]
    fn removing_media_destroys_links_first() {
        let daemon = daemon();
        let tag = daemon.add_tag("cat").expect("tag");
        let media = add(&daemon, "", "a.png");
        daemon.form_link(tag, media).expect("link");

        let mut rx = daemon.notifier().subscribe();
        daemon.remove_media(media).expect("remove");
        assert_eq!(
            drain(&mut rx),
            vec![
                Notification::LinkDestroyed { tag_id: tag, media_id: media },
                Notification::MediaRemoved { media_id: media },
            ]
        );
        assert!(daemon.get_media_by_tag(tag).expect("query").media.is_empty());
        assert!(matches!(daemon.remove_media(media), Err(DaemonError::UnknownMedia(_))));
    }

    #[test]
    fn directory_rename_and_move_carry_media_along() {
        let daemon = daemon();
        daemon.add_directory("", "photos", "").expect("dir");
        daemon.add_directory("photos", "2023", "").expect("dir");
        daemon.add_directory("", "archive", "").expect("dir");
        let media = add(&daemon, "photos/2023", "a.png");

        assert_eq!(daemon.rename_directory("photos", "pics", "").expect("rename"), "pics");
        assert_eq!(daemon.get_media(media).expect("media").sub_path, "pics/2023");

        assert_eq!(daemon.move_directory("pics/2023", "archive").expect("move"), "archive/2023");
        assert_eq!(daemon.media_by_path("archive/2023/a.png").map(|m| m.id), Some(media));
        assert_eq!(daemon.store.media.get_all().expect("rows")[0].sub_path, "archive/2023");

        assert_eq!(daemon.remove_directory("archive").expect("remove"), 1);
        assert!(daemon.get_all_media().is_empty());
        assert!(!daemon.directory_exists("archive"));
    }

    #[test]
    fn query_filters_out_untracked_ids() {
        let daemon = daemon();
        let a = daemon.add_tag("a").expect("tag");
        let b = daemon.add_tag("b").expect("tag");
        let m1 = add(&daemon, "", "1.png");
        let m2 = add(&daemon, "", "2.png");
        daemon.form_link(a, m1).expect("link");
        daemon.form_link(a, m2).expect("link");
        daemon.form_link(b, m2).expect("link");

        let result = daemon.get_media_by_query("a - b").expect("query");
        assert_eq!(result.media.iter().map(|m| m.id).collect::<Vec<_>>(), vec![m1]);
        assert_eq!(result.tag_ids, BTreeSet::from([a, b]));
        assert!(matches!(daemon.get_media_by_query("a +"), Err(DaemonError::Query(_))));
    }

    #[test]
    fn store_failure_keeps_memory_change_and_still_notifies() {
        let fault = FaultSwitch::default();
        let daemon = daemon_with(Persistence::in_memory_with_fault(fault.clone()), FilenameMap::default());
        let mut rx = daemon.notifier().subscribe();

        fault.set(true);
        let err = daemon.add_tag("cat").expect_err("store is down");
        assert!(matches!(err, DaemonError::Persistence(_)));
        assert!(!err.is_validation());

        assert_eq!(daemon.get_all_tags().len(), 1);
        assert!(matches!(drain(&mut rx).as_slice(), [Notification::TagInserted { .. }]));
    }

    #[test]
    fn mapped_tags_attach_existing_tags_only() {
        let mapper = FilenameMap::parse("BEGIN\n\\.png$\nTAG\nimage\nmissing\nEND\n");
        let daemon = daemon_with(Persistence::in_memory(), mapper);
        let image = daemon.add_tag("image").expect("tag");
        let png = add(&daemon, "", "a.png");
        let txt = add(&daemon, "", "b.txt");

        assert_eq!(daemon.apply_mapped_tags(&[png, txt]).expect("map"), 1);
        assert_eq!(daemon.get_media_by_tag(image).expect("tag").media[0].id, png);
        assert_eq!(daemon.apply_mapped_tags(&[png]).expect("again"), 0);
    }
}
