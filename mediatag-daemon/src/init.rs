//! Startup: hydrate the indices from the store and reconcile them with what
//! is actually on disk before anything is published.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fs;
use std::path::Path;

use rayon::prelude::*;

use mediatag_core::{sub_path, Config, FilenameMap, IgnoreList, MediaId, MediaInfo, TagId, TagLink};
use mediatag_store::{hash_file_or_empty, Persistence, TagRecord};

use crate::daemon::{lock, read, write, Daemon};
use crate::error::{io_err, DaemonError};
use crate::notification::{Notification, Notifier};
use crate::paths::{self, is_state_path};

/// What startup reconciliation did, for the log.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InitReport {
    pub tags: usize,
    pub media: usize,
    pub directories: usize,
    /// Files found on disk that were not tracked yet.
    pub discovered: usize,
    /// Missing files found again elsewhere by content hash.
    pub resolved: usize,
    /// Missing files that could not be found again.
    pub dropped: usize,
    /// Records removed because their path is now ignored.
    pub ignored: usize,
    /// Links that referred to unknown tags or media.
    pub purged_links: usize,
    /// Links formed from the filename map.
    pub mapped_links: usize,
}

/// Open the state below `root` and build a fully initialized daemon.
pub fn open(root: &Path, config: &Config, notifier: Notifier) -> Result<Daemon, DaemonError> {
    let filter = IgnoreList::load_or_create(&paths::ignore_path(root))?;
    let mapper = FilenameMap::load(&paths::mediamap_path(root))?;
    tracing::info!(ignore_rules = filter.len(), map_blocks = mapper.len(), "path rules loaded");
    let store = Persistence::open_json(&paths::store_dir(root, config))?;

    let daemon = Daemon::new(root, store, Box::new(filter), Box::new(mapper), notifier);
    initialize(&daemon)?;
    Ok(daemon)
}

/// Load, validate, discover, resolve and publish.
///
/// Store reads and writes and directory enumeration failures are fatal here;
/// the daemon never starts on a partially reconciled state.
pub fn initialize(daemon: &Daemon) -> Result<InitReport, DaemonError> {
    let mut report = InitReport::default();

    let tag_rows = daemon.store.tags.get_all()?;
    let media_rows = daemon.store.media.get_all()?;
    let mut link_rows = daemon.store.links.get_all()?;

    {
        let mut tags = write(&daemon.tags);
        for row in &tag_rows {
            tags.insert_loaded(row.id, &row.name);
        }
    }

    // Validate: ignored records go now, missing files become candidates.
    let mut missing = Vec::new();
    let mut ignored = Vec::new();
    {
        let mut media = write(&daemon.media);
        for info in media_rows {
            let path = info.sub_path_name();
            if is_state_path(&path) || daemon.filter.matches(&path) {
                ignored.push(info.id);
            } else if !daemon.abs_path(&path).is_file() {
                missing.push(info);
            } else {
                media.insert_loaded(info);
            }
        }
    }
    report.ignored = ignored.len();
    drop_rows(daemon, &ignored, &mut link_rows)?;

    // Discover.
    let mut discovered = discover(daemon, "")?;
    discovered
        .par_iter_mut()
        .for_each(|info| info.hash = hash_file_or_empty(&daemon.abs_path(&info.sub_path_name())));
    report.discovered = discovered.len();

    // Resolve startup soft deletes by content hash.
    let (moved, unresolved) = resolve_missing(missing, &mut discovered);
    if !moved.is_empty() {
        let mut media = write(&daemon.media);
        for info in &moved {
            tracing::info!(media_id = %info.id, path = %info.sub_path_name(), "missing media found at new location");
            media.insert_loaded(info.clone());
        }
        daemon.store.media.update_batch(&moved)?;
    }
    report.resolved = moved.len();
    report.dropped = unresolved.len();
    drop_rows(daemon, &unresolved, &mut link_rows)?;

    // Stale links must be gone before new media can take free ids.
    let (valid_links, stale_links) = partition_links(daemon, link_rows);
    if !stale_links.is_empty() {
        let keys: Vec<(TagId, MediaId)> = stale_links.iter().map(|l| (l.tag_id, l.media_id)).collect();
        daemon.store.links.remove_batch(&keys)?;
        tracing::warn!(count = keys.len(), "purged links to unknown tags or media");
    }
    report.purged_links = stale_links.len();

    {
        let mut tags = write(&daemon.tags);
        let mut media = write(&daemon.media);
        for link in &valid_links {
            tags.link(link.tag_id, link.media_id);
            media.link(link.media_id, link.tag_id);
        }
    }

    // New files, then their mapped tags.
    let new_ids = daemon.add_media_batch(discovered)?;
    report.mapped_links = daemon.apply_mapped_tags(&new_ids)?;

    refresh_tag_counts(daemon, &tag_rows)?;

    report.tags = read(&daemon.tags).len();
    {
        let media = read(&daemon.media);
        let mut mirror = lock(&daemon.mirror);
        mirror.clear_media();
        for entry in media.get_all() {
            if let Err(err) = mirror.add_media(&entry.info.sub_path, entry.info.id) {
                tracing::warn!(media_id = %entry.info.id, error = %err, "media outside tracked directories");
            }
        }
        report.media = media.len();
        report.directories = mirror.directories().len();
    }

    tracing::info!(
        tags = report.tags,
        media = report.media,
        directories = report.directories,
        discovered = report.discovered,
        resolved = report.resolved,
        dropped = report.dropped,
        ignored = report.ignored,
        purged_links = report.purged_links,
        mapped_links = report.mapped_links,
        "initialized"
    );
    daemon.notifier.emit(Notification::Initialized);
    Ok(report)
}

/// Walk `start` (a tracked directory) breadth-first. Every non-ignored
/// directory below it is registered in the mirror; files that are neither
/// ignored nor tracked are returned without a hash.
pub(crate) fn discover(daemon: &Daemon, start: &str) -> Result<Vec<MediaInfo>, DaemonError> {
    let mut found = Vec::new();
    let mut queue = VecDeque::from([start.to_string()]);

    while let Some(dir) = queue.pop_front() {
        let abs = daemon.abs_path(&dir);
        let mut entries = Vec::new();
        for entry in fs::read_dir(&abs).map_err(|e| io_err(&abs, e))? {
            let entry = entry.map_err(|e| io_err(&abs, e))?;
            let file_type = entry.file_type().map_err(|e| io_err(entry.path(), e))?;
            match entry.file_name().into_string() {
                Ok(name) => entries.push((name, file_type)),
                Err(name) => tracing::warn!(dir = %dir, name = ?name, "skipping non-UTF-8 name"),
            }
        }

        let media = read(&daemon.media);
        let mut mirror = lock(&daemon.mirror);
        for (name, file_type) in entries {
            let path = sub_path::join(&dir, &name);
            if is_state_path(&path) {
                continue;
            }
            if file_type.is_dir() {
                if daemon.filter.matches_directory(&path) {
                    tracing::debug!(path = %path, "ignored directory");
                    continue;
                }
                if !mirror.exists(&path) {
                    mirror.add_directory(&dir, &name, "")?;
                }
                queue.push_back(path);
            } else if file_type.is_file() && !daemon.filter.matches(&path) && !media.exists_by_path(&path) {
                found.push(MediaInfo::new(dir.clone(), name, "", ""));
            }
        }
    }
    Ok(found)
}

/// Pair each missing record with a discovered file of equal, non-empty hash.
/// A paired record keeps its id and takes the file's location; the file is
/// taken out of `discovered`.
fn resolve_missing(missing: Vec<MediaInfo>, discovered: &mut Vec<MediaInfo>) -> (Vec<MediaInfo>, Vec<MediaId>) {
    let mut by_hash: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, info) in discovered.iter().enumerate() {
        if !info.hash.is_empty() {
            by_hash.entry(info.hash.clone()).or_default().push(idx);
        }
    }

    let mut claimed = BTreeSet::new();
    let mut moved = Vec::new();
    let mut unresolved = Vec::new();
    for record in missing {
        let candidate = by_hash
            .get_mut(&record.hash)
            .filter(|_| !record.hash.is_empty())
            .and_then(|indices| (!indices.is_empty()).then(|| indices.remove(0)));
        match candidate {
            Some(idx) => {
                claimed.insert(idx);
                let found = &discovered[idx];
                moved.push(MediaInfo {
                    id: record.id,
                    sub_path: found.sub_path.clone(),
                    long_name: found.long_name.clone(),
                    short_name: found.short_name.clone(),
                    hash: found.hash.clone(),
                });
            }
            None => {
                tracing::info!(media_id = %record.id, path = %record.sub_path_name(), "missing media dropped");
                unresolved.push(record.id);
            }
        }
    }

    let mut idx = 0;
    discovered.retain(|_| {
        let keep = !claimed.contains(&idx);
        idx += 1;
        keep
    });
    (moved, unresolved)
}

/// Remove media rows and every link row that points at them, from the
/// store and from `links`.
fn drop_rows(daemon: &Daemon, ids: &[MediaId], links: &mut Vec<TagLink>) -> Result<(), DaemonError> {
    if ids.is_empty() {
        return Ok(());
    }
    let doomed: BTreeSet<MediaId> = ids.iter().copied().collect();
    let (dropped, kept): (Vec<TagLink>, Vec<TagLink>) =
        links.drain(..).partition(|link| doomed.contains(&link.media_id));
    *links = kept;
    let keys: Vec<(TagId, MediaId)> = dropped.iter().map(|link| (link.tag_id, link.media_id)).collect();
    daemon.store.links.remove_batch(&keys)?;
    daemon.store.media.remove_batch(ids)?;
    Ok(())
}

fn partition_links(daemon: &Daemon, links: Vec<TagLink>) -> (Vec<TagLink>, Vec<TagLink>) {
    let tags = read(&daemon.tags);
    let media = read(&daemon.media);
    links
        .into_iter()
        .partition(|link| tags.exists(link.tag_id) && media.exists(link.media_id))
}

/// Rewrite tag rows whose stored link count no longer matches.
fn refresh_tag_counts(daemon: &Daemon, stored: &[TagRecord]) -> Result<(), DaemonError> {
    let tags = read(&daemon.tags);
    let stale: Vec<TagRecord> = stored
        .iter()
        .filter_map(|row| tags.get(row.id))
        .map(TagRecord::from)
        .filter(|current| stored.iter().any(|row| row.id == current.id && row.count != current.count))
        .collect();
    if !stale.is_empty() {
        daemon.store.tags.update_batch(&stale)?;
    }
    Ok(())
}

// ─── Tests ────────────────────────────────────────────────────────────────────
