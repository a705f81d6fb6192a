//! The dedicated synchronization thread.
//!
//! One loop drains the event queue, then blocks until new events arrive,
//! shutdown is requested or, while a removal is pending, its grace window
//! runs out. Event handling never fails the loop; only losing the watch
//! does.

use std::fs;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rayon::prelude::*;

use mediatag_core::{sub_path, MediaInfo};
use mediatag_store::hash_file_or_empty;

use crate::daemon::Daemon;
use crate::error::{io_err, DaemonError};
use crate::events::{EventSource, FsEvent, FsEventKind, Wake};
use crate::init;
use crate::paths::{is_state_path, RENAME_PAIR_WINDOW};
use crate::soft_delete::{Candidate, PendingTarget, Resolution, SoftDelete};

pub struct SyncEngine {
    daemon: Arc<Daemon>,
    events: EventSource,
    soft_delete: SoftDelete,
    grace: Duration,
}

/// Where an event lands: the canonical parent and `parent/name`.
struct Located {
    parent: String,
    path: String,
}

impl SyncEngine {
    pub fn new(daemon: Arc<Daemon>, events: EventSource, grace: Duration) -> Self {
        Self {
            daemon,
            events,
            soft_delete: SoftDelete::new(),
            grace,
        }
    }

    /// Run the loop on its own named thread.
    pub fn spawn(self) -> Result<JoinHandle<Result<(), DaemonError>>, DaemonError> {
        let root = self.daemon.root().to_path_buf();
        thread::Builder::new()
            .name("mediatag-sync".into())
            .spawn(move || self.run())
            .map_err(|e| io_err(root, e))
    }

    pub fn run(mut self) -> Result<(), DaemonError> {
        tracing::info!(grace_ms = self.grace.as_millis() as u64, "sync loop started");
        loop {
            while let Some(event) = self.events.next_event() {
                self.process(event);
            }
            match self.events.wait(self.soft_delete.remaining(self.grace)) {
                Ok(Wake::Events) => {}
                Ok(Wake::Timeout) => self.finalize_pending(),
                Ok(Wake::Shutdown) => {
                    self.finalize_pending();
                    tracing::info!("sync loop stopped");
                    return Ok(());
                }
                Err(err) => {
                    self.finalize_pending();
                    tracing::error!(error = %err, "sync loop aborted");
                    return Err(err);
                }
            }
        }
    }

    fn process(&mut self, event: FsEvent) {
        match event.kind {
            FsEventKind::Create | FsEventKind::RenameNew => self.on_create(&event),
            FsEventKind::Remove => self.on_remove(&event),
            FsEventKind::Modify => self.on_modify(&event),
            FsEventKind::RenameOld => self.on_rename(&event),
        }
    }

    // -----------------------------------------------------------------------
    // Event handlers
    // -----------------------------------------------------------------------

    fn on_create(&mut self, event: &FsEvent) {
        let Some(at) = self.locate(&event.sub_path, &event.name) else { return };
        let abs = self.daemon.abs_path(&at.path);
        let Ok(meta) = fs::metadata(&abs) else {
            tracing::debug!(path = %at.path, "created entry is already gone");
            return;
        };

        if meta.is_dir() {
            let tracked = self.daemon.directory_exists(&at.path) && !self.soft_delete.is_pending_directory(&at.path);
            if tracked || self.daemon.filter().matches_directory(&at.path) {
                return;
            }
            match self.soft_delete.resolve(Candidate::Directory { name: &event.name }) {
                Resolution::Moved(target) => {
                    self.complete_move(target, &at, &event.name);
                    return;
                }
                Resolution::Unmatched(target) => self.hard_delete(target),
                Resolution::Idle | Resolution::KindMismatch => {}
            }
            self.add_directory_tree(&at, &event.name);
        } else if meta.is_file() {
            // A file recreated where a removed one waits is offered as its
            // replacement, not skipped as already tracked.
            let tracked = self
                .daemon
                .media_by_path(&at.path)
                .is_some_and(|m| !self.soft_delete.is_pending_media(m.id));
            if tracked || self.daemon.filter().matches(&at.path) {
                return;
            }
            let hash = hash_file_or_empty(&abs);
            match self.soft_delete.resolve(Candidate::File { long_name: &event.name, hash: &hash }) {
                Resolution::Moved(target) => {
                    self.complete_move(target, &at, &event.name);
                    return;
                }
                Resolution::Unmatched(target) => self.hard_delete(target),
                Resolution::Idle | Resolution::KindMismatch => {}
            }
            if let Some(id) = applied(self.daemon.add_media(&at.parent, &event.name, "", Some(hash))) {
                applied(self.daemon.apply_mapped_tags(&[id]));
            }
        }
    }

    fn on_remove(&mut self, event: &FsEvent) {
        let Some(target) = self.tracked(event) else { return };
        self.finalize_pending();
        self.arm(target);
    }

    fn on_modify(&mut self, event: &FsEvent) {
        let Some(target) = self.tracked(event) else { return };
        self.finalize_pending();
        if let PendingTarget::Media(info) = target {
            let hash = hash_file_or_empty(&self.daemon.abs_path(&info.sub_path_name()));
            if hash != info.hash {
                applied(self.daemon.update_media_hash(info.id, &hash));
            }
        }
    }

    fn on_rename(&mut self, event: &FsEvent) {
        let Some(target) = self.tracked(event) else { return };
        self.finalize_pending();

        let partner = self
            .events
            .peek_within(RENAME_PAIR_WINDOW)
            .filter(|next| next.kind == FsEventKind::RenameNew)
            .cloned();
        let Some(next) = partner else {
            // No new name: the entry left the watched tree, or the backend
            // reports the other half as a creation later.
            self.arm(target);
            return;
        };
        self.events.skip_next();

        let destination = self
            .locate(&next.sub_path, &next.name)
            .filter(|at| match &target {
                PendingTarget::Directory(_) => !self.daemon.filter().matches_directory(&at.path),
                PendingTarget::Media(_) => !self.daemon.filter().matches(&at.path),
            });
        let Some(at) = destination else {
            self.arm(target);
            return;
        };

        match target {
            PendingTarget::Directory(old) => {
                let (old_parent, old_name) = sub_path::split(&old);
                let moved = if old_parent == at.parent {
                    Some(old.clone())
                } else {
                    applied(self.daemon.move_directory(&old, &at.parent))
                };
                if let Some(current) = moved.filter(|_| old_name != next.name) {
                    applied(self.daemon.rename_directory(&current, &next.name, ""));
                }
            }
            PendingTarget::Media(info) => match self.daemon.media_by_path(&at.path).filter(|m| m.id != info.id) {
                // Saved through a temporary file: the destination record keeps
                // its id and links and takes the new content.
                Some(kept) => {
                    tracing::debug!(media_id = %kept.id, from = %info.sub_path_name(), "content replaced by rename");
                    let hash = hash_file_or_empty(&self.daemon.abs_path(&at.path));
                    applied(self.daemon.update_media_hash(kept.id, &hash));
                    applied(self.daemon.remove_media(info.id));
                }
                None => {
                    applied(self.daemon.relocate_media(info.id, &at.parent, &next.name, ""));
                }
            },
        }
    }

    // -----------------------------------------------------------------------
    // Soft delete
    // -----------------------------------------------------------------------

    fn arm(&mut self, target: PendingTarget) {
        if let Some(previous) = self.soft_delete.arm(target) {
            self.hard_delete(previous);
        }
    }

    fn finalize_pending(&mut self) {
        if let Some(target) = self.soft_delete.take() {
            self.hard_delete(target);
        }
    }

    fn hard_delete(&self, target: PendingTarget) {
        tracing::debug!(target = %target.describe(), "hard delete");
        match target {
            PendingTarget::Media(info) => {
                let still_there = self
                    .daemon
                    .get_media(info.id)
                    .is_some_and(|current| current.sub_path_name() == info.sub_path_name());
                if still_there {
                    applied(self.daemon.remove_media(info.id));
                }
            }
            PendingTarget::Directory(path) => {
                if self.daemon.directory_exists(&path) {
                    applied(self.daemon.remove_directory(&path));
                }
            }
        }
    }

    fn complete_move(&self, target: PendingTarget, at: &Located, name: &str) {
        match target {
            PendingTarget::Media(info) => {
                tracing::info!(media_id = %info.id, from = %info.sub_path_name(), to = %at.path, "media moved");
                applied(self.daemon.relocate_media(info.id, &at.parent, name, ""));
            }
            PendingTarget::Directory(old) => {
                tracing::info!(from = %old, to = %at.path, "directory moved");
                applied(self.daemon.move_directory(&old, &at.parent));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// `None` when the parent directory is not tracked (ignored or unknown)
    /// or the path belongs to the daemon's own state.
    fn locate(&self, dir: &str, name: &str) -> Option<Located> {
        let parent = self.daemon.resolve_directory(dir)?;
        let path = sub_path::join(&parent, name);
        if is_state_path(&path) {
            return None;
        }
        Some(Located { parent, path })
    }

    /// The tracked entry an event refers to, as it would be parked.
    fn tracked(&self, event: &FsEvent) -> Option<PendingTarget> {
        let at = self.locate(&event.sub_path, &event.name)?;
        if let Some(dir) = self.daemon.resolve_directory(&at.path) {
            return Some(PendingTarget::Directory(dir));
        }
        let found = self.daemon.media_by_path(&at.path).map(PendingTarget::Media);
        if found.is_none() {
            tracing::debug!(kind = ?event.kind, path = %at.path, "event for untracked entry");
        }
        found
    }

    /// Register a directory that appeared and everything already inside it.
    fn add_directory_tree(&self, at: &Located, name: &str) {
        let Some(path) = applied(self.daemon.add_directory(&at.parent, name, "")) else { return };
        let mut found: Vec<MediaInfo> = match init::discover(&self.daemon, &path) {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(path = %path, error = %err, "could not scan new directory");
                return;
            }
        };
        let daemon = &self.daemon;
        found
            .par_iter_mut()
            .for_each(|info| info.hash = hash_file_or_empty(&daemon.abs_path(&info.sub_path_name())));
        if let Some(ids) = applied(self.daemon.add_media_batch(found)) {
            applied(self.daemon.apply_mapped_tags(&ids));
        }
    }
}

/// Daemon entry points log their own failures; the loop just carries on.
fn applied<T>(result: Result<T, DaemonError>) -> Option<T> {
    result.ok()
}
