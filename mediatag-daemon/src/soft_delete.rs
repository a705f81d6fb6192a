//! The pending half of a possible move.
//!
//! A removal is not applied immediately. It is parked here for a grace
//! window; a creation of the same kind that matches it turns the pair into a
//! move that keeps the id and links, anything else makes it a real delete.

use std::time::{Duration, Instant};

use mediatag_core::{sub_path, MediaId, MediaInfo};

/// What was removed from disk but not yet from the indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingTarget {
    /// Snapshot of the removed file's identity.
    Media(MediaInfo),
    /// Canonical path of the removed directory.
    Directory(String),
}

impl PendingTarget {
    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory(_))
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Media(info) => info.sub_path_name(),
            Self::Directory(path) => path.clone(),
        }
    }
}

/// A newly created entry, offered as the other half of a move.
#[derive(Debug, Clone, Copy)]
pub enum Candidate<'a> {
    File { long_name: &'a str, hash: &'a str },
    Directory { name: &'a str },
}

#[derive(Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing was pending.
    Idle,
    /// The pending entry is of the other kind; it stays pending.
    KindMismatch,
    /// The candidate is the pending entry at its new location.
    Moved(PendingTarget),
    /// Same kind but a different entry; the pending one must be deleted.
    Unmatched(PendingTarget),
}

#[derive(Debug, Default)]
pub struct SoftDelete {
    pending: Option<(PendingTarget, Instant)>,
}

impl SoftDelete {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park `target`. Returns whatever was pending before, which the caller
    /// must finalize.
    pub fn arm(&mut self, target: PendingTarget) -> Option<PendingTarget> {
        tracing::debug!(target = %target.describe(), "soft delete armed");
        self.pending
            .replace((target, Instant::now()))
            .map(|(previous, _)| previous)
    }

    pub fn take(&mut self) -> Option<PendingTarget> {
        self.pending.take().map(|(target, _)| target)
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&PendingTarget> {
        self.pending.as_ref().map(|(target, _)| target)
    }

    /// Whether media `id` is the entry waiting out its grace window.
    pub fn is_pending_media(&self, id: MediaId) -> bool {
        matches!(self.pending(), Some(PendingTarget::Media(info)) if info.id == id)
    }

    pub fn is_pending_directory(&self, path: &str) -> bool {
        matches!(self.pending(), Some(PendingTarget::Directory(pending)) if pending == path)
    }

    /// Time left before the pending entry becomes a hard delete.
    pub fn remaining(&self, window: Duration) -> Option<Duration> {
        self.pending
            .as_ref()
            .map(|(_, since)| window.saturating_sub(since.elapsed()))
    }

    /// Offer a created entry. A file matches on equal long name and equal,
    /// non-empty content hash; a directory matches on its last path segment.
    pub fn resolve(&mut self, candidate: Candidate<'_>) -> Resolution {
        let matched = match (self.pending(), candidate) {
            (None, _) => return Resolution::Idle,
            (Some(PendingTarget::Media(info)), Candidate::File { long_name, hash }) => {
                info.long_name == long_name && !hash.is_empty() && info.hash == hash
            }
            (Some(PendingTarget::Directory(path)), Candidate::Directory { name }) => {
                sub_path::split(path).1 == name
            }
            _ => return Resolution::KindMismatch,
        };
        match self.take() {
            Some(target) if matched => Resolution::Moved(target),
            Some(target) => Resolution::Unmatched(target),
            None => Resolution::Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, hash: &str) -> PendingTarget {
        PendingTarget::Media(MediaInfo::new("old", name, "", hash))
    }

    #[test]
    fn nothing_pending_is_idle() {
        let mut soft = SoftDelete::new();
        assert_eq!(soft.resolve(Candidate::Directory { name: "x" }), Resolution::Idle);
        assert_eq!(soft.remaining(Duration::from_secs(1)), None);
    }

    #[test]
    fn file_matches_on_name_and_hash() {
        let mut soft = SoftDelete::new();
        soft.arm(file("a.png", "h1"));
        assert_eq!(
            soft.resolve(Candidate::File { long_name: "a.png", hash: "h1" }),
            Resolution::Moved(file("a.png", "h1"))
        );
        assert!(!soft.is_armed());

        soft.arm(file("a.png", "h1"));
        assert_eq!(
            soft.resolve(Candidate::File { long_name: "a.png", hash: "h2" }),
            Resolution::Unmatched(file("a.png", "h1"))
        );
    }

    #[test]
    fn empty_hash_never_matches() {
        let mut soft = SoftDelete::new();
        soft.arm(file("a.png", ""));
        assert!(matches!(
            soft.resolve(Candidate::File { long_name: "a.png", hash: "" }),
            Resolution::Unmatched(_)
        ));
    }

    #[test]
    fn directory_matches_on_last_segment() {
        let mut soft = SoftDelete::new();
        soft.arm(PendingTarget::Directory("photos/2023".into()));
        assert_eq!(
            soft.resolve(Candidate::Directory { name: "2023" }),
            Resolution::Moved(PendingTarget::Directory("photos/2023".into()))
        );
    }

    #[test]
    fn other_kind_leaves_pending_untouched() {
        let mut soft = SoftDelete::new();
        soft.arm(PendingTarget::Directory("photos".into()));
        assert_eq!(
            soft.resolve(Candidate::File { long_name: "photos", hash: "h" }),
            Resolution::KindMismatch
        );
        assert!(soft.is_armed());
    }

    #[test]
    fn pending_entry_is_recognized() {
        let mut soft = SoftDelete::new();
        soft.arm(file("a.png", "h"));
        assert!(soft.is_pending_media(MediaId(0)));
        assert!(!soft.is_pending_media(MediaId(1)));
        assert!(!soft.is_pending_directory("old"));
    }

    #[test]
    fn rearming_hands_back_the_previous_target() {
        let mut soft = SoftDelete::new();
        assert_eq!(soft.arm(file("a.png", "h")), None);
        assert_eq!(soft.arm(file("b.png", "h")), Some(file("a.png", "h")));
        assert!(soft.remaining(Duration::from_secs(60)).is_some_and(|left| left > Duration::from_secs(50)));
    }
}
