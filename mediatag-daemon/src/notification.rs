//! Change notifications fanned out to every subscriber.

use mediatag_core::{MediaId, MediaSummary, TagId, TagSummary};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    /// Startup reconciliation finished; queries now reflect the disk.
    Initialized,
    TagInserted { tag: TagSummary },
    TagRenamed { tag_id: TagId, name: String },
    TagRemoved { tag_id: TagId },
    /// A newly tracked media file. New media never carries tags.
    MediaInserted { media: MediaSummary },
    /// A media file lost its last tag.
    MediaUntagged { media: MediaSummary },
    MediaRenamed { media_id: MediaId, name: String },
    /// `path` is the new `sub_path/name`.
    MediaMoved { media_id: MediaId, path: String },
    MediaRemoved { media_id: MediaId },
    LinkFormed { tag: TagSummary, media_id: MediaId },
    LinkDestroyed { tag_id: TagId, media_id: MediaId },
}

/// Sending half of the notification channel.
///
/// Emitting never blocks and never fails: with no subscribers the
/// notification is dropped.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn emit(&self, notification: Notification) {
        tracing::trace!(?notification, "notify");
        let _ = self.tx.send(notification);
    }
}
