//! Filesystem change source for the sync thread.
//!
//! The notify callback only forwards raw events over a crossbeam channel.
//! The sync thread blocks in [`EventSource::wait`], drains everything that
//! has arrived into a queue of normalized [`FsEvent`]s, processes the whole
//! queue and only then waits again.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam_channel::{select, Receiver, RecvTimeoutError, TryRecvError};
use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use mediatag_core::sub_path;

use crate::error::{io_err, DaemonError};

pub type RawEvent = notify::Result<notify::Event>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    Create,
    Remove,
    Modify,
    /// First half of a rename: the old name.
    RenameOld,
    /// Second half of a rename: the new name.
    RenameNew,
}

/// One change below the root. `sub_path` is the parent directory as the OS
/// reported it and may use short aliases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub kind: FsEventKind,
    pub sub_path: String,
    pub name: String,
}

impl FsEvent {
    pub fn sub_path_name(&self) -> String {
        sub_path::join(&self.sub_path, &self.name)
    }
}

/// Why [`EventSource::wait`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// New raw events were drained (the queue may still be empty if all of
    /// them were irrelevant).
    Events,
    Timeout,
    Shutdown,
}

pub struct EventSource {
    root: PathBuf,
    raw: Receiver<RawEvent>,
    shutdown: Receiver<()>,
    queue: VecDeque<FsEvent>,
    _watcher: Option<RecommendedWatcher>,
}

impl EventSource {
    /// Watch `root` recursively with the platform's recommended backend.
    pub fn watch(root: &Path, shutdown: Receiver<()>) -> Result<Self, DaemonError> {
        let root = root.canonicalize().map_err(|e| io_err(root, e))?;
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut watcher = notify::recommended_watcher(move |event: RawEvent| {
            let _ = tx.send(event);
        })?;
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| DaemonError::WatchDisarmed(e.to_string()))?;
        tracing::info!(root = %root.display(), "watching for changes");

        let mut source = Self::from_channel(root, rx, shutdown);
        source._watcher = Some(watcher);
        Ok(source)
    }

    /// A source fed from an existing channel instead of a live watcher.
    pub fn from_channel(root: impl Into<PathBuf>, raw: Receiver<RawEvent>, shutdown: Receiver<()>) -> Self {
        Self {
            root: root.into(),
            raw,
            shutdown,
            queue: VecDeque::new(),
            _watcher: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Block until raw events arrive, `timeout` elapses (`None` waits
    /// forever) or shutdown is requested. Returns immediately while queued
    /// events remain.
    pub fn wait(&mut self, timeout: Option<Duration>) -> Result<Wake, DaemonError> {
        if !self.queue.is_empty() {
            return Ok(Wake::Events);
        }
        let timer = match timeout {
            Some(timeout) => crossbeam_channel::after(timeout),
            None => crossbeam_channel::never(),
        };
        let (raw_rx, shutdown_rx) = (self.raw.clone(), self.shutdown.clone());
        select! {
            recv(raw_rx) -> raw => match raw {
                Ok(raw) => {
                    self.accept(raw);
                    self.drain()?;
                    Ok(Wake::Events)
                }
                Err(_) => Err(DaemonError::WatchDisarmed("event channel disconnected".into())),
            },
            recv(shutdown_rx) -> _ => Ok(Wake::Shutdown),
            recv(timer) -> _ => Ok(Wake::Timeout),
        }
    }

    pub fn next_event(&mut self) -> Option<FsEvent> {
        self.queue.pop_front()
    }

    pub fn peek(&self) -> Option<&FsEvent> {
        self.queue.front()
    }

    /// Like [`Self::peek`], but when the queue is empty give the backend up
    /// to `window` to deliver the next event first.
    pub fn peek_within(&mut self, window: Duration) -> Option<&FsEvent> {
        if self.queue.is_empty() {
            match self.raw.recv_timeout(window) {
                Ok(raw) => {
                    self.accept(raw);
                    // Disconnection resurfaces from the next `wait`.
                    let _ = self.drain();
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {}
            }
        }
        self.queue.front()
    }

    /// Drop the queued event that [`Self::peek`] returned; it has been
    /// consumed as part of the current one.
    pub fn skip_next(&mut self) {
        self.queue.pop_front();
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    // -----------------------------------------------------------------------

    fn drain(&mut self) -> Result<(), DaemonError> {
        loop {
            match self.raw.try_recv() {
                Ok(raw) => self.accept(raw),
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => {
                    return Err(DaemonError::WatchDisarmed("event channel disconnected".into()))
                }
            }
        }
    }

    fn accept(&mut self, raw: RawEvent) {
        let event = match raw {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(error = %err, paths = ?err.paths, "watch backend reported an error");
                return;
            }
        };

        match event.kind {
            EventKind::Create(_) => self.push_all(FsEventKind::Create, &event.paths),
            EventKind::Remove(_) => self.push_all(FsEventKind::Remove, &event.paths),
            EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => {
                self.push_all(FsEventKind::Modify, &event.paths)
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                self.push_all(FsEventKind::RenameOld, &event.paths)
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                self.push_all(FsEventKind::RenameNew, &event.paths)
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                if let [from, to] = event.paths.as_slice() {
                    self.push_pair(from, to);
                }
            }
            EventKind::Modify(ModifyKind::Name(_)) => {
                for path in &event.paths {
                    let kind = if path.exists() {
                        FsEventKind::Create
                    } else {
                        FsEventKind::Remove
                    };
                    self.push(kind, path);
                }
            }
            _ => {}
        }
    }

    fn push_all(&mut self, kind: FsEventKind, paths: &[PathBuf]) {
        for path in paths {
            self.push(kind, path);
        }
    }

    fn push_pair(&mut self, from: &Path, to: &Path) {
        let (Some(old), Some(new)) = (self.locate(FsEventKind::RenameOld, from), self.locate(FsEventKind::RenameNew, to))
        else {
            return;
        };
        // Backends that report both halves separately repeat them as a pair.
        let n = self.queue.len();
        if n >= 2 && self.queue[n - 2] == old && self.queue[n - 1] == new {
            return;
        }
        self.enqueue(old);
        self.enqueue(new);
    }

    fn push(&mut self, kind: FsEventKind, path: &Path) {
        if let Some(event) = self.locate(kind, path) {
            self.enqueue(event);
        }
    }

    fn enqueue(&mut self, event: FsEvent) {
        // Back-to-back writes to one file need a single rehash.
        if event.kind == FsEventKind::Modify && self.queue.back() == Some(&event) {
            return;
        }
        tracing::debug!(kind = ?event.kind, path = %event.sub_path_name(), "fs event");
        self.queue.push_back(event);
    }

    fn locate(&self, kind: FsEventKind, path: &Path) -> Option<FsEvent> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let sub_path_name = sub_path::from_relative(rel)?;
        if sub_path_name.is_empty() {
            return None;
        }
        let (dir, name) = sub_path::split(&sub_path_name);
        Some(FsEvent {
            kind,
            sub_path: dir.to_string(),
            name: name.to_string(),
        })
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
