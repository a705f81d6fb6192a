//! mediatag daemon: the [`Daemon`] orchestrator, the filesystem sync loop
//! and the command socket runtime.
//!
//! - [`daemon`]: locked indices, mutations, queries, notifications
//! - [`events`]: `notify` wrapper and event normalizer
//! - [`soft_delete`] / [`sync_engine`]: move detection and the sync thread
//! - [`init`]: startup reconciliation against the disk
//! - [`protocol`] / runtime: JSON lines over `.mediatag/daemon.sock`

pub mod daemon;
mod error;
pub mod events;
pub mod init;
pub mod notification;
pub mod paths;
pub mod protocol;
mod runtime;
pub mod soft_delete;
pub mod sync_engine;

pub use daemon::{Daemon, DaemonStatus, MediaQueryResult};
pub use error::DaemonError;
pub use events::{EventSource, FsEvent, FsEventKind, RawEvent, Wake};
pub use init::{initialize, open, InitReport};
pub use notification::{Notification, Notifier};
pub use protocol::{
    request, request_status, request_stop, send_request, subscribe, DaemonRequest, DaemonResponse,
    MediaSelector, TagRef,
};
pub use runtime::{run, start_blocking, RuntimeStatus};
pub use sync_engine::SyncEngine;
