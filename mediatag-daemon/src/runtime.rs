//! Daemon runtime: startup, the sync thread, the command socket and signal
//! handling, tied together by one broadcast shutdown channel.

use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::broadcast;

use mediatag_core::config::LoggingConfig;
use mediatag_core::Config;

use crate::daemon::{Daemon, DaemonStatus, MediaQueryResult};
use crate::error::{io_err, DaemonError};
use crate::events::EventSource;
use crate::init;
use crate::notification::Notifier;
use crate::paths::{config_path, socket_path, state_dir, NOTIFICATION_CAPACITY};
use crate::protocol::{DaemonRequest, DaemonResponse, MediaSelector, TagRef};
use crate::sync_engine::SyncEngine;

/// Status payload: the index counts plus process facts.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeStatus {
    pub running: bool,
    pub pid: u32,
    pub started_at_unix: u64,
    #[serde(flatten)]
    pub index: DaemonStatus,
}

/// Load the config below `root`, install the subscriber and run the daemon
/// to completion on a fresh multi-threaded runtime.
pub fn start_blocking(root: &Path) -> Result<(), DaemonError> {
    let root = root.canonicalize().map_err(|e| io_err(root, e))?;
    let config = Config::load(&config_path(&root))?;
    init_tracing(&config.logging);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(root, config))
}

/// Run the daemon runtime.
pub async fn run(root: PathBuf, config: Config) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&root)?;
    let started_at_unix = unix_seconds_now();

    let daemon = {
        let root = root.clone();
        let config = config.clone();
        let notifier = Notifier::new(NOTIFICATION_CAPACITY);
        tokio::task::spawn_blocking(move || init::open(&root, &config, notifier))
            .await
            .map_err(|e| DaemonError::Protocol(format!("initialization task join failure: {e}")))??
    };
    let daemon = Arc::new(daemon);

    let (shutdown_tx, _) = broadcast::channel::<()>(16);
    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
    let events = EventSource::watch(&root, stop_rx)?;
    let sync_thread = SyncEngine::new(daemon.clone(), events, config.sync.grace_window()).spawn()?;

    let sync_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let mut joined = tokio::task::spawn_blocking(move || {
                sync_thread
                    .join()
                    .unwrap_or_else(|_| Err(DaemonError::Protocol("sync thread panicked".to_string())))
            });
            let result = tokio::select! {
                result = &mut joined => result,
                _ = shutdown_rx.recv() => {
                    let _ = stop_tx.send(());
                    (&mut joined).await
                }
            };
            let _ = shutdown.send(());
            handle_join("sync", result)
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let root = root.clone();
        let daemon = daemon.clone();
        tokio::spawn(async move {
            let result =
                socket_server_task(root, daemon, shutdown.clone(), shutdown_rx, started_at_unix).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (sync_result, socket_result, signal_result) =
        tokio::join!(sync_handle, socket_handle, signal_handle);

    handle_join("sync", sync_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("daemon stopped");
    Ok(())
}

// ---------------------------------------------------------------------------
// Command socket
// ---------------------------------------------------------------------------

async fn socket_server_task(
    root: PathBuf,
    daemon: Arc<Daemon>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
    started_at_unix: u64,
) -> Result<(), DaemonError> {
    let socket = socket_path(&root);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "command socket listening");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let daemon = daemon.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    let (reader, writer) = stream.into_split();
                    if let Err(err) = handle_client(reader, writer, daemon, shutdown_tx, started_at_unix).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_client<R, W>(
    reader: R,
    mut writer: W,
    daemon: Arc<Daemon>,
    shutdown_tx: broadcast::Sender<()>,
    started_at_unix: u64,
) -> Result<(), DaemonError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<DaemonRequest>(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };
        tracing::debug!(cmd = request.name(), "socket request");

        match request {
            DaemonRequest::Stop => {
                let _ = shutdown_tx.send(());
                write_response(&mut writer, &DaemonResponse::ok(json!({ "stopping": true }))).await?;
                break;
            }
            DaemonRequest::Subscribe => {
                stream_notifications(&mut lines, &mut writer, &daemon, shutdown_tx.subscribe()).await?;
                break;
            }
            request => {
                let worker = daemon.clone();
                let response =
                    match tokio::task::spawn_blocking(move || execute(&worker, request, started_at_unix)).await {
                        Ok(Ok(data)) => DaemonResponse::ok(data),
                        Ok(Err(err)) => DaemonResponse::error(err.to_string()),
                        Err(err) => DaemonResponse::error(format!("request worker failed: {err}")),
                    };
                write_response(&mut writer, &response).await?;
            }
        }
    }

    Ok(())
}

/// Forward notifications as JSON lines until the client hangs up or the
/// daemon shuts down. A subscriber that falls behind skips ahead.
async fn stream_notifications<R, W>(
    lines: &mut tokio::io::Lines<BufReader<R>>,
    writer: &mut W,
    daemon: &Daemon,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut notifications = daemon.notifier().subscribe();
    write_response(writer, &DaemonResponse::ok(json!({ "subscribed": true }))).await?;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => return Ok(()),
            line = lines.next_line() => {
                // Anything but more input means the client went away.
                match line {
                    Ok(Some(_)) => continue,
                    _ => return Ok(()),
                }
            }
            received = notifications.recv() => match received {
                Ok(notification) => write_line(writer, &serde_json::to_string(&notification)?).await?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscriber lagged, notifications dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
        }
    }
}

/// Run one query or mutation against the daemon. Blocking; called from a
/// worker thread.
pub(crate) fn execute(
    daemon: &Daemon,
    request: DaemonRequest,
    started_at_unix: u64,
) -> Result<Value, DaemonError> {
    let data = match request {
        DaemonRequest::Status => serde_json::to_value(RuntimeStatus {
            running: true,
            pid: std::process::id(),
            started_at_unix,
            index: daemon.status(),
        })?,
        DaemonRequest::Tags => serde_json::to_value(daemon.get_all_tags())?,
        DaemonRequest::AddTag { name } => json!({ "tag_id": daemon.add_tag(&name)? }),
        DaemonRequest::RenameTag { tag_id, name } => {
            daemon.rename_tag(tag_id, &name)?;
            json!({ "tag_id": tag_id })
        }
        DaemonRequest::RemoveTag { tag_id } => {
            daemon.remove_tag(tag_id)?;
            json!({ "tag_id": tag_id })
        }
        DaemonRequest::Link { tag, media_id } => {
            match tag {
                TagRef::Id(tag_id) => daemon.form_link(tag_id, media_id)?,
                TagRef::Name(name) => daemon.form_link_by_name(&name, media_id)?,
            }
            json!({ "media_id": media_id })
        }
        DaemonRequest::Unlink { tag_id, media_id } => {
            daemon.destroy_link(tag_id, media_id)?;
            json!({ "tag_id": tag_id, "media_id": media_id })
        }
        DaemonRequest::Media(selector) => {
            let result = match selector {
                MediaSelector::All => MediaQueryResult {
                    media: daemon.get_all_media(),
                    ..MediaQueryResult::default()
                },
                MediaSelector::Untagged => MediaQueryResult {
                    media: daemon.get_untagged_media(),
                    ..MediaQueryResult::default()
                },
                MediaSelector::Tag { tag_id } => daemon.get_media_by_tag(tag_id)?,
                MediaSelector::Query { query } => daemon.get_media_by_query(&query)?,
            };
            serde_json::to_value(result)?
        }
        DaemonRequest::MediaTags { media_id } => serde_json::to_value(daemon.get_tags_for_media(media_id)?)?,
        other @ (DaemonRequest::Stop | DaemonRequest::Subscribe) => {
            return Err(DaemonError::Protocol(format!(
                "'{}' is handled by the connection, not a worker",
                other.name()
            )));
        }
    };
    Ok(data)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(root: &Path) -> Result<(), DaemonError> {
    let state = state_dir(root);
    if !state.exists() {
        fs::create_dir_all(&state).map_err(|e| io_err(&state, e))?;
    }
    Ok(())
}

async fn write_response<W>(writer: &mut W, response: &DaemonResponse) -> Result<(), DaemonError>
where
    W: AsyncWrite + Unpin,
{
    let payload = serde_json::to_string(response)?;
    write_line(writer, &payload).await
}

async fn write_line<W>(writer: &mut W, payload: &str) -> Result<(), DaemonError>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// `RUST_LOG` wins over the configured filter.
fn init_tracing(logging: &LoggingConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}

// ─── Tests ────────────────────────────────────────────────────────────────────
