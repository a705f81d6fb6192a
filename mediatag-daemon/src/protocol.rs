use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use mediatag_core::{MediaId, TagId};

use crate::error::{io_err, DaemonError};
use crate::notification::Notification;
use crate::paths::socket_path;

/// JSON newline-delimited request: `{"cmd": "...", "args": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "args", rename_all = "snake_case")]
pub enum DaemonRequest {
    Status,
    Stop,
    Tags,
    AddTag { name: String },
    RenameTag { tag_id: TagId, name: String },
    RemoveTag { tag_id: TagId },
    Link { tag: TagRef, media_id: MediaId },
    Unlink { tag_id: TagId, media_id: MediaId },
    Media(MediaSelector),
    MediaTags { media_id: MediaId },
    /// Keep the connection open and stream notifications.
    Subscribe,
}

impl DaemonRequest {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Stop => "stop",
            Self::Tags => "tags",
            Self::AddTag { .. } => "add_tag",
            Self::RenameTag { .. } => "rename_tag",
            Self::RemoveTag { .. } => "remove_tag",
            Self::Link { .. } => "link",
            Self::Unlink { .. } => "unlink",
            Self::Media(_) => "media",
            Self::MediaTags { .. } => "media_tags",
            Self::Subscribe => "subscribe",
        }
    }
}

/// A tag named either by id or by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagRef {
    Id(TagId),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaSelector {
    All,
    Untagged,
    Tag { tag_id: TagId },
    Query { query: String },
}

/// JSON newline-delimited response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DaemonResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

fn connect(root: &Path) -> Result<UnixStream, DaemonError> {
    let socket = socket_path(root);
    if !socket.exists() {
        return Err(DaemonError::DaemonNotRunning { socket });
    }

    UnixStream::connect(&socket).map_err(|err| {
        if matches!(
            err.kind(),
            std::io::ErrorKind::NotFound
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
        ) {
            DaemonError::DaemonNotRunning {
                socket: socket.clone(),
            }
        } else {
            io_err(&socket, err)
        }
    })
}

fn write_request(stream: &mut UnixStream, root: &Path, request: &DaemonRequest) -> Result<(), DaemonError> {
    let socket = socket_path(root);
    let payload = serde_json::to_string(request)?;
    stream
        .write_all(payload.as_bytes())
        .map_err(|e| io_err(&socket, e))?;
    stream.write_all(b"\n").map_err(|e| io_err(&socket, e))?;
    stream.flush().map_err(|e| io_err(&socket, e))
}

/// Send one JSON request to the daemon socket and return one response.
pub fn send_request(root: &Path, request: &DaemonRequest) -> Result<DaemonResponse, DaemonError> {
    let mut stream = connect(root)?;
    write_request(&mut stream, root, request)?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|e| io_err(socket_path(root), e))?;
    if read == 0 {
        return Err(DaemonError::Protocol(
            "daemon closed connection before responding".to_string(),
        ));
    }

    let response: DaemonResponse = serde_json::from_str(line.trim_end())?;
    Ok(response)
}

/// Status with a short retry window, so a client racing a freshly started
/// daemon sees it once the socket is bound.
pub fn request_status(root: &Path) -> Result<Value, DaemonError> {
    let mut last_not_running: Option<DaemonError> = None;
    for attempt in 0..5 {
        match send_request(root, &DaemonRequest::Status) {
            Ok(response) => return response_into_data(response),
            Err(err @ DaemonError::DaemonNotRunning { .. }) => {
                last_not_running = Some(err);
                if attempt < 4 {
                    sleep(Duration::from_millis(100));
                    continue;
                }
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_not_running.unwrap_or_else(|| {
        DaemonError::Protocol("daemon status retry loop exited unexpectedly".to_string())
    }))
}

pub fn request_stop(root: &Path) -> Result<(), DaemonError> {
    request(root, &DaemonRequest::Stop).map(|_| ())
}

/// One round trip; an `ok: false` response becomes an error.
pub fn request(root: &Path, request: &DaemonRequest) -> Result<Value, DaemonError> {
    response_into_data(send_request(root, request)?)
}

/// Stream notifications until `on_event` returns `false` or the daemon
/// closes the connection.
pub fn subscribe<F>(root: &Path, mut on_event: F) -> Result<(), DaemonError>
where
    F: FnMut(Notification) -> bool,
{
    let mut stream = connect(root)?;
    write_request(&mut stream, root, &DaemonRequest::Subscribe)?;

    let socket = socket_path(root);
    let mut reader = BufReader::new(stream);
    let mut line = String::new();

    // The first line acknowledges the subscription.
    if reader.read_line(&mut line).map_err(|e| io_err(&socket, e))? == 0 {
        return Err(DaemonError::Protocol(
            "daemon closed connection before responding".to_string(),
        ));
    }
    response_into_data(serde_json::from_str(line.trim_end())?)?;

    loop {
        line.clear();
        if reader.read_line(&mut line).map_err(|e| io_err(&socket, e))? == 0 {
            return Ok(());
        }
        if line.trim().is_empty() {
            continue;
        }
        let notification: Notification = serde_json::from_str(line.trim_end())?;
        if !on_event(notification) {
            return Ok(());
        }
    }
}

pub fn response_into_data(response: DaemonResponse) -> Result<Value, DaemonError> {
    if response.ok {
        Ok(response.data.unwrap_or(Value::Null))
    } else {
        Err(DaemonError::Protocol(
            response
                .error
                .unwrap_or_else(|| "unknown daemon error".to_string()),
        ))
    }
}
