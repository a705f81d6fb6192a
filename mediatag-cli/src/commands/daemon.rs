//! `mediatag daemon`: foreground runtime and socket lifecycle.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;

use mediatag_daemon::paths::socket_path;
use mediatag_daemon::{request_status, request_stop, start_blocking, DaemonError};

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon in the foreground (sync loop + socket server).
    Start,
    /// Request graceful daemon shutdown over the Unix socket.
    Stop,
    /// Query daemon runtime status over the Unix socket.
    Status,
}

pub fn run(root: &Path, command: DaemonCommand) -> Result<()> {
    match command {
        DaemonCommand::Start => {
            start_blocking(root).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match request_stop(root) {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::Status => match request_status(root) {
            Ok(status) => super::print_json(&status)?,
            Err(DaemonError::DaemonNotRunning { .. }) => {
                super::print_json(&serde_json::json!({
                    "running": false,
                    "socket": socket_path(root).display().to_string(),
                }))?;
            }
            Err(err) => return Err(err).context("failed to query daemon status"),
        },
    }

    Ok(())
}
