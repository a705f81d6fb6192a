pub mod daemon;
pub mod link;
pub mod media;
pub mod query;
pub mod tag;
pub mod watch;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use tabled::{settings::Style, Table, Tabled};

use mediatag_core::{MediaSummary, TagSummary};
use mediatag_daemon::{request, DaemonError, DaemonRequest};

/// `--root`, or the current directory, made absolute.
pub fn resolve_root(root: Option<PathBuf>) -> Result<PathBuf> {
    let root = match root {
        Some(root) => root,
        None => std::env::current_dir().context("could not determine current directory")?,
    };
    root.canonicalize()
        .with_context(|| format!("tracked directory {} is not accessible", root.display()))
}

/// One request to the daemon, decoded into `T`.
pub fn call<T: DeserializeOwned>(root: &Path, req: &DaemonRequest) -> Result<T> {
    let data = request(root, req).map_err(|err| match err {
        DaemonError::DaemonNotRunning { .. } => anyhow!(
            "daemon is not running for {}; start it with `mediatag daemon start`",
            root.display()
        ),
        other => anyhow::Error::new(other).context(format!("'{}' failed", req.name())),
    })?;
    serde_json::from_value(data).with_context(|| format!("unexpected '{}' response", req.name()))
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to render JSON")?
    );
    Ok(())
}

#[derive(Tabled)]
struct TagRow {
    #[tabled(rename = "id")]
    id: u32,
    #[tabled(rename = "tag")]
    name: String,
    #[tabled(rename = "media")]
    media: usize,
}

#[derive(Tabled)]
struct MediaRow {
    #[tabled(rename = "id")]
    id: u32,
    #[tabled(rename = "path")]
    path: String,
    #[tabled(rename = "hash")]
    hash: String,
}

pub fn print_tags(tags: Vec<TagSummary>) {
    if tags.is_empty() {
        println!("No tags.");
        return;
    }
    let rows: Vec<TagRow> = tags
        .into_iter()
        .map(|tag| TagRow {
            id: tag.id.0,
            name: tag.name,
            media: tag.media_count,
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

pub fn print_media(media: Vec<MediaSummary>) {
    if media.is_empty() {
        println!("No media.");
        return;
    }
    let rows: Vec<MediaRow> = media
        .into_iter()
        .map(|m| MediaRow {
            id: m.id.0,
            path: m.sub_path_name(),
            hash: short_hash(&m.hash),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn short_hash(hash: &str) -> String {
    if hash.is_empty() {
        "-".to_string()
    } else {
        hash.chars().take(12).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hash_trims_and_marks_missing() {
        assert_eq!(short_hash(""), "-");
        assert_eq!(short_hash("0123456789abcdef"), "0123456789ab");
    }

    #[test]
    fn missing_root_is_an_error() {
        let err = resolve_root(Some(PathBuf::from("/definitely/not/here"))).expect_err("missing");
        assert!(err.to_string().contains("not accessible"));
    }
}
