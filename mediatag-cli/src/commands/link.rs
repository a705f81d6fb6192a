//! `mediatag link add|remove`

use std::path::Path;

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use serde_json::Value;

use mediatag_core::{MediaId, TagId};
use mediatag_daemon::{DaemonRequest, TagRef};

use super::call;

#[derive(Subcommand, Debug)]
pub enum LinkCommand {
    /// Tag a media file. `tag` is a tag id or a tag name.
    Add { tag: String, media_id: u32 },
    /// Remove a tag from a media file.
    Remove { tag_id: u32, media_id: u32 },
}

pub fn run(root: &Path, command: LinkCommand) -> Result<()> {
    match command {
        LinkCommand::Add { tag, media_id } => {
            let request = DaemonRequest::Link { tag: tag_ref(&tag), media_id: MediaId(media_id) };
            let _: Value = call(root, &request)?;
            println!("{} Tagged media {} with '{}'", "✓".green(), media_id, tag);
        }
        LinkCommand::Remove { tag_id, media_id } => {
            let request = DaemonRequest::Unlink { tag_id: TagId(tag_id), media_id: MediaId(media_id) };
            let _: Value = call(root, &request)?;
            println!("{} Untagged media {} from tag {}", "✓".green(), media_id, tag_id);
        }
    }
    Ok(())
}

/// All-digit arguments are ids; anything else is a name.
fn tag_ref(arg: &str) -> TagRef {
    match arg.parse::<u32>() {
        Ok(id) => TagRef::Id(TagId(id)),
        Err(_) => TagRef::Name(arg.to_string()),
    }
}
