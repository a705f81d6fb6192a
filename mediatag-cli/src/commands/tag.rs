//! `mediatag tag list|add|rename|remove`

use std::path::Path;

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Deserialize;

use mediatag_core::{TagId, TagSummary};
use mediatag_daemon::DaemonRequest;

use super::{call, print_json, print_tags};

#[derive(Subcommand, Debug)]
pub enum TagCommand {
    /// List every tag with its media count.
    List(ListArgs),
    /// Create a tag.
    Add { name: String },
    /// Rename a tag; its links are kept.
    Rename { tag_id: u32, name: String },
    /// Delete a tag and all of its links.
    Remove { tag_id: u32 },
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Deserialize)]
struct TagIdReply {
    tag_id: TagId,
}

pub fn run(root: &Path, command: TagCommand) -> Result<()> {
    match command {
        TagCommand::List(args) => {
            let tags: Vec<TagSummary> = call(root, &DaemonRequest::Tags)?;
            if args.json {
                print_json(&tags)?;
            } else {
                print_tags(tags);
            }
        }
        TagCommand::Add { name } => {
            let reply: TagIdReply = call(root, &DaemonRequest::AddTag { name: name.clone() })?;
            println!("{} Added tag '{}' (id {})", "✓".green(), name, reply.tag_id);
        }
        TagCommand::Rename { tag_id, name } => {
            let request = DaemonRequest::RenameTag { tag_id: TagId(tag_id), name: name.clone() };
            let _: TagIdReply = call(root, &request)?;
            println!("{} Renamed tag {} to '{}'", "✓".green(), tag_id, name);
        }
        TagCommand::Remove { tag_id } => {
            let _: TagIdReply = call(root, &DaemonRequest::RemoveTag { tag_id: TagId(tag_id) })?;
            println!("{} Removed tag {}", "✓".green(), tag_id);
        }
    }
    Ok(())
}
