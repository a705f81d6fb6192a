//! `mediatag media list|tags`

use std::path::Path;

use anyhow::Result;
use clap::{Args, Subcommand};

use mediatag_core::{MediaId, TagId, TagSummary};
use mediatag_daemon::{DaemonRequest, MediaQueryResult, MediaSelector};

use super::{call, print_json, print_media, print_tags};

#[derive(Subcommand, Debug)]
pub enum MediaCommand {
    /// List tracked media, optionally only untagged ones or one tag's.
    List(ListArgs),
    /// Show the tags of one media file.
    Tags {
        media_id: u32,
        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only media without any tag.
    #[arg(long, conflicts_with = "tag")]
    pub untagged: bool,

    /// Only media carrying this tag id.
    #[arg(long, value_name = "TAG_ID")]
    pub tag: Option<u32>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl ListArgs {
    fn selector(&self) -> MediaSelector {
        match (self.untagged, self.tag) {
            (true, _) => MediaSelector::Untagged,
            (false, Some(tag_id)) => MediaSelector::Tag { tag_id: TagId(tag_id) },
            (false, None) => MediaSelector::All,
        }
    }
}

pub fn run(root: &Path, command: MediaCommand) -> Result<()> {
    match command {
        MediaCommand::List(args) => {
            let result: MediaQueryResult = call(root, &DaemonRequest::Media(args.selector()))?;
            if args.json {
                print_json(&result)?;
            } else {
                print_media(result.media);
            }
        }
        MediaCommand::Tags { media_id, json } => {
            let tags: Vec<TagSummary> = call(root, &DaemonRequest::MediaTags { media_id: MediaId(media_id) })?;
            if json {
                print_json(&tags)?;
            } else {
                print_tags(tags);
            }
        }
    }
    Ok(())
}
