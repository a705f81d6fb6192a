//! `mediatag query <expr>`

use std::path::Path;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use mediatag_daemon::{DaemonRequest, MediaQueryResult, MediaSelector};

use super::{call, print_json, print_media};

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Tag names combined with `+` (union), `*` (intersection), `-` (difference) and parentheses.
    pub expr: String,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl QueryArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        let request = DaemonRequest::Media(MediaSelector::Query { query: self.expr.clone() });
        let result: MediaQueryResult = call(root, &request)?;
        if self.json {
            return print_json(&result);
        }
        let tags: Vec<String> = result.tag_ids.iter().map(ToString::to_string).collect();
        println!("{} {} (tags: {})", "query".bold(), self.expr, tags.join(", "));
        print_media(result.media);
        Ok(())
    }
}
