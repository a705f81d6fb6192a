//! mediatag: tag media files in a watched directory.
//!
//! # Usage
//!
//! ```text
//! mediatag [--root <dir>] daemon start|stop|status
//! mediatag [--root <dir>] tag list|add <name>|rename <id> <name>|remove <id>
//! mediatag [--root <dir>] link add <tag> <media-id>
//! mediatag [--root <dir>] link remove <tag-id> <media-id>
//! mediatag [--root <dir>] media list [--untagged | --tag <id>]
//! mediatag [--root <dir>] media tags <media-id>
//! mediatag [--root <dir>] query "<expr>"
//! mediatag [--root <dir>] watch [--json] [--count <n>]
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    daemon::DaemonCommand, link::LinkCommand, media::MediaCommand, query::QueryArgs, tag::TagCommand,
    watch::WatchArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "mediatag",
    version,
    about = "Tag media files and keep the tags in sync with the filesystem",
    long_about = None,
)]
struct Cli {
    /// Tracked directory. Defaults to the current directory.
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run, stop or inspect the daemon for the tracked directory.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },

    /// Manage tags.
    Tag {
        #[command(subcommand)]
        command: TagCommand,
    },

    /// Attach tags to media files or detach them.
    Link {
        #[command(subcommand)]
        command: LinkCommand,
    },

    /// List tracked media.
    Media {
        #[command(subcommand)]
        command: MediaCommand,
    },

    /// Select media with a tag expression such as `cats + (dogs - puppies)`.
    Query(QueryArgs),

    /// Print change notifications as they happen.
    Watch(WatchArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let root = commands::resolve_root(cli.root)?;
    match cli.command {
        Commands::Daemon { command } => commands::daemon::run(&root, command),
        Commands::Tag { command } => commands::tag::run(&root, command),
        Commands::Link { command } => commands::link::run(&root, command),
        Commands::Media { command } => commands::media::run(&root, command),
        Commands::Query(args) => args.run(&root),
        Commands::Watch(args) => args.run(&root),
    }
}
