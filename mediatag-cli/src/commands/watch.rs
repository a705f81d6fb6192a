//! `mediatag watch`: follow the daemon's notification stream.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;

use mediatag_daemon::{subscribe, DaemonError, Notification};

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Print each notification as a JSON line.
    #[arg(long)]
    pub json: bool,

    /// Exit after this many notifications.
    #[arg(long, value_name = "N")]
    pub count: Option<usize>,
}

impl WatchArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        let mut seen = 0usize;
        let mut failure = None;
        let streamed = subscribe(root, |notification| {
            let line = if self.json {
                serde_json::to_string(&notification).map_err(anyhow::Error::from)
            } else {
                Ok(describe(&notification))
            };
            match line {
                Ok(line) => println!("{line}"),
                Err(err) => {
                    failure = Some(err);
                    return false;
                }
            }
            seen += 1;
            self.count.map_or(true, |limit| seen < limit)
        });

        match streamed {
            Ok(()) => {}
            Err(DaemonError::DaemonNotRunning { .. }) => {
                return Err(anyhow!(
                    "daemon is not running for {}; start it with `mediatag daemon start`",
                    root.display()
                ))
            }
            Err(err) => return Err(err).context("notification stream failed"),
        }
        match failure {
            Some(err) => Err(err).context("failed to render notification"),
            None => Ok(()),
        }
    }
}

fn describe(notification: &Notification) -> String {
    match notification {
        Notification::Initialized => format!("{} index ready", "init".bold()),
        Notification::TagInserted { tag } => format!("{} tag {} '{}'", "+".green(), tag.id, tag.name),
        Notification::TagRenamed { tag_id, name } => format!("{} tag {} is now '{}'", "~".yellow(), tag_id, name),
        Notification::TagRemoved { tag_id } => format!("{} tag {}", "-".red(), tag_id),
        Notification::MediaInserted { media } => {
            format!("{} media {} {}", "+".green(), media.id, media.sub_path_name())
        }
        Notification::MediaUntagged { media } => {
            format!("{} media {} {} has no tags", "·".bright_black(), media.id, media.sub_path_name())
        }
        Notification::MediaRenamed { media_id, name } => {
            format!("{} media {} renamed to {}", "~".yellow(), media_id, name)
        }
        Notification::MediaMoved { media_id, path } => format!("{} media {} moved to {}", "~".yellow(), media_id, path),
        Notification::MediaRemoved { media_id } => format!("{} media {}", "-".red(), media_id),
        Notification::LinkFormed { tag, media_id } => {
            format!("{} media {} tagged '{}'", "+".green(), media_id, tag.name)
        }
        Notification::LinkDestroyed { tag_id, media_id } => {
            format!("{} media {} untagged from tag {}", "-".red(), media_id, tag_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediatag_core::{MediaId, TagId};

    #[test]
    fn descriptions_name_the_subject() {
        colored::control::set_override(false);
        let moved = describe(&Notification::MediaMoved { media_id: MediaId(3), path: "album/cat.png".into() });
        assert_eq!(moved, "~ media 3 moved to album/cat.png");
        let removed = describe(&Notification::TagRemoved { tag_id: TagId(1) });
        assert_eq!(removed, "- tag 1");
    }
}
