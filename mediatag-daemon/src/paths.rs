//! Locations of the daemon's state below the tracked root.
//!
//! ```text
//! <root>/.mediatag/
//!     config.yaml
//!     ignorefile
//!     mediamap
//!     daemon.sock
//!     db/{tags,media,tag_links}.json
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use mediatag_core::Config;

pub const STATE_DIR: &str = ".mediatag";
pub const CONFIG_FILE: &str = "config.yaml";
pub const IGNORE_FILE: &str = "ignorefile";
pub const MEDIAMAP_FILE: &str = "mediamap";
pub const DAEMON_SOCKET: &str = "daemon.sock";

/// How long a `RenameOld` at the end of a batch waits for its `RenameNew`.
pub const RENAME_PAIR_WINDOW: Duration = Duration::from_millis(50);

/// Notifications buffered per subscriber before it starts lagging.
pub const NOTIFICATION_CAPACITY: usize = 1024;

pub fn state_dir(root: &Path) -> PathBuf {
    root.join(STATE_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    state_dir(root).join(CONFIG_FILE)
}

pub fn ignore_path(root: &Path) -> PathBuf {
    state_dir(root).join(IGNORE_FILE)
}

pub fn mediamap_path(root: &Path) -> PathBuf {
    state_dir(root).join(MEDIAMAP_FILE)
}

pub fn socket_path(root: &Path) -> PathBuf {
    state_dir(root).join(DAEMON_SOCKET)
}

pub fn store_dir(root: &Path, config: &Config) -> PathBuf {
    state_dir(root).join(&config.store.dir)
}

/// `true` for the state directory itself and anything inside it.
pub fn is_state_path(sub_path_name: &str) -> bool {
    sub_path_name == STATE_DIR
        || sub_path_name
            .strip_prefix(STATE_DIR)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_paths_hang_off_root() {
        let root = Path::new("/media/library");
        assert_eq!(socket_path(root), Path::new("/media/library/.mediatag/daemon.sock"));
        assert_eq!(
            store_dir(root, &Config::default()),
            Path::new("/media/library/.mediatag/db")
        );
    }

    #[test]
    fn state_path_detection() {
        assert!(is_state_path(".mediatag"));
        assert!(is_state_path(".mediatag/db/tags.json"));
        assert!(!is_state_path(".mediatagged/a.png"));
        assert!(!is_state_path("photos/.mediatag"));
    }
}
