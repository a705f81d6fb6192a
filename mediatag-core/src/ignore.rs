//! `ignorefile` rules: which paths below the root are never tracked.
//!
//! ```text
//! # comment
//! .mediatag/          directory rule: the directory and everything below it
//! cache/*.tmp         file rule: files matching at exactly this depth
//! */thumbs/           `*` matches within a single segment only
//! ```

use std::fs;
use std::path::Path;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::error::ConfigError;
use crate::sub_path;

/// Ignore-rule collaborator consulted before tracking any path.
pub trait PathFilter: Send + Sync {
    /// `path` names a file (relative, `/`-separated).
    fn matches(&self, path: &str) -> bool;
    /// `path` names a directory.
    fn matches_directory(&self, path: &str) -> bool;
}

pub const DEFAULT_IGNORE_FILE: &str = "\
# Auto-generated ignore file.
# One relative path per line; lines starting with # are comments.
# End a path with / to ignore a whole directory:
#   dir1/dir2/   ignores directory dir2 and everything in it
#   dir1/dir2    ignores the file dir2 in directory dir1
# * matches any run of characters within one path segment.

.mediatag/
";

#[derive(Debug, Clone)]
pub struct IgnoreList {
    files: GlobSet,
    directories: GlobSet,
    rule_count: usize,
}

impl Default for IgnoreList {
    fn default() -> Self {
        Self {
            files: GlobSet::empty(),
            directories: GlobSet::empty(),
            rule_count: 0,
        }
    }
}

impl IgnoreList {
    /// Load rules from `path`, writing [`DEFAULT_IGNORE_FILE`] first when the
    /// file does not exist.
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
            }
            fs::write(path, DEFAULT_IGNORE_FILE).map_err(|e| io_err(path, e))?;
            tracing::info!(path = %path.display(), "generated default ignore file");
        }
        let text = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        Ok(Self::parse(&text))
    }

    /// Parse rule text. Malformed lines are warned about and skipped.
    pub fn parse(text: &str) -> Self {
        let mut files = GlobSetBuilder::new();
        let mut directories = GlobSetBuilder::new();
        let mut rule_count = 0;

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some(rule) = Rule::parse(line) else {
                tracing::warn!(line = idx + 1, rule = line, "malformed ignore rule skipped");
                continue;
            };

            let exact = match glob(&rule.pattern) {
                Ok(g) => g,
                Err(e) => {
                    tracing::warn!(line = idx + 1, rule = line, error = %e, "invalid ignore rule skipped");
                    continue;
                }
            };
            if rule.directory {
                let below = match glob(&format!("{}/**", rule.pattern)) {
                    Ok(g) => g,
                    Err(e) => {
                        tracing::warn!(line = idx + 1, rule = line, error = %e, "invalid ignore rule skipped");
                        continue;
                    }
                };
                directories.add(exact);
                directories.add(below.clone());
                files.add(below);
            } else {
                files.add(exact);
            }
            rule_count += 1;
        }

        let build = |builder: GlobSetBuilder| {
            builder.build().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "ignore rules could not be compiled");
                GlobSet::empty()
            })
        };
        Self {
            files: build(files),
            directories: build(directories),
            rule_count,
        }
    }

    pub fn len(&self) -> usize {
        self.rule_count
    }

    pub fn is_empty(&self) -> bool {
        self.rule_count == 0
    }
}

impl PathFilter for IgnoreList {
    fn matches(&self, path: &str) -> bool {
        self.files.is_match(sub_path::normalize(path))
    }

    fn matches_directory(&self, path: &str) -> bool {
        self.directories.is_match(sub_path::normalize(path))
    }
}

struct Rule {
    /// Glob text with every character but `*` escaped.
    pattern: String,
    directory: bool,
}

impl Rule {
    fn parse(line: &str) -> Option<Self> {
        let directory = line.ends_with('/');
        let body = line.strip_suffix('/').unwrap_or(line);
        let mut segments = Vec::new();
        for segment in body.split('/') {
            let segment = segment.trim();
            if segment.is_empty() {
                return None;
            }
            segments.push(
                segment
                    .split('*')
                    .map(globset::escape)
                    .collect::<Vec<_>>()
                    .join("*"),
            );
        }
        Some(Self {
            pattern: segments.join("/"),
            directory,
        })
    }
}

fn glob(pattern: &str) -> Result<globset::Glob, globset::Error> {
    GlobBuilder::new(pattern).literal_separator(true).build()
}

fn io_err(path: &Path, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
