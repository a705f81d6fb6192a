//! `mediamap`: tags applied automatically to newly discovered media.
//!
//! ```text
//! BEGIN
//! ^photos/.*\.jpe?g$
//! TAG
//! photo
//! END
//! ```
//!
//! Patterns are matched against `sub_path/long_name`. A block with an
//! invalid regex or keywords out of order is dropped up to the next `BEGIN`.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use regex::Regex;

use crate::error::ConfigError;

/// Filename-to-tag collaborator.
pub trait TagMapper: Send + Sync {
    /// De-duplicated tag names for a media path, in rule order.
    fn mapped_tags_for(&self, sub_path_name: &str) -> Vec<String>;
}

#[derive(Debug, Clone)]
struct MapEntry {
    patterns: Vec<Regex>,
    tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FilenameMap {
    entries: Vec<MapEntry>,
}

enum State {
    Idle,
    Patterns(Vec<Regex>),
    Tags(Vec<Regex>, Vec<String>),
    Skipping,
}

impl FilenameMap {
    /// Load from `path`; a missing file is an empty map.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn parse(text: &str) -> Self {
        let mut entries = Vec::new();
        let mut state = State::Idle;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            if raw.trim().is_empty() || raw.starts_with('#') {
                continue;
            }
            let keyword = raw.trim();

            state = match (state, keyword) {
                (State::Idle | State::Skipping, "BEGIN") => State::Patterns(Vec::new()),
                (State::Skipping, _) => State::Skipping,
                (State::Patterns(patterns), "TAG") if !patterns.is_empty() => {
                    State::Tags(patterns, Vec::new())
                }
                (State::Tags(patterns, tags), "END") if !tags.is_empty() => {
                    entries.push(MapEntry { patterns, tags });
                    State::Idle
                }
                (State::Patterns(_) | State::Tags(..), "BEGIN") => {
                    tracing::warn!(line = line_no, "unterminated mediamap block dropped");
                    State::Patterns(Vec::new())
                }
                (_, "TAG" | "END") => {
                    tracing::warn!(line = line_no, keyword, "mediamap keyword out of order, skipping block");
                    State::Skipping
                }
                (State::Patterns(mut patterns), _) => match Regex::new(raw) {
                    Ok(regex) => {
                        patterns.push(regex);
                        State::Patterns(patterns)
                    }
                    Err(e) => {
                        tracing::warn!(line = line_no, error = %e, "invalid mediamap pattern, skipping block");
                        State::Skipping
                    }
                },
                (State::Tags(patterns, mut tags), name) => {
                    if !tags.iter().any(|t| t == name) {
                        tags.push(name.to_string());
                    }
                    State::Tags(patterns, tags)
                }
                (State::Idle, _) => {
                    tracing::warn!(line = line_no, "mediamap line outside a block ignored");
                    State::Idle
                }
            };
        }

        if matches!(state, State::Patterns(_) | State::Tags(..)) {
            tracing::warn!("mediamap ends inside an unterminated block");
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TagMapper for FilenameMap {
    fn mapped_tags_for(&self, sub_path_name: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for entry in &self.entries {
            if !entry.patterns.iter().any(|p| p.is_match(sub_path_name)) {
                continue;
            }
            for tag in &entry.tags {
                if !out.contains(tag) {
                    out.push(tag.clone());
                }
            }
        }
        out
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
