//! Helpers for root-relative, `/`-separated paths.

use std::path::{Component, Path};

/// Separator used in every stored `sub_path`.
pub const SEPARATOR: char = '/';

/// `join("a/b", "c") == "a/b/c"`, `join("", "c") == "c"`.
pub fn join(sub_path: &str, name: &str) -> String {
    if sub_path.is_empty() {
        name.to_string()
    } else {
        format!("{sub_path}{SEPARATOR}{name}")
    }
}

/// Split `a/b/c` into (`a/b`, `c`); a single segment has an empty parent.
pub fn split(sub_path_name: &str) -> (&str, &str) {
    match sub_path_name.rsplit_once(SEPARATOR) {
        Some((parent, name)) => (parent, name),
        None => ("", sub_path_name),
    }
}

/// Non-empty segments of a path. Accepts `\` as well as `/`.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(['/', '\\']).filter(|s| !s.is_empty())
}

/// Canonical textual form: `/` separators, no leading/trailing separator.
pub fn normalize(path: &str) -> String {
    segments(path).collect::<Vec<_>>().join("/")
}

/// Convert a path relative to the root into a `sub_path`.
///
/// Returns `None` for paths containing `..`, a prefix/root component, or
/// non-UTF-8 segments.
pub fn from_relative(rel: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

/// Rewrite `sub_path` when it equals or lies below `old_prefix`.
///
/// `replace_prefix("a/b/c", "a/b", "x") == Some("x/c")`; unrelated paths and
/// sibling names sharing a textual prefix (`a/bc`) yield `None`.
pub fn replace_prefix(sub_path: &str, old_prefix: &str, new_prefix: &str) -> Option<String> {
    if sub_path == old_prefix {
        return Some(new_prefix.to_string());
    }
    if old_prefix.is_empty() {
        return Some(join(new_prefix, sub_path));
    }
    let rest = sub_path.strip_prefix(old_prefix)?.strip_prefix(SEPARATOR)?;
    Some(join(new_prefix, rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn split_and_join_are_inverse() {
        assert_eq!(split("a/b/c"), ("a/b", "c"));
        assert_eq!(split("c"), ("", "c"));
        assert_eq!(join("a/b", "c"), "a/b/c");
        assert_eq!(join("", "c"), "c");
    }

    #[test]
    fn normalize_accepts_both_separators() {
        assert_eq!(normalize("\\dir1\\dir2\\"), "dir1/dir2");
        assert_eq!(normalize("/a//b/"), "a/b");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn from_relative_rejects_parent_components() {
        assert_eq!(
            from_relative(&PathBuf::from("a/b/c.png")).as_deref(),
            Some("a/b/c.png")
        );
        assert_eq!(from_relative(&PathBuf::from("")).as_deref(), Some(""));
        assert_eq!(from_relative(&PathBuf::from("../x")), None);
    }

    #[test]
    fn replace_prefix_respects_segment_boundaries() {
        assert_eq!(replace_prefix("a/b/c", "a/b", "x").as_deref(), Some("x/c"));
        assert_eq!(replace_prefix("a/b", "a/b", "x/y").as_deref(), Some("x/y"));
        assert_eq!(replace_prefix("a/bc", "a/b", "x"), None);
        assert_eq!(replace_prefix("q", "a", "x"), None);
        assert_eq!(replace_prefix("a/b", "a/b", "").as_deref(), Some(""));
        assert_eq!(replace_prefix("a/b/c", "a/b", "").as_deref(), Some("c"));
    }
}
