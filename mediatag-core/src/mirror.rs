//! In-memory shadow of the tracked directory tree.
//!
//! Each node owns its children outright; children are keyed by long name
//! with a second table mapping short aliases to long names. Paths handed in
//! may use either alias per segment; paths handed out are always canonical
//! (long names only).

use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::error::CoreError;
use crate::sub_path;
use crate::types::MediaId;

#[derive(Debug, Default, Clone)]
pub struct DirectoryNode {
    long_name: String,
    short_name: String,
    children: HashMap<String, DirectoryNode>,
    short_to_long: HashMap<String, String>,
    media_ids: BTreeSet<MediaId>,
}

impl DirectoryNode {
    fn new(long_name: &str, short_name: &str) -> Self {
        Self {
            long_name: long_name.to_string(),
            short_name: short_name.to_string(),
            ..Self::default()
        }
    }

    pub fn long_name(&self) -> &str {
        &self.long_name
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    /// Media residing directly in this directory.
    pub fn media_ids(&self) -> &BTreeSet<MediaId> {
        &self.media_ids
    }

    pub fn children(&self) -> impl Iterator<Item = &DirectoryNode> {
        self.children.values()
    }

    /// Long name of the child reachable through `name`, which may be either
    /// alias.
    fn child_key(&self, name: &str) -> Option<&str> {
        if let Some((key, _)) = self.children.get_key_value(name) {
            return Some(key.as_str());
        }
        self.short_to_long.get(name).map(String::as_str)
    }

    fn name_taken(&self, long_name: &str, short_name: &str) -> bool {
        self.child_key(long_name).is_some()
            || (!short_name.is_empty() && self.child_key(short_name).is_some())
    }

    fn attach(&mut self, node: DirectoryNode) {
        if !node.short_name.is_empty() {
            self.short_to_long
                .insert(node.short_name.clone(), node.long_name.clone());
        }
        self.children.insert(node.long_name.clone(), node);
    }

    fn detach(&mut self, long_name: &str) -> Option<DirectoryNode> {
        let node = self.children.remove(long_name)?;
        if !node.short_name.is_empty() {
            self.short_to_long.remove(&node.short_name);
        }
        Some(node)
    }

    /// Union of `media_ids` over this node and all descendants, breadth-first.
    pub fn collect_media_ids(&self) -> BTreeSet<MediaId> {
        let mut collected = BTreeSet::new();
        let mut queue: VecDeque<&DirectoryNode> = VecDeque::from([self]);
        while let Some(node) = queue.pop_front() {
            collected.extend(node.media_ids.iter().copied());
            queue.extend(node.children.values());
        }
        collected
    }

    fn clear_media(&mut self) {
        self.media_ids.clear();
        for child in self.children.values_mut() {
            child.clear_media();
        }
    }
}

// ---------------------------------------------------------------------------
// Mirror
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone)]
pub struct DirectoryMirror {
    root: DirectoryNode,
}

impl DirectoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `long_name` (with optional short alias) under an existing
    /// parent. Returns the canonical path of the new directory.
    pub fn add_directory(
        &mut self,
        parent_sub_path: &str,
        long_name: &str,
        short_name: &str,
    ) -> Result<String, CoreError> {
        let parent_path = self.resolve_canonical_path(parent_sub_path)?;
        let parent = self.node_mut(&parent_path)?;
        if parent.name_taken(long_name, short_name) {
            return Err(CoreError::DirectoryExists {
                parent: parent_path,
                name: long_name.to_string(),
            });
        }
        parent.attach(DirectoryNode::new(long_name, short_name));
        Ok(sub_path::join(&parent_path, long_name))
    }

    /// `true` if the id was not yet recorded in that directory.
    pub fn add_media(&mut self, sub_path: &str, media_id: MediaId) -> Result<bool, CoreError> {
        Ok(self.node_mut(sub_path)?.media_ids.insert(media_id))
    }

    pub fn remove_media(&mut self, sub_path: &str, media_id: MediaId) -> Result<bool, CoreError> {
        Ok(self.node_mut(sub_path)?.media_ids.remove(&media_id))
    }

    /// Rename a directory in place. Returns its new canonical path.
    pub fn rename_directory(
        &mut self,
        old_sub_path_name: &str,
        new_long: &str,
        new_short: &str,
    ) -> Result<String, CoreError> {
        let canonical = self.resolve_canonical_path(old_sub_path_name)?;
        if canonical.is_empty() {
            return Err(CoreError::RootImmutable);
        }
        let (parent_path, old_long) = sub_path::split(&canonical);
        let parent = self.node_mut(parent_path)?;

        let clashes = |name: &str| {
            !name.is_empty() && parent.child_key(name).is_some_and(|key| key != old_long)
        };
        if clashes(new_long) || clashes(new_short) {
            return Err(CoreError::DirectoryExists {
                parent: parent_path.to_string(),
                name: new_long.to_string(),
            });
        }

        let mut node = parent.detach(old_long).ok_or_else(|| CoreError::NotFound {
            path: canonical.clone(),
        })?;
        node.long_name = new_long.to_string();
        node.short_name = new_short.to_string();
        parent.attach(node);
        Ok(sub_path::join(parent_path, new_long))
    }

    /// Transplant a directory, with its whole subtree, under a new parent.
    /// Returns the directory's new canonical path.
    pub fn move_directory(
        &mut self,
        old_sub_path_name: &str,
        new_parent_sub_path: &str,
    ) -> Result<String, CoreError> {
        let from = self.resolve_canonical_path(old_sub_path_name)?;
        if from.is_empty() {
            return Err(CoreError::RootImmutable);
        }
        let to = self.resolve_canonical_path(new_parent_sub_path)?;
        if sub_path::replace_prefix(&to, &from, "").is_some() {
            return Err(CoreError::MoveIntoSelf { from, to });
        }

        let (old_parent, name) = sub_path::split(&from);
        let (long, short) = {
            let node = self.node(&from)?;
            (node.long_name.clone(), node.short_name.clone())
        };
        if old_parent == to {
            return Ok(from);
        }
        if self.node(&to)?.name_taken(&long, &short) {
            return Err(CoreError::DirectoryExists {
                parent: to,
                name: long,
            });
        }

        let node = self
            .node_mut(old_parent)?
            .detach(name)
            .ok_or_else(|| CoreError::NotFound { path: from.clone() })?;
        self.node_mut(&to)?.attach(node);
        Ok(sub_path::join(&to, &long))
    }

    /// Detach and return a directory subtree.
    pub fn remove_directory(&mut self, sub_path_name: &str) -> Result<DirectoryNode, CoreError> {
        let canonical = self.resolve_canonical_path(sub_path_name)?;
        if canonical.is_empty() {
            return Err(CoreError::RootImmutable);
        }
        let (parent_path, name) = sub_path::split(&canonical);
        self.node_mut(parent_path)?
            .detach(name)
            .ok_or(CoreError::NotFound { path: canonical })
    }

    pub fn exists(&self, sub_path: &str) -> bool {
        self.node(sub_path).is_ok()
    }

    /// Canonical form of a path whose segments may use short aliases.
    pub fn resolve_canonical_path(&self, path: &str) -> Result<String, CoreError> {
        let mut node = &self.root;
        let mut canonical: Vec<&str> = Vec::new();
        for segment in sub_path::segments(path) {
            let key = node.child_key(segment).ok_or_else(|| CoreError::NotFound {
                path: path.to_string(),
            })?;
            node = &node.children[key];
            canonical.push(&node.long_name);
        }
        Ok(canonical.join("/"))
    }

    pub fn collect_media_ids_recursive(&self, sub_path: &str) -> Result<BTreeSet<MediaId>, CoreError> {
        Ok(self.node(sub_path)?.collect_media_ids())
    }

    pub fn get(&self, sub_path: &str) -> Result<&DirectoryNode, CoreError> {
        self.node(sub_path)
    }

    /// Forget every media id while keeping the tree shape.
    pub fn clear_media(&mut self) {
        self.root.clear_media();
    }

    /// Canonical paths of all tracked directories except the root.
    pub fn directories(&self) -> Vec<String> {
        let mut paths = Vec::new();
        let mut queue: VecDeque<(String, &DirectoryNode)> = VecDeque::from([(String::new(), &self.root)]);
        while let Some((path, node)) = queue.pop_front() {
            for child in node.children.values() {
                let child_path = sub_path::join(&path, &child.long_name);
                paths.push(child_path.clone());
                queue.push_back((child_path, child));
            }
        }
        paths.sort();
        paths
    }

    // -----------------------------------------------------------------------

    fn node(&self, path: &str) -> Result<&DirectoryNode, CoreError> {
        let mut node = &self.root;
        for segment in sub_path::segments(path) {
            node = node
                .child_key(segment)
                .and_then(|key| node.children.get(key))
                .ok_or_else(|| CoreError::NotFound {
                    path: path.to_string(),
                })?;
        }
        Ok(node)
    }

    fn node_mut(&mut self, path: &str) -> Result<&mut DirectoryNode, CoreError> {
        let mut node = &mut self.root;
        for segment in sub_path::segments(path) {
            let key = match node.child_key(segment) {
                Some(key) => key.to_string(),
                None => {
                    return Err(CoreError::NotFound {
                        path: path.to_string(),
                    })
                }
            };
            node = node.children.get_mut(&key).ok_or_else(|| CoreError::NotFound {
                path: path.to_string(),
            })?;
        }
        Ok(node)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u32]) -> BTreeSet<MediaId> {
        raw.iter().copied().map(MediaId).collect()
    }

    fn sample() -> DirectoryMirror {
        let mut mirror = DirectoryMirror::new();
        mirror.add_directory("", "Documents", "DOCUME~1").expect("add Documents");
        mirror.add_directory("Documents", "Holiday Photos", "HOLIDA~1").expect("add Holiday");
        mirror.add_directory("Documents/Holiday Photos", "2020", "").expect("add 2020");
        mirror.add_directory("", "music", "").expect("add music");
        mirror
    }

    #[test]
    fn short_alias_resolves_like_long_name() {
        let mirror = sample();
        assert!(mirror.exists("DOCUME~1"));
        assert_eq!(
            mirror.resolve_canonical_path("DOCUME~1/HOLIDA~1/2020").expect("resolve"),
            "Documents/Holiday Photos/2020"
        );
        assert_eq!(
            mirror.resolve_canonical_path("Documents/HOLIDA~1").expect("resolve"),
            "Documents/Holiday Photos"
        );
    }

    #[test]
    fn missing_segment_is_not_found() {
        let mirror = sample();
        assert_eq!(
            mirror.resolve_canonical_path("Documents/nope/2020"),
            Err(CoreError::NotFound {
                path: "Documents/nope/2020".into()
            })
        );
        assert!(!mirror.exists("music/x"));
    }

    #[test]
    fn duplicate_directory_rejected() {
        let mut mirror = sample();
        assert!(matches!(
            mirror.add_directory("", "Documents", ""),
            Err(CoreError::DirectoryExists { .. })
        ));
        assert!(matches!(
            mirror.add_directory("", "Other", "DOCUME~1"),
            Err(CoreError::DirectoryExists { .. })
        ));
    }

    #[test]
    fn recursive_collection_unions_all_levels() {
        let mut mirror = sample();
        mirror.add_media("Documents", MediaId(1)).expect("add");
        mirror.add_media("Documents/Holiday Photos", MediaId(2)).expect("add");
        mirror.add_media("DOCUME~1/HOLIDA~1/2020", MediaId(3)).expect("add");
        mirror.add_media("Documents/Holiday Photos/2020", MediaId(4)).expect("add");
        mirror.add_media("music", MediaId(9)).expect("add");

        assert_eq!(
            mirror.collect_media_ids_recursive("Documents").expect("collect"),
            ids(&[1, 2, 3, 4])
        );
        assert_eq!(
            mirror.collect_media_ids_recursive("").expect("collect"),
            ids(&[1, 2, 3, 4, 9])
        );
        assert!(!mirror.add_media("music", MediaId(9)).expect("re-add"));
    }

    #[test]
    fn rename_keeps_subtree_and_updates_both_tables() {
        let mut mirror = sample();
        mirror.add_media("Documents/Holiday Photos/2020", MediaId(7)).expect("add");

        let new_path = mirror
            .rename_directory("DOCUME~1", "Papers", "PAPERS~1")
            .expect("rename");
        assert_eq!(new_path, "Papers");
        assert!(!mirror.exists("Documents"));
        assert!(!mirror.exists("DOCUME~1"));
        assert!(mirror.exists("PAPERS~1/Holiday Photos/2020"));
        assert_eq!(
            mirror.collect_media_ids_recursive("Papers").expect("collect"),
            ids(&[7])
        );
    }

    #[test]
    fn rename_onto_sibling_is_rejected() {
        let mut mirror = sample();
        assert!(matches!(
            mirror.rename_directory("music", "Documents", ""),
            Err(CoreError::DirectoryExists { .. })
        ));
        // Renaming to its own name (case fix, alias change) is allowed.
        assert!(mirror.rename_directory("Documents", "Documents", "").is_ok());
        assert!(!mirror.exists("DOCUME~1"));
    }

    #[test]
    fn move_transplants_node_with_ids() {
        let mut mirror = sample();
        mirror.add_media("Documents/Holiday Photos/2020", MediaId(5)).expect("add");

        let moved = mirror
            .move_directory("Documents/Holiday Photos", "music")
            .expect("move");
        assert_eq!(moved, "music/Holiday Photos");
        assert!(!mirror.exists("Documents/Holiday Photos"));
        assert!(mirror.exists("music/HOLIDA~1/2020"));
        assert_eq!(
            mirror.get("music/Holiday Photos/2020").expect("node").media_ids(),
            &ids(&[5])
        );
    }

    #[test]
    fn move_into_own_subtree_rejected() {
        let mut mirror = sample();
        assert!(matches!(
            mirror.move_directory("Documents", "Documents/Holiday Photos"),
            Err(CoreError::MoveIntoSelf { .. })
        ));
        assert!(mirror.exists("Documents/Holiday Photos/2020"));
    }

    #[test]
    fn remove_returns_subtree_and_root_is_immutable() {
        let mut mirror = sample();
        mirror.add_media("Documents/Holiday Photos", MediaId(2)).expect("add");

        let removed = mirror.remove_directory("Documents").expect("remove");
        assert_eq!(removed.collect_media_ids(), ids(&[2]));
        assert_eq!(mirror.directories(), vec!["music".to_string()]);
        assert!(matches!(
            mirror.remove_directory(""),
            Err(CoreError::RootImmutable)
        ));
    }
}
