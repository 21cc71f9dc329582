//! A directory-tree index over absolute paths. Pure in-memory, no I/O;
//! `InodeStore` composes this inside its own critical section on every
//! mutation (section 4.2).

use std::collections::BTreeMap;

use cache_common::CoreError;

struct Node {
    file_id: i32,
    is_folder: bool,
    children: BTreeMap<String, Node>,
}

/// Splits and validates an absolute path into its components.
///
/// Collapses repeated `/`, rejects non-absolute paths and `..` segments.
/// Returns an empty vector for the root itself (`"/"`).
pub fn normalize(path: &str) -> Result<Vec<String>, CoreError> {
    if !path.starts_with('/') {
        return Err(CoreError::InvalidPath {
            path: path.to_string(),
            reason: "path is not absolute".to_string(),
        });
    }
    let mut components = Vec::new();
    for segment in path.split('/') {
        if segment.is_empty() {
            continue;
        }
        if segment == ".." {
            return Err(CoreError::InvalidPath {
                path: path.to_string(),
                reason: "path contains a `..` segment".to_string(),
            });
        }
        components.push(segment.to_string());
    }
    Ok(components)
}

/// Rebuilds the canonical absolute string form of a component list.
pub fn to_path_string(components: &[String]) -> String {
    if components.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", components.join("/"))
    }
}

pub struct PathTrie {
    root: Node,
}

impl PathTrie {
    /// `root_file_id` is the id InodeStore assigned to the root directory
    /// (conventionally 1).
    pub fn new(root_file_id: i32) -> Self {
        PathTrie {
            root: Node {
                file_id: root_file_id,
                is_folder: true,
                children: BTreeMap::new(),
            },
        }
    }

    pub fn insert(&mut self, path: &str, file_id: i32, is_folder: bool) -> Result<(), CoreError> {
        let components = normalize(path)?;
        let Some((leaf, parents)) = components.split_last() else {
            return Err(CoreError::InvalidPath {
                path: path.to_string(),
                reason: "cannot insert the root".to_string(),
            });
        };

        let parent = self.walk_folder(parents, path)?;
        if parent.children.contains_key(leaf) {
            return Err(CoreError::FileAlreadyExist {
                path: path.to_string(),
            });
        }
        parent.children.insert(
            leaf.clone(),
            Node {
                file_id,
                is_folder,
                children: BTreeMap::new(),
            },
        );
        Ok(())
    }

    pub fn lookup(&self, path: &str) -> Result<Option<i32>, CoreError> {
        let components = normalize(path)?;
        Ok(self.find(&components).map(|node| node.file_id))
    }

    pub fn children(&self, path: &str) -> Result<Vec<(String, i32)>, CoreError> {
        let components = normalize(path)?;
        let node = self
            .find(&components)
            .ok_or_else(|| CoreError::FileDoesNotExist {
                what: path.to_string(),
            })?;
        Ok(node
            .children
            .iter()
            .map(|(name, child)| (name.clone(), child.file_id))
            .collect())
    }

    /// Returns `(absolute_path, file_id)` for `path` itself and every
    /// descendant, used to keep an external id→path index in sync across
    /// a rename.
    pub fn subtree_paths(&self, path: &str) -> Result<Vec<(String, i32)>, CoreError> {
        let components = normalize(path)?;
        let node = self
            .find(&components)
            .ok_or_else(|| CoreError::FileDoesNotExist {
                what: path.to_string(),
            })?;
        let mut out = Vec::new();
        collect_paths(node, &to_path_string(&components), &mut out);
        Ok(out)
    }

    /// Removes the subtree rooted at `path`, returning the file-ids of
    /// every node removed (the node itself plus, if `recursive`, its
    /// descendants).
    pub fn remove(&mut self, path: &str, recursive: bool) -> Result<Vec<i32>, CoreError> {
        let components = normalize(path)?;
        let Some((leaf, parents)) = components.split_last() else {
            return Err(CoreError::InvalidPath {
                path: path.to_string(),
                reason: "cannot remove the root".to_string(),
            });
        };
        let parent = self
            .find_mut(parents)
            .ok_or_else(|| CoreError::FileDoesNotExist {
                what: path.to_string(),
            })?;
        let node = parent
            .children
            .get(leaf)
            .ok_or_else(|| CoreError::FileDoesNotExist {
                what: path.to_string(),
            })?;
        if !node.children.is_empty() && !recursive {
            return Err(CoreError::InvalidPath {
                path: path.to_string(),
                reason: "folder is not empty".to_string(),
            });
        }
        let removed_node = parent.children.remove(leaf).expect("checked above");
        let mut ids = Vec::new();
        collect_ids(&removed_node, &mut ids);
        Ok(ids)
    }

    pub fn rename(&mut self, src: &str, dst: &str) -> Result<(), CoreError> {
        let src_components = normalize(src)?;
        let dst_components = normalize(dst)?;

        if dst_components.len() > src_components.len()
            && dst_components[..src_components.len()] == src_components[..]
        {
            return Err(CoreError::InvalidPath {
                path: dst.to_string(),
                reason: "destination is inside the source subtree".to_string(),
            });
        }

        let Some((src_leaf, src_parents)) = src_components.split_last() else {
            return Err(CoreError::InvalidPath {
                path: src.to_string(),
                reason: "cannot rename the root".to_string(),
            });
        };
        let Some((dst_leaf, dst_parents)) = dst_components.split_last() else {
            return Err(CoreError::InvalidPath {
                path: dst.to_string(),
                reason: "cannot rename onto the root".to_string(),
            });
        };

        if self.lookup(dst)?.is_some() {
            return Err(CoreError::FileAlreadyExist {
                path: dst.to_string(),
            });
        }

        let src_parent = self
            .find_mut(src_parents)
            .ok_or_else(|| CoreError::FileDoesNotExist {
                what: src.to_string(),
            })?;
        let node = src_parent
            .children
            .remove(src_leaf)
            .ok_or_else(|| CoreError::FileDoesNotExist {
                what: src.to_string(),
            })?;

        let dst_parent = self.walk_folder(dst_parents, dst)?;
        dst_parent.children.insert(dst_leaf.clone(), node);
        Ok(())
    }

    fn find(&self, components: &[String]) -> Option<&Node> {
        let mut node = &self.root;
        for component in components {
            node = node.children.get(component)?;
        }
        Some(node)
    }

    fn find_mut(&mut self, components: &[String]) -> Option<&mut Node> {
        let mut node = &mut self.root;
        for component in components {
            node = node.children.get_mut(component)?;
        }
        Some(node)
    }

    fn walk_folder(&mut self, components: &[String], original_path: &str) -> Result<&mut Node, CoreError> {
        let mut node = &mut self.root;
        for component in components {
            if !node.is_folder {
                return Err(CoreError::InvalidPath {
                    path: original_path.to_string(),
                    reason: format!("`{component}` traverses a non-folder intermediate"),
                });
            }
            node = node
                .children
                .get_mut(component)
                .ok_or_else(|| CoreError::InvalidPath {
                    path: original_path.to_string(),
                    reason: format!("intermediate component `{component}` does not exist"),
                })?;
        }
        if !node.is_folder {
            return Err(CoreError::InvalidPath {
                path: original_path.to_string(),
                reason: "traverses a non-folder intermediate".to_string(),
            });
        }
        Ok(node)
    }
}

fn collect_ids(node: &Node, out: &mut Vec<i32>) {
    out.push(node.file_id);
    for child in node.children.values() {
        collect_ids(child, out);
    }
}

fn collect_paths(node: &Node, path: &str, out: &mut Vec<(String, i32)>) {
    out.push((path.to_string(), node.file_id));
    for (name, child) in &node.children {
        let child_path = if path == "/" {
            format!("/{name}")
        } else {
            format!("{path}/{name}")
        };
        collect_paths(child, &child_path, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trie() -> PathTrie {
        PathTrie::new(1)
    }

    #[test]
    fn insert_and_lookup_round_trip() {
        let mut t = trie();
        t.insert("/a", 2, true).unwrap();
        t.insert("/a/b.dat", 3, false).unwrap();
        assert_eq!(t.lookup("/a/b.dat").unwrap(), Some(3));
        assert_eq!(t.lookup("/a").unwrap(), Some(2));
        assert_eq!(t.lookup("/").unwrap(), Some(1));
    }

    #[test]
    fn insert_duplicate_fails() {
        let mut t = trie();
        t.insert("/a", 2, true).unwrap();
        let err = t.insert("/a", 3, true).unwrap_err();
        assert!(matches!(err, CoreError::FileAlreadyExist { .. }));
    }

    #[test]
    fn insert_through_missing_intermediate_fails() {
        let mut t = trie();
        let err = t.insert("/missing/child", 2, false).unwrap_err();
        assert!(matches!(err, CoreError::InvalidPath { .. }));
    }

    #[test]
    fn insert_through_file_intermediate_fails() {
        let mut t = trie();
        t.insert("/a", 2, false).unwrap();
        let err = t.insert("/a/b", 3, false).unwrap_err();
        assert!(matches!(err, CoreError::InvalidPath { .. }));
    }

    #[test]
    fn non_absolute_path_is_invalid() {
        let t = trie();
        let err = t.lookup("relative/path").unwrap_err();
        assert!(matches!(err, CoreError::InvalidPath { .. }));
    }

    #[test]
    fn dotdot_segment_is_invalid() {
        let t = trie();
        let err = t.lookup("/a/../b").unwrap_err();
        assert!(matches!(err, CoreError::InvalidPath { .. }));
    }

    #[test]
    fn repeated_slashes_collapse() {
        let mut t = trie();
        t.insert("/a", 2, true).unwrap();
        t.insert("/a/b", 3, false).unwrap();
        assert_eq!(t.lookup("//a///b").unwrap(), Some(3));
    }

    #[test]
    fn children_are_case_sensitive_lexicographic() {
        let mut t = trie();
        t.insert("/a", 2, true).unwrap();
        t.insert("/a/Zeta", 3, false).unwrap();
        t.insert("/a/apple", 4, false).unwrap();
        t.insert("/a/banana", 5, false).unwrap();
        let names: Vec<_> = t
            .children("/a")
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["Zeta", "apple", "banana"]);
    }

    #[test]
    fn remove_non_recursive_on_nonempty_folder_fails() {
        let mut t = trie();
        t.insert("/a", 2, true).unwrap();
        t.insert("/a/b", 3, false).unwrap();
        let err = t.remove("/a", false).unwrap_err();
        assert!(matches!(err, CoreError::InvalidPath { .. }));
    }

    #[test]
    fn remove_recursive_collects_all_ids() {
        let mut t = trie();
        t.insert("/a", 2, true).unwrap();
        t.insert("/a/b", 3, false).unwrap();
        t.insert("/a/c", 4, false).unwrap();
        let mut ids = t.remove("/a", true).unwrap();
        ids.sort();
        assert_eq!(ids, vec![2, 3, 4]);
        assert_eq!(t.lookup("/a").unwrap(), None);
    }

    #[test]
    fn rename_round_trip_preserves_id() {
        let mut t = trie();
        t.insert("/a", 2, false).unwrap();
        t.rename("/a", "/b").unwrap();
        assert_eq!(t.lookup("/b").unwrap(), Some(2));
        t.rename("/b", "/a").unwrap();
        assert_eq!(t.lookup("/a").unwrap(), Some(2));
    }

    #[test]
    fn rename_into_own_subtree_fails() {
        let mut t = trie();
        t.insert("/a", 2, true).unwrap();
        t.insert("/a/b", 3, false).unwrap();
        let err = t.rename("/a", "/a/nested").unwrap_err();
        assert!(matches!(err, CoreError::InvalidPath { .. }));
    }

    #[test]
    fn rename_onto_existing_path_fails() {
        let mut t = trie();
        t.insert("/a", 2, false).unwrap();
        t.insert("/b", 3, false).unwrap();
        let err = t.rename("/a", "/b").unwrap_err();
        assert!(matches!(err, CoreError::FileAlreadyExist { .. }));
    }
}
