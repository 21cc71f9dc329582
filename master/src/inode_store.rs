//! Authoritative table of files and directories keyed by dense file-id,
//! plus the raw-table side table (section 4.2). Owns `PathTrie` and
//! mutates it inside the same call as every inode change, matching the
//! ownership rule in section 3 ("PlacementIndex ... must be updated
//! under the same critical section as the owning structure" — InodeStore
//! applies the same discipline to its own PathTrie).

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use cache_common::{ClientFileInfo, ClientRawTableInfo, CoreError};

use crate::path_trie::{normalize, to_path_string, PathTrie};

pub const ROOT_FILE_ID: i32 = 1;

#[derive(Debug, Clone)]
pub struct FileRecord {
    pub id: i32,
    pub name: String,
    pub is_folder: bool,
    pub size_bytes: i64,
    pub creation_time_ms: i64,
    pub ready: bool,
    pub pinned: bool,
    pub cache_hint: bool,
    pub checkpoint_path: String,
}

#[derive(Debug, Clone)]
pub struct RawTableRecord {
    pub columns: u32,
    pub metadata: Vec<u8>,
}

pub struct InodeStore {
    next_file_id: i32,
    trie: PathTrie,
    files: HashMap<i32, FileRecord>,
    id_to_path: HashMap<i32, String>,
    raw_tables: HashMap<i32, RawTableRecord>,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

impl InodeStore {
    pub fn new() -> Self {
        let mut files = HashMap::new();
        files.insert(
            ROOT_FILE_ID,
            FileRecord {
                id: ROOT_FILE_ID,
                name: String::new(),
                is_folder: true,
                size_bytes: 0,
                creation_time_ms: now_ms(),
                ready: true,
                pinned: false,
                cache_hint: false,
                checkpoint_path: String::new(),
            },
        );
        let mut id_to_path = HashMap::new();
        id_to_path.insert(ROOT_FILE_ID, "/".to_string());
        InodeStore {
            next_file_id: ROOT_FILE_ID + 1,
            trie: PathTrie::new(ROOT_FILE_ID),
            files,
            id_to_path,
            raw_tables: HashMap::new(),
        }
    }

    fn allocate_id(&mut self) -> i32 {
        let id = self.next_file_id;
        self.next_file_id += 1;
        id
    }

    fn leaf_name(path: &str) -> String {
        let components = normalize(path).unwrap_or_default();
        components.last().cloned().unwrap_or_default()
    }

    /// Creates any missing ancestor folders of `path` (not `path` itself).
    fn ensure_ancestors(&mut self, path: &str) -> Result<(), CoreError> {
        let components = normalize(path)?;
        if components.len() <= 1 {
            return Ok(());
        }
        let mut prefix = String::new();
        for component in &components[..components.len() - 1] {
            prefix.push('/');
            prefix.push_str(component);
            if self.trie.lookup(&prefix)?.is_none() {
                self.mkdir(&prefix)?;
            }
        }
        Ok(())
    }

    pub fn get_file_id(&self, path: &str) -> Result<i32, CoreError> {
        Ok(self.trie.lookup(path)?.unwrap_or(-1))
    }

    pub fn get_raw_table_id(&self, path: &str) -> Result<i32, CoreError> {
        match self.trie.lookup(path)? {
            Some(id) if self.raw_tables.contains_key(&id) => Ok(id),
            _ => Ok(0),
        }
    }

    pub fn path_of(&self, file_id: i32) -> Option<&str> {
        self.id_to_path.get(&file_id).map(String::as_str)
    }

    pub fn file(&self, file_id: i32) -> Option<&FileRecord> {
        self.files.get(&file_id)
    }

    pub fn create_file(&mut self, path: &str) -> Result<i32, CoreError> {
        self.ensure_ancestors(path)?;
        let id = self.allocate_id();
        self.trie.insert(path, id, false)?;
        let name = Self::leaf_name(path);
        self.files.insert(
            id,
            FileRecord {
                id,
                name,
                is_folder: false,
                size_bytes: 0,
                creation_time_ms: now_ms(),
                ready: false,
                pinned: false,
                cache_hint: false,
                checkpoint_path: String::new(),
            },
        );
        self.id_to_path.insert(id, path.to_string());
        Ok(id)
    }

    pub fn mkdir(&mut self, path: &str) -> Result<i32, CoreError> {
        let id = self.allocate_id();
        self.trie.insert(path, id, true)?;
        let name = Self::leaf_name(path);
        self.files.insert(
            id,
            FileRecord {
                id,
                name,
                is_folder: true,
                size_bytes: 0,
                creation_time_ms: now_ms(),
                ready: true,
                pinned: false,
                cache_hint: false,
                checkpoint_path: String::new(),
            },
        );
        self.id_to_path.insert(id, path.to_string());
        Ok(id)
    }

    pub fn create_raw_table(
        &mut self,
        path: &str,
        columns: u32,
        metadata: Vec<u8>,
        max_columns: u32,
    ) -> Result<i32, CoreError> {
        if columns < 1 || columns > max_columns {
            return Err(CoreError::TableColumn {
                columns: columns as i64,
                max: max_columns,
            });
        }
        let table_id = self.mkdir(path)?;
        for column in 0..columns {
            let column_path = format!("{}/{}", path.trim_end_matches('/'), column);
            self.mkdir(&column_path)?;
        }
        self.raw_tables
            .insert(table_id, RawTableRecord { columns, metadata });
        Ok(table_id)
    }

    pub fn update_raw_table_metadata(
        &mut self,
        table_id: i32,
        metadata: Vec<u8>,
    ) -> Result<(), CoreError> {
        let table = self
            .raw_tables
            .get_mut(&table_id)
            .ok_or_else(|| CoreError::TableDoesNotExist {
                what: table_id.to_string(),
            })?;
        table.metadata = metadata;
        Ok(())
    }

    pub fn raw_table_info(&self, table_id: i32) -> Result<ClientRawTableInfo, CoreError> {
        let table = self
            .raw_tables
            .get(&table_id)
            .ok_or_else(|| CoreError::TableDoesNotExist {
                what: table_id.to_string(),
            })?;
        let file = self
            .files
            .get(&table_id)
            .ok_or_else(|| CoreError::FileDoesNotExist {
                what: table_id.to_string(),
            })?;
        let path = self
            .id_to_path
            .get(&table_id)
            .cloned()
            .unwrap_or_default();
        Ok(ClientRawTableInfo {
            id: table_id,
            name: file.name.clone(),
            path,
            columns: table.columns,
            metadata: table.metadata.clone(),
        })
    }

    pub fn rename(&mut self, src: &str, dst: &str) -> Result<(), CoreError> {
        let subtree = self.trie.subtree_paths(src)?;
        self.trie.rename(src, dst)?;

        let canonical_src = to_path_string(&normalize(src)?);
        let canonical_dst = to_path_string(&normalize(dst)?);
        for (old_path, id) in subtree {
            let new_path = if old_path == canonical_src {
                canonical_dst.clone()
            } else {
                format!("{}{}", canonical_dst.trim_end_matches('/'), &old_path[canonical_src.len()..])
            };
            self.id_to_path.insert(id, new_path);
        }
        if let Some(file) = self.files.get_mut(&self.trie.lookup(dst)?.expect("just renamed")) {
            file.name = Self::leaf_name(dst);
        }
        Ok(())
    }

    /// Deletes `path`; on success returns the file-ids removed so the
    /// caller can reconcile `PlacementIndex` and enqueue worker commands.
    pub fn delete(&mut self, path: &str, recursive: bool) -> Result<Vec<i32>, CoreError> {
        let ids = self.trie.remove(path, recursive)?;
        for id in &ids {
            self.files.remove(id);
            self.id_to_path.remove(id);
            self.raw_tables.remove(id);
        }
        Ok(ids)
    }

    pub fn delete_by_id(&mut self, file_id: i32, recursive: bool) -> Result<Vec<i32>, CoreError> {
        let path = self
            .id_to_path
            .get(&file_id)
            .cloned()
            .ok_or_else(|| CoreError::FileDoesNotExist {
                what: file_id.to_string(),
            })?;
        self.delete(&path, recursive)
    }

    pub fn list_children(&self, path: &str) -> Result<Vec<(String, i32)>, CoreError> {
        self.trie.children(path)
    }

    pub fn number_of_files(&self, path: &str) -> Result<i64, CoreError> {
        let id = self
            .trie
            .lookup(path)?
            .ok_or_else(|| CoreError::FileDoesNotExist {
                what: path.to_string(),
            })?;
        let file = self.files.get(&id).expect("trie/files in sync");
        if file.is_folder {
            Ok(self.trie.children(path)?.len() as i64)
        } else {
            Ok(1)
        }
    }

    pub fn unpin(&mut self, file_id: i32) -> Result<(), CoreError> {
        let file = self
            .files
            .get_mut(&file_id)
            .ok_or_else(|| CoreError::FileDoesNotExist {
                what: file_id.to_string(),
            })?;
        file.pinned = false;
        Ok(())
    }

    pub fn pinned_file_ids(&self) -> Vec<i32> {
        self.files
            .values()
            .filter(|f| f.pinned)
            .map(|f| f.id)
            .collect()
    }

    /// Sets `size_bytes`/ready the first time it is observed, either from
    /// a worker cache-file report or an add-checkpoint call; fails
    /// `SuspectedFileSize` on a later disagreement (section 4.2).
    pub fn commit_size(&mut self, file_id: i32, size_bytes: i64) -> Result<(), CoreError> {
        let file = self
            .files
            .get_mut(&file_id)
            .ok_or_else(|| CoreError::FileDoesNotExist {
                what: file_id.to_string(),
            })?;
        if file.ready {
            if file.size_bytes != size_bytes {
                return Err(CoreError::SuspectedFileSize {
                    file_id,
                    existing: file.size_bytes,
                    attempted: size_bytes,
                });
            }
            return Ok(());
        }
        file.size_bytes = size_bytes;
        file.ready = true;
        Ok(())
    }

    pub fn set_checkpoint_path(&mut self, file_id: i32, checkpoint_path: String) -> Result<(), CoreError> {
        let file = self
            .files
            .get_mut(&file_id)
            .ok_or_else(|| CoreError::FileDoesNotExist {
                what: file_id.to_string(),
            })?;
        file.checkpoint_path = checkpoint_path;
        Ok(())
    }

    pub fn to_client_file_info(&self, file_id: i32, in_memory: bool) -> Result<ClientFileInfo, CoreError> {
        let file = self
            .files
            .get(&file_id)
            .ok_or_else(|| CoreError::FileDoesNotExist {
                what: file_id.to_string(),
            })?;
        let path = self
            .id_to_path
            .get(&file_id)
            .cloned()
            .unwrap_or_default();
        Ok(ClientFileInfo {
            id: file.id,
            name: file.name.clone(),
            path,
            checkpoint_path: file.checkpoint_path.clone(),
            size_bytes: file.size_bytes,
            creation_time_ms: file.creation_time_ms,
            ready: file.ready,
            folder: file.is_folder,
            in_memory,
            need_pin: file.pinned,
            need_cache: file.cache_hint,
        })
    }
}

impl Default for InodeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_file_auto_creates_ancestors() {
        let mut store = InodeStore::new();
        let id = store.create_file("/a/b/c.dat").unwrap();
        assert!(store.get_file_id("/a").unwrap() > 0);
        assert!(store.get_file_id("/a/b").unwrap() > 0);
        assert_eq!(store.get_file_id("/a/b/c.dat").unwrap(), id);
    }

    #[test]
    fn file_ids_strictly_increase() {
        let mut store = InodeStore::new();
        let a = store.create_file("/a").unwrap();
        let b = store.create_file("/b").unwrap();
        assert!(b > a);
    }

    #[test]
    fn get_file_id_absent_is_negative_one() {
        let store = InodeStore::new();
        assert_eq!(store.get_file_id("/nope").unwrap(), -1);
    }

    #[test]
    fn second_create_file_fails_already_exist() {
        let mut store = InodeStore::new();
        store.create_file("/a").unwrap();
        let err = store.create_file("/a").unwrap_err();
        assert!(matches!(err, CoreError::FileAlreadyExist { .. }));
    }

    #[test]
    fn commit_size_twice_same_value_ok_different_fails() {
        let mut store = InodeStore::new();
        let id = store.create_file("/a").unwrap();
        store.commit_size(id, 4096).unwrap();
        store.commit_size(id, 4096).unwrap();
        let err = store.commit_size(id, 8192).unwrap_err();
        assert!(matches!(err, CoreError::SuspectedFileSize { .. }));
        assert_eq!(store.file(id).unwrap().size_bytes, 4096);
    }

    #[test]
    fn rename_then_rename_back_restores_namespace_and_id() {
        let mut store = InodeStore::new();
        let id = store.create_file("/a.dat").unwrap();
        store.rename("/a.dat", "/b.dat").unwrap();
        assert_eq!(store.get_file_id("/b.dat").unwrap(), id);
        store.rename("/b.dat", "/a.dat").unwrap();
        assert_eq!(store.get_file_id("/a.dat").unwrap(), id);
        assert_eq!(store.path_of(id), Some("/a.dat"));
    }

    #[test]
    fn rename_updates_descendant_paths() {
        let mut store = InodeStore::new();
        store.create_file("/a/b.dat").unwrap();
        let dir_id = store.get_file_id("/a").unwrap();
        let file_id = store.get_file_id("/a/b.dat").unwrap();
        store.rename("/a", "/z").unwrap();
        assert_eq!(store.path_of(dir_id), Some("/z"));
        assert_eq!(store.path_of(file_id), Some("/z/b.dat"));
    }

    #[test]
    fn rename_with_non_canonical_src_and_dst_does_not_panic() {
        let mut store = InodeStore::new();
        store.create_file("/a/b.dat").unwrap();
        let dir_id = store.get_file_id("/a").unwrap();
        let file_id = store.get_file_id("/a/b.dat").unwrap();
        store.rename("/a/", "//z//").unwrap();
        assert_eq!(store.path_of(dir_id), Some("/z"));
        assert_eq!(store.path_of(file_id), Some("/z/b.dat"));
    }

    #[test]
    fn create_raw_table_rejects_out_of_range_columns() {
        let mut store = InodeStore::new();
        let err = store
            .create_raw_table("/t", 0, vec![], 64)
            .unwrap_err();
        assert!(matches!(err, CoreError::TableColumn { .. }));
    }

    #[test]
    fn create_raw_table_makes_column_directories() {
        let mut store = InodeStore::new();
        let table_id = store.create_raw_table("/t", 3, vec![1, 2, 3], 64).unwrap();
        assert_eq!(store.get_raw_table_id("/t").unwrap(), table_id);
        let children = store.list_children("/t").unwrap();
        let mut names: Vec<_> = children.into_iter().map(|(n, _)| n).collect();
        names.sort();
        assert_eq!(names, vec!["0", "1", "2"]);
    }

    #[test]
    fn delete_recursive_returns_all_removed_ids() {
        let mut store = InodeStore::new();
        store.create_file("/a/b.dat").unwrap();
        store.create_file("/a/c.dat").unwrap();
        let ids = store.delete("/a", true).unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(store.get_file_id("/a").unwrap(), -1);
    }
}
