//! Client-facing `MasterService` operations (the `user_*`/`liststatus`/
//! `getWorkersInfo` methods of section 6).

use rand::seq::IteratorRandom;

use cache_common::{ClientFileInfo, ClientRawTableInfo, ClientWorkerInfo, CoreError, NetAddress};

use super::MasterService;

impl MasterService {
    pub fn user_create_file(&self, path: &str) -> Result<i32, CoreError> {
        let mut guard = self.inner_lock();
        guard.inodes.create_file(path)
    }

    pub fn user_mkdir(&self, path: &str) -> Result<i32, CoreError> {
        let mut guard = self.inner_lock();
        guard.inodes.mkdir(path)
    }

    pub fn user_get_file_id(&self, path: &str) -> Result<i32, CoreError> {
        let guard = self.inner_lock();
        guard.inodes.get_file_id(path)
    }

    pub fn user_get_raw_table_id(&self, path: &str) -> Result<i32, CoreError> {
        let guard = self.inner_lock();
        guard.inodes.get_raw_table_id(path)
    }

    pub fn user_create_raw_table(&self, path: &str, columns: u32, metadata: Vec<u8>) -> Result<i32, CoreError> {
        let mut guard = self.inner_lock();
        let max_columns = self.config().max_columns;
        guard.inodes.create_raw_table(path, columns, metadata, max_columns)
    }

    pub fn user_update_raw_table_metadata(&self, table_id: i32, metadata: Vec<u8>) -> Result<(), CoreError> {
        let mut guard = self.inner_lock();
        guard.inodes.update_raw_table_metadata(table_id, metadata)
    }

    pub fn user_get_client_raw_table_info_by_id(&self, table_id: i32) -> Result<ClientRawTableInfo, CoreError> {
        let guard = self.inner_lock();
        guard.inodes.raw_table_info(table_id)
    }

    pub fn user_get_client_raw_table_info_by_path(&self, path: &str) -> Result<ClientRawTableInfo, CoreError> {
        let guard = self.inner_lock();
        let id = guard
            .inodes
            .get_file_id(path)?;
        guard.inodes.raw_table_info(id)
    }

    pub fn user_rename_file(&self, src: &str, dst: &str) -> Result<(), CoreError> {
        let mut guard = self.inner_lock();
        guard.inodes.rename(src, dst)
    }

    pub fn user_unpin_file(&self, file_id: i32) -> Result<(), CoreError> {
        let mut guard = self.inner_lock();
        guard.inodes.unpin(file_id)
    }

    pub fn user_out_of_memory_for_pin_file(&self, file_id: i32) -> Result<(), CoreError> {
        tracing::warn!(file_id, "worker reported out-of-memory admitting a pinned file");
        Ok(())
    }

    pub fn user_delete_by_path(&self, path: &str, recursive: bool) -> Result<bool, CoreError> {
        let mut guard = self.inner_lock();
        let removed = guard.inodes.delete(path, recursive)?;
        Self::fan_out_delete(&mut guard, &removed);
        Ok(true)
    }

    pub fn user_delete_by_id(&self, file_id: i32, recursive: bool) -> Result<bool, CoreError> {
        let mut guard = self.inner_lock();
        let removed = guard.inodes.delete_by_id(file_id, recursive)?;
        Self::fan_out_delete(&mut guard, &removed);
        Ok(true)
    }

    fn fan_out_delete(guard: &mut super::Inner, removed_ids: &[i32]) {
        for &id in removed_ids {
            let holders = guard.placement.workers_for(id);
            for worker_id in holders {
                guard.workers.queue_delete(worker_id, &[id]);
            }
            guard.placement.remove_file(id);
        }
    }

    pub fn user_get_number_of_files(&self, path: &str) -> Result<i64, CoreError> {
        let guard = self.inner_lock();
        guard.inodes.number_of_files(path)
    }

    pub fn user_get_file_locations_by_id(&self, file_id: i32) -> Result<Vec<NetAddress>, CoreError> {
        let guard = self.inner_lock();
        // Touching `file()` here (rather than just the placement index)
        // ensures an unknown id still surfaces `FileDoesNotExist` instead
        // of a silent empty list.
        guard
            .inodes
            .file(file_id)
            .ok_or_else(|| CoreError::FileDoesNotExist {
                what: file_id.to_string(),
            })?;
        Ok(self.addresses_for(&guard, file_id))
    }

    pub fn user_get_file_locations_by_path(&self, path: &str) -> Result<Vec<NetAddress>, CoreError> {
        let guard = self.inner_lock();
        let id = guard.inodes.get_file_id(path)?;
        if id < 0 {
            return Err(CoreError::FileDoesNotExist {
                what: path.to_string(),
            });
        }
        Ok(self.addresses_for(&guard, id))
    }

    fn addresses_for(&self, guard: &super::Inner, file_id: i32) -> Vec<NetAddress> {
        guard
            .placement
            .workers_for(file_id)
            .into_iter()
            .filter_map(|worker_id| guard.workers.get(worker_id))
            .map(|worker| worker.address.clone())
            .collect()
    }

    pub fn user_get_client_file_info_by_id(&self, file_id: i32) -> Result<ClientFileInfo, CoreError> {
        let guard = self.inner_lock();
        let in_memory = guard.placement.is_in_memory(file_id);
        guard.inodes.to_client_file_info(file_id, in_memory)
    }

    pub fn user_get_client_file_info_by_path(&self, path: &str) -> Result<ClientFileInfo, CoreError> {
        let guard = self.inner_lock();
        let id = guard.inodes.get_file_id(path)?;
        if id < 0 {
            return Err(CoreError::FileDoesNotExist {
                what: path.to_string(),
            });
        }
        let in_memory = guard.placement.is_in_memory(id);
        guard.inodes.to_client_file_info(id, in_memory)
    }

    /// Shared by `liststatus`, `user_ls`: children's info for a folder, or
    /// the single entry itself for a file.
    pub fn liststatus(&self, path: &str) -> Result<Vec<ClientFileInfo>, CoreError> {
        let guard = self.inner_lock();
        let id = guard
            .inodes
            .get_file_id(path)?;
        if id < 0 {
            return Err(CoreError::FileDoesNotExist {
                what: path.to_string(),
            });
        }
        let file = guard.inodes.file(id).expect("id from trie must exist");
        if !file.is_folder {
            let in_memory = guard.placement.is_in_memory(id);
            return Ok(vec![guard.inodes.to_client_file_info(id, in_memory)?]);
        }
        let children = guard.inodes.list_children(path)?;
        children
            .into_iter()
            .map(|(_, child_id)| {
                let in_memory = guard.placement.is_in_memory(child_id);
                guard.inodes.to_client_file_info(child_id, in_memory)
            })
            .collect()
    }

    pub fn user_ls(&self, path: &str) -> Result<Vec<ClientFileInfo>, CoreError> {
        self.liststatus(path)
    }

    pub fn user_list_files(&self, path: &str) -> Result<Vec<i32>, CoreError> {
        Ok(self.liststatus(path)?.into_iter().map(|info| info.id).collect())
    }

    pub fn user_get_worker(&self, random: bool, host: &str) -> Result<NetAddress, CoreError> {
        let guard = self.inner_lock();
        if !random && !host.is_empty() {
            return guard
                .workers
                .live_workers()
                .find(|w| w.address.host == host)
                .map(|w| w.address.clone())
                .ok_or_else(|| CoreError::NoLocalWorker {
                    host: Some(host.to_string()),
                });
        }
        let mut rng = rand::thread_rng();
        guard
            .workers
            .live_workers()
            .choose(&mut rng)
            .map(|w| w.address.clone())
            .ok_or(CoreError::NoLocalWorker { host: None })
    }

    pub fn get_workers_info(&self) -> Vec<ClientWorkerInfo> {
        let guard = self.inner_lock();
        guard
            .workers
            .live_workers()
            .map(|w| guard.workers.to_client_info(w))
            .collect()
    }
}
