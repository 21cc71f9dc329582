//! Worker-facing `MasterService` operations: registration, heartbeat,
//! cache/checkpoint reports, the pin-id feed (section 6).

use std::collections::HashSet;

use cache_common::{Command, CoreError, EncodedWorkerId, NetAddress};

use super::MasterService;

impl MasterService {
    pub fn worker_register(
        &self,
        address: NetAddress,
        total_bytes: i64,
        used_bytes: i64,
        current_files: Vec<i32>,
    ) -> i64 {
        let mut guard = self.inner_lock();
        let worker_id = guard.workers.register(address, total_bytes, used_bytes, current_files.clone());
        guard.placement.reconcile_worker(worker_id, &current_files);
        tracing::info!(worker_id, "worker registered");
        EncodedWorkerId::encode(worker_id, self.start_time_ms()).raw()
    }

    pub fn worker_heartbeat(&self, worker_id: i64, used_bytes: i64, removed_file_ids: &[i32]) -> Command {
        let mut guard = self.inner_lock();
        if !guard.workers.heartbeat(worker_id, used_bytes, removed_file_ids) {
            return Command::register();
        }
        for &id in removed_file_ids {
            guard.placement.remove(id, worker_id);
        }
        guard.workers.next_command(worker_id)
    }

    pub fn worker_cache_file(
        &self,
        worker_id: i64,
        worker_used_bytes: i64,
        file_id: i32,
        file_size_bytes: i64,
    ) -> Result<(), CoreError> {
        let mut guard = self.inner_lock();
        guard.inodes.commit_size(file_id, file_size_bytes)?;
        guard.workers.mark_cached(worker_id, worker_used_bytes, file_id);
        guard.placement.add(file_id, worker_id);
        tracing::debug!(worker_id, file_id, file_size_bytes, "worker cached file");
        Ok(())
    }

    pub fn add_checkpoint(
        &self,
        _worker_id: i64,
        file_id: i32,
        file_size_bytes: i64,
        checkpoint_path: String,
    ) -> Result<bool, CoreError> {
        let mut guard = self.inner_lock();
        guard.inodes.commit_size(file_id, file_size_bytes)?;
        guard.inodes.set_checkpoint_path(file_id, checkpoint_path)?;
        Ok(true)
    }

    pub fn worker_get_pin_id_list(&self) -> HashSet<i32> {
        let guard = self.inner_lock();
        guard.inodes.pinned_file_ids().into_iter().collect()
    }
}
