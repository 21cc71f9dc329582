//! Set of live workers with capacity/usage, last-contact timestamp, and
//! the resident file-id set each declares (section 4.3).

use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

use cache_common::{ClientWorkerInfo, NetAddress};

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[derive(Debug, Clone)]
pub struct WorkerEntry {
    pub id: i64,
    pub address: NetAddress,
    pub total_bytes: i64,
    pub used_bytes: i64,
    pub last_contact_ms: i64,
    pub start_time_ms: i64,
    pub files: HashSet<i32>,
    /// Commands queued for this worker, drained one per heartbeat (FIFO,
    /// `Free` ahead of `Nothing` per section 4.3).
    pub pending_free: Vec<i32>,
    pub pending_delete: Vec<i32>,
    pub pending_register: bool,
}

pub struct WorkerRegistry {
    next_worker_id: i64,
    workers: HashMap<i64, WorkerEntry>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        WorkerRegistry {
            next_worker_id: 1,
            workers: HashMap::new(),
        }
    }

    pub fn register(&mut self, address: NetAddress, total_bytes: i64, used_bytes: i64, current_files: Vec<i32>) -> i64 {
        let id = self.next_worker_id;
        self.next_worker_id += 1;
        self.workers.insert(
            id,
            WorkerEntry {
                id,
                address,
                total_bytes,
                used_bytes,
                last_contact_ms: now_ms(),
                start_time_ms: now_ms(),
                files: current_files.into_iter().collect(),
                pending_free: Vec::new(),
                pending_delete: Vec::new(),
                pending_register: false,
            },
        );
        id
    }

    pub fn heartbeat(&mut self, worker_id: i64, used_bytes: i64, removed_file_ids: &[i32]) -> bool {
        let Some(worker) = self.workers.get_mut(&worker_id) else {
            return false;
        };
        worker.last_contact_ms = now_ms();
        worker.used_bytes = used_bytes;
        for id in removed_file_ids {
            worker.files.remove(id);
        }
        true
    }

    pub fn mark_cached(&mut self, worker_id: i64, used_bytes: i64, file_id: i32) -> bool {
        let Some(worker) = self.workers.get_mut(&worker_id) else {
            return false;
        };
        worker.used_bytes = used_bytes;
        worker.last_contact_ms = now_ms();
        worker.files.insert(file_id);
        true
    }

    pub fn queue_free(&mut self, worker_id: i64, file_ids: &[i32]) {
        if let Some(worker) = self.workers.get_mut(&worker_id) {
            worker.pending_free.extend_from_slice(file_ids);
        }
    }

    pub fn queue_delete(&mut self, worker_id: i64, file_ids: &[i32]) {
        if let Some(worker) = self.workers.get_mut(&worker_id) {
            worker.pending_delete.extend_from_slice(file_ids);
        }
    }

    pub fn force_register(&mut self, worker_id: i64) {
        if let Some(worker) = self.workers.get_mut(&worker_id) {
            worker.pending_register = true;
        }
    }

    /// Drains exactly one outstanding instruction for `worker_id`: `Free`
    /// takes precedence over `Nothing`, `Register` is forced whenever
    /// queued (section 4.3 table).
    pub fn next_command(&mut self, worker_id: i64) -> cache_common::Command {
        use cache_common::Command;
        let Some(worker) = self.workers.get_mut(&worker_id) else {
            return Command::register();
        };
        if worker.pending_register {
            worker.pending_register = false;
            return Command::register();
        }
        if !worker.pending_delete.is_empty() {
            let ids = std::mem::take(&mut worker.pending_delete);
            return Command::delete(ids);
        }
        if !worker.pending_free.is_empty() {
            let ids = std::mem::take(&mut worker.pending_free);
            return Command::free(ids);
        }
        Command::nothing()
    }

    pub fn remove_worker(&mut self, worker_id: i64) -> Option<WorkerEntry> {
        self.workers.remove(&worker_id)
    }

    /// Evicts every worker whose last contact is older than `timeout_ms`,
    /// returning the removed entries so the caller can reconcile
    /// `PlacementIndex`.
    pub fn sweep_timed_out(&mut self, timeout_ms: i64) -> Vec<WorkerEntry> {
        let now = now_ms();
        let dead: Vec<i64> = self
            .workers
            .values()
            .filter(|w| now - w.last_contact_ms > timeout_ms)
            .map(|w| w.id)
            .collect();
        dead.into_iter()
            .filter_map(|id| self.workers.remove(&id))
            .collect()
    }

    pub fn live_workers(&self) -> impl Iterator<Item = &WorkerEntry> {
        self.workers.values()
    }

    pub fn get(&self, worker_id: i64) -> Option<&WorkerEntry> {
        self.workers.get(&worker_id)
    }

    pub fn to_client_info(&self, worker: &WorkerEntry) -> ClientWorkerInfo {
        let now = now_ms();
        ClientWorkerInfo {
            id: worker.id,
            address: worker.address.clone(),
            last_contact_sec: (now - worker.last_contact_ms).max(0) / 1000,
            state: "In Service".to_string(),
            capacity_bytes: worker.total_bytes,
            used_bytes: worker.used_bytes,
            starttime_ms: worker.start_time_ms,
        }
    }
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> NetAddress {
        NetAddress {
            host: "127.0.0.1".to_string(),
            port: 9000,
        }
    }

    #[test]
    fn register_assigns_increasing_ids() {
        let mut reg = WorkerRegistry::new();
        let a = reg.register(addr(), 1024, 0, vec![]);
        let b = reg.register(addr(), 1024, 0, vec![]);
        assert!(b > a);
    }

    #[test]
    fn heartbeat_on_unknown_worker_fails() {
        let mut reg = WorkerRegistry::new();
        assert!(!reg.heartbeat(999, 0, &[]));
    }

    #[test]
    fn free_takes_precedence_over_nothing() {
        let mut reg = WorkerRegistry::new();
        let id = reg.register(addr(), 1024, 0, vec![]);
        reg.queue_free(id, &[1, 2]);
        let cmd = reg.next_command(id);
        assert_eq!(cmd.kind, cache_common::CommandType::Free);
        assert_eq!(cmd.data, vec![1, 2]);
        // drained: next call is Nothing
        let cmd2 = reg.next_command(id);
        assert_eq!(cmd2.kind, cache_common::CommandType::Nothing);
    }

    #[test]
    fn register_command_forced_regardless_of_other_queues() {
        let mut reg = WorkerRegistry::new();
        let id = reg.register(addr(), 1024, 0, vec![]);
        reg.queue_free(id, &[1]);
        reg.force_register(id);
        let cmd = reg.next_command(id);
        assert_eq!(cmd.kind, cache_common::CommandType::Register);
    }

    #[test]
    fn sweep_removes_stale_workers() {
        let mut reg = WorkerRegistry::new();
        let id = reg.register(addr(), 1024, 0, vec![]);
        if let Some(w) = reg.workers.get_mut(&id) {
            w.last_contact_ms -= 100_000;
        }
        let removed = reg.sweep_timed_out(1_000);
        assert_eq!(removed.len(), 1);
        assert!(reg.get(id).is_none());
    }
}
