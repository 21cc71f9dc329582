//! `WorkerService`: composes `WorkerStorage` with the worker's identity
//! and its `MasterClient` handle, the worker-side analogue of `master`'s
//! `MasterService`. Exposes the `WorkerService` RPC surface of section 6
//! plus the bits `membership` needs to drive the heartbeat loop.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use cache_common::{Command, CoreError, NetAddress};

use crate::config::Config;
use crate::master_client::MasterClient;
use crate::storage::WorkerStorage;

const UNREGISTERED: i64 = -1;

#[derive(Clone)]
pub struct WorkerService {
    storage: Arc<Mutex<WorkerStorage>>,
    config: Arc<Config>,
    master: MasterClient,
    worker_id: Arc<AtomicI64>,
}

impl WorkerService {
    pub fn new(config: Config, storage: WorkerStorage) -> Self {
        let master = MasterClient::new(config.master_address.clone());
        WorkerService {
            storage: Arc::new(Mutex::new(storage)),
            config: Arc::new(config),
            master,
            worker_id: Arc::new(AtomicI64::new(UNREGISTERED)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn master(&self) -> &MasterClient {
        &self.master
    }

    pub fn worker_id(&self) -> i64 {
        self.worker_id.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WorkerStorage> {
        self.storage.lock().expect("worker storage lock poisoned")
    }

    pub fn advertise_address(&self) -> NetAddress {
        NetAddress { host: self.config.advertise_host.clone(), port: self.config.advertise_port }
    }

    /// Registers (or re-registers, section 9 scenario 5) with the
    /// master, reconciling its view of this worker's resident files.
    pub async fn register_with_master(&self) -> Result<i64, reqwest::Error> {
        let (used_bytes, current_files) = {
            let guard = self.lock();
            (guard.used_bytes(), guard.resident_file_ids())
        };
        let encoded = self
            .master
            .register(self.advertise_address(), self.config.capacity_bytes, used_bytes, current_files)
            .await?;
        let worker_id = cache_common::EncodedWorkerId(encoded).worker_id();
        self.worker_id.store(worker_id, Ordering::SeqCst);
        tracing::info!(worker_id, "registered with master");
        Ok(worker_id)
    }

    pub fn used_bytes(&self) -> i64 {
        self.lock().used_bytes()
    }

    pub fn drain_removed(&self) -> Vec<i32> {
        self.lock().drain_removed()
    }

    /// Applies a heartbeat `Command` against local storage. `Register`
    /// and `Unknown` are handled by the caller (membership loop).
    pub fn apply_command(&self, command: &Command) {
        use cache_common::CommandType;
        match command.kind {
            CommandType::Nothing | CommandType::Register | CommandType::Unknown => {}
            CommandType::Free => self.lock().handle_free(&command.data),
            CommandType::Delete => self.lock().handle_delete(&command.data),
        }
    }

    pub fn sync_pins(&self, pinned_ids: &std::collections::HashSet<i32>) {
        self.lock().sync_pins(pinned_ids);
    }

    pub fn sweep_timed_out_users(&self) -> Vec<i64> {
        self.lock().sweep_timed_out_users(self.config.user_timeout_ms)
    }

    // --- WorkerService RPC surface (section 6) --------------------------

    pub fn get_data_folder(&self) -> String {
        self.lock().data_folder().display().to_string()
    }

    pub fn get_user_temp_folder(&self, user_id: i64) -> Result<String, CoreError> {
        Ok(self.lock().user_temp_folder(user_id)?.display().to_string())
    }

    pub fn get_user_underfs_temp_folder(&self, user_id: i64) -> Result<String, CoreError> {
        Ok(self.lock().user_underfs_temp_folder(user_id)?.display().to_string())
    }

    pub fn user_heartbeat(&self, user_id: i64) {
        self.lock().user_heartbeat(user_id);
    }

    /// `file_id` is an out-of-band hint (not part of the core
    /// `(userId, bytes)` signature in section 6) so a reservation made
    /// on behalf of a pinned file can surface `OutOfMemoryForPinFile` to
    /// the master on admission failure (scenario 4), rather than just
    /// returning false with no explanation.
    pub async fn request_space(&self, user_id: i64, bytes: i64, file_id: Option<i32>) -> bool {
        let (admitted, pinned_candidate) = {
            let mut guard = self.lock();
            let admitted = guard.request_space(user_id, bytes);
            let pinned_candidate = !admitted && file_id.is_some_and(|id| guard.is_known_pinned(id));
            (admitted, pinned_candidate)
        };
        if pinned_candidate {
            let file_id = file_id.expect("checked by pinned_candidate");
            if let Err(e) = self.master.out_of_memory_for_pin_file(file_id).await {
                tracing::warn!(file_id, error = %e, "failed to report pinned-file OOM to master");
            }
        }
        admitted
    }

    pub fn return_space(&self, user_id: i64, bytes: i64) {
        self.lock().return_space(user_id, bytes);
    }

    pub fn lock_file(&self, file_id: i32, _user_id: i64) {
        self.lock().lock_file(file_id);
    }

    pub fn unlock_file(&self, file_id: i32, _user_id: i64) {
        self.lock().unlock_file(file_id);
    }

    pub fn access_file(&self, file_id: i32) {
        self.lock().access_file(file_id);
    }

    /// Promotes the user's temp file into the resident set, then reports
    /// it to the master. A failed report is logged, not fatal: the next
    /// successful heartbeat's resident count still reflects the file
    /// locally, and a future `worker_register` reconciles the master.
    ///
    /// The rename is done with the lock released (section 5: long-running
    /// I/O must not happen inside the critical section) — the lock is
    /// taken only to read the paths beforehand and to commit the
    /// bookkeeping afterward.
    pub async fn cache_file(&self, user_id: i64, file_id: i32) -> Result<(), CoreError> {
        let (temp_path, dest) = self.lock().cache_paths(user_id, file_id);
        let metadata = std::fs::metadata(&temp_path)
            .map_err(|_| CoreError::FileDoesNotExist { what: temp_path.display().to_string() })?;
        let size_bytes = metadata.len() as i64;
        std::fs::rename(&temp_path, &dest)?;

        let (size_bytes, used_bytes) = {
            let mut guard = self.lock();
            let cached = guard.commit_cached_file(user_id, file_id, size_bytes);
            (cached.size_bytes, guard.used_bytes())
        };
        let worker_id = self.worker_id();
        if let Err(e) = self.master.cache_file(worker_id, used_bytes, file_id, size_bytes).await {
            tracing::warn!(file_id, error = %e, "failed to report cached file to master");
        }
        Ok(())
    }

    /// Copies the user's underfs temp file into the underfs data area,
    /// then reports it to the master. Same lock-scoping rule as
    /// `cache_file`: the rename runs with the lock released, since a
    /// checkpoint carries no worker-local bookkeeping to commit afterward.
    pub async fn add_checkpoint(&self, user_id: i64, file_id: i32) -> Result<bool, CoreError> {
        let (temp_path, dest) = self.lock().checkpoint_paths(user_id, file_id);
        let metadata = std::fs::metadata(&temp_path)
            .map_err(|_| CoreError::FileDoesNotExist { what: temp_path.display().to_string() })?;
        let size_bytes = metadata.len() as i64;
        std::fs::rename(&temp_path, &dest).map_err(|e| CoreError::FailedToCheckpoint {
            file_id,
            path: dest.display().to_string(),
            reason: e.to_string(),
        })?;

        let worker_id = self.worker_id();
        let path = dest.display().to_string();
        self.master
            .add_checkpoint(worker_id, file_id, size_bytes, path.clone())
            .await
            .map_err(|e| CoreError::FailedToCheckpoint { file_id, path, reason: e.to_string() })
    }
}
