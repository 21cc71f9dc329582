//! `WorkerStorage`: the per-worker space accountant, eviction engine,
//! pin-set enforcer and user-temp-folder lifecycle. Wraps an
//! `lru::LruCache`, the same way an attribute cache would wrap one over
//! FUSE attribute entries, over resident file byte budgets instead.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use lru::LruCache;

use cache_common::CoreError;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[derive(Debug, Clone)]
struct ResidentFile {
    size_bytes: i64,
    lock_count: u32,
    pinned: bool,
}

#[derive(Debug, Clone, Default)]
struct UserSlot {
    reserved_bytes: i64,
    last_heartbeat_ms: i64,
}

/// Result of a successful `cacheFile`; the caller reports `size_bytes`
/// to the master via `worker_cacheFile`.
pub struct CachedFile {
    pub size_bytes: i64,
}

pub struct WorkerStorage {
    capacity_bytes: i64,
    used_bytes: i64,
    resident: LruCache<i32, ResidentFile>,
    user_space: HashMap<i64, UserSlot>,
    pending_free: HashSet<i32>,
    removed: Vec<i32>,
    known_pinned: HashSet<i32>,
    data_folder: PathBuf,
    temp_folder: PathBuf,
    underfs_temp_folder: PathBuf,
    underfs_data_folder: PathBuf,
}

impl WorkerStorage {
    pub fn new(
        capacity_bytes: i64,
        data_folder: PathBuf,
        temp_folder: PathBuf,
        underfs_temp_folder: PathBuf,
        underfs_data_folder: PathBuf,
    ) -> std::io::Result<Self> {
        fs::create_dir_all(&data_folder)?;
        fs::create_dir_all(&temp_folder)?;
        fs::create_dir_all(&underfs_temp_folder)?;
        fs::create_dir_all(&underfs_data_folder)?;
        Ok(WorkerStorage {
            capacity_bytes,
            used_bytes: 0,
            resident: LruCache::unbounded(),
            user_space: HashMap::new(),
            pending_free: HashSet::new(),
            removed: Vec::new(),
            known_pinned: HashSet::new(),
            data_folder,
            temp_folder,
            underfs_temp_folder,
            underfs_data_folder,
        })
    }

    pub fn used_bytes(&self) -> i64 {
        self.used_bytes
    }

    pub fn data_folder(&self) -> &Path {
        &self.data_folder
    }

    pub fn resident_file_ids(&self) -> Vec<i32> {
        self.resident.iter().map(|(id, _)| *id).collect()
    }

    fn temp_path(&self, user_id: i64, file_id: i32) -> PathBuf {
        self.temp_folder.join(user_id.to_string()).join(file_id.to_string())
    }

    fn underfs_temp_path(&self, user_id: i64, file_id: i32) -> PathBuf {
        self.underfs_temp_folder.join(user_id.to_string()).join(file_id.to_string())
    }

    fn touch_user(&mut self, user_id: i64) {
        self.user_space.entry(user_id).or_default().last_heartbeat_ms = now_ms();
    }

    /// `getUserTempFolder` — ensures the directory exists and marks the
    /// user as recently seen (section 4: "created on first
    /// getUserTempFolder / userHeartbeat").
    pub fn user_temp_folder(&mut self, user_id: i64) -> Result<PathBuf, CoreError> {
        self.touch_user(user_id);
        let dir = self.temp_folder.join(user_id.to_string());
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn user_underfs_temp_folder(&mut self, user_id: i64) -> Result<PathBuf, CoreError> {
        self.touch_user(user_id);
        let dir = self.underfs_temp_folder.join(user_id.to_string());
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn user_heartbeat(&mut self, user_id: i64) {
        self.touch_user(user_id);
    }

    // --- space accounting -------------------------------------------

    fn try_reserve(&mut self, user_id: i64, request_bytes: i64) -> bool {
        if self.used_bytes + request_bytes > self.capacity_bytes {
            return false;
        }
        self.used_bytes += request_bytes;
        let slot = self.user_space.entry(user_id).or_default();
        slot.reserved_bytes += request_bytes;
        slot.last_heartbeat_ms = now_ms();
        true
    }

    pub fn request_space(&mut self, user_id: i64, request_bytes: i64) -> bool {
        if self.try_reserve(user_id, request_bytes) {
            return true;
        }
        self.evict_to_fit(request_bytes);
        self.try_reserve(user_id, request_bytes)
    }

    pub fn return_space(&mut self, user_id: i64, bytes: i64) {
        let Some(slot) = self.user_space.get_mut(&user_id) else {
            tracing::warn!(user_id, bytes, "returnSpace for unknown user, ignoring");
            return;
        };
        let refund = bytes.min(slot.reserved_bytes);
        if refund < bytes {
            tracing::warn!(user_id, bytes, reserved = slot.reserved_bytes, "returnSpace exceeds reservation, clamping");
        }
        slot.reserved_bytes -= refund;
        self.used_bytes -= refund;
    }

    // --- eviction -----------------------------------------------------

    fn evict_file(&mut self, file_id: i32) {
        if let Some(f) = self.resident.pop(&file_id) {
            self.used_bytes -= f.size_bytes;
            if let Err(e) = fs::remove_file(self.data_folder.join(file_id.to_string())) {
                tracing::warn!(file_id, error = %e, "failed to remove evicted file's backing storage");
            }
            self.removed.push(file_id);
            tracing::debug!(file_id, "evicted resident file");
        }
        self.pending_free.remove(&file_id);
    }

    /// Drains the ids evicted since the last call, for the next
    /// heartbeat's `removedFiles` (section 4.3 / scenario 6).
    pub fn drain_removed(&mut self) -> Vec<i32> {
        std::mem::take(&mut self.removed)
    }

    fn lru_victim(&self) -> Option<i32> {
        self.resident
            .iter()
            .rev()
            .find(|(_, f)| f.lock_count == 0 && !f.pinned)
            .map(|(id, _)| *id)
    }

    fn evict_to_fit(&mut self, needed: i64) {
        while self.used_bytes + needed > self.capacity_bytes {
            match self.lru_victim() {
                Some(id) => self.evict_file(id),
                None => break,
            }
        }
    }

    // --- cache/checkpoint lifecycle -------------------------------------
    //
    // The rename/metadata I/O for both operations is long-running relative
    // to the mutator lock (section 5: "Long-running operations ... MUST
    // happen outside the critical section"). `WorkerStorage` itself holds
    // no lock, so it only hands back the paths the caller needs; the
    // caller (`WorkerService`) takes its `Mutex` just long enough to read
    // these paths and, after the I/O completes, to commit the bookkeeping.

    /// `(temp_path, dest_path)` for promoting a user's staged file into
    /// the resident set (section 4.4). No I/O, no mutation.
    pub fn cache_paths(&self, user_id: i64, file_id: i32) -> (PathBuf, PathBuf) {
        (self.temp_path(user_id, file_id), self.data_folder.join(file_id.to_string()))
    }

    /// Records a file the caller has already renamed into `cache_paths`'s
    /// `dest_path` as resident, debiting the user's reservation by its
    /// final size. Caller reports `size_bytes` to the master via
    /// `worker_cacheFile`.
    pub fn commit_cached_file(&mut self, user_id: i64, file_id: i32, size_bytes: i64) -> CachedFile {
        if let Some(slot) = self.user_space.get_mut(&user_id) {
            let debit = size_bytes.min(slot.reserved_bytes);
            slot.reserved_bytes -= debit;
        }
        self.resident.put(
            file_id,
            ResidentFile { size_bytes, lock_count: 0, pinned: false },
        );
        CachedFile { size_bytes }
    }

    /// `(temp_path, dest_path)` for copying a user's staged underfs file
    /// into the underfs data area (section 4.4). No I/O, no mutation, and
    /// no bookkeeping to commit afterward: a checkpoint does not change
    /// worker-local residency.
    pub fn checkpoint_paths(&self, user_id: i64, file_id: i32) -> (PathBuf, PathBuf) {
        (self.underfs_temp_path(user_id, file_id), self.underfs_data_folder.join(file_id.to_string()))
    }

    // --- locking / access ----------------------------------------------

    pub fn lock_file(&mut self, file_id: i32) {
        match self.resident.peek_mut(&file_id) {
            Some(f) => f.lock_count += 1,
            None => tracing::warn!(file_id, "lockFile for non-resident file, ignoring"),
        }
    }

    pub fn unlock_file(&mut self, file_id: i32) {
        match self.resident.peek_mut(&file_id) {
            Some(f) if f.lock_count > 0 => f.lock_count -= 1,
            Some(_) => tracing::warn!(file_id, "unlockFile with no outstanding lock, ignoring"),
            None => tracing::warn!(file_id, "unlockFile for non-resident file, ignoring"),
        }
        self.drain_pending_free(Some(file_id));
    }

    pub fn access_file(&mut self, file_id: i32) {
        if self.resident.get_mut(&file_id).is_none() {
            tracing::warn!(file_id, "accessFile for non-resident file, ignoring");
        }
    }

    // --- master commands ------------------------------------------------

    /// `Free`: evict eligible ids immediately, queue the rest.
    pub fn handle_free(&mut self, file_ids: &[i32]) {
        for &id in file_ids {
            let eligible = self.resident.peek(&id).map(|f| f.lock_count == 0 && !f.pinned);
            match eligible {
                Some(true) => self.evict_file(id),
                Some(false) => {
                    self.pending_free.insert(id);
                }
                None => {}
            }
        }
    }

    /// `Delete`: evict regardless of lock/pin state, the file no longer
    /// exists at the master.
    pub fn handle_delete(&mut self, file_ids: &[i32]) {
        for &id in file_ids {
            self.evict_file(id);
        }
    }

    /// Re-examines `pendingFree` (called after unlock and after a
    /// successful cache, section 4.4). `just_unlocked` lets the unlock
    /// path avoid scanning the whole set for a single id.
    fn drain_pending_free(&mut self, just_unlocked: Option<i32>) {
        let candidates: Vec<i32> = match just_unlocked {
            Some(id) if self.pending_free.contains(&id) => vec![id],
            Some(_) => return,
            None => self.pending_free.iter().copied().collect(),
        };
        for id in candidates {
            match self.resident.peek(&id).map(|f| f.lock_count == 0 && !f.pinned) {
                Some(true) => self.evict_file(id),
                Some(false) => {}
                None => {
                    self.pending_free.remove(&id);
                }
            }
        }
    }

    /// Syncs the pinned flag against the master's pin-id feed
    /// (`worker_getPinIdList`); freshly-unpinned ids are re-examined
    /// against `pendingFree`.
    pub fn sync_pins(&mut self, pinned_ids: &HashSet<i32>) {
        self.known_pinned = pinned_ids.clone();
        let ids: Vec<i32> = self.resident.iter().map(|(id, _)| *id).collect();
        for id in ids {
            if let Some(f) = self.resident.peek_mut(&id) {
                f.pinned = pinned_ids.contains(&id);
            }
        }
        self.drain_pending_free(None);
    }

    /// Whether the master's last-known pin-id feed named this file,
    /// independent of whether it is currently resident. Used by
    /// `requestSpace` admission failures to decide whether to surface
    /// `OutOfMemoryForPinFile` (scenario 4).
    pub fn is_known_pinned(&self, file_id: i32) -> bool {
        self.known_pinned.contains(&file_id)
    }

    /// Drops temp folders for users that have not heartbeat within
    /// `timeout_ms`, releasing any still-reserved bytes.
    pub fn sweep_timed_out_users(&mut self, timeout_ms: i64) -> Vec<i64> {
        let now = now_ms();
        let stale: Vec<i64> = self
            .user_space
            .iter()
            .filter(|(_, slot)| now - slot.last_heartbeat_ms > timeout_ms)
            .map(|(id, _)| *id)
            .collect();

        for &user_id in &stale {
            if let Some(slot) = self.user_space.remove(&user_id) {
                self.used_bytes -= slot.reserved_bytes;
            }
            let local = self.temp_folder.join(user_id.to_string());
            let underfs = self.underfs_temp_folder.join(user_id.to_string());
            if let Err(e) = fs::remove_dir_all(&local) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(user_id, error = %e, "failed to remove stale local temp folder");
                }
            }
            if let Err(e) = fs::remove_dir_all(&underfs) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(user_id, error = %e, "failed to remove stale underfs temp folder");
                }
            }
            tracing::info!(user_id, "user timed out, temp folders removed");
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn storage(capacity: i64) -> (tempfile::TempDir, WorkerStorage) {
        let root = tempfile::tempdir().unwrap();
        let storage = WorkerStorage::new(
            capacity,
            root.path().join("data"),
            root.path().join("tmp"),
            root.path().join("ufs-tmp"),
            root.path().join("ufs-data"),
        )
        .unwrap();
        (root, storage)
    }

    fn write_temp_file(storage: &mut WorkerStorage, user_id: i64, file_id: i32, bytes: usize) {
        let dir = storage.user_temp_folder(user_id).unwrap();
        fs::write(dir.join(file_id.to_string()), vec![0u8; bytes]).unwrap();
    }

    /// Test-only stand-in for what `WorkerService::cache_file` does
    /// outside the lock in production: resolve paths, rename, then
    /// commit the bookkeeping. `WorkerStorage` itself carries no lock, so
    /// there is nothing to release between the rename and the commit here.
    fn cache(storage: &mut WorkerStorage, user_id: i64, file_id: i32) -> CachedFile {
        let (temp_path, dest) = storage.cache_paths(user_id, file_id);
        let size_bytes = fs::metadata(&temp_path).unwrap().len() as i64;
        fs::rename(&temp_path, &dest).unwrap();
        storage.commit_cached_file(user_id, file_id, size_bytes)
    }

    #[test]
    fn request_then_cache_tracks_size_and_debits_reservation() {
        let (_root, mut storage) = storage(10 * 1024);
        assert!(storage.request_space(1, 4096));
        write_temp_file(&mut storage, 1, 1, 4096);

        let cached = cache(&mut storage, 1, 1);
        assert_eq!(cached.size_bytes, 4096);
        assert_eq!(storage.used_bytes(), 4096);
        assert_eq!(storage.resident_file_ids(), vec![1]);
    }

    #[test]
    fn request_space_then_return_space_is_neutral() {
        let (_root, mut storage) = storage(10 * 1024);
        assert!(storage.request_space(1, 2048));
        assert_eq!(storage.used_bytes(), 2048);
        storage.return_space(1, 2048);
        assert_eq!(storage.used_bytes(), 0);
    }

    #[test]
    fn eviction_skips_locked_file() {
        let (_root, mut storage) = storage(10 * 1024);
        assert!(storage.request_space(1, 6 * 1024));
        write_temp_file(&mut storage, 1, 1, 6 * 1024);
        cache(&mut storage, 1, 1);
        storage.lock_file(1);

        assert!(storage.request_space(2, 4 * 1024));
        write_temp_file(&mut storage, 2, 2, 4 * 1024);
        cache(&mut storage, 2, 2);

        assert!(!storage.request_space(3, 5 * 1024));
        assert!(storage.resident_file_ids().contains(&1));
    }

    #[test]
    fn unlocking_drains_pending_free() {
        let (_root, mut storage) = storage(10 * 1024);
        assert!(storage.request_space(1, 4096));
        write_temp_file(&mut storage, 1, 1, 4096);
        cache(&mut storage, 1, 1);
        storage.lock_file(1);

        storage.handle_free(&[1]);
        assert!(storage.resident_file_ids().contains(&1));

        storage.unlock_file(1);
        assert!(storage.resident_file_ids().is_empty());
    }

    #[test]
    fn pinned_file_is_not_evicted_by_free() {
        let (_root, mut storage) = storage(10 * 1024);
        assert!(storage.request_space(1, 4096));
        write_temp_file(&mut storage, 1, 1, 4096);
        cache(&mut storage, 1, 1);

        let mut pinned = HashSet::new();
        pinned.insert(1);
        storage.sync_pins(&pinned);

        storage.handle_free(&[1]);
        assert!(storage.resident_file_ids().contains(&1));
    }

    #[test]
    fn delete_evicts_regardless_of_lock() {
        let (_root, mut storage) = storage(10 * 1024);
        assert!(storage.request_space(1, 4096));
        write_temp_file(&mut storage, 1, 1, 4096);
        cache(&mut storage, 1, 1);
        storage.lock_file(1);

        storage.handle_delete(&[1]);
        assert!(storage.resident_file_ids().is_empty());
        assert_eq!(storage.used_bytes(), 0);
    }

    #[test]
    fn user_heartbeat_sweep_releases_reservation() {
        let (_root, mut storage) = storage(10 * 1024);
        assert!(storage.request_space(1, 4096));
        let released = storage.sweep_timed_out_users(-1);
        assert_eq!(released, vec![1]);
        assert_eq!(storage.used_bytes(), 0);
    }
}
