//! The MasterService composes `InodeStore`, `PathTrie` (via `InodeStore`),
//! `WorkerRegistry` and `PlacementIndex` under a single mutator lock
//! (section 4.5). This module only holds shared state and small
//! cross-cutting helpers; the RPC surface itself is split the way the
//! teacher splits its FUSE dispatcher across sub-modules — client-facing
//! operations in `client_ops`, worker-facing ones in `worker_ops`.

mod client_ops;
mod worker_ops;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Config;
use crate::inode_store::InodeStore;
use crate::placement_index::PlacementIndex;
use crate::worker_registry::WorkerRegistry;

pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

struct Inner {
    inodes: InodeStore,
    workers: WorkerRegistry,
    placement: PlacementIndex,
}

/// Cheaply `Clone`-able handle to the master's authoritative state. Reads
/// and writes alike go through `Mutex::lock`; long-running I/O never
/// happens while the lock is held (section 5) — there is none on the
/// master side of this core, placement/listing queries only clone the
/// handful of records they need.
#[derive(Clone)]
pub struct MasterService {
    inner: Arc<Mutex<Inner>>,
    config: Arc<Config>,
    start_time_ms: i64,
    next_user_id: Arc<AtomicI64>,
}

impl MasterService {
    pub fn new(config: Config) -> Self {
        MasterService {
            inner: Arc::new(Mutex::new(Inner {
                inodes: InodeStore::new(),
                workers: WorkerRegistry::new(),
                placement: PlacementIndex::new(),
            })),
            config: Arc::new(config),
            start_time_ms: now_ms(),
            next_user_id: Arc::new(AtomicI64::new(1)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn start_time_ms(&self) -> i64 {
        self.start_time_ms
    }

    pub fn user_get_user_id(&self) -> i64 {
        self.next_user_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn user_get_underfs_address(&self) -> String {
        self.config.underfs_address.clone()
    }

    /// Drops workers that have not heartbeat within the configured
    /// timeout, reconciling `PlacementIndex` for each (section 4.3).
    pub fn sweep_timed_out_workers(&self) {
        let mut guard = self.inner.lock().expect("master lock poisoned");
        let timeout_ms = self.config.worker_timeout_ms;
        let dead = guard.workers.sweep_timed_out(timeout_ms);
        for worker in dead {
            tracing::warn!(worker_id = worker.id, "worker timed out, dropping from registry");
            guard.placement.remove_worker(worker.id);
        }
    }

    fn inner_lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("master lock poisoned")
    }
}
