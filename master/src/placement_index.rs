//! Reverse index from file-id to the set of workers currently holding it.
//! Holds only non-owning relations; maintained in lockstep with
//! `WorkerRegistry` and `InodeStore` under the same critical section
//! (section 3).

use std::collections::{HashMap, HashSet};

#[derive(Default)]
pub struct PlacementIndex {
    locations: HashMap<i32, HashSet<i64>>,
}

impl PlacementIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, file_id: i32, worker_id: i64) {
        self.locations.entry(file_id).or_default().insert(worker_id);
    }

    pub fn remove(&mut self, file_id: i32, worker_id: i64) {
        if let Some(set) = self.locations.get_mut(&file_id) {
            set.remove(&worker_id);
            if set.is_empty() {
                self.locations.remove(&file_id);
            }
        }
    }

    /// Replaces the full set of files worker `worker_id` declares, as
    /// happens on `worker_register` (section 4.3: "the master reconciles
    /// PlacementIndex to exactly match the declared list").
    pub fn reconcile_worker(&mut self, worker_id: i64, declared_files: &[i32]) {
        self.remove_worker(worker_id);
        for &file_id in declared_files {
            self.add(file_id, worker_id);
        }
    }

    pub fn remove_worker(&mut self, worker_id: i64) {
        self.locations.retain(|_, workers| {
            workers.remove(&worker_id);
            !workers.is_empty()
        });
    }

    pub fn remove_file(&mut self, file_id: i32) {
        self.locations.remove(&file_id);
    }

    pub fn workers_for(&self, file_id: i32) -> Vec<i64> {
        self.locations
            .get(&file_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_in_memory(&self, file_id: i32) -> bool {
        self.locations
            .get(&file_id)
            .is_some_and(|set| !set.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_workers_for_returns_worker() {
        let mut idx = PlacementIndex::new();
        idx.add(1, 7);
        assert_eq!(idx.workers_for(1), vec![7]);
        assert!(idx.is_in_memory(1));
    }

    #[test]
    fn remove_worker_clears_all_its_files() {
        let mut idx = PlacementIndex::new();
        idx.add(1, 7);
        idx.add(2, 7);
        idx.add(2, 8);
        idx.remove_worker(7);
        assert!(idx.workers_for(1).is_empty());
        assert_eq!(idx.workers_for(2), vec![8]);
    }

    #[test]
    fn reconcile_worker_replaces_declared_set() {
        let mut idx = PlacementIndex::new();
        idx.add(1, 7);
        idx.add(2, 7);
        idx.reconcile_worker(7, &[2, 3]);
        assert!(idx.workers_for(1).is_empty());
        assert_eq!(idx.workers_for(2), vec![7]);
        assert_eq!(idx.workers_for(3), vec![7]);
    }
}
