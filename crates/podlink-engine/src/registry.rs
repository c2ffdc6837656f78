//! In-process registry of sync jobs currently being executed.
//!
//! Owned by the sync dispatcher; prevents double-dispatch when a claim
//! races a slow previous tick. Insert happens before the claim attempt,
//! removal when the spawned executor finishes (any outcome).

use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct RunningJobs {
    ids: Mutex<HashSet<i64>>,
}

impl RunningJobs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a job as dispatched. Returns `false` if it was already
    /// registered — the caller must then skip dispatching it again.
    pub fn insert(&self, job_id: i64) -> bool {
        self.ids
            .lock()
            .expect("running-jobs lock poisoned")
            .insert(job_id)
    }

    /// Removes a job on terminal state (or on a lost claim).
    pub fn remove(&self, job_id: i64) {
        self.ids
            .lock()
            .expect("running-jobs lock poisoned")
            .remove(&job_id);
    }

    #[must_use]
    pub fn contains(&self, job_id: i64) -> bool {
        self.ids
            .lock()
            .expect("running-jobs lock poisoned")
            .contains(&job_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.lock().expect("running-jobs lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_idempotent_guard() {
        let running = RunningJobs::new();
        assert!(running.insert(1));
        assert!(!running.insert(1), "second insert must report a duplicate");
        assert_eq!(running.len(), 1);
    }

    #[test]
    fn remove_frees_the_slot() {
        let running = RunningJobs::new();
        running.insert(7);
        running.remove(7);
        assert!(!running.contains(7));
        assert!(running.insert(7));
    }

    #[test]
    fn remove_of_unknown_id_is_a_no_op() {
        let running = RunningJobs::new();
        running.remove(42);
        assert!(running.is_empty());
    }
}
