//! Thread-safe job registry.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;

use lumen_core::{Job, JobId};

/// Concurrent map from job identifier to job state.
///
/// Cloning is cheap and every clone sees the same jobs. Entries are sharded,
/// so operations on different identifiers do not contend, and every read or
/// write of one job happens under that entry's guard.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<DashMap<JobId, Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a job, replacing any job with the same identifier.
    pub fn add(&self, job: Job) {
        self.jobs.insert(job.id, job);
    }

    /// Snapshot of a job.
    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.jobs.get(id).map(|entry| entry.value().clone())
    }

    /// Remove a job. Absent identifiers are ignored.
    pub fn delete(&self, id: &JobId) -> Option<Job> {
        self.jobs.remove(id).map(|(_, job)| job)
    }

    /// Apply `f` to the job as one atomic step and bump `updated_at`.
    ///
    /// Returns false when the job is not registered.
    pub fn update<F>(&self, id: &JobId, f: F) -> bool
    where
        F: FnOnce(&mut Job),
    {
        match self.jobs.get_mut(id) {
            Some(mut entry) => {
                let job = entry.value_mut();
                f(job);
                job.touch();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.jobs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Drop finished and failed jobs that reached their terminal status more
    /// than `ttl` ago. Returns how many were removed.
    pub fn purge_terminal_older_than(&self, ttl: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return 0;
        };

        let before = self.jobs.len();
        self.jobs.retain(|_, job| !job.finished_before(cutoff));
        let purged = before.saturating_sub(self.jobs.len());
        if purged > 0 {
            debug!(purged_count = purged, "Purged expired jobs");
        }
        purged
    }
}
