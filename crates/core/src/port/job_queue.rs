// Job Queue Port (Interface)

use crate::domain::{BatchDeletionJob, JobId, JobState};
use crate::error::Result;
use async_trait::async_trait;

/// Persistence and leasing of batch deletion jobs.
///
/// A lease is the exclusive right to call `process()` on a job. The queue
/// hands out at most one lease per job; `save` keeps the lease, `release`
/// ends it.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Insert a new job
    async fn enqueue(&self, job: &BatchDeletionJob) -> Result<()>;

    /// Find job by ID
    async fn find_by_id(&self, id: &JobId) -> Result<Option<BatchDeletionJob>>;

    /// Lease the oldest incomplete, unleased job (FIFO)
    async fn lease_next(&self) -> Result<Option<BatchDeletionJob>>;

    /// Persist progress of a leased job
    async fn save(&self, job: &BatchDeletionJob) -> Result<()>;

    /// End the lease so the job can be picked up again
    async fn release(&self, id: &JobId) -> Result<()>;

    /// Release leases taken before `leased_before` (epoch ms) by workers that
    /// never came back
    async fn release_stale_leases(&self, leased_before: i64) -> Result<u64>;

    /// Count jobs by state
    async fn count_by_state(&self, state: JobState) -> Result<i64>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Mutex;

    struct Entry {
        job: BatchDeletionJob,
        leased_at: Option<i64>,
    }

    /// In-memory queue; lease timestamps come from an internal counter
    #[derive(Default)]
    pub struct InMemoryJobQueue {
        entries: Mutex<Vec<Entry>>,
        clock: AtomicI64,
    }

    impl InMemoryJobQueue {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn jobs(&self) -> Vec<BatchDeletionJob> {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.job.clone())
                .collect()
        }

        pub fn is_leased(&self, id: &JobId) -> bool {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .any(|e| &e.job.id == id && e.leased_at.is_some())
        }
    }

    #[async_trait]
    impl JobQueue for InMemoryJobQueue {
        async fn enqueue(&self, job: &BatchDeletionJob) -> Result<()> {
            let mut entries = self.entries.lock().unwrap();
            if entries.iter().any(|e| e.job.id == job.id) {
                return Err(AppError::Storage(format!("Duplicate job id {}", job.id)));
            }
            entries.push(Entry {
                job: job.clone(),
                leased_at: None,
            });
            Ok(())
        }

        async fn find_by_id(&self, id: &JobId) -> Result<Option<BatchDeletionJob>> {
            Ok(self
                .entries
                .lock()
                .unwrap()
                .iter()
                .find(|e| &e.job.id == id)
                .map(|e| e.job.clone()))
        }

        async fn lease_next(&self) -> Result<Option<BatchDeletionJob>> {
            let now = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
            let mut entries = self.entries.lock().unwrap();
            let next = entries
                .iter_mut()
                .filter(|e| !e.job.is_complete() && e.leased_at.is_none())
                .min_by_key(|e| e.job.created_at);
            Ok(next.map(|e| {
                e.leased_at = Some(now);
                e.job.clone()
            }))
        }

        async fn save(&self, job: &BatchDeletionJob) -> Result<()> {
            let mut entries = self.entries.lock().unwrap();
            match entries.iter_mut().find(|e| e.job.id == job.id) {
                Some(entry) => {
                    entry.job = job.clone();
                    Ok(())
                }
                None => Err(AppError::NotFound(format!("Job {} not found", job.id))),
            }
        }

        async fn release(&self, id: &JobId) -> Result<()> {
            let mut entries = self.entries.lock().unwrap();
            if let Some(entry) = entries.iter_mut().find(|e| &e.job.id == id) {
                entry.leased_at = None;
            }
            Ok(())
        }

        async fn release_stale_leases(&self, leased_before: i64) -> Result<u64> {
            let mut released = 0;
            for entry in self.entries.lock().unwrap().iter_mut() {
                if !entry.job.is_complete() && entry.leased_at.is_some_and(|t| t < leased_before)
                {
                    entry.leased_at = None;
                    released += 1;
                }
            }
            Ok(released)
        }

        async fn count_by_state(&self, state: JobState) -> Result<i64> {
            Ok(self
                .entries
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.job.state == state)
                .count() as i64)
        }
    }
}
