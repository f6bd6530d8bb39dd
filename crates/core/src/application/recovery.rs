// Abandoned lease recovery
use crate::port::{JobQueue, TimeProvider};
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::worker::constants::DEFAULT_RECOVERY_WINDOW_MS;

/// Hands jobs held by a worker that died back to the queue.
///
/// Nothing about the job itself changes: `remaining`, `current_step` and
/// `state` are already persisted after every step, so the next lease
/// continues with the identifier the dead worker would have processed.
pub struct RecoveryService {
    queue: Arc<dyn JobQueue>,
    time_provider: Arc<dyn TimeProvider>,
    recovery_window_ms: i64,
}

impl RecoveryService {
    /// Create a new recovery service
    ///
    /// # Arguments
    /// * `queue` - Job queue
    /// * `time_provider` - Time provider
    /// * `recovery_window_ms` - Optional custom recovery window (default: 5 minutes)
    pub fn new(
        queue: Arc<dyn JobQueue>,
        time_provider: Arc<dyn TimeProvider>,
        recovery_window_ms: Option<i64>,
    ) -> Self {
        Self {
            queue,
            time_provider,
            recovery_window_ms: recovery_window_ms.unwrap_or(DEFAULT_RECOVERY_WINDOW_MS),
        }
    }

    /// Release leases older than the recovery window
    ///
    /// # Returns
    /// Number of jobs released
    pub async fn recover_abandoned_leases(&self) -> crate::error::Result<u64> {
        let cutoff = self.time_provider.now_millis() - self.recovery_window_ms;

        info!(
            cutoff_time = %cutoff,
            recovery_window_ms = %self.recovery_window_ms,
            "Starting abandoned lease recovery"
        );

        let released = self.queue.release_stale_leases(cutoff).await?;
        if released > 0 {
            warn!(released, "Released abandoned batch deletion jobs");
        }

        info!(released = %released, "Abandoned lease recovery complete");
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BatchDeletionJob, DeletionRequest, RecordType};
    use crate::port::job_queue::mocks::InMemoryJobQueue;
    use crate::port::time_provider::mocks::FixedTimeProvider;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_releases_only_stale_leases() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let req = DeletionRequest::new(RecordType::new("Page"), vec![1, 2], None, None, None);
        queue.enqueue(&BatchDeletionJob::new("job-1", 0, req)).await.unwrap();

        // the in-memory queue stamps leases 1, 2, ...
        let leased = queue.lease_next().await.unwrap().unwrap();
        assert!(queue.is_leased(&leased.id));
        assert!(queue.lease_next().await.unwrap().is_none());

        let clock = Arc::new(FixedTimeProvider::new(Utc.timestamp_millis_opt(1).unwrap()));
        let within_window = RecoveryService::new(queue.clone(), clock.clone(), Some(0));
        assert_eq!(within_window.recover_abandoned_leases().await.unwrap(), 0);
        assert!(queue.is_leased(&leased.id));

        let clock = Arc::new(FixedTimeProvider::new(Utc.timestamp_millis_opt(10).unwrap()));
        let recovery = RecoveryService::new(queue.clone(), clock, Some(5));
        assert_eq!(recovery.recover_abandoned_leases().await.unwrap(), 1);
        assert!(!queue.is_leased(&leased.id));

        let again = queue.lease_next().await.unwrap().unwrap();
        assert_eq!(again.id, leased.id);
    }
}
