// Worker - Batch deletion job loop

pub mod constants;
mod shutdown;

use constants::*;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::deletion_job::{BatchDeletionProcessor, StepOutcome};
use crate::domain::{BatchDeletionJob, JobState};
use crate::error::{AppError, Result};
use crate::port::JobQueue;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Leases queued deletion jobs and drives them a bounded number of steps
/// per lease, persisting after each step.
pub struct Worker {
    queue: Arc<dyn JobQueue>,
    processor: Arc<BatchDeletionProcessor>,
    steps_per_lease: usize,
}

impl Worker {
    pub fn new(queue: Arc<dyn JobQueue>, processor: Arc<BatchDeletionProcessor>) -> Self {
        Self {
            queue,
            processor,
            steps_per_lease: DEFAULT_STEPS_PER_LEASE,
        }
    }

    pub fn with_steps_per_lease(mut self, steps: usize) -> Self {
        self.steps_per_lease = steps.max(1);
        self
    }

    /// Run worker loop until `shutdown` fires
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(steps_per_lease = self.steps_per_lease, "Worker started");
        loop {
            if shutdown.is_shutdown() {
                info!("Worker shutting down");
                break;
            }
            match self.process_next_job().await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::select! {
                        _ = sleep(IDLE_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => {
                            info!("Worker interrupted during idle");
                            break;
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "Worker error");
                    tokio::select! {
                        _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => {
                            info!("Worker interrupted during error recovery");
                            break;
                        }
                    }
                }
            }
        }
        info!("Worker stopped");
        Ok(())
    }

    /// Lease one job and advance it.
    ///
    /// Returns true when the lease made progress (set up the job or
    /// persisted at least one step). A lease that only hit an unavailable
    /// store returns false so `run` backs off instead of spinning.
    pub async fn process_next_job(&self) -> Result<bool> {
        let job = match self.queue.lease_next().await? {
            Some(j) => j,
            None => return Ok(false),
        };
        let job_id = job.id.clone();

        let result = self.advance(job).await;
        let released = self.queue.release(&job_id).await;

        let progressed = result?;
        released?;
        Ok(progressed)
    }

    async fn advance(&self, mut job: BatchDeletionJob) -> Result<bool> {
        let mut progressed = false;
        if job.state == JobState::Pending {
            job.setup()?;
            self.queue.save(&job).await?;
            progressed = true;
            info!(job_id = %job.id, total_steps = job.total_steps, "Batch deletion job set up");
        }

        let start = job.current_step;
        for _ in 0..self.steps_per_lease {
            // Step runs in its own task so a panic cannot take the worker down
            let processor = Arc::clone(&self.processor);
            let job_id = job.id.clone();
            let handle = tokio::spawn(async move {
                let outcome = processor.process(&mut job).await;
                (job, outcome)
            });

            let (returned, outcome) = match handle.await {
                Ok(pair) => pair,
                Err(join_err) => {
                    error!(job_id = %job_id, error = ?join_err, "Deletion step panicked");
                    return Err(AppError::Internal(format!(
                        "Deletion step for job {} panicked",
                        job_id
                    )));
                }
            };
            job = returned;

            match outcome {
                Ok(StepOutcome::AlreadyComplete) => break,
                Ok(StepOutcome::Completed) => {
                    // notice only once Complete is durable
                    self.queue.save(&job).await?;
                    progressed = true;
                    let notified = self.processor.notify_completion(&job).await;
                    info!(job_id = %job.id, notification = ?notified, "Batch deletion job finished");
                    break;
                }
                Ok(step) => {
                    self.queue.save(&job).await?;
                    progressed = true;
                    if let StepOutcome::Failed(record_id) = step {
                        warn!(job_id = %job.id, record_id, "Record could not be deleted, skipped");
                    }
                }
                Err(e) if e.is_transient() => {
                    warn!(
                        job_id = %job.id,
                        next_id = ?job.next_id(),
                        error = %e,
                        "Deletion step failed, retrying on a later lease"
                    );
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        debug!(
            job_id = %job.id,
            steps = job.current_step - start,
            current_step = job.current_step,
            total_steps = job.total_steps,
            state = %job.state,
            "Lease finished"
        );
        Ok(progressed)
    }
}
