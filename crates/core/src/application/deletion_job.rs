//! Batch deletion job runner
//!
//! Drives one `BatchDeletionJob` a single step at a time. The job struct is
//! passed in by the queue infrastructure on every call and carries all
//! recoverable state, so a worker may stop between any two calls and a
//! different worker may continue later.
//!
//! Completion and notification are split: the runner persists the
//! `Complete` state first and only then sends the notice, so a failed save
//! cannot lead to a second notice on the next lease.

use crate::application::notification::{CompletionNotifier, NotificationOutcome};
use crate::domain::{BatchDeletionJob, DomainError, JobMessage, JobState, RecordId, Severity};
use crate::error::Result;
use crate::port::{DeleteOutcome, JobLogger, RecordLocator, RecordStore, TimeProvider};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of one `process()` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Record located and removed
    Deleted(RecordId),
    /// Record already gone; step still counted
    NotFound(RecordId),
    /// Record could not be deleted (permanent storage failure); step counted
    Failed(RecordId),
    /// Queue drained on this call, job is now complete. The completion
    /// notice is not sent yet: see `BatchDeletionProcessor::notify_completion`
    Completed,
    /// Job was already complete, nothing changed
    AlreadyComplete,
}

impl StepOutcome {
    /// Whether the job has reached its terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepOutcome::Completed | StepOutcome::AlreadyComplete)
    }
}

pub struct BatchDeletionProcessor {
    locator: Arc<dyn RecordLocator>,
    store: Arc<dyn RecordStore>,
    logger: Arc<dyn JobLogger>,
    notifier: Arc<CompletionNotifier>,
    time_provider: Arc<dyn TimeProvider>,
}

impl BatchDeletionProcessor {
    /// Create a processor
    ///
    /// # Arguments
    /// * `locator` - Record lookup (single-scope or all-partitions), chosen by the host
    /// * `store` - Deletion primitive
    /// * `logger` - Receives per-record diagnostics
    /// * `notifier` - Completion notice sender
    /// * `time_provider` - Clock for message timestamps
    pub fn new(
        locator: Arc<dyn RecordLocator>,
        store: Arc<dyn RecordStore>,
        logger: Arc<dyn JobLogger>,
        notifier: Arc<CompletionNotifier>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            locator,
            store,
            logger,
            notifier,
            time_provider,
        }
    }

    /// Process at most one identifier.
    ///
    /// - empty queue: completes the job (`StepOutcome::Completed`); the caller
    ///   persists it, then calls `notify_completion`
    /// - missing record: warning message, step counted
    /// - permanent storage failure on a record: warning message, step counted
    /// - store unavailable: returned, job untouched so the same identifier is
    ///   retried on the next call
    pub async fn process(&self, job: &mut BatchDeletionJob) -> Result<StepOutcome> {
        match job.state {
            JobState::Complete => return Ok(StepOutcome::AlreadyComplete),
            JobState::Pending => {
                return Err(DomainError::InvalidStateTransition {
                    from: job.state.to_string(),
                    to: JobState::Running.to_string(),
                }
                .into())
            }
            JobState::Ready | JobState::Running => {}
        }

        let Some(id) = job.next_id() else {
            job.complete(self.time_provider.now_millis())?;
            info!(
                job_id = %job.id,
                total_steps = job.total_steps,
                "Batch deletion complete"
            );
            return Ok(StepOutcome::Completed);
        };

        let (outcome, severity, text) = match self.delete_one(job, id).await {
            Ok(step) => step,
            Err(e) if e.is_transient() => return Err(e),
            Err(e) => (
                StepOutcome::Failed(id),
                Severity::Warning,
                format!("Could not delete {} ID {}: {}", job.record_type, id, e),
            ),
        };

        if severity == Severity::Warning {
            self.logger.log(severity, &text);
        }
        job.record_step(id, JobMessage::new(self.time_provider.now_millis(), severity, text))?;

        debug!(
            job_id = %job.id,
            record_id = id,
            step = job.current_step,
            total_steps = job.total_steps,
            "Batch deletion step done"
        );
        Ok(outcome)
    }

    /// Send the completion notice for a job whose `Complete` state has been
    /// persisted. Jobs that are not complete are skipped.
    pub async fn notify_completion(&self, job: &BatchDeletionJob) -> NotificationOutcome {
        if !job.is_complete() {
            warn!(job_id = %job.id, state = %job.state, "Completion notice requested for unfinished job");
            return NotificationOutcome::Skipped;
        }
        self.notifier.notify(job).await
    }

    /// Job title naming the initiator when it resolves
    pub async fn describe(&self, job: &BatchDeletionJob) -> String {
        self.notifier.display_title(job).await
    }

    async fn delete_one(
        &self,
        job: &BatchDeletionJob,
        id: RecordId,
    ) -> Result<(StepOutcome, Severity, String)> {
        let record_type = &job.record_type;
        let not_found = || {
            (
                StepOutcome::NotFound(id),
                Severity::Warning,
                format!("{} ID {} not found!", record_type, id),
            )
        };

        let Some(record) = self.locator.locate(record_type, id).await? else {
            return Ok(not_found());
        };

        match self.store.delete(&record.record_type, record.id).await? {
            DeleteOutcome::Removed(_) => Ok((
                StepOutcome::Deleted(id),
                Severity::Info,
                format!(
                    "Deleted {} ID {} ({})",
                    record_type,
                    id,
                    record.created_nice()
                ),
            )),
            // vanished between lookup and delete
            DeleteOutcome::NotFound => Ok(not_found()),
        }
    }
}
