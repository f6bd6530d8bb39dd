//! Deletion dispatcher
//!
//! Decides, for one filtered record set, whether to delete synchronously
//! inside the caller's request or to capture the identifiers into a
//! `BatchDeletionJob` for the background queue.

pub mod config;
pub mod options;
pub mod response;

pub use config::{DispatcherConfig, DEFAULT_QUEUE_THRESHOLD};
pub use options::{button_label, DeleteOption};
pub use response::{DispatchResponse, STATUS_HEADER, STATUS_SEVERITY_HEADER};

use crate::domain::{
    BatchDeletionJob, DeletionRequest, JobId, RecordQuery, Severity, StatusMessage, UserId,
};
use crate::error::{AppError, Result};
use crate::port::{
    DeleteOutcome, IdProvider, JobQueue, RecordSetProvider, RecordStore, StatusSurface,
    TimeProvider,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// One delete action submitted from a filtered list
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// Filtered, unpaginated record set
    pub query: RecordQuery,
    /// Selected option key; `None` or `"now"` for no age restriction
    pub age_cutoff: Option<String>,
    pub initiator: Option<UserId>,
    /// Name of the list the deletion was started from, used in job titles
    pub source_label: Option<String>,
    pub title: Option<String>,
}

impl DispatchRequest {
    pub fn new(query: RecordQuery) -> Self {
        Self {
            query,
            age_cutoff: None,
            initiator: None,
            source_label: None,
            title: None,
        }
    }

    pub fn with_age_cutoff(mut self, key: impl Into<String>) -> Self {
        self.age_cutoff = Some(key.into());
        self
    }

    pub fn initiated_by(mut self, user_id: UserId) -> Self {
        self.initiator = Some(user_id);
        self
    }

    pub fn from_source(mut self, label: impl Into<String>) -> Self {
        self.source_label = Some(label.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Deleted inside the call
    Deleted { deleted: u64, status: StatusMessage },
    /// Captured into a background job, nothing deleted yet
    Queued {
        job_id: JobId,
        total_steps: u64,
        status: StatusMessage,
    },
    /// Empty candidate set; the previous message (if any) was re-surfaced
    Nothing { previous: Option<StatusMessage> },
}

impl DispatchOutcome {
    pub fn status(&self) -> Option<&StatusMessage> {
        match self {
            DispatchOutcome::Deleted { status, .. } | DispatchOutcome::Queued { status, .. } => {
                Some(status)
            }
            DispatchOutcome::Nothing { previous } => previous.as_ref(),
        }
    }
}

pub struct DeletionDispatcher {
    records: Arc<dyn RecordSetProvider>,
    store: Arc<dyn RecordStore>,
    queue: Option<Arc<dyn JobQueue>>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    config: DispatcherConfig,
    last_status: Mutex<Option<StatusMessage>>,
}

impl DeletionDispatcher {
    /// Dispatcher without a background queue; every dispatch is synchronous
    pub fn new(
        records: Arc<dyn RecordSetProvider>,
        store: Arc<dyn RecordStore>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            records,
            store,
            queue: None,
            id_provider,
            time_provider,
            config,
            last_status: Mutex::new(None),
        }
    }

    pub fn with_queue(mut self, queue: Arc<dyn JobQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Most recent message produced by this dispatcher
    pub async fn last_status(&self) -> Option<StatusMessage> {
        self.last_status.lock().await.clone()
    }

    /// Delete the request's record set, synchronously or via a queued job,
    /// and attach the outcome to `response`.
    pub async fn dispatch(
        &self,
        request: DispatchRequest,
        response: &mut dyn StatusSurface,
    ) -> Result<DispatchOutcome> {
        let now = self.time_provider.now();
        let query = match self
            .config
            .resolve_cutoff(request.age_cutoff.as_deref(), now)?
        {
            Some(cutoff) => request.query.created_before(cutoff),
            None => request.query,
        };

        let candidates = self.records.candidate_ids(&query).await?;
        let deletion = DeletionRequest::new(
            query.record_type.clone(),
            candidates,
            request.initiator,
            request.title,
            request.source_label.as_deref(),
        );

        if deletion.is_empty() {
            let previous = self.last_status().await;
            if let Some(status) = &previous {
                response.attach(status);
            }
            debug!(record_type = %query.record_type, "Nothing to delete");
            return Ok(DispatchOutcome::Nothing { previous });
        }

        let count = deletion.len() as u64;
        let outcome = match &self.queue {
            Some(queue) if self.config.should_queue(count) => {
                self.enqueue(queue.as_ref(), deletion).await?
            }
            _ => {
                if self.queue.is_none() && self.config.should_queue(count) {
                    warn!(
                        count,
                        threshold = self.config.threshold,
                        "No job queue configured, deleting synchronously"
                    );
                }
                match self.delete_now(&deletion).await {
                    Ok(outcome) => outcome,
                    Err((deleted, e)) => {
                        let status = StatusMessage::new(
                            format!(
                                "{} of {} records have been deleted before the deletion failed.",
                                deleted,
                                deletion.len()
                            ),
                            Severity::Bad,
                        );
                        warn!(
                            record_type = %deletion.record_type,
                            deleted,
                            candidates = deletion.len(),
                            error = %e,
                            "Synchronous deletion aborted"
                        );
                        response.attach(&status);
                        *self.last_status.lock().await = Some(status);
                        return Err(e);
                    }
                }
            }
        };

        if let Some(status) = outcome.status() {
            response.attach(status);
            *self.last_status.lock().await = Some(status.clone());
        }
        Ok(outcome)
    }

    /// Options for the delete dropdown of a filtered list
    pub async fn options(&self, query: &RecordQuery) -> Result<Vec<DeleteOption>> {
        let count = self.records.count(query).await?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let now = self.time_provider.now();
        let mut options = vec![DeleteOption::delete_all(count)];
        for preset in &self.config.age_cutoffs {
            let cutoff = preset
                .cutoff()
                .and_then(|c| c.cutoff_from(now))
                .map_err(|e| {
                    AppError::InvalidConfiguration(format!("Age cutoff '{}': {}", preset.key, e))
                })?;
            let older = self
                .records
                .count(&query.clone().created_before(cutoff))
                .await?;
            options.push(DeleteOption::new(&preset.key, preset.render_label(older)));
        }
        Ok(options)
    }

    async fn enqueue(
        &self,
        queue: &dyn JobQueue,
        deletion: DeletionRequest,
    ) -> Result<DispatchOutcome> {
        let job = BatchDeletionJob::new(
            self.id_provider.generate_id(),
            self.time_provider.now_millis(),
            deletion,
        );
        queue.enqueue(&job).await?;

        info!(
            job_id = %job.id,
            record_type = %job.record_type,
            total_steps = job.total_steps,
            threshold = self.config.threshold,
            "Batch deletion queued"
        );

        Ok(DispatchOutcome::Queued {
            status: StatusMessage::warning(format!(
                "As more than {} records have to be deleted, a job has been queued in the \
                 background. You will get an email when the task is complete.",
                self.config.threshold
            )),
            job_id: job.id,
            total_steps: job.total_steps,
        })
    }

    /// Delete every candidate in order; on failure, the error comes back
    /// with the number of records already removed
    async fn delete_now(
        &self,
        deletion: &DeletionRequest,
    ) -> std::result::Result<DispatchOutcome, (u64, AppError)> {
        let mut deleted = 0u64;
        for id in &deletion.candidate_ids {
            let outcome = self
                .store
                .delete(&deletion.record_type, *id)
                .await
                .map_err(|e| (deleted, e))?;
            match outcome {
                DeleteOutcome::Removed(_) => deleted += 1,
                DeleteOutcome::NotFound => {
                    debug!(record_type = %deletion.record_type, record_id = id, "Already gone")
                }
            }
        }

        info!(
            record_type = %deletion.record_type,
            candidates = deletion.len(),
            deleted,
            "Records deleted synchronously"
        );

        Ok(DispatchOutcome::Deleted {
            deleted,
            status: StatusMessage::good(format!(
                "{} records have been successfully deleted.",
                deleted
            )),
        })
    }
}
