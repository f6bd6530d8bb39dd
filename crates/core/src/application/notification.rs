// Completion notification
//
// Tells the initiator of a batch deletion that it has finished. Nothing
// here can fail the job: it is already complete when this runs.

use crate::domain::BatchDeletionJob;
use crate::port::{Identity, IdentityResolver, Notification, NotificationSender};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const COMPLETION_SUBJECT: &str = "A deletion task requested by you has completed.";

/// What happened to the completion notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Sent,
    /// No initiator, unknown initiator, or no contact address
    Skipped,
    /// Lookup or delivery failed (logged)
    Failed(String),
}

pub struct CompletionNotifier {
    identities: Arc<dyn IdentityResolver>,
    sender: Arc<dyn NotificationSender>,
}

impl CompletionNotifier {
    pub fn new(identities: Arc<dyn IdentityResolver>, sender: Arc<dyn NotificationSender>) -> Self {
        Self { identities, sender }
    }

    /// Send the completion notice for `job` to its initiator
    pub async fn notify(&self, job: &BatchDeletionJob) -> NotificationOutcome {
        let Some(identity) = self.initiator(job).await else {
            debug!(job_id = %job.id, "No resolvable initiator, skipping completion notice");
            return NotificationOutcome::Skipped;
        };

        let Some(notification) = Self::compose(&identity, job) else {
            debug!(
                job_id = %job.id,
                user_id = identity.id,
                "Initiator has no contact address, skipping completion notice"
            );
            return NotificationOutcome::Skipped;
        };

        match self.sender.send(&notification).await {
            Ok(()) => {
                info!(job_id = %job.id, to = %notification.to, "Completion notice sent");
                NotificationOutcome::Sent
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Completion notice could not be delivered");
                NotificationOutcome::Failed(e.to_string())
            }
        }
    }

    /// Job title naming the initiator, e.g. for queue listings
    pub async fn display_title(&self, job: &BatchDeletionJob) -> String {
        let identity = self.initiator(job).await;
        job.display_title(identity.as_ref().map(|i| i.display_name.as_str()))
    }

    /// Build the notice; None when the identity has no address
    pub fn compose(identity: &Identity, job: &BatchDeletionJob) -> Option<Notification> {
        let to = identity.email.as_deref().map(str::trim).filter(|e| !e.is_empty())?;
        let body = format!(
            "Hi, {}\n\nJob {} has completed.\n\n{} records have been deleted.\n",
            identity.display_name, job.title, job.total_steps
        );
        Some(Notification {
            to: to.to_string(),
            subject: COMPLETION_SUBJECT.to_string(),
            body,
        })
    }

    async fn initiator(&self, job: &BatchDeletionJob) -> Option<Identity> {
        let user_id = job.initiator_id?;
        match self.identities.resolve(user_id).await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(job_id = %job.id, user_id, error = %e, "Initiator lookup failed");
                None
            }
        }
    }
}
