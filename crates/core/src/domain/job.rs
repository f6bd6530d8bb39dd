// Batch Deletion Job Domain Model

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::error::{DomainError, Result};
use super::record::{RecordId, RecordType};
use super::request::DeletionRequest;
use super::status::{JobMessage, Severity};

/// Job ID (UUID v4)
pub type JobId = String;

/// Identity of the user who started a deletion
pub type UserId = i64;

/// Job State
///
/// `Pending -> Ready -> Running -> Complete`, Complete is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Ready,
    Running,
    Complete,
}

impl JobState {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(JobState::Pending),
            "READY" => Some(JobState::Ready),
            "RUNNING" => Some(JobState::Running),
            "COMPLETE" => Some(JobState::Complete),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Pending => write!(f, "PENDING"),
            JobState::Ready => write!(f, "READY"),
            JobState::Running => write!(f, "RUNNING"),
            JobState::Complete => write!(f, "COMPLETE"),
        }
    }
}

/// Step counters for progress display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub current_step: u64,
    pub total_steps: u64,
}

impl Progress {
    pub fn percent(&self) -> f64 {
        if self.total_steps == 0 {
            return 100.0;
        }
        self.current_step as f64 * 100.0 / self.total_steps as f64
    }
}

/// Queued unit of work deleting a fixed list of records one per step.
///
/// The struct is the complete recoverable state of a job: the queue
/// persists it after every step and hands it back on the next lease.
///
/// Invariants (after `setup`):
/// - `remaining.len() + current_step == total_steps`
/// - `remaining` only shrinks from the front
/// - `Complete` is entered once and never left
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchDeletionJob {
    pub id: JobId,
    pub record_type: RecordType,
    pub title: String,
    pub initiator_id: Option<UserId>,

    /// Construction data, never mutated
    pub candidate_ids: Vec<RecordId>,
    pub remaining: VecDeque<RecordId>,

    pub total_steps: u64,
    pub current_step: u64,
    pub state: JobState,

    pub messages: Vec<JobMessage>,

    pub created_at: i64, // epoch ms
    pub finished_at: Option<i64>,
}

impl BatchDeletionJob {
    /// Create a pending job from a dispatch decision
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `request` - Captured candidate set
    pub fn new(id: impl Into<String>, created_at: i64, request: DeletionRequest) -> Self {
        let total_steps = request.candidate_ids.len() as u64;
        Self {
            id: id.into(),
            record_type: request.record_type,
            title: request.title,
            initiator_id: request.initiator,
            candidate_ids: request.candidate_ids,
            remaining: VecDeque::new(),
            total_steps,
            current_step: 0,
            state: JobState::Pending,
            messages: Vec::new(),
            created_at,
            finished_at: None,
        }
    }

    /// Copy the candidate list into the work queue (Pending -> Ready).
    ///
    /// A second call would reset progress, so it is rejected.
    pub fn setup(&mut self) -> Result<()> {
        if self.state != JobState::Pending {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: JobState::Ready.to_string(),
            });
        }
        self.remaining = self.candidate_ids.iter().copied().collect();
        self.state = JobState::Ready;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.state == JobState::Complete
    }

    /// Whether `process()` may be invoked
    pub fn is_runnable(&self) -> bool {
        matches!(self.state, JobState::Ready | JobState::Running)
    }

    /// Identifier the next step will attempt
    pub fn next_id(&self) -> Option<RecordId> {
        self.remaining.front().copied()
    }

    /// Consume the head identifier after its deletion was attempted
    pub fn record_step(&mut self, id: RecordId, message: JobMessage) -> Result<()> {
        if !self.is_runnable() {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: JobState::Running.to_string(),
            });
        }
        if self.next_id() != Some(id) {
            return Err(DomainError::OutOfOrderStep {
                expected: self.next_id(),
                actual: id,
            });
        }

        self.remaining.pop_front();
        self.current_step += 1;
        self.state = JobState::Running;
        self.messages.push(message);
        Ok(())
    }

    /// Transition to Complete once the work queue is drained
    pub fn complete(&mut self, now_millis: i64) -> Result<()> {
        if !self.is_runnable() || !self.remaining.is_empty() {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: JobState::Complete.to_string(),
            });
        }
        self.state = JobState::Complete;
        self.finished_at = Some(now_millis);
        self.messages.push(JobMessage::new(
            now_millis,
            Severity::Info,
            format!("Completed: {} of {} steps", self.current_step, self.total_steps),
        ));
        Ok(())
    }

    pub fn progress(&self) -> Progress {
        Progress {
            current_step: self.current_step,
            total_steps: self.total_steps,
        }
    }

    /// Title as listed in the queue admin, naming the initiator when known
    pub fn display_title(&self, initiator_name: Option<&str>) -> String {
        match initiator_name {
            Some(name) => format!("{} (Initiated by {})", self.title, name),
            None => self.title.clone(),
        }
    }
}
