// Domain Layer - Pure business logic and entities

pub mod age_cutoff;
pub mod error;
pub mod job;
pub mod record;
pub mod request;
pub mod status;

// Re-exports
pub use age_cutoff::{AgeCutoff, AgeCutoffPreset, CutoffUnit, DELETE_NOW_KEY};
pub use error::DomainError;
pub use job::{BatchDeletionJob, JobId, JobState, Progress, UserId};
pub use record::{PartitionId, RecordId, RecordQuery, RecordSnapshot, RecordType};
pub use request::DeletionRequest;
pub use status::{JobMessage, Severity, StatusMessage};
