// Domain Error Types

use thiserror::Error;

use super::record::RecordId;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid job state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    /// A step was recorded for an identifier that is not at the head of the queue
    #[error("Out of order step: expected {expected:?}, got {actual}")]
    OutOfOrderStep {
        expected: Option<RecordId>,
        actual: RecordId,
    },

    #[error("Invalid age cutoff '{0}': expected '<amount> <day|week|month|year>'")]
    InvalidAgeCutoff(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
