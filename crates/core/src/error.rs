// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Permanent storage failure (constraint violation, corrupt row, disk full)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Storage temporarily unreachable (busy/locked database, pool timeout, I/O)
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed operator configuration (age cutoff presets, thresholds).
    /// Fatal to the dispatch call that discovers it.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Only an unavailable store is worth another attempt on a later lease;
    /// retrying a permanent failure would hold the job at the same record
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::StorageUnavailable(_))
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// Note: sqlx::Error conversion lives in the infra-sqlite crate
// (orphan rules), it maps to AppError::Storage / StorageUnavailable

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_storage_is_transient() {
        assert!(AppError::StorageUnavailable("database is locked".into()).is_transient());
        assert!(!AppError::Storage("Foreign key constraint violation (787)".into()).is_transient());
        assert!(!AppError::NotFound("job".into()).is_transient());
    }
}
