// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod identity;
pub mod job_logger;
pub mod job_queue;
pub mod notification;
pub mod record_store;
pub mod status_surface;
pub mod time_provider;

// Re-exports
pub use id_provider::IdProvider;
pub use identity::{Identity, IdentityResolver};
pub use job_logger::{JobLogger, TracingJobLogger};
pub use job_queue::JobQueue;
pub use notification::{Notification, NotificationError, NotificationSender};
pub use record_store::{DeleteOutcome, RecordLocator, RecordSetProvider, RecordStore};
pub use status_surface::StatusSurface;
pub use time_provider::TimeProvider;
