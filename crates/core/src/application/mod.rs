// Application Layer - Use Cases

pub mod deletion_job;
pub mod dispatch;
pub mod notification;
pub mod recovery;
pub mod worker;

// Re-exports
pub use deletion_job::{BatchDeletionProcessor, StepOutcome};
pub use dispatch::{
    button_label, DeleteOption, DeletionDispatcher, DispatchOutcome, DispatchRequest,
    DispatchResponse, DispatcherConfig, DEFAULT_QUEUE_THRESHOLD,
};
pub use notification::{CompletionNotifier, NotificationOutcome};
pub use recovery::RecoveryService;
pub use worker::{shutdown_channel, ShutdownSender, ShutdownToken, Worker};
