// Notification Sender Port

use async_trait::async_trait;
use thiserror::Error;

/// A message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivery errors (never fatal to the job that triggered them)
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Delivery rejected: {0}")]
    Rejected(String),

    #[error("Delivery timed out after {0}ms")]
    Timeout(u64),
}

#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Attempt delivery of one message
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Records sent messages; can be switched to failing mode
    #[derive(Default)]
    pub struct RecordingNotificationSender {
        sent: Mutex<Vec<Notification>>,
        failure: Mutex<Option<String>>,
    }

    impl RecordingNotificationSender {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing(message: impl Into<String>) -> Self {
            let sender = Self::default();
            *sender.failure.lock().unwrap() = Some(message.into());
            sender
        }

        pub fn sent(&self) -> Vec<Notification> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationSender for RecordingNotificationSender {
        async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
            if let Some(msg) = self.failure.lock().unwrap().clone() {
                return Err(NotificationError::Transport(msg));
            }
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }
}
