// Sweeper Infrastructure - System Adapters
// Implements: NotificationSender (local sendmail)

pub mod sendmail;

pub use sendmail::SendmailNotifier;
