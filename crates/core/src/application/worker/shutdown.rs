// Worker shutdown signal

use tokio::sync::watch;

/// Receiving side, one clone per worker loop
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is requested (immediately if it already was).
    /// A dropped sender counts as shutdown.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}

pub struct ShutdownSender {
    tx: watch::Sender<bool>,
}

impl ShutdownSender {
    /// Ask every worker holding a token to stop after its current step
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender { tx }, ShutdownToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_returns_after_shutdown() {
        let (sender, token) = shutdown_channel();
        assert!(!token.is_shutdown());

        let mut waiting = token.clone();
        let handle = tokio::spawn(async move { waiting.wait().await });
        sender.shutdown();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(token.is_shutdown());

        // already signalled
        let mut late = token.clone();
        tokio::time::timeout(Duration::from_millis(50), late.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_sender_releases_waiters() {
        let (sender, mut token) = shutdown_channel();
        drop(sender);
        tokio::time::timeout(Duration::from_millis(50), token.wait())
            .await
            .unwrap();
    }
}
