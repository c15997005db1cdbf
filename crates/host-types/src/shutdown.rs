//! Root cancellation signal.
//!
//! One `Shutdown` is created by the orchestrator; every long-lived
//! worker holds a [`ShutdownListener`] and either polls
//! [`ShutdownListener::is_shutdown`] between steps or awaits
//! [`ShutdownListener::wait`] inside a `select!`.

use tokio::sync::watch;

/// Owning side of the shutdown signal.
#[derive(Debug)]
pub struct Shutdown {
    sender: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// Trip the signal. Idempotent.
    pub fn trigger(&self) {
        let _ = self.sender.send(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle a worker uses to observe shutdown.
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    receiver: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Non-blocking check, for use between pipeline stages.
    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once shutdown is triggered (immediately if it already
    /// was). Also resolves if the `Shutdown` owner is dropped.
    pub async fn wait(&mut self) {
        if *self.receiver.borrow() {
            return;
        }
        // An Err means the sender is gone, which counts as shutdown.
        while self.receiver.changed().await.is_ok() {
            if *self.receiver.borrow() {
                return;
            }
        }
    }

    /// A listener that never fires, for tests and detached tools.
    pub fn never() -> Self {
        let (sender, receiver) = watch::channel(false);
        // Leak the sender so the channel stays open forever.
        std::mem::forget(sender);
        Self { receiver }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_trigger_wakes_listener() {
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();

        let waiter = tokio::spawn(async move {
            listener.wait().await;
        });
        shutdown.trigger();

        timeout(Duration::from_millis(200), waiter)
            .await
            .expect("listener did not wake")
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_after_trigger_returns_immediately() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let mut listener = shutdown.listener();
        timeout(Duration::from_millis(50), listener.wait())
            .await
            .expect("should resolve immediately");
        assert!(listener.is_shutdown());
    }

    #[tokio::test]
    async fn test_dropped_owner_counts_as_shutdown() {
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();
        drop(shutdown);
        timeout(Duration::from_millis(50), listener.wait())
            .await
            .expect("should resolve after owner drop");
    }

    #[tokio::test]
    async fn test_never_listener_stays_quiet() {
        let mut listener = ShutdownListener::never();
        assert!(!listener.is_shutdown());
        assert!(timeout(Duration::from_millis(20), listener.wait())
            .await
            .is_err());
    }
}
