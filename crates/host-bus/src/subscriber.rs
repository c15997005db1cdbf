//! Subscriber-side queue handle.

use host_types::WalletEvent;
use tokio::sync::mpsc;

/// Transport a session is connected over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTransport {
    /// Server-sent events stream on the agent surface.
    Sse,
    /// The extension's native-messaging pipe.
    Stdio,
}

impl SessionTransport {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionTransport::Sse => "sse",
            SessionTransport::Stdio => "stdio",
        }
    }
}

/// Receiving end of a session's event queue.
///
/// Dropping the queue (or calling [`EventQueue::close`]) ends
/// delivery; the broadcaster prunes the dead sender on its next
/// broadcast to that session.
pub struct EventQueue {
    receiver: mpsc::Receiver<WalletEvent>,
}

impl EventQueue {
    pub(crate) fn new(receiver: mpsc::Receiver<WalletEvent>) -> Self {
        Self { receiver }
    }

    /// Receive the next event in FIFO order.
    ///
    /// Returns `None` once the session is unregistered and the queue
    /// is drained.
    pub async fn recv(&mut self) -> Option<WalletEvent> {
        self.receiver.recv().await
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<WalletEvent> {
        self.receiver.try_recv().ok()
    }

    /// Close the queue; pending events may still be drained.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}
