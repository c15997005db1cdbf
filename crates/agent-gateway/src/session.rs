//! SSE session bookkeeping.
//!
//! A session is one open `/mcp/sse` stream. Requests posted to
//! `/mcp/message?session=…` are dispatched off the request task and
//! their responses land in the session's response queue, which the
//! stream pump drains onto the wire.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use host_types::RpcResponse;

/// Buffered responses per session before `/mcp/message` pushes drop.
const RESPONSE_QUEUE_CAPACITY: usize = 32;

struct SessionHandle {
    response_tx: mpsc::Sender<RpcResponse>,
}

/// Live SSE sessions keyed by session ID.
#[derive(Default)]
pub struct SessionManager {
    sessions: DashMap<String, SessionHandle>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session; returns its ID and the response queue the
    /// stream pump reads from.
    pub fn create(&self) -> (String, mpsc::Receiver<RpcResponse>) {
        let session_id = format!("sse-{}", Uuid::new_v4());
        let (response_tx, response_rx) = mpsc::channel(RESPONSE_QUEUE_CAPACITY);
        self.sessions
            .insert(session_id.clone(), SessionHandle { response_tx });
        debug!(session_id = session_id.as_str(), "SSE session created");
        (session_id, response_rx)
    }

    /// Queue a response for delivery on the session's stream.
    /// Returns false if the session is gone (or saturated).
    pub fn push_response(&self, session_id: &str, response: RpcResponse) -> bool {
        match self.sessions.get(session_id) {
            Some(handle) => handle.response_tx.try_send(response).is_ok(),
            None => false,
        }
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn remove(&self, session_id: &str) {
        if self.sessions.remove(session_id).is_some() {
            debug!(session_id = session_id, "SSE session removed");
        }
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}
