//! The event broadcaster.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use host_types::WalletEvent;

use crate::subscriber::{EventQueue, SessionTransport};
use crate::{RECENT_EVENTS_CAPACITY, SUBSCRIBER_QUEUE_CAPACITY};

struct Subscriber {
    sender: mpsc::Sender<WalletEvent>,
    transport: SessionTransport,
    dropped: AtomicU64,
}

/// Fan-out hub mapping session IDs to bounded event queues.
///
/// A single instance is shared by the orchestrator, both RPC surfaces,
/// and the registries that emit events.
pub struct EventBroadcaster {
    subscribers: DashMap<String, Subscriber>,
    /// Read-through window of the most recent events, newest last.
    recent: RwLock<VecDeque<WalletEvent>>,
    events_published: AtomicU64,
    events_dropped: AtomicU64,
    queue_capacity: usize,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(SUBSCRIBER_QUEUE_CAPACITY)
    }

    /// Capacity override for tests exercising drop behavior.
    pub fn with_capacity(queue_capacity: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            recent: RwLock::new(VecDeque::with_capacity(RECENT_EVENTS_CAPACITY)),
            events_published: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
            queue_capacity,
        }
    }

    /// Register a session and hand back its event queue.
    ///
    /// Re-registering an existing session ID replaces the old queue;
    /// the displaced receiver sees its channel close.
    pub fn register(&self, session_id: &str, transport: SessionTransport) -> EventQueue {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        self.subscribers.insert(
            session_id.to_string(),
            Subscriber {
                sender: tx,
                transport,
                dropped: AtomicU64::new(0),
            },
        );
        debug!(
            session_id = session_id,
            transport = transport.as_str(),
            "Session registered with broadcaster"
        );
        EventQueue::new(rx)
    }

    /// Remove a session; its queue closes once drained.
    pub fn unregister(&self, session_id: &str) {
        if self.subscribers.remove(session_id).is_some() {
            debug!(session_id = session_id, "Session unregistered");
        }
    }

    /// Stamp and deliver an event to every live subscriber.
    ///
    /// Delivery is non-blocking: a subscriber at capacity loses this
    /// event (recorded and warned), everyone else still receives it.
    /// Returns the number of queues the event was placed on.
    pub fn broadcast(&self, mut event: WalletEvent) -> usize {
        event.stamp();
        self.events_published.fetch_add(1, Ordering::Relaxed);
        self.push_recent(event.clone());

        let mut delivered = 0;
        let mut dead: Vec<String> = Vec::new();

        for entry in self.subscribers.iter() {
            match entry.value().sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    entry.value().dropped.fetch_add(1, Ordering::Relaxed);
                    self.events_dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        session_id = entry.key().as_str(),
                        transport = entry.value().transport.as_str(),
                        event_type = %event.kind,
                        "Subscriber queue full, event dropped"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    dead.push(entry.key().clone());
                }
            }
        }

        for session_id in dead {
            self.subscribers.remove(&session_id);
            debug!(session_id = session_id.as_str(), "Pruned dead subscriber");
        }

        delivered
    }

    fn push_recent(&self, event: WalletEvent) {
        let mut recent = self.recent.write();
        if recent.len() == RECENT_EVENTS_CAPACITY {
            recent.pop_front();
        }
        recent.push_back(event);
    }

    /// Snapshot of the recent-events window, oldest first.
    pub fn recent_events(&self) -> Vec<WalletEvent> {
        self.recent.read().iter().cloned().collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }

    pub fn events_dropped(&self) -> u64 {
        self.events_dropped.load(Ordering::Relaxed)
    }

    /// Drops recorded for one session, if registered.
    pub fn dropped_for(&self, session_id: &str) -> Option<u64> {
        self.subscribers
            .get(session_id)
            .map(|s| s.dropped.load(Ordering::Relaxed))
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
