//! # Host Bus - Event Fan-Out for Wallet Sessions
//!
//! Delivers wallet/chain events to every connected session (AI agents
//! over SSE, the extension over stdio) with per-subscriber
//! backpressure.
//!
//! ## Delivery Rules
//!
//! - Each subscriber owns a bounded queue; `broadcast` never blocks.
//! - A full queue drops that subscriber's copy of the event and logs a
//!   warning; other subscribers are unaffected.
//! - Per-subscriber order is FIFO; there is no cross-subscriber
//!   ordering guarantee.
//! - Events are stamped (`id`, `timestamp`) once at publish time and
//!   are read-only afterwards.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod broadcaster;
pub mod subscriber;

pub use broadcaster::EventBroadcaster;
pub use subscriber::{EventQueue, SessionTransport};

/// Maximum events buffered per subscriber before drops.
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 100;

/// Size of the recent-events window backing `events://live_stream`.
pub const RECENT_EVENTS_CAPACITY: usize = 100;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacities() {
        assert_eq!(SUBSCRIBER_QUEUE_CAPACITY, 100);
        assert_eq!(RECENT_EVENTS_CAPACITY, 100);
    }
}
