//! The wallet event model.
//!
//! Events are constructed once at publish time and shared read-only
//! across subscribers; the broadcaster stamps `id` and `timestamp`
//! when the emitter leaves them unset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::chain::ChainTag;

/// Closed set of event types carried over SSE and stdio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TransactionConfirmationNeeded,
    SignatureConfirmationNeeded,
    TransactionPending,
    TransactionConfirmed,
    TransactionRejected,
    TransactionFailed,
    BalanceChanged,
    WalletStatusChanged,
    BlockNew,
    // Transport-level events
    Connected,
    Heartbeat,
    Status,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TransactionConfirmationNeeded => "transaction_confirmation_needed",
            EventKind::SignatureConfirmationNeeded => "signature_confirmation_needed",
            EventKind::TransactionPending => "transaction_pending",
            EventKind::TransactionConfirmed => "transaction_confirmed",
            EventKind::TransactionRejected => "transaction_rejected",
            EventKind::TransactionFailed => "transaction_failed",
            EventKind::BalanceChanged => "balance_changed",
            EventKind::WalletStatusChanged => "wallet_status_changed",
            EventKind::BlockNew => "block_new",
            EventKind::Connected => "connected",
            EventKind::Heartbeat => "heartbeat",
            EventKind::Status => "status",
            EventKind::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single wallet event as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletEvent {
    /// Unique event ID; assigned by the broadcaster when empty.
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Stamped by the broadcaster when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<ChainTag>,
    pub data: serde_json::Value,
}

impl WalletEvent {
    /// Build an event with payload; `id`/`timestamp` left for the
    /// broadcaster to stamp.
    pub fn new(kind: EventKind, data: serde_json::Value) -> Self {
        Self {
            id: String::new(),
            kind,
            timestamp: None,
            chain: None,
            data,
        }
    }

    pub fn with_chain(mut self, chain: ChainTag) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Fill in `id` and `timestamp` if the emitter left them unset.
    /// Events are immutable after this point.
    pub fn stamp(&mut self) {
        if self.id.is_empty() {
            self.id = Uuid::new_v4().to_string();
        }
        if self.timestamp.is_none() {
            self.timestamp = Some(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_fills_missing_fields() {
        let mut ev = WalletEvent::new(EventKind::BlockNew, serde_json::json!({"height": 1}));
        assert!(ev.id.is_empty());
        ev.stamp();
        assert!(!ev.id.is_empty());
        assert!(ev.timestamp.is_some());
    }

    #[test]
    fn test_stamp_preserves_existing_id() {
        let mut ev = WalletEvent::new(EventKind::Heartbeat, serde_json::json!({}));
        ev.id = "fixed".to_string();
        ev.stamp();
        assert_eq!(ev.id, "fixed");
    }

    #[test]
    fn test_event_wire_shape() {
        let mut ev = WalletEvent::new(
            EventKind::TransactionConfirmed,
            serde_json::json!({
                "tx_hash": "0xabc",
                "confirmations": 6,
            }),
        )
        .with_chain(ChainTag::Ethereum);
        ev.stamp();

        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "transaction_confirmed");
        assert_eq!(json["chain"], "ethereum");
        assert_eq!(json["data"]["confirmations"], 6);
        assert!(json["timestamp"].is_string());
    }
}
