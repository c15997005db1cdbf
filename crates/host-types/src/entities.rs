//! Core wallet-host entities.
//!
//! These are the wire-visible shapes shared by the agent gateway, the
//! stdio endpoint, and the registries. State machines that mutate them
//! live in their owning crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chain::ChainTag;

/// Kind of a pending request awaiting a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    /// Native or token transfer.
    Transfer,
    /// DEX swap.
    Swap,
    /// Arbitrary contract interaction.
    Contract,
    /// Off-chain message signature.
    Signature,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxKind::Transfer => "transfer",
            TxKind::Swap => "swap",
            TxKind::Contract => "contract",
            TxKind::Signature => "signature",
        };
        f.write_str(s)
    }
}

/// Lifecycle status of a pending transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    /// Awaiting a decision, or submitted and awaiting confirmations.
    Pending,
    /// Reached the required confirmation count. Terminal.
    Confirmed,
    /// Chain or broadcast failure. Terminal.
    Failed,
    /// Declined by the agent or user. Terminal.
    Rejected,
}

impl TxStatus {
    /// Terminal states are immutable once entered.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxStatus::Pending)
    }
}

/// Fee priority requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxPriority {
    Low,
    #[default]
    Medium,
    High,
}

/// Reason attached to a rejection decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    SuspiciousActivity,
    HighGasFee,
    UserRequest,
    SecurityConcern,
    DuplicateTransaction,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::SuspiciousActivity => "suspicious_activity",
            RejectReason::HighGasFee => "high_gas_fee",
            RejectReason::UserRequest => "user_request",
            RejectReason::SecurityConcern => "security_concern",
            RejectReason::DuplicateTransaction => "duplicate_transaction",
        };
        f.write_str(s)
    }
}

/// Wire-visible snapshot of a pending transaction.
///
/// Invariants enforced by the registry that owns these:
/// - exactly one terminal transition per entry;
/// - `confirmations` monotonically non-decreasing until confirmed;
/// - `rejected_at` and `reject_reason` present iff status = rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTransaction {
    /// Wire hash when available, otherwise an opaque host-assigned ID.
    pub id: String,
    pub chain: ChainTag,
    pub from: String,
    pub to: String,
    pub amount: String,
    pub token: String,
    #[serde(rename = "type")]
    pub kind: TxKind,
    pub status: TxStatus,
    pub confirmations: u32,
    pub required_confirmations: u32,
    /// Estimated or actual gas fee, decimal string in native units.
    pub gas_fee: String,
    pub priority: TxPriority,
    pub submitted_at: DateTime<Utc>,
    pub last_checked: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<RejectReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_log_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    /// Raw payload for signature requests and contract calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl PendingTransaction {
    /// Create a fresh pending entry with defaulted bookkeeping fields.
    pub fn new(
        id: impl Into<String>,
        chain: ChainTag,
        from: impl Into<String>,
        to: impl Into<String>,
        amount: impl Into<String>,
        token: impl Into<String>,
        kind: TxKind,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            chain,
            from: from.into(),
            to: to.into(),
            amount: amount.into(),
            token: token.into(),
            kind,
            status: TxStatus::Pending,
            confirmations: 0,
            required_confirmations: chain.default_required_confirmations(),
            gas_fee: "0".to_string(),
            priority: TxPriority::default(),
            submitted_at: now,
            last_checked: now,
            block_number: None,
            nonce: None,
            reject_reason: None,
            reject_details: None,
            audit_log_id: None,
            rejected_at: None,
            payload: None,
        }
    }
}

/// Wallet status snapshot for `wallet_status` on either surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletStatusInfo {
    pub has_wallet: bool,
    pub is_unlocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    pub chains: Vec<ChainTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

impl WalletStatusInfo {
    /// Status for a host with no wallet on disk.
    pub fn absent() -> Self {
        Self {
            has_wallet: false,
            is_unlocked: false,
            address: None,
            public_key: None,
            chains: Vec::new(),
            created_at: None,
            last_used_at: None,
        }
    }
}
