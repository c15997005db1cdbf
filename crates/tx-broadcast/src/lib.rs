//! # Tx Broadcast - Ranked Submission Channels
//!
//! Drives on-chain submission through ordered fallback channels:
//! direct RPC, exchange relay, MEV bundle, and paper (simulation).
//!
//! ## Fallback Policy
//!
//! - A named, enabled preferred channel is attempted first.
//! - Otherwise enabled channels are tried in ascending priority.
//! - First success wins; if every channel fails the caller gets
//!   `all_channels_failed` with the per-channel errors collected.
//! - Each attempt is bounded by the per-channel timeout (default
//!   30 s). The loop is cancellable between channels, never
//!   mid-channel.
//! - The manager never retries a single channel; retries are a
//!   channel-internal policy.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod channel;
pub mod channels;
pub mod manager;

pub use channel::{BroadcastChannel, ChannelTxStatus, SubmitParams, SubmitResult};
pub use channels::{BundleChannel, PaperChannel, RelayChannel, RpcChannel};
pub use manager::BroadcastManager;

use std::time::Duration;

/// Default per-channel submission timeout.
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Built-in channel names, in default priority order.
pub mod names {
    pub const RPC: &str = "rpc";
    pub const RELAY: &str = "relay";
    pub const BUNDLE: &str = "bundle";
    pub const PAPER: &str = "paper";
}
