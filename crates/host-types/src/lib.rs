//! # Host Types - Shared Entities for the Wallet Host
//!
//! Common vocabulary for every crate in the workspace: chain tags,
//! wallet and transaction entities, the event model, the error
//! taxonomy with its per-surface wire codes, the JSON-RPC envelope,
//! and the `Chain`/`Dex` collaborator ports.
//!
//! ## Design Rules
//!
//! - Entities carry no behavior beyond validation and formatting;
//!   state machines live in the owning crate.
//! - Errors are surface-agnostic kinds here; transports map them to
//!   their wire representation at the boundary.
//! - Collaborator ports are object-safe async traits so the runtime
//!   can swap real adapters for mocks under test.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod chain;
pub mod entities;
pub mod error;
pub mod events;
pub mod ports;
pub mod rpc;
pub mod shutdown;

pub use chain::{normalize_tx_hash, ChainTag};
pub use entities::{
    PendingTransaction, RejectReason, TxKind, TxPriority, TxStatus, WalletStatusInfo,
};
pub use error::{HostError, HostResult};
pub use events::{EventKind, WalletEvent};
pub use ports::{
    Chain, ChainRouter, ChainTxStatus, Dex, GasEstimate, QuoteRequest, QuoteResult,
    SignedTransfer, SigningHandle, TransferRequest, TxStatusInfo,
};
pub use rpc::{RpcErrorObject, RpcId, RpcRequest, RpcResponse, StdioFrame};
pub use shutdown::{Shutdown, ShutdownListener};

/// Host protocol version reported in `initialize` and `status` replies.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server name reported to agent sessions on connect.
pub const SERVER_NAME: &str = "algonius-wallet-host";
