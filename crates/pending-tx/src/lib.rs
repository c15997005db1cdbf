//! # Pending-Tx - Requests Awaiting a Decision
//!
//! DApp- and agent-initiated signing requests park here until an agent
//! (or the user, via the extension) confirms or rejects them. The
//! registry owns the state machine:
//!
//! ```text
//!                 submit
//!   (none) ─────────────────► pending
//!                                │
//!               confirm ─────────┼──────► confirmed (terminal)
//!               reject  ─────────┼──────► rejected  (terminal)
//!               fail    ─────────┴──────► failed    (terminal)
//! ```
//!
//! ## Invariants
//!
//! - Exactly one terminal transition per entry; terminal state is
//!   immutable and any further decision returns `already_decided`.
//! - Confirmations are monotonically non-decreasing until confirmed.
//! - `rejected_at` and the reject reason are present iff rejected.
//! - Every successful reject writes exactly one audit record.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod audit;
pub mod entry;
pub mod registry;

pub use audit::{ActorSurface, AuditLog, AuditRecord, InMemoryAuditLog, JsonlAuditLog};
pub use registry::{
    NewPendingTx, PendingPage, PendingTxFilter, PendingTxRegistry, RegistryConfig, RejectOutcome,
};

/// Hard cap on `get_pending_transactions` page size.
pub const MAX_PAGE_SIZE: usize = 100;
