//! # Host Runtime - Lifecycle and the Extension Surface
//!
//! Wires every component of the native host and owns the two things
//! no other crate does: the stdio native-messaging endpoint the
//! browser extension speaks to, and the orchestrator that boots,
//! runs, and tears the process down.
//!
//! ## Boot order
//!
//! ```text
//! wallet store → broadcaster → pending-tx registry → broadcast
//! manager → tool registry → stdio endpoint → dual-transport server
//! ```
//!
//! Teardown runs in reverse, driven by one root shutdown signal
//! (SIGINT/SIGTERM, stdio EOF, or the `shutdown` RPC).

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod config;
pub mod orchestrator;
pub mod stdio;

pub use config::{HostConfig, RunMode};
pub use orchestrator::Orchestrator;
