//! Algonius wallet host test suite.
//!
//! Per-crate behavior lives in each crate's `#[cfg(test)]` modules;
//! this crate holds the cross-crate scenarios: the full
//! agent-decides/extension-decides flows, the authority partition,
//! broadcast failover, backpressure, and graceful shutdown.

pub mod harness;

#[cfg(test)]
mod integration {
    mod authority;
    mod gateway_http;
    mod scenarios;
    mod shutdown;
}
