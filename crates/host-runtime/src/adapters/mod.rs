//! In-tree stand-ins for the external chain/DEX collaborators.
//!
//! Real adapters (chain-specific cryptography, transaction assembly,
//! DEX routing) live outside this repository; the mock pair below
//! keeps every host path exercisable under `RUN_MODE=test` and in
//! development.

pub mod mock_chain;
pub mod mock_dex;

pub use mock_chain::MockChain;
pub use mock_dex::MockDex;

use std::sync::Arc;

use host_types::{ChainRouter, ChainTag};

use crate::config::HostConfig;

/// Build the chain router with one adapter per supported chain.
pub fn build_chain_router(config: &HostConfig) -> Arc<ChainRouter> {
    let router = Arc::new(ChainRouter::new());
    for chain in ChainTag::ALL {
        let endpoints = config
            .chain_rpc_endpoints
            .get(&chain)
            .cloned()
            .unwrap_or_default();
        router.register(Arc::new(MockChain::new(chain, endpoints)));
    }
    router
}
