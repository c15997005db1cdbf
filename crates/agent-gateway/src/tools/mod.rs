//! The agent-visible tool set and resources.
//!
//! Every handler receives its dependencies through [`ToolContext`];
//! nothing reaches for process-global state.

pub mod trading;
pub mod transactions;
pub mod wallet;

use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;

use host_bus::EventBroadcaster;
use host_types::ports::Dex;
use host_types::{ChainRouter, ChainTag, HostError, HostResult};
use pending_tx::PendingTxRegistry;
use wallet_store::WalletStore;

use crate::authority::Authority;
use crate::registry::{Resource, Tool, ToolRegistry};

/// Constructor-injected dependencies shared by all tool handlers.
pub struct ToolContext {
    pub store: Arc<WalletStore>,
    pub pending: Arc<PendingTxRegistry>,
    pub chains: Arc<ChainRouter>,
    pub dex: Arc<dyn Dex>,
    pub bus: Arc<EventBroadcaster>,
}

/// Build the full agent surface over the given context.
pub fn build_registry(ctx: Arc<ToolContext>) -> ToolRegistry {
    let mut tools: Vec<Tool> = Vec::new();
    tools.extend(wallet::tools(&ctx));
    tools.extend(transactions::tools(&ctx));
    tools.extend(trading::tools(&ctx));

    let resources: Vec<Resource> = wallet::resources(&ctx);
    ToolRegistry::new(tools, resources)
}

/// Names every agent-visible tool must carry, used by start-up checks.
pub const REQUIRED_AGENT_TOOLS: &[&str] = &[
    "create_wallet",
    "get_balance",
    "send_transaction",
    "confirm_transaction",
    "reject_transaction",
    "get_transactions",
    "get_pending_transactions",
    "sign_message",
    "swap_tokens",
];

pub(crate) fn agent(tool: Tool) -> Tool {
    debug_assert_eq!(tool.authority, Authority::Agent);
    tool
}

// ── argument helpers ─────────────────────────────────────────────

pub(crate) fn arg_str(args: &Value, name: &str) -> HostResult<String> {
    args.get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| HostError::invalid_params(format!("missing required field: {name}")))
}

pub(crate) fn arg_str_opt(args: &Value, name: &str) -> Option<String> {
    args.get(name).and_then(Value::as_str).map(str::to_string)
}

pub(crate) fn arg_u64_opt(args: &Value, name: &str) -> Option<u64> {
    args.get(name).and_then(Value::as_u64)
}

pub(crate) fn arg_chain(args: &Value) -> HostResult<ChainTag> {
    ChainTag::from_str(&arg_str(args, "chain")?)
}

pub(crate) fn arg_chain_opt(args: &Value) -> HostResult<Option<ChainTag>> {
    match arg_str_opt(args, "chain") {
        Some(raw) => Ok(Some(ChainTag::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Default derivation path per chain family.
pub(crate) fn default_derivation_path(chain: ChainTag) -> &'static str {
    if chain.is_evm() {
        "m/44'/60'/0'/0/0"
    } else {
        "m/44'/501'/0'/0'"
    }
}
