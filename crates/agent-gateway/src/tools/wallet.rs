//! Wallet tools (`create_wallet`, `get_balance`) and the resource set.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use host_types::{EventKind, HostResult, WalletEvent};

use crate::authority::Authority;
use crate::registry::{Resource, ResourceReader, Tool, ToolHandler, ToolOutput};
use crate::schema::{FieldKind, FieldSpec, InputSchema};
use crate::tools::{agent, arg_chain, arg_str, arg_str_opt, default_derivation_path, ToolContext};

pub fn tools(ctx: &Arc<ToolContext>) -> Vec<Tool> {
    vec![
        agent(Tool {
            name: "create_wallet",
            description: "Create a new wallet for a chain. The recovery phrase stays on the \
                          host; back it up through the extension, never through this surface.",
            schema: InputSchema::new(vec![
                FieldSpec::required("chain", FieldKind::String, "target chain, e.g. ethereum"),
                FieldSpec::required("password", FieldKind::String, "encryption password (min 8 chars)"),
            ]),
            authority: Authority::Agent,
            handler: Arc::new(CreateWallet { ctx: Arc::clone(ctx) }),
        }),
        agent(Tool {
            name: "get_balance",
            description: "Get the balance of an address. Defaults to the host wallet's address \
                          and the chain's native token.",
            schema: InputSchema::new(vec![
                FieldSpec::required("chain", FieldKind::String, "chain to query"),
                FieldSpec::optional("address", FieldKind::String, "address to query"),
                FieldSpec::optional("token", FieldKind::String, "token symbol"),
            ]),
            authority: Authority::Agent,
            handler: Arc::new(GetBalance { ctx: Arc::clone(ctx) }),
        }),
    ]
}

pub fn resources(ctx: &Arc<ToolContext>) -> Vec<Resource> {
    vec![
        Resource {
            uri: "wallet_status",
            name: "Wallet status",
            mime_type: "application/json",
            subscribable: false,
            reader: Arc::new(WalletStatusResource { ctx: Arc::clone(ctx) }),
        },
        Resource {
            uri: "supported_chains",
            name: "Supported chains",
            mime_type: "application/json",
            subscribable: false,
            reader: Arc::new(SupportedChainsResource { ctx: Arc::clone(ctx) }),
        },
        Resource {
            uri: "supported_tokens",
            name: "Supported tokens",
            mime_type: "application/json",
            subscribable: false,
            reader: Arc::new(SupportedTokensResource { ctx: Arc::clone(ctx) }),
        },
        Resource {
            uri: "events://live_stream",
            name: "Recent wallet events",
            mime_type: "application/json",
            subscribable: true,
            reader: Arc::new(LiveStreamResource { ctx: Arc::clone(ctx) }),
        },
    ]
}

struct CreateWallet {
    ctx: Arc<ToolContext>,
}

#[async_trait]
impl ToolHandler for CreateWallet {
    async fn call(&self, args: Value) -> HostResult<ToolOutput> {
        let chain = arg_chain(&args)?;
        let password = arg_str(&args, "password")?;

        let (status, _mnemonic) = self
            .ctx
            .store
            .create(&password, chain, default_derivation_path(chain))
            .await?;
        // The mnemonic never crosses the agent surface.

        self.ctx.bus.broadcast(WalletEvent::new(
            EventKind::WalletStatusChanged,
            json!({"has_wallet": true, "is_unlocked": true}),
        ));

        let address = status.address.clone().unwrap_or_default();
        Ok(ToolOutput::with_metadata(
            format!(
                "Created a new {chain} wallet.\n\n- **Address**: `{address}`\n- The wallet is \
                 unlocked for this session.\n- Back up the recovery phrase via the extension \
                 before funding this wallet."
            ),
            json!({
                "address": address,
                "public_key": status.public_key,
                "chains": status.chains,
                "is_unlocked": status.is_unlocked,
            }),
        ))
    }
}

struct GetBalance {
    ctx: Arc<ToolContext>,
}

#[async_trait]
impl ToolHandler for GetBalance {
    async fn call(&self, args: Value) -> HostResult<ToolOutput> {
        let chain = arg_chain(&args)?;
        let adapter = self.ctx.chains.get(chain)?;
        let address = match arg_str_opt(&args, "address") {
            Some(address) => address,
            None => self.ctx.store.address_for(chain).await?,
        };
        let token = arg_str_opt(&args, "token").unwrap_or_else(|| chain.native_token().to_string());

        let balance = adapter.get_balance(&address, &token).await?;
        Ok(ToolOutput::with_metadata(
            format!("Balance of `{address}` on {chain}: **{balance} {token}**"),
            json!({
                "chain": chain,
                "address": address,
                "token": token,
                "balance": balance,
            }),
        ))
    }
}

struct WalletStatusResource {
    ctx: Arc<ToolContext>,
}

#[async_trait]
impl ResourceReader for WalletStatusResource {
    async fn read(&self) -> HostResult<Value> {
        Ok(serde_json::to_value(self.ctx.store.status().await)
            .unwrap_or_else(|_| json!({})))
    }
}

struct SupportedChainsResource {
    ctx: Arc<ToolContext>,
}

#[async_trait]
impl ResourceReader for SupportedChainsResource {
    async fn read(&self) -> HostResult<Value> {
        let chains: Vec<Value> = self
            .ctx
            .chains
            .tags()
            .into_iter()
            .map(|tag| {
                json!({
                    "name": tag.as_str(),
                    "native_token": tag.native_token(),
                    "required_confirmations": tag.default_required_confirmations(),
                })
            })
            .collect();
        Ok(json!({ "chains": chains }))
    }
}

struct SupportedTokensResource {
    ctx: Arc<ToolContext>,
}

#[async_trait]
impl ResourceReader for SupportedTokensResource {
    async fn read(&self) -> HostResult<Value> {
        let tokens: Vec<Value> = self
            .ctx
            .chains
            .tags()
            .into_iter()
            .map(|tag| {
                json!({
                    "chain": tag.as_str(),
                    "tokens": [tag.native_token(), "USDT", "USDC"],
                })
            })
            .collect();
        Ok(json!({ "tokens": tokens }))
    }
}

struct LiveStreamResource {
    ctx: Arc<ToolContext>,
}

#[async_trait]
impl ResourceReader for LiveStreamResource {
    async fn read(&self) -> HostResult<Value> {
        // Polling view over the recent-events window; the push path
        // is the SSE stream itself.
        let events = self.ctx.bus.recent_events();
        Ok(json!({
            "count": events.len(),
            "events": events,
        }))
    }
}
