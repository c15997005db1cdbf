//! Privileged method handlers for the extension surface.
//!
//! These methods exist only on the stdio pipe; none of them is ever
//! visible through the agent gateway. Agent-surface methods
//! (`tools/call` and friends) are equally invisible here, so the two
//! surfaces stay disjoint in both directions.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use host_bus::EventBroadcaster;
use host_types::{
    ChainRouter, ChainTag, EventKind, HostError, HostResult, RejectReason, TxKind, WalletEvent,
};
use pending_tx::{ActorSurface, NewPendingTx, PendingTxRegistry};
use wallet_store::WalletStore;

/// Dependencies shared by every privileged handler.
pub struct MethodContext {
    pub store: Arc<WalletStore>,
    pub pending: Arc<PendingTxRegistry>,
    pub bus: Arc<EventBroadcaster>,
    pub chains: Arc<ChainRouter>,
    pub sse_port: u16,
    pub sse_base_url: String,
    pub start_time: DateTime<Utc>,
    pub started: Instant,
}

/// The extension-surface method table.
pub struct MethodTable {
    ctx: Arc<MethodContext>,
}

impl MethodTable {
    pub fn new(ctx: Arc<MethodContext>) -> Self {
        Self { ctx }
    }

    /// Every method name this surface accepts.
    pub const METHODS: &'static [&'static str] = &[
        "init",
        "status",
        "wallet_status",
        "import_wallet",
        #[cfg(feature = "wallet-export")]
        "export_wallet",
        "unlock_wallet",
        "lock_wallet",
        "approve_transaction",
        "reject_transaction",
        "web3_request",
        "shutdown",
    ];

    pub async fn dispatch(&self, method: &str, params: &Value) -> HostResult<Value> {
        match method {
            "init" => self.init().await,
            "status" => self.status(),
            "wallet_status" => self.wallet_status().await,
            "import_wallet" => self.import_wallet(params).await,
            #[cfg(feature = "wallet-export")]
            "export_wallet" => self.export_wallet().await,
            "unlock_wallet" => self.unlock_wallet(params).await,
            "lock_wallet" => self.lock_wallet().await,
            "approve_transaction" => self.approve_transaction(params).await,
            "reject_transaction" => self.reject_transaction(params).await,
            "web3_request" => self.web3_request(params).await,
            "shutdown" => Ok(json!({"status": "shutting_down"})),
            other => Err(HostError::MethodNotFound {
                method: other.to_string(),
            }),
        }
    }

    async fn init(&self) -> HostResult<Value> {
        let status = self.ctx.store.status().await;
        Ok(json!({
            "version": host_types::PROTOCOL_VERSION,
            "sse_port": self.ctx.sse_port,
            "sse_base_url": self.ctx.sse_base_url,
            "wallet": status,
        }))
    }

    fn status(&self) -> HostResult<Value> {
        Ok(json!({
            "version": host_types::PROTOCOL_VERSION,
            "uptime": self.ctx.started.elapsed().as_secs(),
            "start_time": self.ctx.start_time,
            "current_time": Utc::now(),
            "sse_port": self.ctx.sse_port,
            "sse_base_url": self.ctx.sse_base_url,
        }))
    }

    async fn wallet_status(&self) -> HostResult<Value> {
        Ok(serde_json::to_value(self.ctx.store.status().await)
            .unwrap_or_else(|_| json!({})))
    }

    async fn import_wallet(&self, params: &Value) -> HostResult<Value> {
        let mnemonic = required_str(params, "mnemonic")?;
        let password = required_str(params, "password")?;
        let chain = ChainTag::from_str(&required_str(params, "chain")?)?;
        let derivation_path = params
            .get("derivation_path")
            .and_then(Value::as_str)
            .unwrap_or(if chain.is_evm() {
                "m/44'/60'/0'/0/0"
            } else {
                "m/44'/501'/0'/0'"
            });

        let status = self
            .ctx
            .store
            .import(&mnemonic, &password, chain, derivation_path)
            .await?;
        self.emit_wallet_status(&status);
        info!("Wallet imported via extension");
        Ok(serde_json::to_value(status).unwrap_or_else(|_| json!({})))
    }

    #[cfg(feature = "wallet-export")]
    async fn export_wallet(&self) -> HostResult<Value> {
        let mnemonic = self.ctx.store.export_mnemonic().await?;
        Ok(json!({ "mnemonic": mnemonic }))
    }

    async fn unlock_wallet(&self, params: &Value) -> HostResult<Value> {
        let password = required_str(params, "password")?;
        let status = self.ctx.store.unlock(&password).await?;
        self.emit_wallet_status(&status);
        Ok(serde_json::to_value(status).unwrap_or_else(|_| json!({})))
    }

    async fn lock_wallet(&self) -> HostResult<Value> {
        let status = self.ctx.store.lock().await;
        self.emit_wallet_status(&status);
        // Locking with no wallet loaded is still a success.
        Ok(json!({ "locked": true }))
    }

    async fn approve_transaction(&self, params: &Value) -> HostResult<Value> {
        let id = required_str(params, "transaction_id")?;
        let tx = self.ctx.pending.confirm(&id).await?;
        Ok(json!({
            "tx_hash": tx.id,
            "status": tx.status,
            "required_confirmations": tx.required_confirmations,
        }))
    }

    async fn reject_transaction(&self, params: &Value) -> HostResult<Value> {
        let ids: Vec<String> = params
            .get("transaction_ids")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if ids.is_empty() {
            return Err(HostError::invalid_params("transaction_ids must not be empty"));
        }
        let reason: RejectReason = params
            .get("reason")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|_| HostError::invalid_params("invalid rejection reason"))?
            .unwrap_or(RejectReason::UserRequest);
        let details = params
            .get("details")
            .and_then(Value::as_str)
            .map(str::to_string);

        let outcomes = self
            .ctx
            .pending
            .reject(&ids, reason, details, ActorSurface::Extension)
            .await;
        Ok(json!({ "results": outcomes }))
    }

    /// The extension's conduit for DApp Web3 calls. Read-only calls
    /// answer inline; authorization-requiring ones park a pending
    /// entry and return a correlation token, with the final result
    /// pushed as an event when the decision resolves.
    async fn web3_request(&self, params: &Value) -> HostResult<Value> {
        let method = required_str(params, "method")?;
        let chain = match params.get("chain").and_then(Value::as_str) {
            Some(raw) => ChainTag::from_str(raw)?,
            None => ChainTag::Ethereum,
        };
        let args = params.get("params").cloned().unwrap_or(Value::Null);

        match method.as_str() {
            "eth_accounts" | "eth_requestAccounts" => {
                match self.ctx.store.address_for(chain).await {
                    Ok(address) => Ok(json!([address])),
                    Err(HostError::WalletNotFound) => Ok(json!([])),
                    Err(err) => Err(err),
                }
            }
            "eth_chainId" => {
                let id = chain.evm_chain_id().ok_or_else(|| {
                    HostError::invalid_params(format!("{chain} has no EVM chain id"))
                })?;
                Ok(json!(format!("0x{id:x}")))
            }
            "eth_getBalance" => {
                let address = args
                    .get(0)
                    .and_then(Value::as_str)
                    .ok_or_else(|| HostError::invalid_params("missing address param"))?;
                let adapter = self.ctx.chains.get(chain)?;
                let balance = adapter.get_balance(address, chain.native_token()).await?;
                Ok(json!(balance))
            }
            "eth_sendTransaction" => {
                let tx = args
                    .get(0)
                    .cloned()
                    .ok_or_else(|| HostError::invalid_params("missing transaction param"))?;
                let from = tx.get("from").and_then(Value::as_str).unwrap_or_default();
                let to = tx
                    .get("to")
                    .and_then(Value::as_str)
                    .ok_or_else(|| HostError::invalid_params("missing 'to' field"))?;
                let amount = tx
                    .get("value")
                    .and_then(Value::as_str)
                    .unwrap_or("0")
                    .to_string();

                let correlation = format!("web3-{}", Uuid::new_v4());
                let mut new = NewPendingTx::transfer(
                    chain,
                    from,
                    to,
                    amount,
                    chain.native_token(),
                );
                if tx.get("data").and_then(Value::as_str).is_some() {
                    new.kind = TxKind::Contract;
                    new.payload = Some(tx.clone());
                }
                new.correlation = Some(correlation.clone());
                let parked = self.ctx.pending.submit(new).await;

                Ok(json!({
                    "status": "pending_confirmation",
                    "transaction_id": parked.id,
                    "correlation": correlation,
                }))
            }
            "personal_sign" | "eth_sign" | "eth_signTypedData" | "eth_signTypedData_v3"
            | "eth_signTypedData_v4" => {
                // personal_sign is [message, address]; the rest are
                // [address, payload].
                let raw_message = if method == "personal_sign" {
                    args.get(0).and_then(Value::as_str).map(str::to_string)
                } else {
                    args.get(1)
                        .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                };
                let message = raw_message
                    .ok_or_else(|| HostError::invalid_params("missing message param"))?;

                let address = self.ctx.store.address_for(chain).await.unwrap_or_default();
                let correlation = format!("web3-{}", Uuid::new_v4());
                let mut new =
                    NewPendingTx::transfer(chain, address, "", "0", chain.native_token());
                new.kind = TxKind::Signature;
                new.payload = Some(json!({ "message": message, "web3_method": method }));
                new.correlation = Some(correlation.clone());
                let parked = self.ctx.pending.submit(new).await;

                Ok(json!({
                    "status": "pending_confirmation",
                    "transaction_id": parked.id,
                    "correlation": correlation,
                }))
            }
            other => Err(HostError::MethodNotFound {
                method: format!("web3_request/{other}"),
            }),
        }
    }

    fn emit_wallet_status(&self, status: &host_types::WalletStatusInfo) {
        self.ctx.bus.broadcast(WalletEvent::new(
            EventKind::WalletStatusChanged,
            json!({
                "has_wallet": status.has_wallet,
                "is_unlocked": status.is_unlocked,
            }),
        ));
    }
}

fn required_str(params: &Value, name: &str) -> HostResult<String> {
    params
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| HostError::invalid_params(format!("missing required field: {name}")))
}
