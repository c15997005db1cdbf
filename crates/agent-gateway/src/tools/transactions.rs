//! Transaction tools: send, confirm, reject, and listings.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use host_types::{
    normalize_tx_hash, HostError, HostResult, RejectReason, TxKind, TxPriority, TxStatus,
};
use pending_tx::{ActorSurface, NewPendingTx, PendingTxFilter};

use crate::authority::Authority;
use crate::registry::{Tool, ToolHandler, ToolOutput};
use crate::schema::{FieldKind, FieldSpec, InputSchema};
use crate::tools::{
    agent, arg_chain, arg_chain_opt, arg_str, arg_str_opt, arg_u64_opt, ToolContext,
};

const REJECT_REASONS: &[&str] = &[
    "suspicious_activity",
    "high_gas_fee",
    "user_request",
    "security_concern",
    "duplicate_transaction",
];

const TX_TYPES: &[&str] = &["transfer", "swap", "contract", "signature"];
const TX_STATUSES: &[&str] = &["pending", "confirmed", "failed", "rejected"];
const PRIORITIES: &[&str] = &["low", "medium", "high"];

pub fn tools(ctx: &Arc<ToolContext>) -> Vec<Tool> {
    vec![
        agent(Tool {
            name: "send_transaction",
            description: "Queue a transfer. The transaction is parked until it is confirmed \
                          (by this agent or the user) and only then signed and broadcast.",
            schema: InputSchema::new(vec![
                FieldSpec::required("chain", FieldKind::String, "chain to send on"),
                FieldSpec::required("to", FieldKind::String, "recipient address"),
                FieldSpec::required("amount", FieldKind::String, "decimal amount"),
                FieldSpec::optional("from", FieldKind::String, "sender address (defaults to the wallet)"),
                FieldSpec::optional("token", FieldKind::String, "token symbol (defaults to native)"),
                FieldSpec::optional("priority", FieldKind::String, "fee priority")
                    .with_allowed(PRIORITIES),
                FieldSpec::optional("gas_fee", FieldKind::String, "explicit gas fee"),
                FieldSpec::optional(
                    "required_confirmations",
                    FieldKind::Integer,
                    "override the confirmation threshold",
                ),
            ]),
            authority: Authority::Agent,
            handler: Arc::new(SendTransaction { ctx: Arc::clone(ctx) }),
        }),
        agent(Tool {
            name: "confirm_transaction",
            description: "Confirm a parked transaction, or check the confirmation status of a \
                          submitted one by hash.",
            schema: InputSchema::new(vec![
                FieldSpec::optional("transaction_id", FieldKind::String, "pending entry ID"),
                FieldSpec::optional("tx_hash", FieldKind::String, "wire transaction hash"),
                FieldSpec::optional("chain", FieldKind::String, "chain of the transaction"),
            ]),
            authority: Authority::Agent,
            handler: Arc::new(ConfirmTransaction { ctx: Arc::clone(ctx) }),
        }),
        agent(Tool {
            name: "reject_transaction",
            description: "Reject one or more parked transactions. Each rejection is recorded \
                          in the append-only audit log.",
            schema: InputSchema::new(vec![
                FieldSpec::required(
                    "transaction_ids",
                    FieldKind::StringArray,
                    "IDs of the entries to reject",
                ),
                FieldSpec::required("reason", FieldKind::String, "rejection reason")
                    .with_allowed(REJECT_REASONS),
                FieldSpec::optional("details", FieldKind::String, "free-form explanation"),
            ]),
            authority: Authority::Agent,
            handler: Arc::new(RejectTransaction { ctx: Arc::clone(ctx) }),
        }),
        agent(Tool {
            name: "get_transactions",
            description: "List transactions in any state, newest first.",
            schema: InputSchema::new(vec![
                FieldSpec::optional("chain", FieldKind::String, "filter by chain"),
                FieldSpec::optional("address", FieldKind::String, "filter by either endpoint"),
                FieldSpec::optional("type", FieldKind::String, "filter by kind")
                    .with_allowed(TX_TYPES),
                FieldSpec::optional("status", FieldKind::String, "filter by status")
                    .with_allowed(TX_STATUSES),
                FieldSpec::optional("limit", FieldKind::Integer, "page size (max 100)"),
                FieldSpec::optional("offset", FieldKind::Integer, "page offset"),
            ]),
            authority: Authority::Agent,
            handler: Arc::new(GetTransactions {
                ctx: Arc::clone(ctx),
                pending_only: false,
            }),
        }),
        agent(Tool {
            name: "get_pending_transactions",
            description: "List transactions awaiting a decision, newest first.",
            schema: InputSchema::new(vec![
                FieldSpec::optional("chain", FieldKind::String, "filter by chain"),
                FieldSpec::optional("address", FieldKind::String, "filter by either endpoint"),
                FieldSpec::optional("type", FieldKind::String, "filter by kind")
                    .with_allowed(TX_TYPES),
                FieldSpec::optional("limit", FieldKind::Integer, "page size (max 100)"),
                FieldSpec::optional("offset", FieldKind::Integer, "page offset"),
            ]),
            authority: Authority::Agent,
            handler: Arc::new(GetTransactions {
                ctx: Arc::clone(ctx),
                pending_only: true,
            }),
        }),
    ]
}

struct SendTransaction {
    ctx: Arc<ToolContext>,
}

#[async_trait]
impl ToolHandler for SendTransaction {
    async fn call(&self, args: Value) -> HostResult<ToolOutput> {
        let chain = arg_chain(&args)?;
        let to = arg_str(&args, "to")?;
        let amount = arg_str(&args, "amount")?;
        if amount.parse::<f64>().map_or(true, |a| a <= 0.0) {
            return Err(HostError::invalid_params("amount must be a positive number"));
        }
        let from = match arg_str_opt(&args, "from") {
            Some(from) => from,
            None => self.ctx.store.address_for(chain).await?,
        };
        let token = arg_str_opt(&args, "token").unwrap_or_else(|| chain.native_token().to_string());

        let mut new = NewPendingTx::transfer(chain, from, to, amount, token);
        if let Some(priority) = arg_str_opt(&args, "priority") {
            new.priority = serde_json::from_value::<TxPriority>(json!(priority))
                .map_err(|_| HostError::invalid_params("invalid priority"))?;
        }
        new.gas_fee = arg_str_opt(&args, "gas_fee");
        new.required_confirmations = arg_u64_opt(&args, "required_confirmations").map(|v| v as u32);

        let tx = self.ctx.pending.submit(new).await;
        Ok(ToolOutput::with_metadata(
            format!(
                "Transaction `{}` is awaiting confirmation.\n\n- **{} {}** from `{}` to `{}` \
                 on {}\n- Confirm with `confirm_transaction` or reject with \
                 `reject_transaction`.",
                tx.id, tx.amount, tx.token, tx.from, tx.to, tx.chain
            ),
            json!({
                "transaction_id": tx.id,
                "status": tx.status,
                "required_confirmations": tx.required_confirmations,
            }),
        ))
    }
}

struct ConfirmTransaction {
    ctx: Arc<ToolContext>,
}

#[async_trait]
impl ToolHandler for ConfirmTransaction {
    async fn call(&self, args: Value) -> HostResult<ToolOutput> {
        let id = arg_str_opt(&args, "transaction_id")
            .or_else(|| arg_str_opt(&args, "tx_hash"))
            .ok_or_else(|| {
                HostError::invalid_params("one of transaction_id or tx_hash is required")
            })?;
        let chain_hint = arg_chain_opt(&args)?;

        // A known registry entry: either decide it or report it.
        if let Ok(tx) = self.ctx.pending.get(&id).await {
            if tx.status == TxStatus::Pending && tx.confirmations == 0 && tx.id.starts_with("ptx-")
            {
                let submitted = self.ctx.pending.confirm(&id).await?;
                return Ok(ToolOutput::with_metadata(
                    format!(
                        "Confirmed. Submitted as `{}`; waiting for {} confirmations.",
                        submitted.id, submitted.required_confirmations
                    ),
                    json!({
                        "tx_hash": submitted.id,
                        "status": submitted.status,
                        "confirmations": submitted.confirmations,
                        "required_confirmations": submitted.required_confirmations,
                    }),
                ));
            }
            return Ok(ToolOutput::with_metadata(
                format!(
                    "Transaction `{}`: **{}** ({}/{} confirmations).",
                    tx.id,
                    json!(tx.status).as_str().unwrap_or("unknown"),
                    tx.confirmations,
                    tx.required_confirmations
                ),
                json!({
                    "tx_hash": tx.id,
                    "status": tx.status,
                    "confirmations": tx.confirmations,
                    "required_confirmations": tx.required_confirmations,
                    "block_number": tx.block_number,
                }),
            ));
        }

        // Unknown to the registry: fall through to the chain itself.
        let chain = chain_hint.ok_or_else(|| {
            HostError::invalid_params("chain is required when the transaction is not tracked")
        })?;
        let adapter = self.ctx.chains.get(chain)?;
        let hash = normalize_tx_hash(chain, &id);
        let info = adapter.get_tx_status(&hash).await?;
        Ok(ToolOutput::with_metadata(
            format!(
                "Transaction `{hash}`: **{}** ({} confirmations).",
                json!(info.status).as_str().unwrap_or("unknown"),
                info.confirmations
            ),
            json!({
                "tx_hash": hash,
                "status": info.status,
                "confirmations": info.confirmations,
                "block_number": info.block_number,
            }),
        ))
    }
}

struct RejectTransaction {
    ctx: Arc<ToolContext>,
}

#[async_trait]
impl ToolHandler for RejectTransaction {
    async fn call(&self, args: Value) -> HostResult<ToolOutput> {
        let ids: Vec<String> = args
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

        let reason_raw = arg_str(&args, "reason")?;
        let reason: RejectReason = serde_json::from_value(json!(reason_raw))
            .map_err(|_| HostError::invalid_params("invalid rejection reason"))?;
        let details = arg_str_opt(&args, "details");

        let outcomes = self
            .ctx
            .pending
            .reject(&ids, reason, details, ActorSurface::Agent)
            .await;

        let rejected = outcomes.iter().filter(|o| o.rejected).count();
        let lines: Vec<String> = outcomes
            .iter()
            .map(|o| {
                if o.rejected {
                    format!("- `{}`: rejected", o.id)
                } else {
                    format!(
                        "- `{}`: {}",
                        o.id,
                        o.error.as_deref().unwrap_or("not rejected")
                    )
                }
            })
            .collect();

        Ok(ToolOutput::with_metadata(
            format!(
                "Rejected {rejected} of {} transaction(s).\n\n{}",
                outcomes.len(),
                lines.join("\n")
            ),
            json!({ "results": outcomes }),
        ))
    }
}

struct GetTransactions {
    ctx: Arc<ToolContext>,
    pending_only: bool,
}

#[async_trait]
impl ToolHandler for GetTransactions {
    async fn call(&self, args: Value) -> HostResult<ToolOutput> {
        let status = if self.pending_only {
            Some(TxStatus::Pending)
        } else {
            match arg_str_opt(&args, "status") {
                Some(raw) => Some(
                    serde_json::from_value::<TxStatus>(json!(raw))
                        .map_err(|_| HostError::invalid_params("invalid status"))?,
                ),
                None => None,
            }
        };
        let kind = match arg_str_opt(&args, "type") {
            Some(raw) => Some(
                serde_json::from_value::<TxKind>(json!(raw))
                    .map_err(|_| HostError::invalid_params("invalid transaction type"))?,
            ),
            None => None,
        };

        let filter = PendingTxFilter {
            chain: arg_chain_opt(&args)?,
            address: arg_str_opt(&args, "address"),
            kind,
            status,
            limit: arg_u64_opt(&args, "limit").map(|v| v as usize),
            offset: arg_u64_opt(&args, "offset").unwrap_or(0) as usize,
        };
        let page = self.ctx.pending.list(&filter).await;

        let label = if self.pending_only { "pending " } else { "" };
        Ok(ToolOutput::with_metadata(
            format!(
                "{} {label}transaction(s) of {} total{}.",
                page.transactions.len(),
                page.total_count,
                if page.has_more { " (more available)" } else { "" }
            ),
            json!({
                "transactions": page.transactions,
                "total_count": page.total_count,
                "offset": page.offset,
                "limit": page.limit,
                "has_more": page.has_more,
            }),
        ))
    }
}
