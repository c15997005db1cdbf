//! Signature and swap tools.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use host_types::ports::QuoteRequest;
use host_types::{HostError, HostResult, TxKind};
use pending_tx::NewPendingTx;

use crate::authority::Authority;
use crate::registry::{Tool, ToolHandler, ToolOutput};
use crate::schema::{FieldKind, FieldSpec, InputSchema};
use crate::tools::{agent, arg_chain, arg_str, arg_u64_opt, ToolContext};

pub fn tools(ctx: &Arc<ToolContext>) -> Vec<Tool> {
    vec![
        agent(Tool {
            name: "sign_message",
            description: "Request an off-chain message signature. The request parks until it \
                          is confirmed; the signature is delivered in the resolution event.",
            schema: InputSchema::new(vec![
                FieldSpec::required("chain", FieldKind::String, "chain whose key signs"),
                FieldSpec::required("message", FieldKind::String, "message to sign"),
            ]),
            authority: Authority::Agent,
            handler: Arc::new(SignMessage { ctx: Arc::clone(ctx) }),
        }),
        agent(Tool {
            name: "swap_tokens",
            description: "Quote a token swap and park it for confirmation.",
            schema: InputSchema::new(vec![
                FieldSpec::required("chain", FieldKind::String, "chain to swap on"),
                FieldSpec::required("from_token", FieldKind::String, "token to sell"),
                FieldSpec::required("to_token", FieldKind::String, "token to buy"),
                FieldSpec::required("amount", FieldKind::String, "decimal amount to sell"),
                FieldSpec::optional("slippage_bps", FieldKind::Integer, "max slippage in basis points"),
            ]),
            authority: Authority::Agent,
            handler: Arc::new(SwapTokens { ctx: Arc::clone(ctx) }),
        }),
    ]
}

struct SignMessage {
    ctx: Arc<ToolContext>,
}

#[async_trait]
impl ToolHandler for SignMessage {
    async fn call(&self, args: Value) -> HostResult<ToolOutput> {
        let chain = arg_chain(&args)?;
        let message = arg_str(&args, "message")?;
        if message.is_empty() {
            return Err(HostError::invalid_params("message must not be empty"));
        }
        let address = self.ctx.store.address_for(chain).await.unwrap_or_default();

        let mut new = NewPendingTx::transfer(chain, address, "", "0", chain.native_token());
        new.kind = TxKind::Signature;
        new.payload = Some(json!({ "message": message }));
        let tx = self.ctx.pending.submit(new).await;

        Ok(ToolOutput::with_metadata(
            format!(
                "Signature request `{}` is awaiting confirmation. The signature will be \
                 delivered in the resolution event once confirmed.",
                tx.id
            ),
            json!({
                "transaction_id": tx.id,
                "status": tx.status,
            }),
        ))
    }
}

struct SwapTokens {
    ctx: Arc<ToolContext>,
}

#[async_trait]
impl ToolHandler for SwapTokens {
    async fn call(&self, args: Value) -> HostResult<ToolOutput> {
        let chain = arg_chain(&args)?;
        let from_token = arg_str(&args, "from_token")?;
        let to_token = arg_str(&args, "to_token")?;
        let amount = arg_str(&args, "amount")?;
        if amount.parse::<f64>().map_or(true, |a| a <= 0.0) {
            return Err(HostError::invalid_params("amount must be a positive number"));
        }

        let quote = self
            .ctx
            .dex
            .quote(&QuoteRequest {
                chain,
                from_token: from_token.clone(),
                to_token: to_token.clone(),
                amount_in: amount.clone(),
                slippage_bps: arg_u64_opt(&args, "slippage_bps").map(|v| v as u32),
            })
            .await?;

        let address = self.ctx.store.address_for(chain).await?;
        let mut new = NewPendingTx::transfer(chain, address, "", amount, from_token.clone());
        new.kind = TxKind::Swap;
        new.payload = Some(json!({
            "from_token": from_token,
            "to_token": to_token,
            "quote": quote,
        }));
        let tx = self.ctx.pending.submit(new).await;

        Ok(ToolOutput::with_metadata(
            format!(
                "Swap quote: **{} {}** → **{} {}** (price impact {}%). Swap `{}` is awaiting \
                 confirmation; it expires at {}.",
                quote.amount_in,
                from_token,
                quote.amount_out,
                to_token,
                quote.price_impact,
                tx.id,
                quote.valid_until
            ),
            json!({
                "transaction_id": tx.id,
                "status": tx.status,
                "quote": quote,
            }),
        ))
    }
}
