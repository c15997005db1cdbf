//! Collaborator ports consumed by the host core.
//!
//! Chain-specific cryptography, address derivation, and transaction
//! assembly live behind the `Chain` trait; quote and route computation
//! behind `Dex`. The runtime wires concrete adapters (or mocks under
//! `RUN_MODE=test`) into a `ChainRouter` shared by the registries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::chain::ChainTag;
use crate::error::{HostError, HostResult};

/// Status of a submitted transaction as reported by a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainTxStatus {
    Pending,
    Processed,
    Confirmed,
    Failed,
    Unknown,
}

/// Result of a chain status query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxStatusInfo {
    pub status: ChainTxStatus,
    pub confirmations: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Gas estimate returned by `Chain::estimate_gas`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasEstimate {
    pub gas_limit: u64,
    /// Decimal string in the chain's native fee unit.
    pub gas_price: String,
}

/// An unsigned transfer handed to the chain adapter for assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub chain: ChainTag,
    pub from: String,
    pub to: String,
    pub amount: String,
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
}

/// Opaque handle to signing material, resolved by the wallet store.
///
/// The adapter receives the seed bytes only for the duration of the
/// call; it must not retain them.
pub struct SigningHandle<'a> {
    pub address: &'a str,
    pub seed: &'a [u8],
    pub derivation_path: &'a str,
}

/// A transaction signed but not yet submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTransfer {
    /// Raw signed payload, hex- or base64-encoded per chain.
    pub raw: String,
    /// The hash/signature the payload will have on the wire.
    pub hash: String,
}

/// Chain collaborator: balance, gas, sign-and-submit, status.
#[async_trait]
pub trait Chain: Send + Sync {
    /// Tag this adapter serves.
    fn tag(&self) -> ChainTag;

    /// Confirmation threshold this chain considers final. Defaults to
    /// the family default; non-EVM adapters declare their own.
    fn required_confirmations(&self) -> u32 {
        self.tag().default_required_confirmations()
    }

    /// Derive the wallet's address and public key from a seed. Pure;
    /// the seed must not be retained.
    fn derive_address(&self, seed: &[u8], derivation_path: &str) -> HostResult<(String, String)>;

    async fn get_balance(&self, address: &str, token: &str) -> HostResult<String>;

    async fn estimate_gas(&self, req: &TransferRequest) -> HostResult<GasEstimate>;

    /// Sign with the wallet's key material and submit to the network,
    /// returning the wire hash/signature.
    async fn sign_and_submit(
        &self,
        wallet: SigningHandle<'_>,
        req: &TransferRequest,
    ) -> HostResult<String>;

    /// Sign without submitting: returns the raw signed payload plus
    /// its wire hash, for channels that submit through their own
    /// endpoint (relay, bundle).
    async fn sign_transfer(
        &self,
        wallet: SigningHandle<'_>,
        req: &TransferRequest,
    ) -> HostResult<SignedTransfer>;

    /// Sign an off-chain message, returning the signature hex.
    async fn sign_message(&self, wallet: SigningHandle<'_>, message: &str) -> HostResult<String>;

    async fn get_tx_status(&self, signature: &str) -> HostResult<TxStatusInfo>;

    /// Poll until `confirmations >= required` or terminal failure.
    async fn confirm(&self, signature: &str, required: u32) -> HostResult<TxStatusInfo>;
}

/// Swap quote request passed to the DEX collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub chain: ChainTag,
    pub from_token: String,
    pub to_token: String,
    pub amount_in: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slippage_bps: Option<u32>,
}

/// Quote returned by the DEX collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteResult {
    pub amount_in: String,
    pub amount_out: String,
    pub gas_estimate: String,
    pub price_impact: String,
    pub route: Vec<String>,
    pub valid_until: i64,
}

/// Result of an executed swap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapResult {
    pub tx_hash: String,
    pub status: ChainTxStatus,
    pub amount_out: String,
}

/// DEX collaborator: quotes and swap execution.
#[async_trait]
pub trait Dex: Send + Sync {
    async fn quote(&self, req: &QuoteRequest) -> HostResult<QuoteResult>;

    async fn execute(&self, wallet: SigningHandle<'_>, req: &QuoteRequest)
        -> HostResult<SwapResult>;
}

/// Routes a chain tag to its adapter. Shared, cheap to clone.
#[derive(Default)]
pub struct ChainRouter {
    chains: dashmap::DashMap<ChainTag, Arc<dyn Chain>>,
}

impl ChainRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, adapter: Arc<dyn Chain>) {
        self.chains.insert(adapter.tag(), adapter);
    }

    pub fn get(&self, tag: ChainTag) -> HostResult<Arc<dyn Chain>> {
        self.chains
            .get(&tag)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| HostError::UnsupportedChain {
                chain: tag.to_string(),
            })
    }

    pub fn tags(&self) -> Vec<ChainTag> {
        let mut tags: Vec<ChainTag> = self.chains.iter().map(|e| *e.key()).collect();
        tags.sort_by_key(|t| t.as_str());
        tags
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}
