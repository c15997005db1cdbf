//! The broadcast-channel port and its wire types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use host_types::ports::{ChainTxStatus, SigningHandle, TransferRequest};
use host_types::{ChainTag, HostResult, TxPriority};
use wallet_store::SecretSeed;

/// Everything a channel needs to sign and submit one transaction.
///
/// The seed is a zeroizing copy lent to the chain adapter for the
/// duration of the attempt; channels must not retain it.
pub struct SubmitParams {
    pub chain: ChainTag,
    pub request: TransferRequest,
    pub address: String,
    pub derivation_path: String,
    pub seed: SecretSeed,
    pub priority: TxPriority,
}

impl SubmitParams {
    /// Signing handle lending the seed to an adapter call.
    pub fn signing_handle(&self) -> SigningHandle<'_> {
        SigningHandle {
            address: &self.address,
            seed: self.seed.expose(),
            derivation_path: &self.derivation_path,
        }
    }
}

impl std::fmt::Debug for SubmitParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Seed deliberately absent.
        f.debug_struct("SubmitParams")
            .field("chain", &self.chain)
            .field("from", &self.request.from)
            .field("to", &self.request.to)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Successful submission: which channel accepted it and the wire hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResult {
    pub channel: String,
    pub signature: String,
}

/// Channel-specific status of a submitted transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelTxStatus {
    pub status: ChainTxStatus,
    pub confirmations: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelTxStatus {
    pub fn unknown() -> Self {
        Self {
            status: ChainTxStatus::Unknown,
            confirmations: 0,
            slot: None,
            block_time: None,
            fee: None,
            error: None,
        }
    }
}

/// A submission path to an on-chain network.
///
/// Channels own their timing: `submit` is expected to give up within
/// the manager's per-attempt budget. Idempotence of re-submitting the
/// same payload is channel business; the manager treats every call as
/// a fresh attempt.
#[async_trait]
pub trait BroadcastChannel: Send + Sync {
    /// Stable channel name (`rpc`, `relay`, `bundle`, `paper`).
    fn name(&self) -> &str;

    /// Disabled channels are skipped by registration.
    fn enabled(&self) -> bool;

    /// Lower value = tried earlier during fallback.
    fn priority(&self) -> u8;

    /// Sign (if needed) and submit; returns the wire hash/signature.
    async fn submit(&self, params: &SubmitParams) -> HostResult<String>;

    /// Channel-specific status poll for a submitted signature.
    async fn status(&self, chain: ChainTag, signature: &str) -> HostResult<ChannelTxStatus>;

    /// Release any connections. Called during shutdown.
    async fn close(&self) {}
}
