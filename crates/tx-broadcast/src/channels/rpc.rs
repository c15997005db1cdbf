//! Direct-RPC channel: sign and submit through the chain adapter.

use std::sync::Arc;

use async_trait::async_trait;

use host_types::{ChainRouter, ChainTag, HostResult};

use crate::channel::{BroadcastChannel, ChannelTxStatus, SubmitParams};
use crate::names;

/// Highest-priority channel. Delegates both submission and status to
/// the chain adapter's own RPC connection.
pub struct RpcChannel {
    chains: Arc<ChainRouter>,
    priority: u8,
}

impl RpcChannel {
    pub fn new(chains: Arc<ChainRouter>) -> Self {
        Self { chains, priority: 0 }
    }
}

#[async_trait]
impl BroadcastChannel for RpcChannel {
    fn name(&self) -> &str {
        names::RPC
    }

    fn enabled(&self) -> bool {
        !self.chains.is_empty()
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    async fn submit(&self, params: &SubmitParams) -> HostResult<String> {
        let chain = self.chains.get(params.chain)?;
        chain
            .sign_and_submit(params.signing_handle(), &params.request)
            .await
    }

    async fn status(&self, chain: ChainTag, signature: &str) -> HostResult<ChannelTxStatus> {
        let adapter = self.chains.get(chain)?;
        let info = adapter.get_tx_status(signature).await?;
        Ok(ChannelTxStatus {
            status: info.status,
            confirmations: info.confirmations,
            slot: info.block_number,
            block_time: info.timestamp,
            fee: info.fee,
            error: info.error,
        })
    }
}
