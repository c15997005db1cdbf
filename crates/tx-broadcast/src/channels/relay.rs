//! Exchange-relay channel: HTTP submission of pre-signed payloads.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use host_types::ports::ChainTxStatus;
use host_types::{ChainRouter, ChainTag, HostError, HostResult};

use crate::channel::{BroadcastChannel, ChannelTxStatus, SubmitParams};
use crate::names;

/// Relay credentials and endpoint, read from `RELAY_*` env by the
/// runtime. The channel is disabled until an endpoint is configured.
#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    pub endpoint: String,
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: String,
}

impl RelayConfig {
    pub fn is_configured(&self) -> bool {
        !self.endpoint.is_empty() && !self.api_key.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct RelaySubmitResponse {
    tx_hash: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RelayStatusResponse {
    status: String,
    #[serde(default)]
    confirmations: u32,
    block_number: Option<u64>,
    fee: Option<String>,
    error: Option<String>,
}

/// Submits through a centralized exchange relay.
pub struct RelayChannel {
    config: RelayConfig,
    chains: Arc<ChainRouter>,
    client: reqwest::Client,
    priority: u8,
}

impl RelayChannel {
    pub fn new(config: RelayConfig, chains: Arc<ChainRouter>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(25))
            .build()
            .unwrap_or_default();
        Self {
            config,
            chains,
            client,
            priority: 1,
        }
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("X-RELAY-KEY", &self.config.api_key)
            .header("X-RELAY-SECRET", &self.config.api_secret)
            .header("X-RELAY-PASSPHRASE", &self.config.passphrase)
    }
}

#[async_trait]
impl BroadcastChannel for RelayChannel {
    fn name(&self) -> &str {
        names::RELAY
    }

    fn enabled(&self) -> bool {
        self.config.is_configured()
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    async fn submit(&self, params: &SubmitParams) -> HostResult<String> {
        let chain = self.chains.get(params.chain)?;
        let signed = chain
            .sign_transfer(params.signing_handle(), &params.request)
            .await?;

        let url = format!("{}/v1/broadcast", self.config.endpoint.trim_end_matches('/'));
        debug!(url = url.as_str(), chain = %params.chain, "Relay submit");

        let response = self
            .authed(self.client.post(&url))
            .json(&serde_json::json!({
                "chain": params.chain.as_str(),
                "raw_transaction": signed.raw,
            }))
            .send()
            .await
            .map_err(|e| HostError::ChainRpcFailed {
                message: format!("relay request failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(HostError::ChainRpcFailed {
                message: format!("relay returned HTTP {}", response.status()),
            });
        }

        let body: RelaySubmitResponse =
            response.json().await.map_err(|e| HostError::ChainRpcFailed {
                message: format!("relay response malformed: {e}"),
            })?;

        if let Some(err) = body.error {
            return Err(HostError::ChainRpcFailed {
                message: format!("relay rejected: {err}"),
            });
        }
        // The relay echoes the hash; fall back to the locally computed
        // one if the field is absent.
        Ok(body.tx_hash.unwrap_or(signed.hash))
    }

    async fn status(&self, chain: ChainTag, signature: &str) -> HostResult<ChannelTxStatus> {
        let url = format!(
            "{}/v1/transactions/{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            chain.as_str(),
            signature
        );
        let response = self
            .authed(self.client.get(&url))
            .send()
            .await
            .map_err(|e| HostError::ChainRpcFailed {
                message: format!("relay status failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Ok(ChannelTxStatus::unknown());
        }

        let body: RelayStatusResponse =
            response.json().await.map_err(|e| HostError::ChainRpcFailed {
                message: format!("relay status malformed: {e}"),
            })?;

        let status = match body.status.as_str() {
            "pending" => ChainTxStatus::Pending,
            "processed" => ChainTxStatus::Processed,
            "confirmed" => ChainTxStatus::Confirmed,
            "failed" => ChainTxStatus::Failed,
            _ => ChainTxStatus::Unknown,
        };
        Ok(ChannelTxStatus {
            status,
            confirmations: body.confirmations,
            slot: body.block_number,
            block_time: None,
            fee: body.fee,
            error: body.error,
        })
    }
}
