//! MEV-bundle channel: private submission through a builder endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use host_types::ports::ChainTxStatus;
use host_types::{ChainRouter, ChainTag, HostError, HostResult};

use crate::channel::{BroadcastChannel, ChannelTxStatus, SubmitParams};
use crate::names;

/// Bundle endpoint configuration (`BUNDLE_*` env).
#[derive(Debug, Clone, Default)]
pub struct BundleConfig {
    pub endpoint: String,
    pub api_key: String,
}

impl BundleConfig {
    pub fn is_configured(&self) -> bool {
        !self.endpoint.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct BundleSubmitResponse {
    bundle_id: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BundleStatusResponse {
    /// `pending` | `included` | `dropped`
    status: String,
    block_number: Option<u64>,
    block_time: Option<i64>,
}

/// Shields submissions from the public mempool by sending them as a
/// single-transaction bundle. EVM chains only.
pub struct BundleChannel {
    config: BundleConfig,
    chains: Arc<ChainRouter>,
    client: reqwest::Client,
    priority: u8,
}

impl BundleChannel {
    pub fn new(config: BundleConfig, chains: Arc<ChainRouter>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(25))
            .build()
            .unwrap_or_default();
        Self {
            config,
            chains,
            client,
            priority: 2,
        }
    }
}

#[async_trait]
impl BroadcastChannel for BundleChannel {
    fn name(&self) -> &str {
        names::BUNDLE
    }

    fn enabled(&self) -> bool {
        self.config.is_configured()
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    async fn submit(&self, params: &SubmitParams) -> HostResult<String> {
        if !params.chain.is_evm() {
            return Err(HostError::ChainRpcFailed {
                message: format!("bundle channel does not support {}", params.chain),
            });
        }

        let chain = self.chains.get(params.chain)?;
        let signed = chain
            .sign_transfer(params.signing_handle(), &params.request)
            .await?;

        let url = format!("{}/v1/bundle", self.config.endpoint.trim_end_matches('/'));
        debug!(url = url.as_str(), chain = %params.chain, "Bundle submit");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&serde_json::json!({
                "chain": params.chain.as_str(),
                "transactions": [signed.raw],
            }))
            .send()
            .await
            .map_err(|e| HostError::ChainRpcFailed {
                message: format!("bundle request failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(HostError::ChainRpcFailed {
                message: format!("bundle endpoint returned HTTP {}", response.status()),
            });
        }

        let body: BundleSubmitResponse =
            response.json().await.map_err(|e| HostError::ChainRpcFailed {
                message: format!("bundle response malformed: {e}"),
            })?;

        if let Some(err) = body.error {
            return Err(HostError::ChainRpcFailed {
                message: format!("bundle rejected: {err}"),
            });
        }
        if body.bundle_id.is_none() {
            return Err(HostError::ChainRpcFailed {
                message: "bundle endpoint returned no bundle id".to_string(),
            });
        }
        // Status polling keys off the transaction hash, not the
        // bundle id: the bundle-status API accepts either.
        Ok(signed.hash)
    }

    async fn status(&self, chain: ChainTag, signature: &str) -> HostResult<ChannelTxStatus> {
        let url = format!(
            "{}/v1/bundle/status/{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            chain.as_str(),
            signature
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| HostError::ChainRpcFailed {
                message: format!("bundle status failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Ok(ChannelTxStatus::unknown());
        }

        let body: BundleStatusResponse =
            response.json().await.map_err(|e| HostError::ChainRpcFailed {
                message: format!("bundle status malformed: {e}"),
            })?;

        let (status, confirmations) = match body.status.as_str() {
            "pending" => (ChainTxStatus::Pending, 0),
            // An included bundle is final from the builder's side;
            // confirmation depth still comes from the chain itself.
            "included" => (ChainTxStatus::Processed, 1),
            "dropped" => (ChainTxStatus::Failed, 0),
            _ => (ChainTxStatus::Unknown, 0),
        };
        Ok(ChannelTxStatus {
            status,
            confirmations,
            slot: body.block_number,
            block_time: body.block_time,
            fee: None,
            error: None,
        })
    }
}
