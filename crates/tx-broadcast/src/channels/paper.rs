//! Paper channel: accepts everything, touches no network.
//!
//! Used under `RUN_MODE=test` and for dry-run setups. Submissions get
//! a synthetic hash; each status poll advances the simulated
//! confirmation count by one until the chain's threshold is reached.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::RngCore;
use std::collections::HashMap;
use tracing::info;

use host_types::ports::ChainTxStatus;
use host_types::{ChainTag, HostError, HostResult};

use crate::channel::{BroadcastChannel, ChannelTxStatus, SubmitParams};
use crate::names;

pub struct PaperChannel {
    enabled: bool,
    priority: u8,
    /// signature -> (chain, polls so far)
    submissions: Mutex<HashMap<String, (ChainTag, u32)>>,
}

impl PaperChannel {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            priority: 9,
            submissions: Mutex::new(HashMap::new()),
        }
    }

    fn synthetic_hash(chain: ChainTag) -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        if chain.is_evm() {
            format!("0x{}", hex::encode(bytes))
        } else {
            hex::encode(bytes)
        }
    }
}

#[async_trait]
impl BroadcastChannel for PaperChannel {
    fn name(&self) -> &str {
        names::PAPER
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    async fn submit(&self, params: &SubmitParams) -> HostResult<String> {
        let hash = Self::synthetic_hash(params.chain);
        info!(
            chain = %params.chain,
            from = params.request.from.as_str(),
            to = params.request.to.as_str(),
            amount = params.request.amount.as_str(),
            tx_hash = hash.as_str(),
            "Paper submission recorded"
        );
        self.submissions
            .lock()
            .insert(hash.clone(), (params.chain, 0));
        Ok(hash)
    }

    async fn status(&self, _chain: ChainTag, signature: &str) -> HostResult<ChannelTxStatus> {
        let mut submissions = self.submissions.lock();
        let (chain, polls) = submissions
            .get_mut(signature)
            .ok_or_else(|| HostError::TxNotFound {
                id: signature.to_string(),
            })?;

        *polls += 1;
        let required = chain.default_required_confirmations();
        let confirmations = (*polls).min(required);
        let status = if confirmations >= required {
            ChainTxStatus::Confirmed
        } else {
            ChainTxStatus::Pending
        };
        Ok(ChannelTxStatus {
            status,
            confirmations,
            slot: Some(u64::from(*polls)),
            block_time: None,
            fee: Some("0".to_string()),
            error: None,
        })
    }
}
